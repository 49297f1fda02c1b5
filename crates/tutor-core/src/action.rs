use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Index of an item in a concept's candidate item space.
pub type ItemId = usize;

/// Value produced by evaluating a hypothesis on an item (a sum, a yes/no flag, ...).
pub type Observation = i32;

/// The three ways an item can be presented to a learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TeachingAction {
    /// Show the item together with its correct value.
    Example = 0,
    /// Ask for the value without revealing it.
    Quiz = 1,
    /// Ask for the value, then reveal the correct answer.
    Feedback = 2,
}

impl TeachingAction {
    pub const ALL: [TeachingAction; 3] = [
        TeachingAction::Example,
        TeachingAction::Quiz,
        TeachingAction::Feedback,
    ];

    pub const QUIZ_EXAMPLE_ONLY: [TeachingAction; 2] =
        [TeachingAction::Example, TeachingAction::Quiz];

    /// Whether the learner is told the correct value of the item.
    pub const fn reveals_content(self) -> bool {
        !matches!(self, TeachingAction::Quiz)
    }

    /// Whether the learner produces a response that can be observed.
    pub const fn expects_response(self) -> bool {
        !matches!(self, TeachingAction::Example)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TeachingAction::Example => "EXAMPLE",
            TeachingAction::Quiz => "QUIZ",
            TeachingAction::Feedback => "FEEDBACK",
        }
    }
}

impl fmt::Display for TeachingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown teaching action '{0}'")]
pub struct ActionParseError(pub String);

impl FromStr for TeachingAction {
    type Err = ActionParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "example" => Ok(TeachingAction::Example),
            "quiz" => Ok(TeachingAction::Quiz),
            "feedback" | "question" => Ok(TeachingAction::Feedback),
            _ => Err(ActionParseError(value.to_string())),
        }
    }
}

/// Time cost of each teaching action, in the concept's time units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionCosts {
    pub example: f64,
    pub quiz: f64,
    pub feedback: f64,
}

impl ActionCosts {
    pub const fn new(example: f64, quiz: f64, feedback: f64) -> Self {
        Self {
            example,
            quiz,
            feedback,
        }
    }

    pub const fn cost(&self, action: TeachingAction) -> f64 {
        match action {
            TeachingAction::Example => self.example,
            TeachingAction::Quiz => self.quiz,
            TeachingAction::Feedback => self.feedback,
        }
    }

    /// Cheapest action cost; scales the leaf estimate of the forward search.
    pub fn min(&self) -> f64 {
        self.example.min(self.quiz).min(self.feedback)
    }
}

impl Default for ActionCosts {
    fn default() -> Self {
        Self::new(7.0, 6.6, 12.0)
    }
}

/// Learner model variants; concepts tune their noise constants per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Memoryless,
    Discrete,
    Continuous,
}

impl ModelKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ModelKind::Memoryless => "memoryless",
            ModelKind::Discrete => "discrete",
            ModelKind::Continuous => "continuous",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Noise parameters of a learner model, both in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    /// Probability that the learner's state does not change although the content implies it.
    pub transition: f64,
    /// Probability that a response does not reflect the learner's state.
    pub production: f64,
}

impl NoiseParams {
    pub const fn new(transition: f64, production: f64) -> Self {
        Self {
            transition,
            production,
        }
    }

    pub const fn noiseless() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// An item together with the value revealed to the learner, if any.
///
/// `value` is `None` for quizzes and for the observation-only pass of a feedback action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemResult {
    pub item: ItemId,
    pub value: Option<Observation>,
}

impl ItemResult {
    pub const fn revealed(item: ItemId, value: Observation) -> Self {
        Self {
            item,
            value: Some(value),
        }
    }

    pub const fn hidden(item: ItemId) -> Self {
        Self { item, value: None }
    }

    /// The result a learner actually sees for `action` on an item whose true value is `value`.
    pub const fn for_action(action: TeachingAction, item: ItemId, value: Observation) -> Self {
        if action.reveals_content() {
            Self::revealed(item, value)
        } else {
            Self::hidden(item)
        }
    }
}
