//! The teaching loop: plan, present, observe, assess.

mod runner;

pub use runner::{PreplanSource, RunSummary, SessionRunner};

use crate::learner::Learner;
use rand::RngCore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Level, event};
use tutor_core::action::{ItemId, ModelKind, Observation, TeachingAction};
use tutor_core::belief::telemetry::BeliefMetrics;
use tutor_core::concept::{Concept, ConceptError};
use tutor_planner::{PlanError, PlannedAction, Planner, RandomPlanner};

/// One JSONL line of the session log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionRow {
    Action(ActionRow),
    Assessment(AssessmentRow),
    Trial(TrialRow),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRow {
    pub run_id: String,
    pub trial: usize,
    pub step: usize,
    /// Planner that chose this step; `random` when the search budget ran out.
    pub planner: String,
    pub action: TeachingAction,
    pub item: ItemId,
    pub shown: String,
    pub response: Option<Observation>,
    pub correct: Option<bool>,
    pub cost: f64,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub belief: Option<BeliefMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentRow {
    pub run_id: String,
    pub trial: usize,
    pub step: usize,
    pub items: usize,
    pub correct: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRow {
    pub run_id: String,
    pub trial: usize,
    pub seed: u64,
    pub planner: String,
    pub learner: ModelKind,
    pub actions: usize,
    pub assessments: usize,
    pub fallbacks: usize,
    pub total_cost: f64,
    pub passed: bool,
}

/// Result of one simulated learner being taught.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub actions: usize,
    pub assessments: usize,
    pub fallbacks: usize,
    pub total_cost: f64,
    pub passed: bool,
    pub rows: Vec<SessionRow>,
}

/// Loop limits for a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialLimits {
    pub max_actions: usize,
    /// Teaching actions between assessments.
    pub phase_len: usize,
}

/// Drives a planner against learners for one concept.
pub struct TeachingSession<C> {
    run_id: String,
    concept: Arc<C>,
    planner: Box<dyn Planner>,
    fallback: RandomPlanner<C>,
    limits: TrialLimits,
}

impl<C: Concept> TeachingSession<C> {
    pub fn new(
        run_id: impl Into<String>,
        concept: Arc<C>,
        planner: Box<dyn Planner>,
        actions: &[TeachingAction],
        limits: TrialLimits,
    ) -> Self {
        let fallback = RandomPlanner::new(Arc::clone(&concept), actions);
        Self {
            run_id: run_id.into(),
            concept,
            planner,
            fallback,
            limits: TrialLimits {
                max_actions: limits.max_actions,
                phase_len: limits.phase_len.max(1),
            },
        }
    }

    pub fn planner(&self) -> &dyn Planner {
        self.planner.as_ref()
    }

    pub fn planner_mut(&mut self) -> &mut dyn Planner {
        self.planner.as_mut()
    }

    /// Teaches `learner` until it passes an assessment or the action budget runs out.
    pub fn run_trial(
        &mut self,
        trial: usize,
        seed: u64,
        learner: &mut dyn Learner,
        rng: &mut dyn RngCore,
    ) -> Result<TrialOutcome, SessionError> {
        self.planner.reset();
        self.fallback.reset();

        let mut rows = Vec::new();
        let mut previous: Option<Observation> = None;
        let mut total_cost = 0.0;
        let mut actions = 0usize;
        let mut assessments = 0usize;
        let mut fallbacks = 0usize;
        let mut passed = false;

        for step in 1..=self.limits.max_actions {
            let (planned, planner_name) = match self.planner.choose_action(previous, rng) {
                Ok(planned) => (planned, self.planner.name()),
                Err(PlanError::BudgetExhausted { nodes, elapsed_ms }) => {
                    event!(
                        target: "tutor_bench::session",
                        Level::WARN,
                        trial,
                        step,
                        nodes,
                        elapsed_ms,
                        "search budget exhausted, falling back to a random action"
                    );
                    fallbacks += 1;
                    (self.fallback.choose_action(previous, rng)?, self.fallback.name())
                }
                Err(err) => return Err(err.into()),
            };

            let result = planned.result();
            let response = present(learner, planned, rng);
            self.planner.observe(planned.action, result, response)?;
            learner.finish_action(planned.action, result);

            let cost = self.concept.action_cost(planned.action);
            total_cost += cost;
            actions = step;
            let correct = response.map(|r| r == planned.value);

            event!(
                target: "tutor_bench::session",
                Level::DEBUG,
                trial,
                step,
                action = %planned.action,
                item = planned.item,
                response = ?response,
                "taught"
            );

            rows.push(SessionRow::Action(ActionRow {
                run_id: self.run_id.clone(),
                trial,
                step,
                planner: planner_name.to_string(),
                action: planned.action,
                item: planned.item,
                shown: self.concept.describe_item(planned.item, result.value),
                response,
                correct,
                cost,
                total_cost,
                belief: self.planner.belief_metrics(),
            }));
            previous = response;

            if step % self.limits.phase_len == 0 {
                assessments += 1;
                let (items, correct) = self.assess(learner, rng);
                passed = items > 0 && correct == items;
                rows.push(SessionRow::Assessment(AssessmentRow {
                    run_id: self.run_id.clone(),
                    trial,
                    step,
                    items,
                    correct,
                    passed,
                }));
                self.planner.start_teaching_phase();
                self.fallback.start_teaching_phase();
                if passed {
                    break;
                }
            }
        }

        event!(
            target: "tutor_bench::session",
            Level::INFO,
            trial,
            actions,
            assessments,
            fallbacks,
            total_cost,
            passed,
            "trial finished"
        );

        rows.push(SessionRow::Trial(TrialRow {
            run_id: self.run_id.clone(),
            trial,
            seed,
            planner: self.planner.name().to_string(),
            learner: learner.kind(),
            actions,
            assessments,
            fallbacks,
            total_cost,
            passed,
        }));

        Ok(TrialOutcome {
            actions,
            assessments,
            fallbacks,
            total_cost,
            passed,
            rows,
        })
    }

    /// Asks every assessment item; returns `(asked, answered correctly)`.
    fn assess(&self, learner: &mut dyn Learner, rng: &mut dyn RngCore) -> (usize, usize) {
        let items = self.concept.assessment_items(rng);
        let correct = items
            .iter()
            .filter(|item| learner.answer(**item, rng) == self.concept.true_value(**item))
            .count();
        (items.len(), correct)
    }
}

/// Shows a planned step to the learner and collects its response.
fn present(
    learner: &mut dyn Learner,
    planned: PlannedAction,
    rng: &mut dyn RngCore,
) -> Option<Observation> {
    match planned.action {
        TeachingAction::Example => {
            learner.see_example(planned.item, planned.value, rng);
            None
        }
        TeachingAction::Quiz => Some(learner.see_quiz(planned.item, rng)),
        TeachingAction::Feedback => {
            let response = learner.see_question(planned.item, rng);
            learner.see_feedback(planned.item, planned.value, response == planned.value, rng);
            Some(response)
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),
    #[error("invalid concept: {0}")]
    Concept(#[from] ConceptError),
    #[error("number game needs a target rule")]
    MissingTarget,
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
}
