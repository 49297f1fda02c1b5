#![deny(warnings)]
mod budget;
pub mod config;
mod forward_search;
mod info_gain;
pub mod preplan;
mod random;

pub use config::SearchConfig;
pub use forward_search::{ForwardSearchPlanner, SearchNode};
pub use info_gain::InfoGainPlanner;
pub use preplan::{PlanNode, PreplanTree, ResponseKey};
pub use random::RandomPlanner;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tutor_core::action::{ItemId, ItemResult, Observation, TeachingAction};
use tutor_core::belief::BeliefError;
use tutor_core::belief::telemetry::BeliefMetrics;

/// A teaching step chosen by a planner: present `item` as `action`.
///
/// `value` is the item's true value; it is only shown to the learner when the action
/// reveals content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlannedAction {
    pub action: TeachingAction,
    pub item: ItemId,
    pub value: Observation,
}

impl PlannedAction {
    /// What the learner is shown.
    pub fn result(&self) -> ItemResult {
        ItemResult::for_action(self.action, self.item, self.value)
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Belief(#[from] BeliefError),
    #[error("search budget exhausted after {nodes} nodes ({elapsed_ms} ms)")]
    BudgetExhausted { nodes: usize, elapsed_ms: u64 },
    #[error("concept has no candidate items")]
    NoCandidates,
    #[error("preplanned tree I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed preplanned tree: {0}")]
    Json(#[from] serde_json::Error),
}

/// Chooses teaching actions and tracks what the learner has been shown.
pub trait Planner {
    fn name(&self) -> &'static str;

    /// Next action, given the learner's response to the previous one.
    fn choose_action(
        &mut self,
        prev_response: Option<Observation>,
        rng: &mut dyn RngCore,
    ) -> Result<PlannedAction, PlanError>;

    /// Feeds an executed step and the learner's response back into the planner's belief.
    fn observe(
        &mut self,
        _action: TeachingAction,
        _result: ItemResult,
        _response: Option<Observation>,
    ) -> Result<(), PlanError> {
        Ok(())
    }

    /// Called after every assessment phase.
    fn start_teaching_phase(&mut self) {}

    /// Prepares for a new learner.
    fn reset(&mut self);

    /// Computes a decision tree `depth` actions deep, sampling `samples` items per level.
    fn perform_preplanning(
        &mut self,
        _depth: usize,
        _samples: usize,
        _rng: &mut dyn RngCore,
    ) -> Result<(), PlanError> {
        Ok(())
    }

    fn load_preplanning(&mut self, _tree: PreplanTree) {}

    fn preplanned(&self) -> Option<&PreplanTree> {
        None
    }

    /// Summary of the planner's learner model, for planners that keep one.
    fn belief_metrics(&self) -> Option<BeliefMetrics> {
        None
    }
}
