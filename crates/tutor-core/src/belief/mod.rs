//! Belief tracking over a concept's hypothesis space.
//!
//! This module is composed of:
//! - `filter`: the exact Bayesian filter shared by the memoryless and discrete models
//!   (observation step, transition step, validity fallback).
//! - `memoryless`: the filter with no history.
//! - `discrete`: the filter gated by a bounded window of past content.
//! - `continuous`: particle approximation with depletion recovery.
//! - `telemetry`: entropy and summary metrics of a belief.

mod continuous;
mod discrete;
mod filter;
mod memoryless;
pub mod telemetry;

pub use continuous::{
    ContinuousBelief, ContinuousSnapshot, DEFAULT_PARTICLE_CAP, DEPLETION_LIMIT, Particle,
};
pub use discrete::{DEFAULT_MEMORY_SIZE, DiscreteBelief, DiscreteSnapshot, MemoryWindow};
pub use memoryless::MemorylessBelief;

use crate::action::{ItemId, ItemResult, ModelKind, Observation, TeachingAction};
use thiserror::Error;

/// Sum below which a belief vector counts as collapsed.
pub(crate) const ZERO_MASS: f64 = 1e-300;

/// The agent's estimate of what the learner currently believes.
///
/// Every completed [`BeliefModel::update`] leaves a distribution that sums to one.
pub trait BeliefModel {
    /// Opaque copy of the mutable state, restored bit for bit by [`BeliefModel::restore`].
    type Snapshot: Clone;

    fn kind(&self) -> ModelKind;

    fn hypothesis_count(&self) -> usize;

    /// Folds one teaching step into the belief.
    ///
    /// `result.value` is the content revealed to the learner (`None` for quizzes),
    /// `response` the learner's answer (`None` for examples).
    fn update(
        &mut self,
        action: TeachingAction,
        result: ItemResult,
        response: Option<Observation>,
    ) -> Result<(), BeliefError>;

    /// Probability that the learner answers `observation` when asked about `item`.
    fn observation_probability(&self, item: ItemId, observation: Observation) -> f64;

    /// Probability mass on the hypothesis at `index`.
    fn concept_probability(&self, index: usize) -> f64;

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: &Self::Snapshot);

    /// Returns to the state the model was constructed with.
    fn reset(&mut self);

    /// Full distribution over hypotheses.
    fn marginal(&self) -> Vec<f64>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BeliefError {
    #[error("no hypothesis agrees with item {item} = {value} and the remembered content")]
    UnsatisfiableMemory { item: ItemId, value: Observation },
    #[error("history replay left no consistent hypothesis at step {step}")]
    InconsistentHistory { step: usize },
}

/// Drops the response for actions that do not produce one and the value for
/// actions that do not reveal it.
pub(crate) fn sanitize(
    action: TeachingAction,
    result: ItemResult,
    response: Option<Observation>,
) -> (ItemResult, Option<Observation>) {
    let result = if action.reveals_content() {
        result
    } else {
        ItemResult::hidden(result.item)
    };
    let response = if action.expects_response() {
        response
    } else {
        None
    };
    (result, response)
}

/// Scales `values` to sum to one. Returns `false` when the mass is zero.
pub(crate) fn normalize(values: &mut [f64]) -> bool {
    let total: f64 = values.iter().sum();
    if total <= ZERO_MASS || !total.is_finite() {
        return false;
    }
    for value in values.iter_mut() {
        *value /= total;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_what_the_action_cannot_carry() {
        let (result, response) =
            sanitize(TeachingAction::Example, ItemResult::revealed(1, 3), Some(2));
        assert_eq!(result.value, Some(3));
        assert_eq!(response, None);

        let (result, response) = sanitize(TeachingAction::Quiz, ItemResult::revealed(1, 3), Some(2));
        assert_eq!(result.value, None);
        assert_eq!(response, Some(2));
    }

    #[test]
    fn normalize_rejects_zero_mass() {
        let mut zeros = vec![0.0; 3];
        assert!(!normalize(&mut zeros));
        let mut weights = vec![1.0, 3.0];
        assert!(normalize(&mut weights));
        assert_eq!(weights, vec![0.25, 0.75]);
    }
}
