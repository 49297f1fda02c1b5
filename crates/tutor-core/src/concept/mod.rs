//! Hypothesis spaces the learner has to infer, and the contract the planners rely on.
//!
//! - `letter_addition`: letters bound to a permutation of small numbers, taught through sums.
//! - `number_game`: number-classification rules over `1..=100`.
//! - [`StateActionValues`]: dense items × hypotheses table of evaluations, built once.

mod letter_addition;
mod number_game;

pub use letter_addition::LetterAddition;
pub use number_game::{NumberGame, NumberRule, SpaceMode, TargetRule};

use crate::action::{ActionCosts, ItemId, ModelKind, NoiseParams, Observation, TeachingAction};
use rand::RngCore;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

/// A concept instance: a finite hypothesis space with one true hypothesis.
pub trait Concept {
    type Hypothesis;

    /// Ordered hypothesis space; indices are stable for the lifetime of the concept.
    fn hypothesis_space(&self) -> &[Self::Hypothesis];

    fn true_hypothesis_index(&self) -> usize;

    /// Prior over the hypothesis space, sums to one.
    fn default_prior(&self) -> &[f64];

    /// Number of candidate items; items are addressed as `0..item_count()`.
    fn item_count(&self) -> usize;

    /// Evaluates `hypothesis` on `item`. Must agree with [`Concept::evaluate_indexed`].
    fn evaluate(&self, item: ItemId, hypothesis: &Self::Hypothesis) -> Observation;

    /// Every value a learner may answer with.
    fn observation_space(&self) -> &[Observation];

    fn action_costs(&self) -> ActionCosts;

    fn noise(&self, model: ModelKind) -> NoiseParams;

    /// Precomputed evaluations of every hypothesis on every item.
    fn state_action_values(&self) -> &Arc<StateActionValues>;

    /// Human readable form of an item, with the value when it is revealed.
    fn describe_item(&self, item: ItemId, value: Option<Observation>) -> String;

    fn hypothesis_count(&self) -> usize {
        self.hypothesis_space().len()
    }

    fn candidate_items(&self) -> Range<ItemId> {
        0..self.item_count()
    }

    /// Cached evaluation of the hypothesis at `index` on `item`.
    fn evaluate_indexed(&self, item: ItemId, index: usize) -> Observation {
        self.state_action_values().value(item, index)
    }

    /// Value of `item` under the true hypothesis.
    fn true_value(&self, item: ItemId) -> Observation {
        self.evaluate_indexed(item, self.true_hypothesis_index())
    }

    fn action_cost(&self, action: TeachingAction) -> f64 {
        self.action_costs().cost(action)
    }

    fn transition_noise(&self, model: ModelKind) -> f64 {
        self.noise(model).transition
    }

    fn production_noise(&self, model: ModelKind) -> f64 {
        self.noise(model).production
    }

    /// Items asked during an assessment phase.
    fn assessment_items(&self, _rng: &mut dyn RngCore) -> Vec<ItemId> {
        self.candidate_items().collect()
    }
}

/// Dense table of `evaluate(item, hypothesis)` for every item and hypothesis.
///
/// Rows are items, columns are hypotheses. Owned by the concept and shared read-only
/// with belief models and simulated learners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateActionValues {
    items: usize,
    hypotheses: usize,
    values: Vec<Observation>,
}

impl StateActionValues {
    /// Builds the table by calling `evaluate` once per (item, hypothesis) pair.
    pub fn build<H>(
        items: usize,
        hypotheses: &[H],
        mut evaluate: impl FnMut(ItemId, &H) -> Observation,
    ) -> Self {
        let mut values = Vec::with_capacity(items * hypotheses.len());
        for item in 0..items {
            for hypothesis in hypotheses {
                values.push(evaluate(item, hypothesis));
            }
        }
        Self {
            items,
            hypotheses: hypotheses.len(),
            values,
        }
    }

    pub fn item_count(&self) -> usize {
        self.items
    }

    pub fn hypothesis_count(&self) -> usize {
        self.hypotheses
    }

    pub fn value(&self, item: ItemId, hypothesis: usize) -> Observation {
        self.values[item * self.hypotheses + hypothesis]
    }

    /// Evaluations of every hypothesis on `item`.
    pub fn row(&self, item: ItemId) -> &[Observation] {
        let start = item * self.hypotheses;
        &self.values[start..start + self.hypotheses]
    }

    /// Iterates the hypothesis indices whose evaluation on `item` equals `value`.
    pub fn consistent(&self, item: ItemId, value: Observation) -> impl Iterator<Item = usize> + '_ {
        self.row(item)
            .iter()
            .enumerate()
            .filter(move |(_, v)| **v == value)
            .map(|(idx, _)| idx)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConceptError {
    #[error("concept needs at least {min} letters, got {found}")]
    TooFewLetters { min: usize, found: usize },
    #[error("letter assignment {0:?} is not a permutation of 0..n")]
    InvalidAssignment(Vec<Observation>),
    #[error("unknown target rule '{0}'")]
    UnknownTarget(String),
    #[error("target rule '{0}' is not part of the hypothesis space")]
    TargetNotInSpace(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_row_major_by_item() {
        let hypotheses = [10, 20, 30];
        let table = StateActionValues::build(2, &hypotheses, |item, h| *h + item as i32);
        assert_eq!(table.row(0), &[10, 20, 30]);
        assert_eq!(table.row(1), &[11, 21, 31]);
        assert_eq!(table.value(1, 2), 31);
        assert_eq!(table.consistent(1, 21).collect::<Vec<_>>(), vec![1]);
    }
}
