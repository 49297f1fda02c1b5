use super::filter::BeliefFilter;
use super::{BeliefError, BeliefModel};
use crate::action::{ItemId, ItemResult, ModelKind, NoiseParams, Observation, TeachingAction};
use crate::concept::{Concept, StateActionValues};
use std::collections::VecDeque;

pub const DEFAULT_MEMORY_SIZE: usize = 2;

/// Bounded FIFO of the most recent content-revealing steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryWindow {
    capacity: usize,
    entries: VecDeque<(TeachingAction, ItemResult)>,
}

impl MemoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TeachingAction, ItemResult)> {
        self.entries.iter()
    }

    /// Remembers a step; quizzes are never remembered.
    pub fn push(&mut self, action: TeachingAction, result: ItemResult) {
        if matches!(action, TeachingAction::Quiz) || self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((action, result));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether the hypothesis at `index` agrees with every remembered revealed value.
    pub fn admits(&self, values: &StateActionValues, index: usize) -> bool {
        self.entries.iter().all(|(_, result)| match result.value {
            Some(value) => values.value(result.item, index) == value,
            None => true,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteSnapshot {
    pub belief: Vec<f64>,
    pub memory: MemoryWindow,
}

/// Filter for a learner that only moves to hypotheses consistent with the last few
/// pieces of content it was shown.
#[derive(Debug, Clone)]
pub struct DiscreteBelief {
    filter: BeliefFilter,
    memory: MemoryWindow,
}

impl DiscreteBelief {
    pub fn new<C: Concept + ?Sized>(concept: &C, memory_size: usize) -> Self {
        Self::with_belief(concept, memory_size, concept.default_prior().to_vec())
    }

    pub fn with_belief<C: Concept + ?Sized>(
        concept: &C,
        memory_size: usize,
        belief: Vec<f64>,
    ) -> Self {
        Self {
            filter: BeliefFilter::new(concept, ModelKind::Discrete, belief),
            memory: MemoryWindow::new(memory_size),
        }
    }

    pub fn with_noise(self, noise: NoiseParams, observations: usize) -> Self {
        Self {
            filter: self.filter.with_noise(noise, observations),
            memory: self.memory,
        }
    }

    pub fn belief(&self) -> &[f64] {
        self.filter.belief()
    }

    pub fn memory(&self) -> &MemoryWindow {
        &self.memory
    }

    pub fn noise(&self) -> NoiseParams {
        self.filter.noise()
    }

    /// Hypotheses a transition may currently enter after seeing `item = value`.
    pub fn admissible(&self, item: ItemId, value: Observation) -> Vec<usize> {
        let values = self.filter.values();
        values
            .consistent(item, value)
            .filter(|idx| self.memory.admits(values, *idx))
            .collect()
    }
}

impl BeliefModel for DiscreteBelief {
    type Snapshot = DiscreteSnapshot;

    fn kind(&self) -> ModelKind {
        ModelKind::Discrete
    }

    fn hypothesis_count(&self) -> usize {
        self.filter.belief().len()
    }

    fn update(
        &mut self,
        action: TeachingAction,
        result: ItemResult,
        response: Option<Observation>,
    ) -> Result<(), BeliefError> {
        self.filter
            .update(action, result, response, Some(&self.memory))?;
        self.memory.push(action, result);
        Ok(())
    }

    fn observation_probability(&self, item: ItemId, observation: Observation) -> f64 {
        self.filter.observation_probability(item, observation)
    }

    fn concept_probability(&self, index: usize) -> f64 {
        self.filter.belief()[index]
    }

    fn snapshot(&self) -> Self::Snapshot {
        DiscreteSnapshot {
            belief: self.filter.belief().to_vec(),
            memory: self.memory.clone(),
        }
    }

    fn restore(&mut self, snapshot: &Self::Snapshot) {
        self.filter.set_belief(&snapshot.belief);
        self.memory.clone_from(&snapshot.memory);
    }

    fn reset(&mut self) {
        self.filter.reset();
        self.memory.clear();
    }

    fn marginal(&self) -> Vec<f64> {
        self.filter.belief().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::LetterAddition;

    fn three_letters(memory: usize) -> (LetterAddition, DiscreteBelief) {
        let concept = LetterAddition::with_assignment(vec![0, 2, 1]).unwrap();
        let belief = DiscreteBelief::new(&concept, memory)
            .with_noise(NoiseParams::noiseless(), concept.observation_space().len());
        (concept, belief)
    }

    #[test]
    fn two_examples_identify_the_true_permutation() {
        let (concept, mut belief) = three_letters(DEFAULT_MEMORY_SIZE);
        let first = concept.item_for_pair(0, 1).unwrap();
        let second = concept.item_for_pair(0, 2).unwrap();
        belief
            .update(TeachingAction::Example, ItemResult::revealed(first, 2), None)
            .unwrap();
        let after_first = belief.belief().to_vec();
        assert!((after_first[1] - 0.5).abs() < 1e-12);
        assert!((after_first[4] - 0.5).abs() < 1e-12);

        belief
            .update(TeachingAction::Example, ItemResult::revealed(second, 1), None)
            .unwrap();
        assert!((belief.concept_probability(concept.true_hypothesis_index()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn quizzes_are_not_remembered() {
        let (concept, mut belief) = three_letters(2);
        let item = concept.item_for_pair(1, 2).unwrap();
        belief
            .update(TeachingAction::Quiz, ItemResult::hidden(item), Some(3))
            .unwrap();
        assert!(belief.memory().is_empty());
        belief
            .update(TeachingAction::Example, ItemResult::revealed(item, 3), None)
            .unwrap();
        assert_eq!(belief.memory().len(), 1);
    }

    #[test]
    fn window_keeps_only_capacity_entries() {
        let mut window = MemoryWindow::new(3);
        for item in 0..5 {
            window.push(TeachingAction::Example, ItemResult::revealed(item, 1));
        }
        let items: Vec<_> = window.iter().map(|(_, result)| result.item).collect();
        assert_eq!(items, vec![2, 3, 4]);
        assert_eq!(window.capacity(), 3);
    }

    #[test]
    fn contradictory_memory_is_fatal() {
        let (concept, mut belief) = three_letters(2);
        let item = concept.item_for_pair(0, 1).unwrap();
        belief
            .update(TeachingAction::Example, ItemResult::revealed(item, 2), None)
            .unwrap();
        let err = belief
            .update(TeachingAction::Example, ItemResult::revealed(item, 1), None)
            .unwrap_err();
        assert_eq!(err, BeliefError::UnsatisfiableMemory { item, value: 1 });
    }

    #[test]
    fn incorrect_feedback_transitions_only_into_remembered_content() {
        let (concept, mut belief) = three_letters(2);
        let shown = concept.item_for_pair(1, 2).unwrap();
        let asked = concept.item_for_pair(0, 1).unwrap();
        belief
            .update(TeachingAction::Example, ItemResult::revealed(shown, 3), None)
            .unwrap();
        assert!((belief.belief()[0] - 0.5).abs() < 1e-12);
        assert!((belief.belief()[1] - 0.5).abs() < 1e-12);

        // The wrong answer 1 keeps (0, 1, 2); the shown 2 admits (0, 2, 1) and (2, 0, 1),
        // of which only (0, 2, 1) still gives B + C = 3.
        belief
            .update(TeachingAction::Feedback, ItemResult::revealed(asked, 2), Some(1))
            .unwrap();
        assert_eq!(belief.belief(), &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(belief.memory().len(), 2);
    }

    #[test]
    fn snapshot_restores_memory() {
        let (concept, mut belief) = three_letters(2);
        let snapshot = belief.snapshot();
        belief
            .update(TeachingAction::Feedback, ItemResult::revealed(0, 2), Some(1))
            .unwrap();
        assert_eq!(belief.memory().len(), 1);
        belief.restore(&snapshot);
        assert_eq!(belief.snapshot(), snapshot);
        assert_eq!(belief.admissible(0, 2), vec![1, 4]);
        assert_eq!(concept.item_count(), 3);
    }
}
