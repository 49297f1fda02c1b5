use super::filter::BeliefFilter;
use super::{BeliefError, BeliefModel};
use crate::action::{ItemId, ItemResult, ModelKind, NoiseParams, Observation, TeachingAction};
use crate::concept::Concept;

/// Exact filter over hypotheses for a learner that keeps no history: whenever the
/// revealed content contradicts its state, it jumps to a consistent hypothesis.
#[derive(Debug, Clone)]
pub struct MemorylessBelief {
    filter: BeliefFilter,
}

impl MemorylessBelief {
    /// Starts from the concept's prior with the concept's memoryless noise constants.
    pub fn new<C: Concept + ?Sized>(concept: &C) -> Self {
        Self::with_belief(concept, concept.default_prior().to_vec())
    }

    /// Starts from an explicit belief; `reset` returns to it.
    pub fn with_belief<C: Concept + ?Sized>(concept: &C, belief: Vec<f64>) -> Self {
        Self {
            filter: BeliefFilter::new(concept, ModelKind::Memoryless, belief),
        }
    }

    /// Overrides the concept's noise constants.
    pub fn with_noise(self, noise: NoiseParams, observations: usize) -> Self {
        Self {
            filter: self.filter.with_noise(noise, observations),
        }
    }

    pub fn belief(&self) -> &[f64] {
        self.filter.belief()
    }

    pub fn noise(&self) -> NoiseParams {
        self.filter.noise()
    }
}

impl BeliefModel for MemorylessBelief {
    type Snapshot = Vec<f64>;

    fn kind(&self) -> ModelKind {
        ModelKind::Memoryless
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
        self.filter.update(action, result, response, None)
    }

    fn observation_probability(&self, item: ItemId, observation: Observation) -> f64 {
        self.filter.observation_probability(item, observation)
    }

    fn concept_probability(&self, index: usize) -> f64 {
        self.filter.belief()[index]
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.filter.belief().to_vec()
    }

    fn restore(&mut self, snapshot: &Self::Snapshot) {
        self.filter.set_belief(snapshot);
    }

    fn reset(&mut self) {
        self.filter.reset();
    }

    fn marginal(&self) -> Vec<f64> {
        self.filter.belief().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::LetterAddition;

    fn three_letters() -> (LetterAddition, MemorylessBelief) {
        let concept = LetterAddition::with_assignment(vec![0, 2, 1]).unwrap();
        let belief = MemorylessBelief::new(&concept)
            .with_noise(NoiseParams::noiseless(), concept.observation_space().len());
        (concept, belief)
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn example_collapses_to_consistent_pair() {
        let (concept, mut belief) = three_letters();
        let item = concept.item_for_pair(0, 1).unwrap();
        belief
            .update(TeachingAction::Example, ItemResult::revealed(item, 2), None)
            .unwrap();
        assert_close(belief.belief(), &[0.0, 0.5, 0.0, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn second_example_without_memory_keeps_jump_targets() {
        let (concept, mut belief) = three_letters();
        let first = concept.item_for_pair(0, 1).unwrap();
        let second = concept.item_for_pair(0, 2).unwrap();
        belief
            .update(TeachingAction::Example, ItemResult::revealed(first, 2), None)
            .unwrap();
        belief
            .update(TeachingAction::Example, ItemResult::revealed(second, 1), None)
            .unwrap();
        assert_close(belief.belief(), &[0.0, 0.75, 0.0, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn example_ignores_response() {
        let (concept, mut with_response) = three_letters();
        let mut without = with_response.clone();
        let item = concept.item_for_pair(1, 2).unwrap();
        with_response
            .update(TeachingAction::Example, ItemResult::revealed(item, 3), Some(1))
            .unwrap();
        without
            .update(TeachingAction::Example, ItemResult::revealed(item, 3), None)
            .unwrap();
        assert_eq!(with_response.belief(), without.belief());
    }

    #[test]
    fn inconsistent_quiz_restarts_from_prior() {
        let (concept, mut belief) = three_letters();
        let item = concept.item_for_pair(0, 1).unwrap();
        belief
            .update(TeachingAction::Example, ItemResult::revealed(item, 2), None)
            .unwrap();
        belief
            .update(TeachingAction::Quiz, ItemResult::hidden(item), Some(3))
            .unwrap();
        // (1, 2, 0) and (2, 1, 0) are the only hypotheses answering 3.
        assert_close(belief.belief(), &[0.0, 0.0, 0.0, 0.5, 0.0, 0.5]);
    }

    #[test]
    fn impossible_response_falls_back_to_prior() {
        let (concept, mut belief) = three_letters();
        let item = concept.item_for_pair(0, 1).unwrap();
        belief
            .update(TeachingAction::Example, ItemResult::revealed(item, 2), None)
            .unwrap();
        belief
            .update(TeachingAction::Quiz, ItemResult::hidden(item), Some(9))
            .unwrap();
        assert_close(belief.belief(), concept.default_prior());
    }

    #[test]
    fn correct_feedback_answer_does_not_transition() {
        let (concept, mut belief) = three_letters();
        let item = concept.item_for_pair(0, 1).unwrap();
        belief
            .update(TeachingAction::Feedback, ItemResult::revealed(item, 2), Some(2))
            .unwrap();
        assert_close(belief.belief(), &[0.0, 0.5, 0.0, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn incorrect_feedback_answer_narrows_then_moves_to_the_shown_value() {
        let (concept, mut belief) = three_letters();
        let item = concept.item_for_pair(0, 1).unwrap();
        // Answering 1 for A + B points at (0, 1, 2) and (1, 0, 2) before the 2 is shown.
        belief
            .update(TeachingAction::Feedback, ItemResult::revealed(item, 2), Some(1))
            .unwrap();
        assert_close(belief.belief(), &[0.0, 0.5, 0.0, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn snapshot_restore_is_exact() {
        let (concept, mut belief) = three_letters();
        let noisy = MemorylessBelief::new(&concept);
        let snapshot = belief.snapshot();
        belief
            .update(TeachingAction::Example, ItemResult::revealed(0, 2), None)
            .unwrap();
        belief.restore(&snapshot);
        assert_eq!(belief.snapshot(), snapshot);
        assert_eq!(noisy.noise(), NoiseParams::new(0.15, 0.019));
        belief.reset();
        assert_eq!(belief.belief(), concept.default_prior());
    }
}
