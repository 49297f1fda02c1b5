use super::discrete::MemoryWindow;
use super::{BeliefError, normalize, sanitize};
use crate::action::{ItemId, ItemResult, ModelKind, NoiseParams, Observation, TeachingAction};
use crate::concept::{Concept, StateActionValues};
use std::sync::Arc;
use tracing::debug;

/// Exact filter over a belief vector, shared by the memoryless and discrete models.
///
/// An update is an observation step followed by a transition step. The discrete model
/// passes its memory window, which narrows the set of hypotheses a transition may enter.
#[derive(Debug, Clone)]
pub(crate) struct BeliefFilter {
    belief: Vec<f64>,
    initial: Vec<f64>,
    prior: Arc<[f64]>,
    values: Arc<StateActionValues>,
    noise: NoiseParams,
    noise_per_observation: f64,
}

impl BeliefFilter {
    pub(crate) fn new<C: Concept + ?Sized>(concept: &C, kind: ModelKind, initial: Vec<f64>) -> Self {
        let noise = concept.noise(kind);
        let observations = concept.observation_space().len().max(1);
        Self {
            belief: initial.clone(),
            initial,
            prior: Arc::from(concept.default_prior()),
            values: Arc::clone(concept.state_action_values()),
            noise,
            noise_per_observation: noise.production / observations as f64,
        }
    }

    pub(crate) fn with_noise(mut self, noise: NoiseParams, observations: usize) -> Self {
        self.noise = noise;
        self.noise_per_observation = noise.production / observations.max(1) as f64;
        self
    }

    pub(crate) fn belief(&self) -> &[f64] {
        &self.belief
    }

    pub(crate) fn set_belief(&mut self, belief: &[f64]) {
        self.belief.clear();
        self.belief.extend_from_slice(belief);
    }

    pub(crate) fn reset(&mut self) {
        self.belief.clone_from(&self.initial);
    }

    pub(crate) fn noise(&self) -> NoiseParams {
        self.noise
    }

    pub(crate) fn values(&self) -> &StateActionValues {
        &self.values
    }

    pub(crate) fn update(
        &mut self,
        action: TeachingAction,
        result: ItemResult,
        response: Option<Observation>,
        memory: Option<&MemoryWindow>,
    ) -> Result<(), BeliefError> {
        let (result, response) = sanitize(action, result, response);
        match action {
            TeachingAction::Feedback => {
                self.narrow_before_feedback(result.item, response, memory)?;
                self.step(result, response, memory)
            }
            TeachingAction::Example | TeachingAction::Quiz => self.step(result, response, memory),
        }
    }

    /// The answer to a feedback question was produced before the correct value was shown,
    /// so it first narrows the belief about the old state.
    fn narrow_before_feedback(
        &mut self,
        item: ItemId,
        response: Option<Observation>,
        memory: Option<&MemoryWindow>,
    ) -> Result<(), BeliefError> {
        self.step(ItemResult::hidden(item), response, memory)
    }

    fn step(
        &mut self,
        result: ItemResult,
        response: Option<Observation>,
        memory: Option<&MemoryWindow>,
    ) -> Result<(), BeliefError> {
        let mut next = self.propagate(&self.belief, result, response, memory)?;
        if !normalize(&mut next) {
            debug!(
                target: "tutor_core::belief",
                item = result.item,
                ?response,
                "belief collapsed, retrying from prior"
            );
            self.belief = self.prior.to_vec();
            next = self.propagate(&self.belief, result, response, memory)?;
            if !normalize(&mut next) {
                debug!(
                    target: "tutor_core::belief",
                    item = result.item,
                    ?response,
                    "response impossible under prior, keeping prior"
                );
                next = self.prior.to_vec();
                normalize(&mut next);
            }
        }
        self.belief = next;
        Ok(())
    }

    /// Unnormalized belief after observing `response` and, when content was revealed and
    /// contradicts the response, transitioning towards it.
    fn propagate(
        &self,
        belief: &[f64],
        result: ItemResult,
        response: Option<Observation>,
        memory: Option<&MemoryWindow>,
    ) -> Result<Vec<f64>, BeliefError> {
        let row = self.values.row(result.item);
        let mut next = belief.to_vec();

        if let Some(observed) = response {
            let consistent = (1.0 - self.noise.production) + self.noise_per_observation;
            for (p, value) in next.iter_mut().zip(row) {
                *p *= if *value == observed {
                    consistent
                } else {
                    self.noise_per_observation
                };
            }
        }

        match result.value {
            Some(value) if Some(value) != response => {
                self.transition(&mut next, result.item, value, memory)?;
            }
            _ => {}
        }
        Ok(next)
    }

    /// Moves `1 - transition_noise` of the mass held by hypotheses inconsistent with
    /// `item = value` onto the consistent ones, split by prior weight.
    fn transition(
        &self,
        belief: &mut [f64],
        item: ItemId,
        value: Observation,
        memory: Option<&MemoryWindow>,
    ) -> Result<(), BeliefError> {
        let row = self.values.row(item);
        let consistent: Vec<bool> = row
            .iter()
            .enumerate()
            .map(|(idx, v)| {
                *v == value && memory.is_none_or(|window| window.admits(&self.values, idx))
            })
            .collect();

        let consistent_count = consistent.iter().filter(|c| **c).count();
        let stay = self.noise.transition;
        if consistent_count == 0 {
            if memory.is_some() {
                return Err(BeliefError::UnsatisfiableMemory { item, value });
            }
            belief.iter_mut().for_each(|p| *p *= stay);
            return Ok(());
        }

        let mut consistent_prior = 0.0;
        let mut outgoing = 0.0;
        for (idx, is_consistent) in consistent.iter().enumerate() {
            if *is_consistent {
                consistent_prior += self.prior[idx];
            } else {
                outgoing += belief[idx];
            }
        }
        let moved = (1.0 - stay) * outgoing;

        for (idx, p) in belief.iter_mut().enumerate() {
            if consistent[idx] {
                let share = if consistent_prior > 0.0 {
                    self.prior[idx] / consistent_prior
                } else {
                    1.0 / consistent_count as f64
                };
                *p += moved * share;
            } else {
                *p *= stay;
            }
        }
        Ok(())
    }

    /// `(1 - production_noise)` times the mass agreeing with `observation`, plus the noise
    /// share of a single observation value.
    pub(crate) fn observation_probability(&self, item: ItemId, observation: Observation) -> f64 {
        let consistent: f64 = self
            .values
            .consistent(item, observation)
            .map(|idx| self.belief[idx])
            .sum();
        (1.0 - self.noise.production) * consistent + self.noise_per_observation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::LetterAddition;

    fn noiseless(concept: &LetterAddition) -> BeliefFilter {
        BeliefFilter::new(concept, ModelKind::Memoryless, concept.default_prior().to_vec())
            .with_noise(NoiseParams::noiseless(), concept.observation_space().len())
    }

    #[test]
    fn observation_without_transition_keeps_mass_on_consistent() {
        let concept = LetterAddition::with_assignment(vec![0, 2, 1]).unwrap();
        let mut filter = noiseless(&concept);
        filter
            .update(TeachingAction::Quiz, ItemResult::hidden(0), Some(2), None)
            .unwrap();
        let belief = filter.belief();
        assert!((belief[1] - 0.5).abs() < 1e-12);
        assert!((belief[4] - 0.5).abs() < 1e-12);
        assert_eq!(belief.iter().filter(|p| **p > 0.0).count(), 2);
    }

    #[test]
    fn transition_conserves_mass() {
        let concept = LetterAddition::with_assignment(vec![1, 3, 0, 2]).unwrap();
        let mut filter = BeliefFilter::new(
            &concept,
            ModelKind::Memoryless,
            concept.default_prior().to_vec(),
        );
        let mut belief = filter.belief().to_vec();
        let item = concept.item_for_pair(0, 3).unwrap();
        filter
            .transition(&mut belief, item, concept.true_value(item), None)
            .unwrap();
        assert!((belief.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        filter.set_belief(&belief);
        assert_eq!(filter.belief(), belief.as_slice());
    }

    #[test]
    fn observation_probabilities_cover_the_observation_space() {
        let concept = LetterAddition::with_assignment(vec![2, 0, 1]).unwrap();
        let filter = BeliefFilter::new(
            &concept,
            ModelKind::Memoryless,
            concept.default_prior().to_vec(),
        );
        let total: f64 = concept
            .observation_space()
            .iter()
            .map(|obs| filter.observation_probability(1, *obs))
            .sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
