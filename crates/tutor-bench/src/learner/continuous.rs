use super::{Learner, ignores_change, produce, sample_weighted};
use rand::RngCore;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::debug;
use tutor_core::action::{ItemId, ModelKind, NoiseParams, Observation};
use tutor_core::concept::Concept;

/// Learner holding a distribution over hypotheses, starting from the prior.
///
/// Revealed values zero out the hypotheses that disagree. Answers are drawn from the
/// distribution's prediction for the item. An assessment commits to a single sampled
/// hypothesis until the next teaching step.
pub struct ContinuousLearner<C> {
    concept: Arc<C>,
    noise: NoiseParams,
    belief: Vec<f64>,
    assessment_guess: Option<usize>,
}

impl<C: Concept> ContinuousLearner<C> {
    pub fn new(concept: Arc<C>, noise: NoiseParams) -> Self {
        let belief = concept.default_prior().to_vec();
        Self {
            concept,
            noise,
            belief,
            assessment_guess: None,
        }
    }

    pub fn belief(&self) -> &[f64] {
        &self.belief
    }

    fn update_state(&mut self, item: ItemId, value: Observation, rng: &mut dyn RngCore) {
        if ignores_change(&self.noise, rng) {
            debug!(target: "tutor_bench::learner", item, "learner ignored the correction");
            return;
        }

        let row = self.concept.state_action_values().row(item);
        let kept: f64 = self
            .belief
            .iter()
            .zip(row)
            .filter(|(_, v)| **v == value)
            .map(|(p, _)| *p)
            .sum();
        if kept <= 0.0 {
            debug!(
                target: "tutor_bench::learner",
                item,
                value,
                "no believed hypothesis fits, keeping belief"
            );
            return;
        }
        for (p, v) in self.belief.iter_mut().zip(row) {
            *p = if *v == value { *p / kept } else { 0.0 };
        }
    }

    fn generate_answer(&mut self, item: ItemId, rng: &mut dyn RngCore) -> Observation {
        self.assessment_guess = None;
        let observations = self.concept.observation_space();
        let row = self.concept.state_action_values().row(item);
        let mass: Vec<f64> = observations
            .iter()
            .map(|obs| {
                self.belief
                    .iter()
                    .zip(row)
                    .filter(|(_, v)| **v == *obs)
                    .map(|(p, _)| *p)
                    .sum::<f64>()
            })
            .collect();
        let intended = match sample_weighted(&mass, rng) {
            Some(idx) => observations[idx],
            None => observations.choose(rng).copied().unwrap_or_default(),
        };
        produce(intended, observations, &self.noise, rng)
    }
}

impl<C: Concept> Learner for ContinuousLearner<C> {
    fn kind(&self) -> ModelKind {
        ModelKind::Continuous
    }

    fn see_example(&mut self, item: ItemId, value: Observation, rng: &mut dyn RngCore) {
        self.assessment_guess = None;
        self.update_state(item, value, rng);
    }

    fn see_quiz(&mut self, item: ItemId, rng: &mut dyn RngCore) -> Observation {
        self.generate_answer(item, rng)
    }

    fn see_question(&mut self, item: ItemId, rng: &mut dyn RngCore) -> Observation {
        self.generate_answer(item, rng)
    }

    fn see_feedback(
        &mut self,
        item: ItemId,
        value: Observation,
        _correct: bool,
        rng: &mut dyn RngCore,
    ) {
        self.update_state(item, value, rng);
    }

    fn answer(&mut self, item: ItemId, rng: &mut dyn RngCore) -> Observation {
        let guess = match self.assessment_guess {
            Some(guess) => guess,
            None => {
                let guess = sample_weighted(&self.belief, rng).unwrap_or_default();
                self.assessment_guess = Some(guess);
                guess
            }
        };
        self.concept.evaluate_indexed(item, guess)
    }
}
