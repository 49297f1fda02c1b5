//! Simulated students answering in place of a human learner.

mod continuous;
mod hypothesis;

pub use continuous::ContinuousLearner;
pub use hypothesis::HypothesisLearner;

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::sync::Arc;
use tutor_core::action::{ItemId, ItemResult, ModelKind, NoiseParams, Observation, TeachingAction};
use tutor_core::concept::Concept;

/// A student being taught one concept.
///
/// Teaching calls (`see_*`) may change what the learner believes; `answer` is used during
/// assessments and never does.
pub trait Learner {
    fn kind(&self) -> ModelKind;

    fn see_example(&mut self, item: ItemId, value: Observation, rng: &mut dyn RngCore);

    fn see_quiz(&mut self, item: ItemId, rng: &mut dyn RngCore) -> Observation;

    /// First half of a feedback question: the learner answers before seeing the truth.
    fn see_question(&mut self, item: ItemId, rng: &mut dyn RngCore) -> Observation;

    /// Second half of a feedback question: the true value and whether the answer matched it.
    fn see_feedback(
        &mut self,
        item: ItemId,
        value: Observation,
        correct: bool,
        rng: &mut dyn RngCore,
    );

    fn answer(&mut self, item: ItemId, rng: &mut dyn RngCore) -> Observation;

    /// Called once the step is complete, with what the learner was shown.
    fn finish_action(&mut self, _action: TeachingAction, _result: ItemResult) {}
}

/// Builds a fresh simulated learner following `kind`.
pub fn simulated_learner<C: Concept + 'static>(
    kind: ModelKind,
    concept: Arc<C>,
    noise: NoiseParams,
    memory_size: usize,
    rng: &mut dyn RngCore,
) -> Box<dyn Learner> {
    match kind {
        ModelKind::Memoryless => Box::new(HypothesisLearner::memoryless(concept, noise, rng)),
        ModelKind::Discrete => Box::new(HypothesisLearner::discrete(
            concept,
            noise,
            memory_size,
            rng,
        )),
        ModelKind::Continuous => Box::new(ContinuousLearner::new(concept, noise)),
    }
}

/// Index drawn proportionally to `weights`; `None` when no entry carries mass.
pub(crate) fn sample_weighted<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    WeightedIndex::new(weights)
        .ok()
        .map(|dist| dist.sample(rng))
}

/// Weighted draw restricted to `candidates`, uniform among them if they carry no mass.
pub(crate) fn sample_among<R: Rng + ?Sized>(
    candidates: &[usize],
    weights: &[f64],
    rng: &mut R,
) -> Option<usize> {
    let restricted: Vec<f64> = candidates.iter().map(|idx| weights[*idx]).collect();
    match sample_weighted(&restricted, rng) {
        Some(pick) => Some(candidates[pick]),
        None => candidates.choose(rng).copied(),
    }
}

/// True when a transition should be skipped.
pub(crate) fn ignores_change<R: Rng + ?Sized>(noise: &NoiseParams, rng: &mut R) -> bool {
    noise.transition > 0.0 && rng.r#gen::<f64>() < noise.transition
}

/// The learner's intended answer, replaced by a different observation on a slip.
pub(crate) fn produce<R: Rng + ?Sized>(
    intended: Observation,
    observations: &[Observation],
    noise: &NoiseParams,
    rng: &mut R,
) -> Observation {
    if noise.production <= 0.0 || rng.r#gen::<f64>() >= noise.production {
        return intended;
    }
    let others: Vec<Observation> = observations
        .iter()
        .copied()
        .filter(|obs| *obs != intended)
        .collect();
    others.choose(rng).copied().unwrap_or(intended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn weighted_sampling_skips_empty_entries() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(sample_weighted(&[0.0, 2.0, 0.0], &mut rng), Some(1));
        }
        assert_eq!(sample_weighted(&[0.0, 0.0], &mut rng), None);
    }

    #[test]
    fn restricted_sampling_falls_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(8);
        let weights = [0.5, 0.0, 0.0, 0.5];
        for _ in 0..50 {
            let pick = sample_among(&[1, 2], &weights, &mut rng).unwrap();
            assert!(pick == 1 || pick == 2);
        }
        assert_eq!(sample_among(&[], &weights, &mut rng), None);
    }

    #[test]
    fn slips_always_change_the_answer() {
        let mut rng = StdRng::seed_from_u64(11);
        let always = NoiseParams::new(0.0, 1.0);
        for _ in 0..50 {
            assert_ne!(produce(3, &[1, 2, 3, 4], &always, &mut rng), 3);
        }
        assert_eq!(produce(3, &[3], &always, &mut rng), 3);
        let never = NoiseParams::noiseless();
        assert_eq!(produce(3, &[1, 2, 3], &never, &mut rng), 3);
        assert!(!ignores_change(&never, &mut rng));
    }
}
