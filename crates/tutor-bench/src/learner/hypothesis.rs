use super::{Learner, ignores_change, produce, sample_among, sample_weighted};
use rand::{Rng, RngCore};
use std::sync::Arc;
use tracing::debug;
use tutor_core::action::{ItemId, ItemResult, ModelKind, NoiseParams, Observation, TeachingAction};
use tutor_core::belief::MemoryWindow;
use tutor_core::concept::Concept;

/// Learner holding a single hypothesis at a time.
///
/// When shown content its hypothesis disagrees with, it resamples from the prior among the
/// hypotheses that agree. With a memory window (the discrete variant) the replacement must
/// also agree with the remembered steps.
pub struct HypothesisLearner<C> {
    concept: Arc<C>,
    noise: NoiseParams,
    memory: Option<MemoryWindow>,
    current: usize,
}

impl<C: Concept> HypothesisLearner<C> {
    pub fn memoryless(concept: Arc<C>, noise: NoiseParams, rng: &mut dyn RngCore) -> Self {
        let current = initial_hypothesis(concept.as_ref(), rng);
        Self {
            concept,
            noise,
            memory: None,
            current,
        }
    }

    pub fn discrete(
        concept: Arc<C>,
        noise: NoiseParams,
        memory_size: usize,
        rng: &mut dyn RngCore,
    ) -> Self {
        Self {
            memory: Some(MemoryWindow::new(memory_size)),
            ..Self::memoryless(concept, noise, rng)
        }
    }

    /// Starts from a fixed hypothesis instead of a prior draw.
    pub fn with_hypothesis(mut self, index: usize) -> Self {
        self.current = index;
        self
    }

    pub fn hypothesis(&self) -> usize {
        self.current
    }

    pub fn memory(&self) -> Option<&MemoryWindow> {
        self.memory.as_ref()
    }

    fn believes(&self, item: ItemId) -> Observation {
        self.concept.evaluate_indexed(item, self.current)
    }

    fn update_state(&mut self, item: ItemId, value: Observation, rng: &mut dyn RngCore) {
        if ignores_change(&self.noise, rng) {
            debug!(target: "tutor_bench::learner", item, "learner ignored the correction");
            return;
        }

        let values = self.concept.state_action_values();
        let consistent: Vec<usize> = values.consistent(item, value).collect();
        let remembered: Vec<usize> = match self.memory.as_ref() {
            Some(memory) => consistent
                .iter()
                .copied()
                .filter(|idx| memory.admits(values, *idx))
                .collect(),
            None => consistent.clone(),
        };
        let candidates = if remembered.is_empty() {
            debug!(
                target: "tutor_bench::learner",
                item,
                value,
                "no hypothesis fits memory, forgetting it"
            );
            if let Some(memory) = self.memory.as_mut() {
                memory.clear();
            }
            consistent
        } else {
            remembered
        };

        if let Some(next) = sample_among(&candidates, self.concept.default_prior(), rng) {
            self.current = next;
        }
    }
}

fn initial_hypothesis<C: Concept + ?Sized>(concept: &C, rng: &mut dyn RngCore) -> usize {
    sample_weighted(concept.default_prior(), rng)
        .unwrap_or_else(|| rng.gen_range(0..concept.hypothesis_count().max(1)))
}

impl<C: Concept> Learner for HypothesisLearner<C> {
    fn kind(&self) -> ModelKind {
        if self.memory.is_some() {
            ModelKind::Discrete
        } else {
            ModelKind::Memoryless
        }
    }

    fn see_example(&mut self, item: ItemId, value: Observation, rng: &mut dyn RngCore) {
        if self.believes(item) != value {
            self.update_state(item, value, rng);
        }
    }

    fn see_quiz(&mut self, item: ItemId, rng: &mut dyn RngCore) -> Observation {
        produce(
            self.believes(item),
            self.concept.observation_space(),
            &self.noise,
            rng,
        )
    }

    fn see_question(&mut self, item: ItemId, rng: &mut dyn RngCore) -> Observation {
        self.see_quiz(item, rng)
    }

    fn see_feedback(
        &mut self,
        item: ItemId,
        value: Observation,
        correct: bool,
        rng: &mut dyn RngCore,
    ) {
        if !correct && self.believes(item) != value {
            self.update_state(item, value, rng);
        }
    }

    fn answer(&mut self, item: ItemId, _rng: &mut dyn RngCore) -> Observation {
        self.believes(item)
    }

    fn finish_action(&mut self, action: TeachingAction, result: ItemResult) {
        if let Some(memory) = self.memory.as_mut() {
            memory.push(action, result);
        }
    }
}
