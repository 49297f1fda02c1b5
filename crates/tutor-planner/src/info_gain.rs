use crate::{PlanError, PlannedAction, Planner};
use rand::RngCore;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{Level, event};
use tutor_core::action::{ItemResult, Observation, TeachingAction};
use tutor_core::belief::telemetry::{BeliefMetrics, particle_entropy};
use tutor_core::belief::{BeliefModel, ContinuousBelief};
use tutor_core::concept::Concept;

/// Myopic planner that picks the example reducing particle entropy the most.
///
/// Only examples are evaluated; quizzes and feedback questions score zero gain.
pub struct InfoGainPlanner<C> {
    concept: Arc<C>,
    belief: ContinuousBelief,
    actions: Vec<TeachingAction>,
}

impl<C: Concept> InfoGainPlanner<C> {
    pub fn new(concept: Arc<C>, belief: ContinuousBelief, actions: &[TeachingAction]) -> Self {
        Self {
            concept,
            belief,
            actions: actions.to_vec(),
        }
    }

    pub fn belief(&self) -> &ContinuousBelief {
        &self.belief
    }

    /// Entropy reduction of every (item, action) pair, in item-major order.
    pub fn gains(&self) -> Result<Vec<(PlannedAction, f64)>, PlanError> {
        let mut work = self.belief.clone();
        let snapshot = work.snapshot();
        let before = particle_entropy(work.particles());
        let mut gains = Vec::with_capacity(self.concept.item_count() * self.actions.len());

        for item in self.concept.candidate_items() {
            let value = self.concept.true_value(item);
            for &action in &self.actions {
                let gain = match action {
                    TeachingAction::Example => {
                        work.update(action, ItemResult::revealed(item, value), None)?;
                        let after = particle_entropy(work.particles());
                        work.restore(&snapshot);
                        before - after
                    }
                    TeachingAction::Quiz | TeachingAction::Feedback => 0.0,
                };
                gains.push((PlannedAction { action, item, value }, gain));
            }
        }
        Ok(gains)
    }
}

impl<C: Concept> Planner for InfoGainPlanner<C> {
    fn name(&self) -> &'static str {
        "info_gain"
    }

    fn choose_action(
        &mut self,
        _prev_response: Option<Observation>,
        rng: &mut dyn RngCore,
    ) -> Result<PlannedAction, PlanError> {
        let gains = self.gains()?;
        let best = gains
            .iter()
            .map(|(_, gain)| *gain)
            .fold(f64::NEG_INFINITY, f64::max);
        let candidates: Vec<&(PlannedAction, f64)> =
            gains.iter().filter(|(_, gain)| *gain == best).collect();
        let (action, gain) = **candidates.choose(rng).ok_or(PlanError::NoCandidates)?;
        event!(
            target: "tutor_planner::info_gain",
            Level::DEBUG,
            action = %action.action,
            item = action.item,
            gain,
            ties = candidates.len(),
            "planned action"
        );
        Ok(action)
    }

    fn observe(
        &mut self,
        action: TeachingAction,
        result: ItemResult,
        response: Option<Observation>,
    ) -> Result<(), PlanError> {
        self.belief.update(action, result, response)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.belief.reset();
    }

    fn belief_metrics(&self) -> Option<BeliefMetrics> {
        Some(BeliefMetrics::from_model(
            &self.belief,
            self.concept.true_hypothesis_index(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use tutor_core::belief::DEFAULT_PARTICLE_CAP;
    use tutor_core::concept::LetterAddition;

    fn planner() -> InfoGainPlanner<LetterAddition> {
        let concept = Arc::new(LetterAddition::with_assignment(vec![1, 3, 0, 2]).unwrap());
        let belief = ContinuousBelief::new(concept.as_ref(), DEFAULT_PARTICLE_CAP);
        InfoGainPlanner::new(concept, belief, &TeachingAction::ALL)
    }

    #[test]
    fn only_examples_carry_gain() {
        let planner = planner();
        let gains = planner.gains().unwrap();
        assert_eq!(gains.len(), 6 * 3);
        for (action, gain) in &gains {
            match action.action {
                TeachingAction::Example => assert!(*gain > 0.0),
                TeachingAction::Quiz | TeachingAction::Feedback => assert_eq!(*gain, 0.0),
            }
        }
    }

    #[test]
    fn chooses_an_example_and_keeps_belief() {
        let mut planner = planner();
        let before = planner.belief().snapshot();
        let mut rng = SmallRng::seed_from_u64(21);
        let action = planner.choose_action(None, &mut rng).unwrap();
        assert_eq!(action.action, TeachingAction::Example);
        assert_eq!(planner.belief().snapshot(), before);
    }
}
