use crate::{PlanError, PlannedAction, Planner};
use rand::RngCore;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{Level, event};
use tutor_core::action::{ItemId, Observation, TeachingAction};
use tutor_core::concept::Concept;

/// Baseline: a random action on an item not yet shown in the current teaching phase.
pub struct RandomPlanner<C> {
    concept: Arc<C>,
    actions: Vec<TeachingAction>,
    shown: BTreeSet<ItemId>,
}

impl<C: Concept> RandomPlanner<C> {
    pub fn new(concept: Arc<C>, actions: &[TeachingAction]) -> Self {
        Self {
            concept,
            actions: actions.to_vec(),
            shown: BTreeSet::new(),
        }
    }

    pub fn shown(&self) -> &BTreeSet<ItemId> {
        &self.shown
    }
}

impl<C: Concept> Planner for RandomPlanner<C> {
    fn name(&self) -> &'static str {
        "random"
    }

    fn choose_action(
        &mut self,
        _prev_response: Option<Observation>,
        rng: &mut dyn RngCore,
    ) -> Result<PlannedAction, PlanError> {
        let action = *self.actions.choose(rng).ok_or(PlanError::NoCandidates)?;
        let mut fresh: Vec<ItemId> = self
            .concept
            .candidate_items()
            .filter(|item| !self.shown.contains(item))
            .collect();
        if fresh.is_empty() {
            event!(
                target: "tutor_planner::random",
                Level::DEBUG,
                shown = self.shown.len(),
                "every item shown this phase, starting over"
            );
            self.shown.clear();
            fresh = self.concept.candidate_items().collect();
        }
        let item = *fresh.choose(rng).ok_or(PlanError::NoCandidates)?;
        self.shown.insert(item);
        Ok(PlannedAction {
            action,
            item,
            value: self.concept.true_value(item),
        })
    }

    fn start_teaching_phase(&mut self) {
        self.shown.clear();
    }

    fn reset(&mut self) {
        self.shown.clear();
    }
}
