use crate::budget::Budget;
use crate::config::SearchConfig;
use crate::preplan::{PlanNode, PreplanTree, ResponseKey};
use crate::{PlanError, PlannedAction, Planner};
use rand::seq::{SliceRandom, index};
use rand::{Rng, RngCore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{Level, event};
use tutor_core::action::{ItemId, ItemResult, Observation, TeachingAction};
use tutor_core::belief::BeliefModel;
use tutor_core::belief::telemetry::BeliefMetrics;
use tutor_core::concept::Concept;

/// A node of the online search tree: one (item, action) choice and the subtrees of
/// every observation branch that was explored below it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchNode {
    pub action: TeachingAction,
    pub item: ItemId,
    pub value: Observation,
    /// Action cost plus the discounted expected cost of what follows.
    pub cost: f64,
    pub children: Vec<SearchNode>,
}

/// State of a single planning call.
struct Search<'a, C: Concept + ?Sized, R: Rng + ?Sized> {
    concept: &'a C,
    actions: &'a [TeachingAction],
    discount: f64,
    leaf_cost: f64,
    true_index: usize,
    /// Branch-and-bound on observation branches.
    bound: bool,
    budget: Budget,
    rng: &'a mut R,
}

impl<C: Concept + ?Sized, R: Rng + ?Sized> Search<'_, C, R> {
    /// Expected cost of acting optimally for `depth` more steps from `belief`.
    ///
    /// `belief` is mutated while branches are explored and restored from a snapshot
    /// after each one, so it is unchanged on successful return.
    fn expand<B: BeliefModel>(
        &mut self,
        belief: &mut B,
        depth: usize,
        samples: &[usize],
        children: &mut Vec<SearchNode>,
    ) -> Result<f64, PlanError> {
        self.budget.tick()?;
        if depth == 0 {
            return Ok(self.leaf_value(belief));
        }
        let items = self.sample_items(samples.first().copied());
        if items.is_empty() {
            return Ok(self.leaf_value(belief));
        }
        let deeper = samples.get(1..).unwrap_or(&[]);
        let concept = self.concept;
        let actions = self.actions;
        let snapshot = belief.snapshot();
        let mut best = f64::INFINITY;

        for item in items {
            let value = concept.true_value(item);
            for &action in actions {
                let mut node = SearchNode {
                    action,
                    item,
                    value,
                    cost: concept.action_cost(action),
                    children: Vec::new(),
                };
                let future = self.expected_future(belief, &snapshot, &mut node, depth, deeper, best)?;
                node.cost += future;
                if node.cost < best {
                    best = node.cost;
                }
                children.push(node);
            }
        }
        Ok(best)
    }

    fn expected_future<B: BeliefModel>(
        &mut self,
        belief: &mut B,
        snapshot: &B::Snapshot,
        node: &mut SearchNode,
        depth: usize,
        deeper: &[usize],
        best_sibling: f64,
    ) -> Result<f64, PlanError> {
        let concept = self.concept;
        match node.action {
            TeachingAction::Example => {
                belief.update(node.action, ItemResult::revealed(node.item, node.value), None)?;
                let future = self.expand(belief, depth - 1, deeper, &mut node.children)?;
                belief.restore(snapshot);
                Ok(self.discount * future)
            }
            TeachingAction::Quiz | TeachingAction::Feedback => {
                let result = ItemResult::for_action(node.action, node.item, node.value);
                let mut expected = 0.0;
                for &observation in concept.observation_space() {
                    let probability = belief.observation_probability(node.item, observation);
                    if probability <= 0.0 {
                        continue;
                    }
                    belief.update(node.action, result, Some(observation))?;
                    let future = self.expand(belief, depth - 1, deeper, &mut node.children)?;
                    belief.restore(snapshot);
                    expected += self.discount * probability * future;
                    // Bound: this action can no longer beat a sibling.
                    if self.bound && expected + node.cost > best_sibling {
                        break;
                    }
                }
                Ok(expected)
            }
        }
    }

    fn leaf_value<B: BeliefModel>(&self, belief: &B) -> f64 {
        (1.0 - belief.concept_probability(self.true_index)) * self.leaf_cost
    }

    /// Up to `amount` distinct items, or every item when no amount is left.
    fn sample_items(&mut self, amount: Option<usize>) -> Vec<ItemId> {
        let total = self.concept.item_count();
        match amount {
            Some(amount) => index::sample(&mut *self.rng, total, amount.min(total)).into_vec(),
            None => (0..total).collect(),
        }
    }

    /// Cheapest root choice; ties are broken uniformly at random.
    fn select(&mut self, children: &[SearchNode]) -> Option<(PlannedAction, f64)> {
        let best = children
            .iter()
            .map(|node| node.cost)
            .fold(f64::INFINITY, f64::min);
        let candidates: Vec<&SearchNode> =
            children.iter().filter(|node| node.cost == best).collect();
        candidates.choose(&mut *self.rng).map(|node| {
            (
                PlannedAction {
                    action: node.action,
                    item: node.item,
                    value: node.value,
                },
                node.cost,
            )
        })
    }
}

struct SearchOutcome {
    action: PlannedAction,
    cost: f64,
    tree: Vec<SearchNode>,
    nodes: usize,
    elapsed_ms: u64,
}

/// Expected-cost forward search over (item, action) choices and learner responses,
/// optionally replaying a preplanned decision tree first.
pub struct ForwardSearchPlanner<C, B> {
    concept: Arc<C>,
    belief: B,
    actions: Vec<TeachingAction>,
    config: SearchConfig,
    preplan: Option<PreplanTree>,
    path: Vec<ResponseKey>,
    action_count: usize,
    last_tree: Vec<SearchNode>,
    last_nodes: usize,
    bound: bool,
}

impl<C: Concept, B: BeliefModel + Clone> ForwardSearchPlanner<C, B> {
    pub fn new(
        concept: Arc<C>,
        belief: B,
        actions: &[TeachingAction],
        config: SearchConfig,
    ) -> Self {
        let config = SearchConfig {
            horizon: config.horizon.max(1),
            ..config
        };
        Self {
            concept,
            belief,
            actions: actions.to_vec(),
            config,
            preplan: None,
            path: Vec::new(),
            action_count: 0,
            last_tree: Vec::new(),
            last_nodes: 0,
            bound: true,
        }
    }

    pub fn belief(&self) -> &B {
        &self.belief
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Root children of the most recent online search.
    pub fn plan_tree(&self) -> &[SearchNode] {
        &self.last_tree
    }

    /// Nodes visited by the most recent online search.
    pub fn last_node_count(&self) -> usize {
        self.last_nodes
    }

    /// Runs the online search from the current belief.
    pub fn plan_best_action<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<PlannedAction, PlanError> {
        let samples = self.config.samples_per_level(self.config.horizon);
        let outcome = self.search_from(&self.belief, &samples, rng)?;
        event!(
            target: "tutor_planner::forward_search",
            Level::DEBUG,
            action = %outcome.action.action,
            item = outcome.action.item,
            cost = outcome.cost,
            nodes = outcome.nodes,
            elapsed_ms = outcome.elapsed_ms,
            "planned action"
        );
        self.last_tree = outcome.tree;
        self.last_nodes = outcome.nodes;
        Ok(outcome.action)
    }

    fn search_from<R: Rng + ?Sized>(
        &self,
        belief: &B,
        samples: &[usize],
        rng: &mut R,
    ) -> Result<SearchOutcome, PlanError> {
        let concept = self.concept.as_ref();
        let mut search = Search {
            concept,
            actions: &self.actions,
            discount: self.config.discount,
            leaf_cost: self.config.leaf_scale * concept.action_costs().min(),
            true_index: concept.true_hypothesis_index(),
            bound: self.bound,
            budget: Budget::new(self.config.time_cap_ms, self.config.node_cap),
            rng,
        };
        let mut work = belief.clone();
        let mut tree = Vec::new();
        search.expand(&mut work, self.config.horizon, samples, &mut tree)?;
        let (action, cost) = search.select(&tree).ok_or(PlanError::NoCandidates)?;
        Ok(SearchOutcome {
            action,
            cost,
            tree,
            nodes: search.budget.nodes(),
            elapsed_ms: search.budget.elapsed_ms(),
        })
    }

    fn walk<R: Rng + ?Sized>(
        &self,
        node: &mut PlanNode,
        level: usize,
        belief: &B,
        samples: &[usize],
        rng: &mut R,
    ) -> Result<(), PlanError> {
        if level == 0 {
            return Ok(());
        }
        let action = self.search_from(belief, samples, rng)?.action;
        node.action = Some(action);
        if level == 1 {
            return Ok(());
        }

        let responses: Vec<Option<Observation>> = match action.action {
            TeachingAction::Example => vec![None],
            TeachingAction::Quiz | TeachingAction::Feedback => self
                .concept
                .observation_space()
                .iter()
                .copied()
                .map(Some)
                .collect(),
        };
        for response in responses {
            let mut next = belief.clone();
            next.update(action.action, action.result(), response)?;
            let mut child = PlanNode::default();
            self.walk(&mut child, level - 1, &next, samples, rng)?;
            node.responses.insert(ResponseKey(response), child);
        }
        Ok(())
    }

    /// The preplanned action for the current position in the tree, if any.
    fn preplanned_action(&mut self, prev_response: Option<Observation>) -> Option<PlannedAction> {
        let tree = self.preplan.as_ref()?;
        if self.action_count > 1 {
            self.path.push(ResponseKey(prev_response));
        }
        tree.root.descend(&self.path).and_then(|node| node.action)
    }
}

impl<C, B> Planner for ForwardSearchPlanner<C, B>
where
    C: Concept,
    B: BeliefModel + Clone,
{
    fn name(&self) -> &'static str {
        "forward_search"
    }

    fn choose_action(
        &mut self,
        prev_response: Option<Observation>,
        rng: &mut dyn RngCore,
    ) -> Result<PlannedAction, PlanError> {
        self.action_count += 1;
        if let Some(action) = self.preplanned_action(prev_response) {
            event!(
                target: "tutor_planner::forward_search",
                Level::DEBUG,
                action = %action.action,
                item = action.item,
                depth = self.path.len(),
                "replayed preplanned action"
            );
            return Ok(action);
        }
        self.plan_best_action(rng)
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
        self.action_count = 0;
        self.path.clear();
        self.last_tree.clear();
        self.last_nodes = 0;
    }

    fn perform_preplanning(
        &mut self,
        depth: usize,
        samples: usize,
        rng: &mut dyn RngCore,
    ) -> Result<(), PlanError> {
        let per_level = vec![samples.max(1); self.config.horizon];
        let mut root = PlanNode::default();
        self.walk(&mut root, depth, &self.belief, &per_level, rng)?;
        event!(
            target: "tutor_planner::forward_search",
            Level::INFO,
            depth,
            samples,
            nodes = root.node_count(),
            "preplanning finished"
        );
        self.preplan = Some(PreplanTree {
            depth,
            samples,
            root,
        });
        self.path.clear();
        self.action_count = 0;
        Ok(())
    }

    fn load_preplanning(&mut self, tree: PreplanTree) {
        self.preplan = Some(tree);
        self.path.clear();
        self.action_count = 0;
    }

    fn preplanned(&self) -> Option<&PreplanTree> {
        self.preplan.as_ref()
    }

    fn belief_metrics(&self) -> Option<BeliefMetrics> {
        Some(BeliefMetrics::from_model(
            &self.belief,
            self.concept.true_hypothesis_index(),
        ))
    }
}
