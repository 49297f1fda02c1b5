use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::Arc;
use tutor_core::action::{Observation, TeachingAction};
use tutor_core::belief::{BeliefModel, ContinuousBelief, DiscreteBelief, MemorylessBelief};
use tutor_core::concept::{Concept, LetterAddition};
use tutor_planner::{
    ForwardSearchPlanner, PlanError, PlanNode, PlannedAction, Planner, PreplanTree, ResponseKey,
    SearchConfig,
};

fn letters() -> Arc<LetterAddition> {
    Arc::new(LetterAddition::with_assignment(vec![2, 0, 3, 1]).unwrap())
}

fn config(horizon: usize, samples: Vec<usize>) -> SearchConfig {
    SearchConfig {
        horizon,
        samples,
        ..SearchConfig::default()
    }
}

fn planner_with<B: BeliefModel + Clone>(
    concept: &Arc<LetterAddition>,
    belief: B,
) -> ForwardSearchPlanner<LetterAddition, B> {
    ForwardSearchPlanner::new(
        Arc::clone(concept),
        belief,
        &TeachingAction::ALL,
        config(2, vec![3, 2]),
    )
}

#[test]
fn same_seed_same_action_for_every_model() {
    let concept = letters();
    for seed in [1, 2, 3] {
        let mut a = planner_with(&concept, MemorylessBelief::new(concept.as_ref()));
        let mut b = planner_with(&concept, MemorylessBelief::new(concept.as_ref()));
        assert_eq!(
            a.plan_best_action(&mut SmallRng::seed_from_u64(seed)).unwrap(),
            b.plan_best_action(&mut SmallRng::seed_from_u64(seed)).unwrap()
        );

        let mut a = planner_with(&concept, DiscreteBelief::new(concept.as_ref(), 2));
        let mut b = planner_with(&concept, DiscreteBelief::new(concept.as_ref(), 2));
        assert_eq!(
            a.plan_best_action(&mut SmallRng::seed_from_u64(seed)).unwrap(),
            b.plan_best_action(&mut SmallRng::seed_from_u64(seed)).unwrap()
        );

        let mut a = planner_with(&concept, ContinuousBelief::new(concept.as_ref(), 16));
        let mut b = planner_with(&concept, ContinuousBelief::new(concept.as_ref(), 16));
        assert_eq!(
            a.plan_best_action(&mut SmallRng::seed_from_u64(seed)).unwrap(),
            b.plan_best_action(&mut SmallRng::seed_from_u64(seed)).unwrap()
        );
    }
}

#[test]
fn root_costs_include_action_costs() {
    let concept = letters();
    let mut planner = planner_with(&concept, MemorylessBelief::new(concept.as_ref()));
    let chosen = planner
        .plan_best_action(&mut SmallRng::seed_from_u64(17))
        .unwrap();
    let tree = planner.plan_tree();
    assert_eq!(tree.len(), 3 * 3);
    let best = tree.iter().map(|n| n.cost).fold(f64::INFINITY, f64::min);
    assert!(tree.iter().any(|n| {
        n.cost == best && n.item == chosen.item && n.action == chosen.action
    }));
    for node in tree {
        assert!(node.cost >= concept.action_cost(node.action));
        assert_eq!(node.value, concept.true_value(node.item));
    }
}

/// Every response path of `node`, paired with the action stored at its end.
fn paths(node: &PlanNode, prefix: Vec<ResponseKey>, out: &mut Vec<(Vec<ResponseKey>, PlannedAction)>) {
    if let Some(action) = node.action {
        out.push((prefix.clone(), action));
    }
    for (key, child) in &node.responses {
        let mut next = prefix.clone();
        next.push(*key);
        paths(child, next, out);
    }
}

fn replay<P: Planner>(planner: &mut P, path: &[ResponseKey]) -> PlannedAction {
    planner.reset();
    let mut rng = SmallRng::seed_from_u64(0);
    let mut previous: Option<Observation> = None;
    let mut action = planner.choose_action(previous, &mut rng).unwrap();
    for key in path {
        planner
            .observe(action.action, action.result(), key.0)
            .unwrap();
        previous = key.0;
        action = planner.choose_action(previous, &mut rng).unwrap();
    }
    action
}

#[test]
fn reloaded_preplan_replays_identical_actions() {
    let concept = letters();
    let mut original = ForwardSearchPlanner::new(
        Arc::clone(&concept),
        MemorylessBelief::new(concept.as_ref()),
        &TeachingAction::ALL,
        config(1, vec![2]),
    );
    original
        .perform_preplanning(3, 2, &mut SmallRng::seed_from_u64(99))
        .unwrap();
    let tree = original.preplanned().cloned().unwrap();
    let json = tree.to_json().unwrap();
    let restored_tree = PreplanTree::from_json(&json).unwrap();
    assert_eq!(restored_tree.to_json().unwrap(), json);

    let mut restored = ForwardSearchPlanner::new(
        Arc::clone(&concept),
        MemorylessBelief::new(concept.as_ref()),
        &TeachingAction::ALL,
        config(1, vec![2]),
    );
    restored.load_preplanning(restored_tree);

    let mut all = Vec::new();
    paths(&tree.root, Vec::new(), &mut all);
    assert!(all.len() > 1);
    for (path, expected) in all {
        assert_eq!(replay(&mut original, &path), expected);
        assert_eq!(replay(&mut restored, &path), expected);
    }
}

#[test]
fn preplanned_tree_branches_on_every_response() {
    let concept = letters();
    let mut planner = ForwardSearchPlanner::new(
        Arc::clone(&concept),
        MemorylessBelief::new(concept.as_ref()),
        &TeachingAction::ALL,
        config(1, vec![3]),
    );
    planner
        .perform_preplanning(2, 3, &mut SmallRng::seed_from_u64(5))
        .unwrap();
    let root = &planner.preplanned().unwrap().root;
    let action = root.action.unwrap();
    let expected = match action.action {
        TeachingAction::Example => 1,
        TeachingAction::Quiz | TeachingAction::Feedback => concept.observation_space().len(),
    };
    assert_eq!(root.responses.len(), expected);
    assert!(root.responses.values().all(|child| child.action.is_some()));
}

#[test]
fn time_cap_zero_exhausts_immediately() {
    let concept = letters();
    let mut planner = ForwardSearchPlanner::new(
        Arc::clone(&concept),
        MemorylessBelief::new(concept.as_ref()),
        &TeachingAction::ALL,
        SearchConfig {
            time_cap_ms: Some(0),
            ..config(2, vec![3, 3])
        },
    );
    let err = planner
        .choose_action(None, &mut SmallRng::seed_from_u64(1))
        .unwrap_err();
    assert!(matches!(err, PlanError::BudgetExhausted { nodes: 1, .. }));
}
