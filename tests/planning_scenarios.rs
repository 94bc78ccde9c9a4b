//! End-to-end planning of the counter domain through the scheduler

mod common;

use boundplan::{
    PlannerSettings, SelectionMode,
    domains::counter::{CounterActions, Increment},
    ports::StateDataContext,
};
use common::{counter_scheduler, plan_from};

fn converges_to_full_counter_plan(mode: SelectionMode) {
    let settings = PlannerSettings::new()
        .with_state_expansion_budget(1)
        .with_selection_mode(mode);
    let (arena, scheduler) = counter_scheduler(100, CounterActions::deterministic(), settings);

    let request = plan_from(&scheduler, &arena, 0);
    let plan = request.plan().unwrap();
    let root = plan.root_info().unwrap();

    assert!(root.subplan_is_complete);
    assert_eq!(plan.size(), 103);
    assert_eq!(root.cumulative_reward_estimate.lower_bound, 100.0);
    assert_eq!(root.cumulative_reward_estimate.upper_bound, 100.0);
}

#[test]
fn sequential_selection_converges_on_the_counter() {
    converges_to_full_counter_plan(SelectionMode::Sequential);
}

#[test]
fn parallel_selection_converges_on_the_counter() {
    converges_to_full_counter_plan(SelectionMode::Parallel);
}

#[test]
fn larger_budgets_reach_the_same_plan() {
    let settings = PlannerSettings::new()
        .with_state_expansion_budget(8)
        .with_selection_mode(SelectionMode::Parallel);
    let (arena, scheduler) = counter_scheduler(100, CounterActions::deterministic(), settings);

    let plan = plan_from(&scheduler, &arena, 0).plan().unwrap();
    assert!(plan.root_info().unwrap().subplan_is_complete);
    assert_eq!(plan.size(), 103);
}

#[test]
fn equal_successors_share_one_state() {
    let (arena, scheduler) =
        counter_scheduler(10, CounterActions::deterministic(), PlannerSettings::new());
    let plan = plan_from(&scheduler, &arena, 0).plan().unwrap();

    let twos: Vec<_> = plan
        .states()
        .into_iter()
        .filter(|(key, _)| arena.state_data(*key) == Some(2))
        .collect();
    assert_eq!(twos.len(), 1);

    let two = plan.try_get_equivalent_plan_state(&2).unwrap();
    assert_eq!(twos[0].0, two);
    let root = plan.root().unwrap();
    let one = plan.try_get_equivalent_plan_state(&1).unwrap();
    let mut predecessors = plan.predecessors(two);
    predecessors.sort();
    let mut expected = vec![root, one];
    expected.sort();
    assert_eq!(predecessors, expected);

    assert_eq!(plan.outcomes(root, Increment(2))[0].0, two);
    assert_eq!(plan.outcomes(one, Increment(1))[0].0, two);
}

#[test]
fn optimal_action_breaks_ties_by_smallest_key() {
    let (arena, scheduler) =
        counter_scheduler(10, CounterActions::deterministic(), PlannerSettings::new());
    let plan = plan_from(&scheduler, &arena, 0).plan().unwrap();
    let root = plan.root().unwrap();

    for action in plan.actions(root) {
        let info = plan.try_get_action_info(root, action).unwrap();
        assert_eq!(info.cumulative_reward_estimate.average, 10.0);
    }
    assert_eq!(plan.try_get_optimal_action(root), Some(Increment(1)));
}

#[test]
fn overshooting_is_avoided_near_the_goal() {
    let (arena, scheduler) =
        counter_scheduler(10, CounterActions::deterministic(), PlannerSettings::new());
    let plan = plan_from(&scheduler, &arena, 9).plan().unwrap();
    let root = plan.root().unwrap();

    assert_eq!(plan.try_get_optimal_action(root), Some(Increment(1)));
    let overshoot = plan.try_get_action_info(root, Increment(3)).unwrap();
    assert_eq!(overshoot.cumulative_reward_estimate.average, 3.0 - 100.0);
}

#[test]
fn slippery_counter_converges() {
    let settings = PlannerSettings::new().with_state_expansion_budget(2);
    let (arena, scheduler) = counter_scheduler(10, CounterActions::slippery(0.2), settings);
    let plan = plan_from(&scheduler, &arena, 0).plan().unwrap();

    assert!(plan.root_info().unwrap().subplan_is_complete);
    for (key, _) in plan.states() {
        let value = arena.state_data(key).unwrap();
        assert!((0..=12).contains(&value), "unexpected state {value}");
    }

    let root = plan.root().unwrap();
    let outcomes = plan.outcomes(root, Increment(3));
    assert_eq!(outcomes.len(), 2);
    let total: f64 = outcomes.iter().map(|(_, info)| info.probability).sum();
    assert!((total - 1.0).abs() < 1e-12);
}

#[test]
fn discounting_shrinks_the_root_value() {
    let settings = PlannerSettings::new().with_discount_factor(0.5);
    let (arena, scheduler) = counter_scheduler(10, CounterActions::deterministic(), settings);
    let plan = plan_from(&scheduler, &arena, 0).plan().unwrap();
    let root = plan.root_info().unwrap();

    assert!(root.subplan_is_complete);
    assert!(root.cumulative_reward_estimate.average < 10.0);
    assert!(root.cumulative_reward_estimate.average > 0.0);
}
