//! Upward propagation of bounds and completeness.
//!
//! States selected this iteration are grouped by the horizon they were
//! reached at and processed from the deepest layer up. A state whose info
//! changed queues its predecessors one layer closer to the root, so every
//! refresh reaches the root in a bounded number of steps even on cyclic
//! graphs.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::{
    graph::PlanGraph,
    identifiers::{PlanKey, StateActionPair, StateTransition},
    types::{ActionInfo, BoundedValue, StateInfo},
};

/// Refresh the selected states and their ancestors. Returns the number of
/// states whose info changed.
pub fn backpropagate<S: PlanKey, A: PlanKey>(
    graph: &mut PlanGraph<S, A>,
    selected: &[(S, usize)],
    discount_factor: f64,
) -> usize {
    let mut layers: BTreeMap<usize, BTreeSet<S>> = BTreeMap::new();
    for &(state, horizon) in selected {
        layers.entry(horizon).or_default().insert(state);
    }

    let mut updated = 0;
    while let Some((horizon, states)) = layers.pop_last() {
        for state in states {
            if !update_state(graph, state, discount_factor) {
                continue;
            }
            updated += 1;
            if horizon == 0 {
                continue;
            }
            let predecessors = graph.predecessors(&state);
            if !predecessors.is_empty() {
                layers
                    .entry(horizon - 1)
                    .or_default()
                    .extend(predecessors.iter().copied());
            }
        }
    }
    updated
}

/// Recompute one state from its actions. Returns whether its info changed.
fn update_state<S: PlanKey, A: PlanKey>(
    graph: &mut PlanGraph<S, A>,
    state: S,
    discount_factor: f64,
) -> bool {
    let Some(&previous) = graph.state_info(&state) else {
        return false;
    };

    let actions = graph.actions(&state).to_vec();
    if actions.is_empty() {
        // Expanded without any outcome: nothing left to explore below.
        let average = previous.cumulative_reward_estimate.average;
        let info = StateInfo {
            subplan_is_complete: true,
            cumulative_reward_estimate: BoundedValue::exact(average),
        };
        graph.set_state_info(state, info);
        return info != previous;
    }

    let mut action_values = Vec::with_capacity(actions.len());
    for action in actions {
        let pair = StateActionPair::new(state, action);
        let info = action_value(graph, pair, discount_factor);
        graph.set_action_info(pair, info);
        action_values.push(info);
    }

    let mut estimate = action_values[0].cumulative_reward_estimate;
    for value in &action_values[1..] {
        estimate = estimate.max(&value.cumulative_reward_estimate);
    }
    let complete = action_values
        .iter()
        .filter(|info| info.cumulative_reward_estimate.upper_bound >= estimate.lower_bound)
        .all(|info| info.subplan_is_complete);

    let info = StateInfo {
        subplan_is_complete: complete || previous.subplan_is_complete,
        cumulative_reward_estimate: estimate,
    };
    graph.set_state_info(state, info);
    trace!(?state, %estimate, complete = info.subplan_is_complete, "state refreshed");
    info != previous
}

/// `sum(p * (utility + discount * V(successor)))` per channel.
fn action_value<S: PlanKey, A: PlanKey>(
    graph: &PlanGraph<S, A>,
    pair: StateActionPair<S, A>,
    discount_factor: f64,
) -> ActionInfo {
    let mut estimate = BoundedValue::default();
    let mut complete = true;
    for &successor in graph.resulting_states(&pair) {
        let (Some(transition), Some(successor_info)) = (
            graph.transition_info(&StateTransition::new(pair, successor)),
            graph.state_info(&successor),
        ) else {
            complete = false;
            continue;
        };
        let contribution = successor_info
            .cumulative_reward_estimate
            .scale(discount_factor)
            .offset(transition.transition_utility_value)
            .scale(transition.probability);
        estimate = estimate.add(&contribution);
        complete &= successor_info.subplan_is_complete;
    }
    ActionInfo {
        subplan_is_complete: complete,
        cumulative_reward_estimate: estimate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::EdgeBatch, types::StateTransitionInfo};

    fn state(lower: f64, average: f64, upper: f64, complete: bool) -> StateInfo {
        StateInfo {
            subplan_is_complete: complete,
            cumulative_reward_estimate: BoundedValue::new(lower, average, upper),
        }
    }

    #[test]
    fn stochastic_action_takes_the_expectation() {
        let mut graph: PlanGraph<u32, u8> = PlanGraph::new();
        graph.set_state_info(0, state(0.0, 0.0, 0.0, false));
        graph.set_state_info(1, state(10.0, 10.0, 10.0, true));
        graph.set_state_info(2, state(0.0, 2.0, 4.0, false));
        let batch = EdgeBatch::with_capacity(2);
        batch.write_edge(0, 0, StateTransitionInfo::new(0.5, 1.0), 1);
        batch.write_edge(0, 0, StateTransitionInfo::new(0.5, 1.0), 2);
        graph.merge_edges(batch);

        assert_eq!(backpropagate(&mut graph, &[(0, 0)], 1.0), 1);
        let root = graph.state_info(&0).unwrap();
        assert_eq!(root.cumulative_reward_estimate, BoundedValue::new(6.0, 7.0, 8.0));
        assert!(!root.subplan_is_complete);
    }

    #[test]
    fn dominated_incomplete_actions_do_not_block_completion() {
        let mut graph: PlanGraph<u32, u8> = PlanGraph::new();
        graph.set_state_info(0, state(0.0, 0.0, 100.0, false));
        graph.set_state_info(1, state(5.0, 5.0, 5.0, true));
        graph.set_state_info(2, state(0.0, 1.0, 3.0, false));
        let batch = EdgeBatch::with_capacity(2);
        batch.write_edge(0, 0, StateTransitionInfo::new(1.0, 0.0), 1);
        batch.write_edge(0, 1, StateTransitionInfo::new(1.0, 0.0), 2);
        graph.merge_edges(batch);

        backpropagate(&mut graph, &[(0, 0)], 1.0);
        let root = graph.state_info(&0).unwrap();
        assert!(root.subplan_is_complete);
        assert_eq!(root.cumulative_reward_estimate, BoundedValue::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn changes_climb_through_predecessors() {
        // 0 -> 1 -> 2, with 2 a dead end selected at horizon 2.
        let mut graph: PlanGraph<u32, u8> = PlanGraph::new();
        graph.set_state_info(0, state(0.0, 0.0, 10.0, false));
        graph.set_state_info(1, state(0.0, 0.0, 10.0, false));
        graph.set_state_info(2, state(0.0, 3.0, 10.0, false));
        let batch = EdgeBatch::with_capacity(2);
        batch.write_edge(0, 0, StateTransitionInfo::new(1.0, 1.0), 1);
        batch.write_edge(1, 0, StateTransitionInfo::new(1.0, 1.0), 2);
        graph.merge_edges(batch);

        let updated = backpropagate(&mut graph, &[(2, 2)], 0.5);
        assert_eq!(updated, 3);
        assert_eq!(graph.state_info(&2).unwrap(), &state(3.0, 3.0, 3.0, true));
        // 1 + 0.5 * 3 = 2.5, then 1 + 0.5 * 2.5 = 2.25
        assert_eq!(
            graph.state_info(&0).unwrap(),
            &state(2.25, 2.25, 2.25, true)
        );
    }

    #[test]
    fn completeness_is_sticky() {
        let mut graph: PlanGraph<u32, u8> = PlanGraph::new();
        graph.set_state_info(0, state(0.0, 0.0, 0.0, true));
        graph.set_state_info(1, state(0.0, 1.0, 2.0, false));
        let batch = EdgeBatch::with_capacity(1);
        batch.write_edge(0, 0, StateTransitionInfo::new(1.0, 0.0), 1);
        graph.merge_edges(batch);

        backpropagate(&mut graph, &[(0, 0)], 1.0);
        assert!(graph.state_info(&0).unwrap().subplan_is_complete);
    }
}
