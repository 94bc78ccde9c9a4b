//! Budgeted selection of frontier states.
//!
//! The walk starts at the root with the full expansion budget and proceeds by
//! increasing horizon. At every expanded state the budget is split over the
//! non-dominated actions (one unit each, best upper bound first) with any
//! remainder going to the best-average action; an action's units are split
//! over its incomplete outcomes by probability-weighted bound range.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    graph::PlanGraph,
    identifiers::{PlanKey, StateActionPair, StateTransition},
};

/// Traversal strategy used by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// One worker walks every horizon in turn.
    #[default]
    Sequential,
    /// All states of a horizon are processed as one parallel batch.
    Parallel,
}

/// States picked by one selection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutput<S> {
    /// Every state the walk stopped at, with the deepest horizon it was reached at.
    pub all_selected: Vec<(S, usize)>,
    /// The subset of `all_selected` that has not been expanded yet.
    pub unexpanded: Vec<S>,
}

impl<S> Default for SelectionOutput<S> {
    fn default() -> Self {
        Self {
            all_selected: Vec::new(),
            unexpanded: Vec::new(),
        }
    }
}

impl<S> SelectionOutput<S> {
    pub fn is_empty(&self) -> bool {
        self.all_selected.is_empty()
    }
}

/// Where a unit of budget ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment<S> {
    /// Keep walking from `state` at the next horizon.
    Queue { state: S, budget: usize },
    /// The walk stops at `state`.
    Select {
        state: S,
        horizon: usize,
        expanded: bool,
    },
}

struct Selector<'a, S, A> {
    graph: &'a PlanGraph<S, A>,
    depths: &'a HashMap<S, usize>,
}

impl<'a, S: PlanKey, A: PlanKey> Selector<'a, S, A> {
    fn assign_to_state(&self, state: S, horizon: usize, budget: usize) -> Assignment<S> {
        if !self.graph.is_expanded(&state) {
            return Assignment::Select {
                state,
                horizon,
                expanded: false,
            };
        }
        match self.depths.get(&state) {
            Some(&depth) if horizon <= depth => Assignment::Queue { state, budget },
            _ => Assignment::Select {
                state,
                horizon,
                expanded: true,
            },
        }
    }

    /// Split `budget` units at `state` (reached at `horizon`) over its actions.
    fn allocate(&self, state: S, horizon: usize, budget: usize) -> Vec<Assignment<S>> {
        let stale = vec![Assignment::Select {
            state,
            horizon,
            expanded: true,
        }];

        let mut max_lower_bound = f64::NEG_INFINITY;
        let mut best_average: Option<(A, f64)> = None;
        let mut incomplete = Vec::new();
        for &action in self.graph.actions(&state) {
            let Some(info) = self.graph.action_info(&StateActionPair::new(state, action)) else {
                continue;
            };
            let estimate = info.cumulative_reward_estimate;
            max_lower_bound = max_lower_bound.max(estimate.lower_bound);
            if info.subplan_is_complete {
                continue;
            }
            if best_average.is_none_or(|(_, average)| estimate.average > average) {
                best_average = Some((action, estimate.average));
            }
            incomplete.push((action, estimate.upper_bound));
        }

        let Some((best_action, _)) = best_average else {
            return stale;
        };

        let mut non_dominated: Vec<(A, f64)> = incomplete
            .into_iter()
            .filter(|&(_, upper)| upper >= max_lower_bound)
            .collect();
        if non_dominated.is_empty() {
            // A complete action dominates the rest; backpropagation settles it.
            return stale;
        }
        non_dominated.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut per_action: Vec<(A, usize)> = Vec::with_capacity(non_dominated.len());
        let mut remaining = budget;
        for (action, _) in non_dominated {
            if remaining == 0 {
                break;
            }
            per_action.push((action, 1));
            remaining -= 1;
        }
        if remaining > 0 {
            match per_action.iter_mut().find(|(action, _)| *action == best_action) {
                Some(entry) => entry.1 += remaining,
                None => per_action.push((best_action, remaining)),
            }
        }

        let mut assignments = Vec::with_capacity(per_action.len());
        let mut refresh = false;
        for (action, units) in per_action {
            let pair = StateActionPair::new(state, action);
            if !self.allocate_outcomes(pair, horizon + 1, units, &mut assignments) {
                refresh = true;
            }
        }
        // An action whose outcomes all completed still reports as incomplete
        // until this state is backed up again.
        if refresh {
            assignments.extend(stale);
        }
        assignments
    }

    /// Split `units` over the incomplete outcomes of `pair`. Returns `false`
    /// when every outcome is already complete.
    fn allocate_outcomes(
        &self,
        pair: StateActionPair<S, A>,
        horizon: usize,
        units: usize,
        out: &mut Vec<Assignment<S>>,
    ) -> bool {
        let mut weighted: Vec<(S, f64)> = self
            .graph
            .resulting_states(&pair)
            .iter()
            .filter_map(|&successor| {
                let info = self.graph.state_info(&successor)?;
                if info.subplan_is_complete {
                    return None;
                }
                let probability = self
                    .graph
                    .transition_info(&StateTransition::new(pair, successor))
                    .map_or(0.0, |t| t.probability);
                Some((successor, probability * info.cumulative_reward_estimate.range()))
            })
            .collect();
        if weighted.is_empty() {
            return false;
        }
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let ones = units.min(weighted.len());
        let top_share = units - ones + 1;
        for (index, &(successor, _)) in weighted.iter().take(ones).enumerate() {
            let share = if index == 0 { top_share } else { 1 };
            out.push(self.assign_to_state(successor, horizon, share));
        }
        true
    }
}

/// Records the deepest horizon each selected state was reached at.
struct SelectedStates<S> {
    horizons: HashMap<S, (usize, bool)>,
}

impl<S> Default for SelectedStates<S> {
    fn default() -> Self {
        Self {
            horizons: HashMap::new(),
        }
    }
}

impl<S: PlanKey> SelectedStates<S> {
    fn record(&mut self, state: S, horizon: usize, expanded: bool) {
        match self.horizons.get(&state) {
            Some(&(existing, _)) if existing >= horizon => {}
            _ => {
                self.horizons.insert(state, (horizon, expanded));
            }
        }
    }

    fn finish(self, depths: &mut HashMap<S, usize>) -> SelectionOutput<S> {
        let mut output = SelectionOutput::default();
        for (state, (horizon, expanded)) in self.horizons {
            let depth = depths.entry(state).or_insert(horizon);
            *depth = (*depth).max(horizon);
            output.all_selected.push((state, horizon));
            if !expanded {
                output.unexpanded.push(state);
            }
        }
        output.all_selected.sort();
        output.unexpanded.sort();
        output
    }
}

/// Run one selection pass from `root` and refresh `depths`.
pub fn select<S: PlanKey, A: PlanKey>(
    graph: &PlanGraph<S, A>,
    depths: &mut HashMap<S, usize>,
    root: S,
    budget: usize,
    mode: SelectionMode,
) -> SelectionOutput<S> {
    let Some(root_info) = graph.state_info(&root) else {
        return SelectionOutput::default();
    };
    if root_info.subplan_is_complete || budget == 0 {
        return SelectionOutput::default();
    }

    let selector = Selector {
        graph,
        depths: &*depths,
    };
    let mut selected = SelectedStates::default();
    let mut layer: BTreeMap<S, usize> = BTreeMap::new();
    match selector.assign_to_state(root, 0, budget) {
        Assignment::Queue { state, budget } => {
            layer.insert(state, budget);
        }
        Assignment::Select {
            state,
            horizon,
            expanded,
        } => selected.record(state, horizon, expanded),
    }

    let mut horizon = 0;
    while !layer.is_empty() {
        let assignments: Vec<Assignment<S>> = match mode {
            SelectionMode::Sequential => layer
                .iter()
                .flat_map(|(&state, &budget)| selector.allocate(state, horizon, budget))
                .collect(),
            SelectionMode::Parallel => layer
                .par_iter()
                .flat_map_iter(|(&state, &budget)| selector.allocate(state, horizon, budget))
                .collect(),
        };

        let mut next_layer = BTreeMap::new();
        for assignment in assignments {
            match assignment {
                Assignment::Queue { state, budget } => {
                    *next_layer.entry(state).or_insert(0) += budget;
                }
                Assignment::Select {
                    state,
                    horizon,
                    expanded,
                } => selected.record(state, horizon, expanded),
            }
        }
        layer = next_layer;
        horizon += 1;
    }

    selected.finish(depths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::EdgeBatch,
        types::{ActionInfo, BoundedValue, StateInfo, StateTransitionInfo},
    };

    fn info(lower: f64, average: f64, upper: f64, complete: bool) -> StateInfo {
        StateInfo {
            subplan_is_complete: complete,
            cumulative_reward_estimate: BoundedValue::new(lower, average, upper),
        }
    }

    fn set_action(graph: &mut PlanGraph<u32, u8>, state: u32, action: u8, value: StateInfo) {
        graph.set_action_info(
            StateActionPair::new(state, action),
            ActionInfo {
                subplan_is_complete: value.subplan_is_complete,
                cumulative_reward_estimate: value.cumulative_reward_estimate,
            },
        );
    }

    /// Root 0 with actions 0 -> 1, 1 -> 2, 2 -> 3 (action 2 dominated).
    fn fan() -> (PlanGraph<u32, u8>, HashMap<u32, usize>) {
        let mut graph = PlanGraph::new();
        graph.set_state_info(0, info(0.0, 1.0, 10.0, false));
        for s in 1..=3 {
            graph.set_state_info(s, info(0.0, 1.0, 10.0, false));
        }
        let batch = EdgeBatch::with_capacity(3);
        for (action, successor) in [(0u8, 1u32), (1, 2), (2, 3)] {
            batch.write_edge(0, action, StateTransitionInfo::new(1.0, 0.0), successor);
        }
        graph.merge_edges(batch);
        set_action(&mut graph, 0, 0, info(2.0, 4.0, 9.0, false));
        set_action(&mut graph, 0, 1, info(1.0, 5.0, 6.0, false));
        set_action(&mut graph, 0, 2, info(0.0, 0.5, 1.0, false));
        (graph, HashMap::from([(0, 0)]))
    }

    #[test]
    fn unexpanded_root_is_selected_directly() {
        let mut graph: PlanGraph<u32, u8> = PlanGraph::new();
        graph.set_state_info(7, StateInfo::default());
        let mut depths = HashMap::from([(7, 0)]);
        let output = select(&graph, &mut depths, 7, 4, SelectionMode::Sequential);
        assert_eq!(output.unexpanded, vec![7]);
        assert_eq!(output.all_selected, vec![(7, 0)]);
    }

    #[test]
    fn complete_root_selects_nothing() {
        let mut graph: PlanGraph<u32, u8> = PlanGraph::new();
        graph.set_state_info(0, info(1.0, 1.0, 1.0, true));
        let mut depths = HashMap::from([(0, 0)]);
        assert!(select(&graph, &mut depths, 0, 3, SelectionMode::Parallel).is_empty());
    }

    #[test]
    fn dominated_actions_receive_no_budget() {
        let (graph, mut depths) = fan();
        let output = select(&graph, &mut depths, 0, 5, SelectionMode::Sequential);
        assert_eq!(output.unexpanded, vec![1, 2]);
        assert_eq!(depths.get(&1), Some(&1));
        assert!(!depths.contains_key(&3));
    }

    #[test]
    fn single_unit_goes_to_highest_upper_bound() {
        let (graph, mut depths) = fan();
        let output = select(&graph, &mut depths, 0, 1, SelectionMode::Parallel);
        assert_eq!(output.unexpanded, vec![1]);
    }

    #[test]
    fn complete_actions_are_skipped() {
        let (mut graph, mut depths) = fan();
        set_action(&mut graph, 0, 0, info(2.0, 4.0, 9.0, true));
        let output = select(&graph, &mut depths, 0, 1, SelectionMode::Sequential);
        assert_eq!(output.unexpanded, vec![2]);
    }

    #[test]
    fn stale_state_is_selected_for_refresh() {
        let (mut graph, mut depths) = fan();
        for action in 0..3 {
            set_action(&mut graph, 0, action, info(1.0, 1.0, 1.0, true));
        }
        let output = select(&graph, &mut depths, 0, 2, SelectionMode::Sequential);
        assert_eq!(output.all_selected, vec![(0, 0)]);
        assert!(output.unexpanded.is_empty());
    }
    #[test]
    fn stale_action_keeps_sibling_assignments() {
        let (mut graph, mut depths) = fan();
        graph.set_state_info(1, info(3.0, 3.0, 3.0, true));
        let output = select(&graph, &mut depths, 0, 2, SelectionMode::Sequential);
        assert_eq!(output.all_selected, vec![(0, 0), (2, 1)]);
        assert_eq!(output.unexpanded, vec![2]);
    }
}
