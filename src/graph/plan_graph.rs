//! Canonical plan graph storage.
//!
//! Holds states, actions, transitions and their bound estimates. Expansion
//! writes into an [`EdgeBatch`] from many threads; [`PlanGraph::merge_edges`]
//! reconciles the batch into canonical storage before the next phase reads it.

use std::collections::{HashMap, HashSet, VecDeque};

use super::multimap::{ConcurrentMultiMap, MultiMap};
use crate::{
    identifiers::{PlanKey, StateActionPair, StateTransition},
    types::{ActionInfo, StateInfo, StateTransitionInfo},
};

/// The persistent state-action graph.
#[derive(Debug, Clone)]
pub struct PlanGraph<S, A> {
    state_info: HashMap<S, StateInfo>,
    action_info: HashMap<StateActionPair<S, A>, ActionInfo>,
    transition_info: HashMap<StateTransition<S, A>, StateTransitionInfo>,
    action_lookup: MultiMap<S, A>,
    resulting_state_lookup: MultiMap<StateActionPair<S, A>, S>,
    predecessor_graph: MultiMap<S, S>,
}

impl<S, A> Default for PlanGraph<S, A> {
    fn default() -> Self {
        Self {
            state_info: HashMap::new(),
            action_info: HashMap::new(),
            transition_info: HashMap::new(),
            action_lookup: MultiMap::default(),
            resulting_state_lookup: MultiMap::default(),
            predecessor_graph: MultiMap::default(),
        }
    }
}

impl<S: PlanKey, A: PlanKey> PlanGraph<S, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve room for upcoming states and actions.
    pub fn expand_by(&mut self, state_capacity_delta: usize, action_capacity_delta: usize) {
        self.state_info.reserve(state_capacity_delta);
        self.predecessor_graph.reserve(state_capacity_delta);
        self.action_lookup.reserve(action_capacity_delta);
        self.action_info.reserve(action_capacity_delta);
        self.resulting_state_lookup.reserve(action_capacity_delta);
        self.transition_info.reserve(state_capacity_delta);
    }

    /// Number of states with recorded info.
    pub fn size(&self) -> usize {
        self.state_info.len()
    }

    pub fn contains_state(&self, state: &S) -> bool {
        self.state_info.contains_key(state)
    }

    pub fn state_info(&self, state: &S) -> Option<&StateInfo> {
        self.state_info.get(state)
    }

    pub fn set_state_info(&mut self, state: S, info: StateInfo) {
        self.state_info.insert(state, info);
    }

    pub fn action_info(&self, pair: &StateActionPair<S, A>) -> Option<&ActionInfo> {
        self.action_info.get(pair)
    }

    pub fn set_action_info(&mut self, pair: StateActionPair<S, A>, info: ActionInfo) {
        self.action_info.insert(pair, info);
    }

    pub fn transition_info(&self, transition: &StateTransition<S, A>) -> Option<&StateTransitionInfo> {
        self.transition_info.get(transition)
    }

    /// Actions recorded for `state`; empty for frontier states.
    pub fn actions(&self, state: &S) -> &[A] {
        self.action_lookup.get(state)
    }

    pub fn is_expanded(&self, state: &S) -> bool {
        self.action_lookup.contains_key(state)
    }

    pub fn resulting_states(&self, pair: &StateActionPair<S, A>) -> &[S] {
        self.resulting_state_lookup.get(pair)
    }

    pub fn predecessors(&self, state: &S) -> &[S] {
        self.predecessor_graph.get(state)
    }

    pub fn states(&self) -> impl Iterator<Item = (&S, &StateInfo)> {
        self.state_info.iter()
    }

    pub fn action_count(&self) -> usize {
        self.action_info.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transition_info.len()
    }

    /// The action with the highest average estimate; ties go to the smallest key.
    pub fn optimal_action(&self, state: &S) -> Option<(A, ActionInfo)> {
        let mut best: Option<(A, ActionInfo)> = None;
        for &action in self.actions(state) {
            let Some(info) = self.action_info(&StateActionPair::new(*state, action)) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((_, current)) => {
                    info.cumulative_reward_estimate.average
                        > current.cumulative_reward_estimate.average
                }
            };
            if better {
                best = Some((action, *info));
            }
        }
        best
    }

    /// Reconcile an expansion batch into canonical storage.
    ///
    /// Every new decision edge gets a default [`ActionInfo`] placeholder that
    /// backpropagation fills in. Outcomes of one action that resolved to the
    /// same canonical state are folded into a single transition whose
    /// probability is the sum and whose utility is the probability-weighted mean.
    pub fn merge_edges(&mut self, batch: EdgeBatch<S, A>) -> usize {
        let EdgeBatch {
            action_lookup,
            resulting_state_lookup,
            predecessor_graph,
            transition_info,
        } = batch;

        let new_actions = action_lookup.merge_into(&mut self.action_lookup);
        resulting_state_lookup.merge_into(&mut self.resulting_state_lookup);
        predecessor_graph.merge_into(&mut self.predecessor_graph);

        for (transition, mut infos) in transition_info.into_groups() {
            infos.sort_by(|a, b| {
                a.probability
                    .total_cmp(&b.probability)
                    .then(a.transition_utility_value.total_cmp(&b.transition_utility_value))
            });
            let probability: f64 = infos.iter().map(|i| i.probability).sum();
            let weighted_utility: f64 = infos
                .iter()
                .map(|i| i.probability * i.transition_utility_value)
                .sum();
            let utility = if probability > 0.0 {
                weighted_utility / probability
            } else {
                infos[0].transition_utility_value
            };
            self.transition_info
                .insert(transition, StateTransitionInfo::new(probability, utility));
            self.action_info
                .entry(transition.state_action_pair())
                .or_default();
        }

        new_actions
    }

    /// States reachable from `root` through recorded actions and outcomes.
    pub fn reachable_from(&self, root: S) -> HashSet<S> {
        let mut reachable = HashSet::new();
        if !self.contains_state(&root) {
            return reachable;
        }
        let mut queue = VecDeque::from([root]);
        reachable.insert(root);
        while let Some(state) = queue.pop_front() {
            for &action in self.actions(&state) {
                for &successor in self.resulting_states(&StateActionPair::new(state, action)) {
                    if reachable.insert(successor) {
                        queue.push_back(successor);
                    }
                }
            }
        }
        reachable
    }

    /// Every stored state not reachable from `root`, in ascending key order.
    pub fn collect_unreachable(&self, root: S) -> Vec<S> {
        let reachable = self.reachable_from(root);
        let mut unreachable: Vec<S> = self
            .state_info
            .keys()
            .filter(|state| !reachable.contains(state))
            .copied()
            .collect();
        unreachable.sort();
        unreachable
    }

    /// Remove states and every edge touching them.
    pub fn remove_states(&mut self, states: &[S]) {
        for &state in states {
            self.state_info.remove(&state);
            for action in self.action_lookup.remove_key(&state) {
                let pair = StateActionPair::new(state, action);
                self.action_info.remove(&pair);
                for successor in self.resulting_state_lookup.remove_key(&pair) {
                    self.transition_info
                        .remove(&StateTransition::new(pair, successor));
                    self.predecessor_graph.remove_value(&successor, &state);
                }
            }
            for predecessor in self.predecessor_graph.remove_key(&state) {
                let actions = self.action_lookup.get(&predecessor).to_vec();
                for action in actions {
                    let pair = StateActionPair::new(predecessor, action);
                    if self.resulting_state_lookup.remove_value(&pair, &state) {
                        self.transition_info
                            .remove(&StateTransition::new(pair, state));
                    }
                }
            }
        }
    }

    /// Drop everything, returning the keys that were stored.
    pub fn clear(&mut self) -> Vec<S> {
        let mut states: Vec<S> = self.state_info.keys().copied().collect();
        states.sort();
        self.state_info.clear();
        self.action_info.clear();
        self.transition_info.clear();
        self.action_lookup.clear();
        self.resulting_state_lookup.clear();
        self.predecessor_graph.clear();
        states
    }
}

/// Edges appended by the workers of one expansion batch.
#[derive(Debug)]
pub struct EdgeBatch<S, A>
where
    S: PlanKey,
    A: PlanKey,
{
    action_lookup: ConcurrentMultiMap<S, A>,
    resulting_state_lookup: ConcurrentMultiMap<StateActionPair<S, A>, S>,
    predecessor_graph: ConcurrentMultiMap<S, S>,
    transition_info: ConcurrentMultiMap<StateTransition<S, A>, StateTransitionInfo>,
}

impl<S: PlanKey, A: PlanKey> EdgeBatch<S, A> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            action_lookup: ConcurrentMultiMap::with_capacity(capacity),
            resulting_state_lookup: ConcurrentMultiMap::with_capacity(capacity),
            predecessor_graph: ConcurrentMultiMap::with_capacity(capacity),
            transition_info: ConcurrentMultiMap::with_capacity(capacity),
        }
    }

    /// Record the edge `predecessor --action--> successor`.
    pub fn write_edge(&self, predecessor: S, action: A, info: StateTransitionInfo, successor: S) {
        let pair = StateActionPair::new(predecessor, action);
        self.action_lookup.append(predecessor, action);
        self.resulting_state_lookup.append(pair, successor);
        self.transition_info
            .append(StateTransition::new(pair, successor), info);
        self.predecessor_graph.append(successor, predecessor);
    }

    pub fn transition_count(&self) -> usize {
        self.transition_info.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> PlanGraph<u32, u8> {
        // 0 -a-> 1 -a-> 2, 0 -b-> 3
        let mut graph = PlanGraph::new();
        for s in 0..4 {
            graph.set_state_info(s, StateInfo::default());
        }
        let batch = EdgeBatch::with_capacity(4);
        batch.write_edge(0, b'a', StateTransitionInfo::new(1.0, 1.0), 1);
        batch.write_edge(0, b'b', StateTransitionInfo::new(1.0, 1.0), 3);
        batch.write_edge(1, b'a', StateTransitionInfo::new(1.0, 1.0), 2);
        graph.merge_edges(batch);
        graph
    }

    #[test]
    fn merge_creates_placeholders_and_reverse_edges() {
        let graph = chain();
        assert_eq!(graph.actions(&0), &[b'a', b'b']);
        assert_eq!(graph.predecessors(&2), &[1]);
        assert_eq!(
            graph.action_info(&StateActionPair::new(1, b'a')),
            Some(&ActionInfo::default())
        );
        assert!(!graph.is_expanded(&2));
    }

    #[test]
    fn equal_outcomes_of_one_action_fold_into_one_transition() {
        let mut graph: PlanGraph<u32, u8> = PlanGraph::new();
        let batch = EdgeBatch::with_capacity(2);
        batch.write_edge(0, 0, StateTransitionInfo::new(0.25, 4.0), 1);
        batch.write_edge(0, 0, StateTransitionInfo::new(0.75, 0.0), 1);
        graph.merge_edges(batch);

        let info = graph
            .transition_info(&StateTransition::new(StateActionPair::new(0, 0), 1))
            .copied()
            .unwrap();
        assert_eq!(info.probability, 1.0);
        assert_eq!(info.transition_utility_value, 1.0);
        assert_eq!(graph.resulting_states(&StateActionPair::new(0, 0)), &[1]);
    }

    #[test]
    fn pruning_removes_unreachable_states_and_their_edges() {
        let mut graph = chain();
        let unreachable = graph.collect_unreachable(1);
        assert_eq!(unreachable, vec![0, 3]);

        graph.remove_states(&unreachable);
        assert_eq!(graph.size(), 2);
        assert!(graph.predecessors(&1).is_empty());
        assert_eq!(graph.predecessors(&2), &[1]);
        assert!(graph.action_info(&StateActionPair::new(0, b'a')).is_none());
        assert_eq!(graph.transition_count(), 1);
    }

    #[test]
    fn optimal_action_prefers_highest_average() {
        let mut graph = chain();
        let mut info = ActionInfo::default();
        info.cumulative_reward_estimate.average = 2.0;
        info.cumulative_reward_estimate.upper_bound = 2.0;
        graph.set_action_info(StateActionPair::new(0, b'b'), info);
        assert_eq!(graph.optimal_action(&0).map(|(a, _)| a), Some(b'b'));
        assert_eq!(graph.optimal_action(&2), None);
    }
}
