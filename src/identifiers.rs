//! Identifier types for states, decision edges and outcome edges.
//!
//! The engine never inspects keys; it only compares, hashes, orders and copies
//! them. Any type meeting the [`PlanKey`] bound can serve as a state or action
//! key.

use std::{fmt::Debug, hash::Hash};

use serde::{Deserialize, Serialize};

use crate::types::StateTransitionInfo;

/// Bound shared by state and action keys.
///
/// `Ord` lets merges between parallel phases pick a canonical representative
/// independently of write order.
pub trait PlanKey: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {}

impl<T> PlanKey for T where T: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {}

/// One decision edge: an action taken in a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateActionPair<S, A> {
    pub state_key: S,
    pub action_key: A,
}

impl<S, A> StateActionPair<S, A> {
    pub fn new(state_key: S, action_key: A) -> Self {
        Self {
            state_key,
            action_key,
        }
    }
}

/// One stochastic outcome of a decision edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateTransition<S, A> {
    pub predecessor_state_key: S,
    pub action_key: A,
    pub successor_state_key: S,
}

impl<S: Copy, A: Copy> StateTransition<S, A> {
    pub fn new(pair: StateActionPair<S, A>, successor_state_key: S) -> Self {
        Self {
            predecessor_state_key: pair.state_key,
            action_key: pair.action_key,
            successor_state_key,
        }
    }

    pub fn state_action_pair(&self) -> StateActionPair<S, A> {
        StateActionPair::new(self.predecessor_state_key, self.action_key)
    }
}

/// A transition produced during expansion together with its edge data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateTransitionInfoPair<S, A> {
    pub transition: StateTransition<S, A>,
    pub info: StateTransitionInfo,
}

impl<S: Copy, A: Copy> StateTransitionInfoPair<S, A> {
    pub fn new(
        predecessor: S,
        action: A,
        successor: S,
        info: StateTransitionInfo,
    ) -> Self {
        Self {
            transition: StateTransition::new(StateActionPair::new(predecessor, action), successor),
            info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_recovers_its_decision_edge() {
        let pair = StateActionPair::new(3u32, 'a');
        let transition = StateTransition::new(pair, 7u32);
        assert_eq!(transition.state_action_pair(), pair);
        assert_eq!(transition.successor_state_key, 7);
    }

    #[test]
    fn pairs_order_by_state_then_action() {
        let mut pairs = vec![
            StateActionPair::new(2u32, 1u8),
            StateActionPair::new(1, 9),
            StateActionPair::new(2, 0),
        ];
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                StateActionPair::new(1, 9),
                StateActionPair::new(2, 0),
                StateActionPair::new(2, 1),
            ]
        );
    }
}
