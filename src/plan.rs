//! Read-only view of a plan.
//!
//! The scheduler hands out a [`Plan`] after every iteration and root change.
//! A `Plan` reads the scheduler's canonical plan data through a shared lock:
//! cloning and publishing it copy nothing, and every read sees the plan as of
//! the last finished job. Reads wait while a job is mutating the graph.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    identifiers::{PlanKey, StateActionPair, StateTransition},
    planner::PlanData,
    ports::StateDataContext,
    types::{ActionInfo, StateInfo, StateTransitionInfo},
};

/// Plan data shared between the scheduler and every [`Plan`] it hands out.
pub(crate) type SharedPlanData<S, A> = Arc<RwLock<PlanData<S, A>>>;

pub(crate) fn read<S, A>(data: &RwLock<PlanData<S, A>>) -> RwLockReadGuard<'_, PlanData<S, A>> {
    data.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<S, A>(data: &RwLock<PlanData<S, A>>) -> RwLockWriteGuard<'_, PlanData<S, A>> {
    data.write().unwrap_or_else(PoisonError::into_inner)
}

/// Shared view of the plan graph.
pub struct Plan<C: StateDataContext, A> {
    context: Arc<C>,
    data: SharedPlanData<C::StateKey, A>,
}

impl<C: StateDataContext, A> Clone for Plan<C, A> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            data: Arc::clone(&self.data),
        }
    }
}

impl<C: StateDataContext, A: PlanKey> fmt::Debug for Plan<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = read(&self.data);
        f.debug_struct("Plan")
            .field("root", &data.root())
            .field("size", &data.size())
            .finish()
    }
}

impl<C, A> Plan<C, A>
where
    C: StateDataContext,
    A: PlanKey,
{
    pub(crate) fn new(context: Arc<C>, data: SharedPlanData<C::StateKey, A>) -> Self {
        Self { context, data }
    }

    /// Whether both views read the same plan storage.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn root(&self) -> Option<C::StateKey> {
        read(&self.data).root()
    }

    pub fn root_info(&self) -> Option<StateInfo> {
        read(&self.data).root_info()
    }

    /// Number of states in the plan.
    pub fn size(&self) -> usize {
        read(&self.data).graph().size()
    }

    pub fn contains_state(&self, state: C::StateKey) -> bool {
        read(&self.data).graph().contains_state(&state)
    }

    pub fn try_get_state_info(&self, state: C::StateKey) -> Option<StateInfo> {
        read(&self.data).graph().state_info(&state).copied()
    }

    /// The action with the best average estimate; ties go to the smallest key.
    pub fn try_get_optimal_action(&self, state: C::StateKey) -> Option<A> {
        read(&self.data).graph().optimal_action(&state).map(|(action, _)| action)
    }

    pub fn try_get_action_info(&self, state: C::StateKey, action: A) -> Option<ActionInfo> {
        read(&self.data)
            .graph()
            .action_info(&StateActionPair::new(state, action))
            .copied()
    }

    /// The plan state whose data equals `state_data`, if any.
    pub fn try_get_equivalent_plan_state(&self, state_data: &C::StateData) -> Option<C::StateKey> {
        let hash = self.context.state_data_hash(state_data);
        read(&self.data).bins().get(&hash).iter().copied().find(|&candidate| {
            self.context
                .state_data(candidate)
                .is_some_and(|data| self.context.state_data_equals(&data, state_data))
        })
    }

    /// Actions recorded for `state`, in ascending key order.
    pub fn actions(&self, state: C::StateKey) -> Vec<A> {
        read(&self.data).graph().actions(&state).to_vec()
    }

    /// Outcomes of taking `action` in `state`.
    pub fn outcomes(
        &self,
        state: C::StateKey,
        action: A,
    ) -> Vec<(C::StateKey, StateTransitionInfo)> {
        let pair = StateActionPair::new(state, action);
        let data = read(&self.data);
        let graph = data.graph();
        graph
            .resulting_states(&pair)
            .iter()
            .filter_map(|&successor| {
                graph
                    .transition_info(&StateTransition::new(pair, successor))
                    .map(|info| (successor, *info))
            })
            .collect()
    }

    pub fn predecessors(&self, state: C::StateKey) -> Vec<C::StateKey> {
        read(&self.data).graph().predecessors(&state).to_vec()
    }

    /// Deepest horizon at which `state` has been selected.
    pub fn depth(&self, state: C::StateKey) -> Option<usize> {
        read(&self.data).depth(&state)
    }

    /// Every state with its info, in ascending key order.
    pub fn states(&self) -> Vec<(C::StateKey, StateInfo)> {
        let mut states: Vec<_> = read(&self.data)
            .graph()
            .states()
            .map(|(&state, &info)| (state, info))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }
}
