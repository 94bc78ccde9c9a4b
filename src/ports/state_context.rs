//! State-data context port - storage and identity of opaque states

use crate::identifiers::PlanKey;

/// Storage for state snapshots, addressed by opaque keys.
///
/// The planner asks the context to materialize successor states
/// ([`register_state`](StateDataContext::register_state)), to look them up,
/// and to release duplicates and pruned states
/// ([`destroy_state`](StateDataContext::destroy_state)). Equality and hashing
/// are defined on the *data*, so two keys may denote equal states; the
/// planner merges such duplicates.
///
/// Implementations are shared across the worker threads of a parallel phase
/// and therefore must be `Send + Sync`; registration happens concurrently.
pub trait StateDataContext: Send + Sync {
    type StateKey: PlanKey;
    type StateData: Clone + Send + Sync;

    /// Look up the data for a key. `None` for unknown or destroyed keys.
    fn state_data(&self, key: Self::StateKey) -> Option<Self::StateData>;

    /// Produce an independent copy of some state data.
    fn copy_state_data(&self, data: &Self::StateData) -> Self::StateData {
        data.clone()
    }

    /// Store new state data and return its key.
    fn register_state(&self, data: Self::StateData) -> Self::StateKey;

    /// Release a key. The planner never hands the same key here twice.
    fn destroy_state(&self, key: Self::StateKey);

    /// Value equality of two states.
    fn state_data_equals(&self, a: &Self::StateData, b: &Self::StateData) -> bool;

    /// Content hash consistent with [`state_data_equals`](StateDataContext::state_data_equals).
    fn state_data_hash(&self, data: &Self::StateData) -> u64;
}
