//! Action-generation port - the domain's successor function

use crate::identifiers::PlanKey;

/// One stochastic outcome of an applied action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome<D> {
    pub state_data: D,
    pub probability: f64,
    pub utility: f64,
}

impl<D> ActionOutcome<D> {
    pub fn new(state_data: D, probability: f64, utility: f64) -> Self {
        Self {
            state_data,
            probability,
            utility,
        }
    }

    /// A certain outcome (`probability == 1.0`).
    pub fn certain(state_data: D, utility: f64) -> Self {
        Self::new(state_data, 1.0, utility)
    }
}

/// An applicable action and the outcome distribution it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEffects<A, D> {
    pub action_key: A,
    pub outcomes: Vec<ActionOutcome<D>>,
}

impl<A, D> ActionEffects<A, D> {
    pub fn new(action_key: A, outcomes: Vec<ActionOutcome<D>>) -> Self {
        Self {
            action_key,
            outcomes,
        }
    }
}

/// Generates the legal actions of a state and their effects.
///
/// The expander calls [`generate`](ActionGenerator::generate) for every
/// frontier state of a batch, in parallel. Returning no actions marks the
/// state as a dead end.
pub trait ActionGenerator<D>: Send + Sync {
    type ActionKey: PlanKey;

    fn generate(&self, state: &D) -> Vec<ActionEffects<Self::ActionKey, D>>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
