//! Ports (trait boundaries) for external collaborators.
//!
//! The planning engine owns these traits; domains implement them. The engine
//! itself never names a concrete state, action or data type.

pub mod action_generator;
pub mod evaluators;
pub mod observer;
pub mod state_context;

pub use action_generator::{ActionEffects, ActionGenerator, ActionOutcome};
pub use evaluators::{
    CumulativeRewardEstimator, DefaultCumulativeRewardEstimator, NeverTerminal,
    TerminationEvaluator,
};
pub use observer::PlannerObserver;
pub use state_context::StateDataContext;
