//! The planning engine: one iteration is select, expand, evaluate,
//! backpropagate, then destroy what was merged away.

pub mod backpropagation;
pub mod evaluation;
pub mod expansion;
pub mod plan_data;
pub mod selection;

pub use plan_data::{IterationReport, PlanData};
pub use selection::{SelectionMode, SelectionOutput};

use crate::ports::{CumulativeRewardEstimator, StateDataContext, TerminationEvaluator};

/// The domain collaborators one iteration runs against.
pub struct Oracles<'a, C: StateDataContext, G> {
    pub context: &'a C,
    pub generator: &'a G,
    pub estimator: &'a dyn CumulativeRewardEstimator<C::StateData>,
    pub termination: &'a dyn TerminationEvaluator<C::StateData>,
}
