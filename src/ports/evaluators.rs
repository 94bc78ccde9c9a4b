//! Evaluator ports - reward-bound estimation and termination
//!
//! Both traits are pluggable per scheduler and may be replaced while an
//! iteration is in flight; the replacement takes effect on the next iteration.

use crate::types::BoundedValue;

/// Estimates the range of cumulative reward achievable from a state.
///
/// Values must be finite and satisfy `lower <= average <= upper`; anything
/// else is reported as a fatal [`crate::Error::InvalidBoundedValue`] naming
/// this estimator.
pub trait CumulativeRewardEstimator<D>: Send + Sync {
    fn evaluate(&self, state: &D) -> BoundedValue;

    /// Name used in fatal error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Decides whether a state ends the episode.
pub trait TerminationEvaluator<D>: Send + Sync {
    /// `Some(terminal_reward)` for terminal states, `None` otherwise.
    fn is_terminal(&self, state: &D) -> Option<f64>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Estimates every state at `(0, 0, 0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCumulativeRewardEstimator;

impl<D> CumulativeRewardEstimator<D> for DefaultCumulativeRewardEstimator {
    fn evaluate(&self, _state: &D) -> BoundedValue {
        BoundedValue::default()
    }
}

/// Treats no state as terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverTerminal;

impl<D> TerminationEvaluator<D> for NeverTerminal {
    fn is_terminal(&self, _state: &D) -> Option<f64> {
        None
    }
}
