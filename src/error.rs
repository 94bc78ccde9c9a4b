//! Error types for the planner crate

use thiserror::Error;

/// Main error type for the planner crate
///
/// Errors are `Clone` so that a single failed iteration can be reported to
/// every holder of the same [`crate::scheduler::JobHandle`].
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("bounded value {value} from {estimator} is invalid: {reason}")]
    InvalidBoundedValue {
        estimator: String,
        value: String,
        reason: String,
    },

    #[error("scheduler is faulted and will not run further iterations: {reason}")]
    SchedulerFaulted { reason: String },

    #[error("no plan assigned")]
    NoPlanAssigned,

    #[error("no actions available for plan state {state}")]
    NoActionsAvailable { state: String },

    #[error("action {action} for state {state} was not found in the plan")]
    ActionNotInPlan { state: String, action: String },

    #[error("an action is already executing: {action}")]
    ActionInFlight { action: String },

    #[error("state {state} is not part of the plan")]
    UnknownState { state: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("job failed: {message}")]
    JobFailed { message: String },

    #[error("progress bar template error: {message}")]
    ProgressBarTemplate { message: String },
}

impl Error {
    /// Whether this error poisons the scheduler for all later iterations.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidBoundedValue { .. } | Error::SchedulerFaulted { .. }
        )
    }
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
