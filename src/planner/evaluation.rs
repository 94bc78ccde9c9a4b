//! Estimates for newly accepted states.

use rayon::prelude::*;
use tracing::error;

use super::expansion::NewState;
use crate::{
    Error, Result,
    ports::{CumulativeRewardEstimator, TerminationEvaluator},
    types::{BoundedValue, StateInfo},
};

/// Evaluate one state: terminal states collapse to their reward and are
/// complete, everything else gets the estimator's interval.
pub fn evaluate_state<D>(
    data: &D,
    estimator: &dyn CumulativeRewardEstimator<D>,
    termination: &dyn TerminationEvaluator<D>,
) -> Result<StateInfo> {
    if let Some(reward) = termination.is_terminal(data) {
        let value = BoundedValue::exact(reward);
        validate(value, termination.name())?;
        return Ok(StateInfo {
            subplan_is_complete: true,
            cumulative_reward_estimate: value,
        });
    }

    let value = estimator.evaluate(data);
    validate(value, estimator.name())?;
    Ok(StateInfo {
        subplan_is_complete: false,
        cumulative_reward_estimate: value,
    })
}

fn validate(value: BoundedValue, source: &str) -> Result<()> {
    match value.check() {
        None => Ok(()),
        Some(reason) => {
            error!(estimator = source, %value, reason, "invalid bounded value");
            Err(Error::InvalidBoundedValue {
                estimator: source.to_string(),
                value: value.to_string(),
                reason: reason.to_string(),
            })
        }
    }
}

/// Evaluate a batch in parallel. The first invalid value aborts the batch.
pub fn evaluate_new_states<S, D>(
    new_states: &[NewState<S, D>],
    estimator: &dyn CumulativeRewardEstimator<D>,
    termination: &dyn TerminationEvaluator<D>,
) -> Result<Vec<(S, u64, StateInfo)>>
where
    S: Copy + Send + Sync,
    D: Send + Sync,
{
    new_states
        .par_iter()
        .map(|state| {
            evaluate_state(&state.data, estimator, termination)
                .map(|info| (state.key, state.hash, info))
        })
        .collect()
}
