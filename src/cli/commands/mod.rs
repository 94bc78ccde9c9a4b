//! CLI command implementations

pub mod plan;
pub mod simulate;

use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::warn;

use crate::{
    JobHandle, PlanRequest, PlannerScheduler, PlannerSettings,
    adapters::StateArena,
    domains::counter::{CountToEstimator, CountToTermination, CounterActions, Increment},
};

/// Slip probability of `--stochastic` counters.
pub const STOCHASTIC_SLIP: f64 = 0.2;

pub type CounterScheduler = PlannerScheduler<StateArena<i64>, CounterActions>;
pub type CounterRequest = PlanRequest<StateArena<i64>, Increment>;

/// Build a scheduler for the count-to-`goal` domain.
pub fn counter_scheduler(
    arena: Arc<StateArena<i64>>,
    goal: i64,
    stochastic: bool,
    settings: PlannerSettings,
) -> Result<CounterScheduler> {
    let actions = if stochastic {
        CounterActions::slippery(STOCHASTIC_SLIP)
    } else {
        CounterActions::deterministic()
    };
    let scheduler = PlannerScheduler::new(arena, actions, settings)?;
    scheduler.set_cumulative_reward_estimator(CountToEstimator::new(goal));
    scheduler.set_termination_evaluator(CountToTermination::new(goal));
    Ok(scheduler)
}

/// Run iterations until `done` holds, the planner stops making progress or
/// `max_iterations` is reached. Returns the number of iterations run.
pub fn run_until(
    scheduler: &CounterScheduler,
    request: &CounterRequest,
    max_iterations: usize,
    mut done: impl FnMut(&CounterRequest) -> bool,
) -> Result<usize> {
    for iteration in 0..max_iterations {
        if done(request) {
            return Ok(iteration);
        }
        scheduler.schedule(JobHandle::completed()).complete()?;
        if scheduler.last_report().is_some_and(|r| r.is_idle()) && !done(request) {
            warn!(iteration, "planner made no progress; stopping");
            return Ok(iteration + 1);
        }
    }
    if !done(request) {
        bail!("gave up after {max_iterations} iterations");
    }
    Ok(max_iterations)
}
