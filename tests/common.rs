//! Common fixtures for the boundplan test suite.
//!
//! Everything here plans the integer counter domain over an in-memory arena.
#![allow(dead_code)]

use std::sync::Arc;

use boundplan::{
    JobHandle, PlanCompletion, PlanRequest, PlannerScheduler, PlannerSettings,
    adapters::{ArenaKey, StateArena},
    domains::counter::{CountToEstimator, CountToTermination, CounterActions, Increment},
    planner::{Oracles, PlanData},
    ports::StateDataContext,
};

pub type CounterScheduler = PlannerScheduler<StateArena<i64>, CounterActions>;
pub type CounterRequest = PlanRequest<StateArena<i64>, Increment>;

/// Generous bound on iterations for any counter test.
pub const MAX_ITERATIONS: usize = 20_000;

/// A scheduler for count-to-`goal` with its estimator and termination set.
pub fn counter_scheduler(
    goal: i64,
    actions: CounterActions,
    settings: PlannerSettings,
) -> (Arc<StateArena<i64>>, CounterScheduler) {
    let arena = Arc::new(StateArena::new());
    let scheduler = PlannerScheduler::new(Arc::clone(&arena), actions, settings).unwrap();
    scheduler.set_cumulative_reward_estimator(CountToEstimator::new(goal));
    scheduler.set_termination_evaluator(CountToTermination::new(goal));
    (arena, scheduler)
}

/// Schedule iterations until the request completes. Returns the count.
pub fn run_until_complete(scheduler: &CounterScheduler, request: &CounterRequest) -> usize {
    for iteration in 0..MAX_ITERATIONS {
        if request.is_complete() {
            return iteration;
        }
        scheduler.schedule(JobHandle::completed()).complete().unwrap();
    }
    panic!("request did not complete within {MAX_ITERATIONS} iterations");
}

/// Request a plan from `root` and run it to completion.
pub fn plan_from(
    scheduler: &CounterScheduler,
    arena: &StateArena<i64>,
    root: i64,
) -> CounterRequest {
    let key = arena.insert(root);
    let request = scheduler.request_plan(key, PlanCompletion::RootResolved);
    run_until_complete(scheduler, &request);
    request
}

/// Oracles for driving a [`PlanData`] directly, without the scheduler.
pub struct CounterFixture {
    pub arena: StateArena<i64>,
    pub actions: CounterActions,
    pub estimator: CountToEstimator,
    pub termination: CountToTermination,
}

impl CounterFixture {
    pub fn new(goal: i64, actions: CounterActions) -> Self {
        Self {
            arena: StateArena::new(),
            actions,
            estimator: CountToEstimator::new(goal),
            termination: CountToTermination::new(goal),
        }
    }

    pub fn oracles(&self) -> Oracles<'_, StateArena<i64>, CounterActions> {
        Oracles {
            context: &self.arena,
            generator: &self.actions,
            estimator: &self.estimator,
            termination: &self.termination,
        }
    }

    /// A plan rooted at a copy of `root`.
    pub fn plan(&self, root: i64) -> PlanData<ArenaKey, Increment> {
        let mut data = PlanData::new();
        let key = self.arena.insert(root);
        data.set_root(&self.oracles(), key).unwrap();
        data
    }

    /// Counter values of every plan state, sorted.
    pub fn values(&self, data: &PlanData<ArenaKey, Increment>) -> Vec<i64> {
        let mut values: Vec<i64> = data
            .graph()
            .states()
            .filter_map(|(key, _)| self.arena.state_data(*key))
            .collect();
        values.sort();
        values
    }
}
