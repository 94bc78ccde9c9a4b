//! Plan execution: turning a plan into actions in the world.
//!
//! [`PlanExecutor`] follows the agent's actual state through the plan, decides
//! when the plan is good enough to act on (using the request's
//! [`PlanCompletion`] against the *current* plan state), and hands the chosen
//! action to an [`ActionRunner`]. Moving the agent is the runner's business.

use std::{
    fmt,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{
    Error, Result, identifiers::PlanKey, plan::Plan, ports::StateDataContext,
    scheduler::PlanCompletion,
};

/// Where the executor is in its act/observe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanExecutionStatus {
    /// No plan yet, or the last plan ran into a terminal state.
    AwaitingPlan,
    /// Ready to pick the next action.
    AwaitingExecution,
    /// An action is in flight.
    ExecutingAction,
}

/// Outcome of starting an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionProgress {
    /// The action finished synchronously.
    Completed,
    /// The action keeps running; call [`PlanExecutor::complete_action`] when it ends.
    Running,
}

/// Carries out actions chosen by the executor.
pub trait ActionRunner<A>: Send {
    fn act(&mut self, action: A) -> ActionProgress;

    /// Abort the action in flight, if any.
    fn stop(&mut self) {}
}

impl<A, F> ActionRunner<A> for F
where
    F: FnMut(A) -> ActionProgress + Send,
{
    fn act(&mut self, action: A) -> ActionProgress {
        self(action)
    }
}

/// Execution events.
pub trait ExecutionObserver<S, A>: Send {
    fn on_action_complete(&mut self, _action: A) {}

    /// The current plan state is complete and has no actions left.
    fn on_terminal_state_reached(&mut self, _state: S) {}

    /// The executor's state has no equivalent in the plan.
    fn on_unexpected_state(&mut self, _state: S) {}
}

/// Follows a plan through the world one action at a time.
pub struct PlanExecutor<C, A, R>
where
    C: StateDataContext,
{
    runner: R,
    completion: PlanCompletion,
    plan: Option<Plan<C, A>>,
    observer: Option<Box<dyn ExecutionObserver<C::StateKey, A>>>,
    status: PlanExecutionStatus,
    executor_state: Option<C::StateKey>,
    plan_state: Option<C::StateKey>,
    current_action: Option<A>,
    decision_started: Instant,
}

impl<C, A, R> fmt::Debug for PlanExecutor<C, A, R>
where
    C: StateDataContext,
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("status", &self.status)
            .field("executor_state", &self.executor_state)
            .field("plan_state", &self.plan_state)
            .field("current_action", &self.current_action)
            .finish()
    }
}

impl<C, A, R> PlanExecutor<C, A, R>
where
    C: StateDataContext,
    A: PlanKey,
    R: ActionRunner<A>,
{
    pub fn new(runner: R, completion: PlanCompletion) -> Self {
        Self {
            runner,
            completion,
            plan: None,
            observer: None,
            status: PlanExecutionStatus::AwaitingPlan,
            executor_state: None,
            plan_state: None,
            current_action: None,
            decision_started: Instant::now(),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ExecutionObserver<C::StateKey, A>>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn status(&self) -> PlanExecutionStatus {
        self.status
    }

    pub fn current_action(&self) -> Option<A> {
        self.current_action
    }

    /// The caller's key for the world state being tracked.
    pub fn current_executor_state(&self) -> Option<C::StateKey> {
        self.executor_state
    }

    /// The plan state equivalent to the executor state.
    pub fn current_plan_state(&self) -> Option<C::StateKey> {
        self.plan_state
    }

    pub fn plan(&self) -> Option<&Plan<C, A>> {
        self.plan.as_ref()
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Time since the current decision started.
    pub fn decision_time(&self) -> Duration {
        self.decision_started.elapsed()
    }

    /// Assign (or refresh) the plan to follow.
    pub fn set_plan(&mut self, plan: Plan<C, A>) {
        if self.status == PlanExecutionStatus::AwaitingPlan {
            self.status = PlanExecutionStatus::AwaitingExecution;
        }
        self.plan = Some(plan);
        // The new plan may not hold the old plan state.
        self.plan_state = None;
        self.resolve_plan_state();
    }

    /// Track a new world state and classify it against the plan.
    pub fn update_current_state(&mut self, state: C::StateKey) {
        self.executor_state = Some(state);
        self.plan_state = None;
        self.resolve_plan_state();
        if self.plan.is_some() {
            self.check_new_state(state);
        }
    }

    fn resolve_plan_state(&mut self) {
        if self.plan_state.is_some() {
            return;
        }
        let (Some(plan), Some(state)) = (&self.plan, self.executor_state) else {
            return;
        };
        self.plan_state = if plan.contains_state(state) {
            Some(state)
        } else {
            plan.context()
                .state_data(state)
                .and_then(|data| plan.try_get_equivalent_plan_state(&data))
        };
    }

    fn check_new_state(&mut self, executor_state: C::StateKey) {
        let Some(plan) = &self.plan else {
            return;
        };
        match self.plan_state {
            None => {
                warn!(state = ?executor_state, "state has no equivalent in the plan");
                self.status = PlanExecutionStatus::AwaitingExecution;
                if let Some(observer) = &mut self.observer {
                    observer.on_unexpected_state(executor_state);
                }
            }
            Some(plan_state) => {
                let terminal = plan
                    .try_get_state_info(plan_state)
                    .is_some_and(|info| info.subplan_is_complete)
                    && plan.try_get_optimal_action(plan_state).is_none();
                if terminal {
                    debug!(state = ?plan_state, "terminal state reached");
                    self.status = PlanExecutionStatus::AwaitingPlan;
                    if let Some(observer) = &mut self.observer {
                        observer.on_terminal_state_reached(plan_state);
                    }
                } else {
                    self.status = PlanExecutionStatus::AwaitingExecution;
                }
            }
        }
    }

    /// Whether the plan is good enough to act on from the current state.
    pub fn ready_to_act(&mut self) -> bool {
        if self.current_action.is_some() {
            return false;
        }
        self.resolve_plan_state();
        let (Some(plan), Some(state)) = (&self.plan, self.plan_state) else {
            return false;
        };
        if plan.try_get_optimal_action(state).is_none() {
            return false;
        }
        self.completion
            .is_satisfied(plan, state, self.decision_started.elapsed())
    }

    /// Start the plan's best action, or `override_action` if given.
    ///
    /// Missing plans and states without actions are logged and leave the
    /// executor awaiting execution. An override the plan does not contain,
    /// or a call while an action is in flight, is an error.
    pub fn execute_next_action(&mut self, override_action: Option<A>) -> Result<()> {
        if let Some(action) = self.current_action {
            return Err(Error::ActionInFlight {
                action: format!("{action:?}"),
            });
        }
        if self.plan.is_none() {
            error!("{}", Error::NoPlanAssigned);
            self.status = PlanExecutionStatus::AwaitingExecution;
            return Ok(());
        }
        self.decision_started = Instant::now();
        self.resolve_plan_state();
        let Some(plan) = &self.plan else {
            return Ok(());
        };

        let action = match override_action {
            Some(action) => {
                let known = self
                    .plan_state
                    .is_some_and(|state| plan.try_get_action_info(state, action).is_some());
                if !known {
                    return Err(Error::ActionNotInPlan {
                        state: format!("{:?}", self.plan_state),
                        action: format!("{action:?}"),
                    });
                }
                action
            }
            None => match self
                .plan_state
                .and_then(|state| plan.try_get_optimal_action(state))
            {
                Some(action) => action,
                None => {
                    let e = Error::NoActionsAvailable {
                        state: format!("{:?}", self.plan_state),
                    };
                    error!("{e}");
                    self.status = PlanExecutionStatus::AwaitingExecution;
                    return Ok(());
                }
            },
        };

        debug!(?action, state = ?self.plan_state, "executing action");
        self.status = PlanExecutionStatus::ExecutingAction;
        self.current_action = Some(action);
        if self.runner.act(action) == ActionProgress::Completed {
            self.complete_action();
        }
        Ok(())
    }

    /// Mark the action in flight as finished.
    pub fn complete_action(&mut self) {
        let Some(action) = self.current_action.take() else {
            return;
        };
        if self.status == PlanExecutionStatus::ExecutingAction {
            self.status = PlanExecutionStatus::AwaitingExecution;
        }
        if let Some(observer) = &mut self.observer {
            observer.on_action_complete(action);
        }
    }

    /// Abort the action in flight.
    pub fn stop_execution(&mut self) {
        if self.current_action.take().is_some() {
            self.runner.stop();
        }
        self.status = PlanExecutionStatus::AwaitingExecution;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        adapters::StateArena,
        domains::counter::Increment,
    };

    type CounterExecutor<R> = PlanExecutor<StateArena<i64>, Increment, R>;

    fn recording_runner() -> (Arc<Mutex<Vec<Increment>>>, impl ActionRunner<Increment>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let runner = move |action| {
            sink.lock().unwrap().push(action);
            ActionProgress::Completed
        };
        (log, runner)
    }

    #[test]
    fn starts_awaiting_a_plan() {
        let (_, runner) = recording_runner();
        let mut executor: CounterExecutor<_> =
            PlanExecutor::new(runner, PlanCompletion::ActImmediately);
        assert_eq!(executor.status(), PlanExecutionStatus::AwaitingPlan);
        assert!(!executor.ready_to_act());
    }

    #[test]
    fn executing_without_a_plan_is_logged_not_raised() {
        let (log, runner) = recording_runner();
        let mut executor: CounterExecutor<_> =
            PlanExecutor::new(runner, PlanCompletion::ActImmediately);
        let arena = StateArena::new();
        executor.update_current_state(arena.insert(3));
        executor.execute_next_action(None).unwrap();
        assert_eq!(executor.status(), PlanExecutionStatus::AwaitingExecution);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn stop_without_action_is_harmless() {
        let (_, runner) = recording_runner();
        let mut executor: CounterExecutor<_> =
            PlanExecutor::new(runner, PlanCompletion::WaitForManualCall);
        executor.stop_execution();
        executor.complete_action();
        assert_eq!(executor.current_action(), None);
        assert_eq!(executor.status(), PlanExecutionStatus::AwaitingExecution);
    }
}
