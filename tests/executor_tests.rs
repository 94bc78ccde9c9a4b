//! Plan executor status machine over real plans

mod common;

use std::sync::{Arc, Mutex};

use boundplan::{
    ActionProgress, Error, PlanCompletion, PlanExecutionStatus, PlanExecutor, PlannerSettings,
    adapters::{ArenaKey, StateArena},
    domains::counter::{CounterActions, Increment},
    executor::ExecutionObserver,
};
use common::{counter_scheduler, plan_from};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Completed(Increment),
    Terminal,
    Unexpected,
}

struct Recorder(Arc<Mutex<Vec<Event>>>);

impl ExecutionObserver<ArenaKey, Increment> for Recorder {
    fn on_action_complete(&mut self, action: Increment) {
        self.0.lock().unwrap().push(Event::Completed(action));
    }

    fn on_terminal_state_reached(&mut self, _state: ArenaKey) {
        self.0.lock().unwrap().push(Event::Terminal);
    }

    fn on_unexpected_state(&mut self, _state: ArenaKey) {
        self.0.lock().unwrap().push(Event::Unexpected);
    }
}

type Runner = Box<dyn FnMut(Increment) -> ActionProgress + Send>;

struct Harness {
    arena: Arc<StateArena<i64>>,
    executor: PlanExecutor<StateArena<i64>, Increment, Runner>,
    acted: Arc<Mutex<Vec<Increment>>>,
    events: Arc<Mutex<Vec<Event>>>,
}

/// An executor holding a resolved count-to-10 plan from 0.
fn harness(progress: ActionProgress, completion: PlanCompletion) -> Harness {
    let (arena, scheduler) =
        counter_scheduler(10, CounterActions::deterministic(), PlannerSettings::new());
    let request = plan_from(&scheduler, &arena, 0);

    let acted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&acted);
    let runner: Runner = Box::new(move |action| {
        sink.lock().unwrap().push(action);
        progress
    });
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut executor = PlanExecutor::new(runner, completion)
        .with_observer(Box::new(Recorder(Arc::clone(&events))));
    executor.set_plan(request.plan().unwrap());

    Harness {
        arena,
        executor,
        acted,
        events,
    }
}

#[test]
fn acts_on_the_optimal_action_once_resolved() {
    let mut h = harness(ActionProgress::Completed, PlanCompletion::RootResolved);
    assert_eq!(h.executor.status(), PlanExecutionStatus::AwaitingExecution);

    h.executor.update_current_state(h.arena.insert(0));
    assert!(h.executor.current_plan_state().is_some());
    assert!(h.executor.ready_to_act());

    h.executor.execute_next_action(None).unwrap();
    assert_eq!(*h.acted.lock().unwrap(), vec![Increment(1)]);
    assert_eq!(h.executor.status(), PlanExecutionStatus::AwaitingExecution);
    assert_eq!(h.executor.current_action(), None);
    assert_eq!(*h.events.lock().unwrap(), vec![Event::Completed(Increment(1))]);
}

#[test]
fn running_actions_block_further_execution() {
    let mut h = harness(ActionProgress::Running, PlanCompletion::RootResolved);
    h.executor.update_current_state(h.arena.insert(4));

    h.executor.execute_next_action(Some(Increment(3))).unwrap();
    assert_eq!(h.executor.status(), PlanExecutionStatus::ExecutingAction);
    assert_eq!(h.executor.current_action(), Some(Increment(3)));
    assert!(!h.executor.ready_to_act());
    assert!(matches!(
        h.executor.execute_next_action(None),
        Err(Error::ActionInFlight { .. })
    ));

    h.executor.complete_action();
    assert_eq!(h.executor.status(), PlanExecutionStatus::AwaitingExecution);
    assert_eq!(*h.events.lock().unwrap(), vec![Event::Completed(Increment(3))]);
}

#[test]
fn stopping_clears_the_action_in_flight() {
    let mut h = harness(ActionProgress::Running, PlanCompletion::RootResolved);
    h.executor.update_current_state(h.arena.insert(2));
    h.executor.execute_next_action(None).unwrap();

    h.executor.stop_execution();
    assert_eq!(h.executor.current_action(), None);
    assert_eq!(h.executor.status(), PlanExecutionStatus::AwaitingExecution);
    assert!(h.events.lock().unwrap().is_empty());
}

#[test]
fn overrides_must_be_plan_actions() {
    let mut h = harness(ActionProgress::Completed, PlanCompletion::RootResolved);
    h.executor.update_current_state(h.arena.insert(0));

    let err = h.executor.execute_next_action(Some(Increment(7))).unwrap_err();
    assert!(matches!(err, Error::ActionNotInPlan { .. }));
    assert!(h.acted.lock().unwrap().is_empty());
}

#[test]
fn unknown_states_are_reported() {
    let mut h = harness(ActionProgress::Completed, PlanCompletion::RootResolved);
    h.executor.update_current_state(h.arena.insert(-50));

    assert_eq!(h.executor.current_plan_state(), None);
    assert_eq!(h.executor.status(), PlanExecutionStatus::AwaitingExecution);
    assert!(!h.executor.ready_to_act());
    assert_eq!(*h.events.lock().unwrap(), vec![Event::Unexpected]);

    h.executor.execute_next_action(None).unwrap();
    assert!(h.acted.lock().unwrap().is_empty());
}

#[test]
fn reaching_the_goal_awaits_a_new_plan() {
    let mut h = harness(ActionProgress::Completed, PlanCompletion::RootResolved);
    h.executor.update_current_state(h.arena.insert(10));

    assert_eq!(h.executor.status(), PlanExecutionStatus::AwaitingPlan);
    assert!(!h.executor.ready_to_act());
    assert_eq!(*h.events.lock().unwrap(), vec![Event::Terminal]);

    h.executor.execute_next_action(None).unwrap();
    assert_eq!(h.executor.status(), PlanExecutionStatus::AwaitingExecution);
    assert!(h.acted.lock().unwrap().is_empty());
}

#[test]
fn manual_completion_never_reports_ready() {
    let mut h = harness(ActionProgress::Completed, PlanCompletion::WaitForManualCall);
    h.executor.update_current_state(h.arena.insert(0));
    assert!(!h.executor.ready_to_act());

    h.executor.execute_next_action(None).unwrap();
    assert_eq!(*h.acted.lock().unwrap(), vec![Increment(1)]);
}

#[test]
fn a_new_plan_resolves_the_plan_state_again() {
    let (arena, scheduler) =
        counter_scheduler(10, CounterActions::deterministic(), PlannerSettings::new());
    let first = plan_from(&scheduler, &arena, 0);
    let runner: Runner = Box::new(|_| ActionProgress::Completed);
    let mut executor = PlanExecutor::new(runner, PlanCompletion::RootResolved);
    executor.set_plan(first.plan().unwrap());
    executor.update_current_state(arena.insert(0));
    let old_state = executor.current_plan_state().unwrap();

    let second = plan_from(&scheduler, &arena, -5);
    executor.set_plan(second.plan().unwrap());

    assert!(!arena.contains(old_state));
    let zero = second.plan().unwrap().try_get_equivalent_plan_state(&0);
    assert!(zero.is_some());
    assert_ne!(zero, Some(old_state));
    assert_eq!(executor.current_plan_state(), zero);
}
