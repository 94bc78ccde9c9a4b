//! Plan requests and their completion predicates.

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::{Error, identifiers::PlanKey, plan::Plan, ports::StateDataContext};

/// Lifecycle of a plan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanRequestStatus {
    /// No root has been assigned yet.
    AwaitingPlan,
    /// The graph is growing and the completion predicate does not hold.
    Planning,
    /// The completion predicate holds for the root.
    Complete,
}

/// When a plan counts as good enough to act on.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanCompletion {
    /// As soon as the state has any action in the plan.
    ActImmediately,
    /// Never by itself; the caller decides.
    WaitForManualCall,
    /// Once the state's subplan is complete.
    #[default]
    RootResolved,
    /// Once the state's bound range is within the tolerance.
    WithinTolerance(f64),
    /// Once the plan holds at least this many states.
    MinimumPlanSize(usize),
    /// Once the request has been planning for at least this long.
    MinimumPlanningTime(Duration),
}

impl PlanCompletion {
    /// Evaluate the predicate for `state` in `plan`.
    ///
    /// Tolerance, size and time predicates also hold once `state` is
    /// complete.
    pub fn is_satisfied<C, A>(&self, plan: &Plan<C, A>, state: C::StateKey, elapsed: Duration) -> bool
    where
        C: StateDataContext,
        A: PlanKey,
    {
        let Some(info) = plan.try_get_state_info(state) else {
            return false;
        };
        let complete = info.subplan_is_complete;
        match *self {
            Self::ActImmediately => complete || plan.try_get_optimal_action(state).is_some(),
            Self::WaitForManualCall => false,
            Self::RootResolved => complete,
            Self::WithinTolerance(tolerance) => {
                complete || info.cumulative_reward_estimate.range() <= tolerance
            }
            Self::MinimumPlanSize(size) => complete || plan.size() >= size,
            Self::MinimumPlanningTime(duration) => complete || elapsed >= duration,
        }
    }
}

impl fmt::Display for PlanCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActImmediately => write!(f, "immediate"),
            Self::WaitForManualCall => write!(f, "manual"),
            Self::RootResolved => write!(f, "resolved"),
            Self::WithinTolerance(tolerance) => write!(f, "tolerance:{tolerance}"),
            Self::MinimumPlanSize(size) => write!(f, "size:{size}"),
            Self::MinimumPlanningTime(duration) => write!(f, "time:{}", duration.as_millis()),
        }
    }
}

impl FromStr for PlanCompletion {
    type Err = Error;

    /// Parses `immediate`, `manual`, `resolved`, `tolerance:X`, `size:N` and
    /// `time:MS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: String| Error::InvalidConfiguration { message };
        let (kind, argument) = match s.split_once(':') {
            Some((kind, argument)) => (kind, Some(argument)),
            None => (s, None),
        };
        match (kind, argument) {
            ("immediate", None) => Ok(Self::ActImmediately),
            ("manual", None) => Ok(Self::WaitForManualCall),
            ("resolved", None) => Ok(Self::RootResolved),
            ("tolerance", Some(value)) => {
                let tolerance: f64 = value
                    .parse()
                    .map_err(|e| invalid(format!("invalid tolerance '{value}': {e}")))?;
                if !(tolerance >= 0.0) {
                    return Err(invalid(format!("tolerance must be non-negative, got {value}")));
                }
                Ok(Self::WithinTolerance(tolerance))
            }
            ("size", Some(value)) => value
                .parse()
                .map(Self::MinimumPlanSize)
                .map_err(|e| invalid(format!("invalid plan size '{value}': {e}"))),
            ("time", Some(value)) => value
                .parse()
                .map(|ms| Self::MinimumPlanningTime(Duration::from_millis(ms)))
                .map_err(|e| invalid(format!("invalid planning time '{value}': {e}"))),
            _ => Err(invalid(format!("unknown completion condition '{s}'"))),
        }
    }
}

type CompletionCallback<C, A> = Box<dyn FnOnce(&Plan<C, A>) + Send>;

struct RequestState<C: StateDataContext, A> {
    status: PlanRequestStatus,
    plan: Option<Plan<C, A>>,
    callback: Option<CompletionCallback<C, A>>,
    completed_once: bool,
}

struct RequestShared<C: StateDataContext, A> {
    completion: PlanCompletion,
    started: Instant,
    state: Mutex<RequestState<C, A>>,
}

/// A caller's handle to one planning session.
///
/// Cloning shares the session. The scheduler updates the status and the plan
/// after every iteration; the completion callback runs once, the first time
/// the predicate holds.
pub struct PlanRequest<C: StateDataContext, A> {
    shared: Arc<RequestShared<C, A>>,
}

impl<C: StateDataContext, A> Clone for PlanRequest<C, A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: StateDataContext, A> PlanRequest<C, A> {
    fn lock(&self) -> MutexGuard<'_, RequestState<C, A>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: StateDataContext, A> fmt::Debug for PlanRequest<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanRequest")
            .field("completion", &self.shared.completion)
            .field("status", &self.lock().status)
            .finish()
    }
}

impl<C, A> PlanRequest<C, A>
where
    C: StateDataContext,
    A: PlanKey,
{
    pub(crate) fn new(completion: PlanCompletion) -> Self {
        Self {
            shared: Arc::new(RequestShared {
                completion,
                started: Instant::now(),
                state: Mutex::new(RequestState {
                    status: PlanRequestStatus::AwaitingPlan,
                    plan: None,
                    callback: None,
                    completed_once: false,
                }),
            }),
        }
    }

    pub fn status(&self) -> PlanRequestStatus {
        self.lock().status
    }

    pub fn is_complete(&self) -> bool {
        self.status() == PlanRequestStatus::Complete
    }

    pub fn completion(&self) -> PlanCompletion {
        self.shared.completion
    }

    /// The latest published plan, once a root has been assigned.
    pub fn plan(&self) -> Option<Plan<C, A>> {
        self.lock().plan.clone()
    }

    /// Time since the request was made.
    pub fn planning_time(&self) -> Duration {
        self.shared.started.elapsed()
    }

    /// Run `callback` once when the completion predicate first holds. If it
    /// already held, the callback runs immediately on this thread.
    pub fn on_complete(&self, callback: impl FnOnce(&Plan<C, A>) + Send + 'static) {
        let mut state = self.lock();
        if state.completed_once {
            let plan = state.plan.clone();
            drop(state);
            if let Some(plan) = plan {
                callback(&plan);
            }
            return;
        }
        state.callback = Some(Box::new(callback));
    }

    /// Whether two handles refer to the same request.
    pub fn same_request(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Store the published plan and re-evaluate the predicate against its root.
    /// Returns `true` the first time the request completes.
    pub(crate) fn publish(&self, plan: Plan<C, A>) -> bool {
        let satisfied = plan.root().is_some_and(|root| {
            self.shared
                .completion
                .is_satisfied(&plan, root, self.planning_time())
        });

        let mut state = self.lock();
        state.status = if satisfied {
            PlanRequestStatus::Complete
        } else {
            PlanRequestStatus::Planning
        };
        state.plan = Some(plan.clone());
        let first = satisfied && !state.completed_once;
        if first {
            state.completed_once = true;
        }
        let callback = if first { state.callback.take() } else { None };
        drop(state);

        if let Some(callback) = callback {
            callback(&plan);
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_completion_form() {
        assert_eq!("immediate".parse::<PlanCompletion>().unwrap(), PlanCompletion::ActImmediately);
        assert_eq!("manual".parse::<PlanCompletion>().unwrap(), PlanCompletion::WaitForManualCall);
        assert_eq!("resolved".parse::<PlanCompletion>().unwrap(), PlanCompletion::RootResolved);
        assert_eq!(
            "tolerance:0.5".parse::<PlanCompletion>().unwrap(),
            PlanCompletion::WithinTolerance(0.5)
        );
        assert_eq!(
            "size:200".parse::<PlanCompletion>().unwrap(),
            PlanCompletion::MinimumPlanSize(200)
        );
        assert_eq!(
            "time:15".parse::<PlanCompletion>().unwrap(),
            PlanCompletion::MinimumPlanningTime(Duration::from_millis(15))
        );
    }

    #[test]
    fn rejects_malformed_conditions() {
        for input in ["", "resolved:1", "tolerance", "tolerance:-1", "size:x", "soon"] {
            assert!(input.parse::<PlanCompletion>().is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let condition = PlanCompletion::MinimumPlanningTime(Duration::from_millis(250));
        assert_eq!(condition.to_string().parse::<PlanCompletion>().unwrap(), condition);
    }
}
