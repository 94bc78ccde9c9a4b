//! The scheduler that drives planning iterations.
//!
//! The engine lives behind a mutex that only the worker thread takes. Every
//! call that touches the graph (`schedule`, `request_plan`,
//! `update_plan_request_root_state`) becomes a job on one FIFO channel that a
//! single long-lived worker drains, so overlapping calls queue up instead of
//! racing. Evaluator replacements go to a pending slot that the next job
//! picks up.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
        mpsc::{self, Receiver, Sender},
    },
    thread,
};

use tracing::{debug, error, info, warn};

use super::{JobHandle, PlanCompletion, PlanRequest, PlannerSettings};
use crate::{
    Error, Result,
    plan::{self, Plan, SharedPlanData},
    planner::{IterationReport, Oracles, PlanData},
    ports::{
        ActionGenerator, CumulativeRewardEstimator, DefaultCumulativeRewardEstimator,
        NeverTerminal, PlannerObserver, StateDataContext, TerminationEvaluator,
    },
};

type Estimator<D> = Arc<dyn CumulativeRewardEstimator<D>>;
type Termination<D> = Arc<dyn TerminationEvaluator<D>>;
type Task<C, G> = Box<dyn FnOnce(&mut PlannerCore<C, G>) -> Result<()> + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct PendingEvaluators<D> {
    estimator: Option<Estimator<D>>,
    termination: Option<Termination<D>>,
}

impl<D> Default for PendingEvaluators<D> {
    fn default() -> Self {
        Self {
            estimator: None,
            termination: None,
        }
    }
}

struct PlannerCore<C, G>
where
    C: StateDataContext,
    G: ActionGenerator<C::StateData>,
{
    context: Arc<C>,
    generator: G,
    estimator: Estimator<C::StateData>,
    termination: Termination<C::StateData>,
    plan_data: SharedPlanData<C::StateKey, G::ActionKey>,
    request: Option<PlanRequest<C, G::ActionKey>>,
    settings: PlannerSettings,
    observers: Vec<Box<dyn PlannerObserver>>,
    iterations: usize,
    last_report: Option<IterationReport>,
    fault: Option<String>,
}

impl<C, G> PlannerCore<C, G>
where
    C: StateDataContext,
    G: ActionGenerator<C::StateData>,
{
    fn apply_pending(&mut self, pending: &Mutex<PendingEvaluators<C::StateData>>) {
        let mut pending = lock(pending);
        if let Some(estimator) = pending.estimator.take() {
            debug!(estimator = estimator.name(), "reward estimator replaced");
            self.estimator = estimator;
        }
        if let Some(termination) = pending.termination.take() {
            debug!(termination = termination.name(), "termination evaluator replaced");
            self.termination = termination;
        }
    }

    /// Run `task` unless the engine is faulted; fatal errors fault it.
    fn run(&mut self, task: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        if let Some(reason) = &self.fault {
            return Err(Error::SchedulerFaulted {
                reason: reason.clone(),
            });
        }
        let result = task(self);
        if let Err(e) = &result {
            if e.is_fatal() {
                error!(error = %e, "scheduler faulted");
                self.fault = Some(e.to_string());
            }
        }
        result
    }

    fn iterate(&mut self) -> Result<()> {
        let iteration = self.iterations;
        self.iterations += 1;
        let Some(request) = self.request.clone() else {
            debug!(iteration, "no plan request; iteration skipped");
            return Ok(());
        };

        let oracles = Oracles {
            context: &*self.context,
            generator: &self.generator,
            estimator: &*self.estimator,
            termination: &*self.termination,
        };
        let report =
            plan::write(&self.plan_data).run_iteration(&oracles, &self.settings, iteration)?;

        for observer in &mut self.observers {
            if let Err(e) = observer.on_iteration_complete(&report) {
                warn!(error = %e, "observer failed");
            }
        }
        self.publish(&request, &report);
        self.last_report = Some(report);
        Ok(())
    }

    fn set_root(&mut self, root: C::StateKey) -> Result<()> {
        let oracles = Oracles {
            context: &*self.context,
            generator: &self.generator,
            estimator: &*self.estimator,
            termination: &*self.termination,
        };
        let pruned = plan::write(&self.plan_data).set_root(&oracles, root)?;
        for observer in &mut self.observers {
            if let Err(e) = observer.on_reroot(pruned) {
                warn!(error = %e, "observer failed");
            }
        }
        Ok(())
    }

    fn install_request(
        &mut self,
        request: PlanRequest<C, G::ActionKey>,
        root: C::StateKey,
    ) -> Result<()> {
        self.set_root(root)?;
        info!(root = ?plan::read(&self.plan_data).root(), completion = %request.completion(), "plan requested");
        self.request = Some(request.clone());
        let report = self.snapshot_report();
        self.publish(&request, &report);
        Ok(())
    }

    fn update_root(&mut self, root: C::StateKey) -> Result<()> {
        let Some(request) = self.request.clone() else {
            warn!(?root, "root update without a plan request ignored");
            return Ok(());
        };
        self.set_root(root)?;
        let report = self.snapshot_report();
        self.publish(&request, &report);
        Ok(())
    }

    fn snapshot_report(&self) -> IterationReport {
        let data = plan::read(&self.plan_data);
        let root_info = data.root_info();
        IterationReport {
            iteration: self.iterations,
            plan_size: data.size(),
            root_estimate: root_info.map(|info| info.cumulative_reward_estimate),
            root_complete: root_info.is_some_and(|info| info.subplan_is_complete),
            ..IterationReport::default()
        }
    }

    fn publish(&mut self, request: &PlanRequest<C, G::ActionKey>, report: &IterationReport) {
        let plan = Plan::new(Arc::clone(&self.context), Arc::clone(&self.plan_data));
        if request.publish(plan) {
            info!(
                iterations = self.iterations,
                size = report.plan_size,
                root_complete = report.root_complete,
                "plan request complete"
            );
            for observer in &mut self.observers {
                if let Err(e) = observer.on_request_complete(report) {
                    warn!(error = %e, "observer failed");
                }
            }
        }
    }
}

/// Drives planning iterations on a background worker thread.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use boundplan::{
///     adapters::StateArena,
///     domains::counter::{CountToEstimator, CountToTermination, CounterActions},
///     scheduler::{JobHandle, PlanCompletion, PlannerScheduler, PlannerSettings},
/// };
///
/// let arena = Arc::new(StateArena::new());
/// let root = arena.insert(0);
/// let scheduler = PlannerScheduler::new(
///     Arc::clone(&arena),
///     CounterActions::deterministic(),
///     PlannerSettings::new().with_state_expansion_budget(4),
/// )
/// .unwrap();
/// scheduler.set_cumulative_reward_estimator(CountToEstimator::new(10));
/// scheduler.set_termination_evaluator(CountToTermination::new(10));
///
/// let request = scheduler.request_plan(root, PlanCompletion::RootResolved);
/// while !request.is_complete() {
///     scheduler.schedule(JobHandle::default()).complete().unwrap();
/// }
/// let plan = request.plan().unwrap();
/// assert!(plan.root_info().unwrap().subplan_is_complete);
/// ```
pub struct PlannerScheduler<C, G>
where
    C: StateDataContext,
    G: ActionGenerator<C::StateData>,
{
    core: Arc<Mutex<PlannerCore<C, G>>>,
    pending: Arc<Mutex<PendingEvaluators<C::StateData>>>,
    queue: Mutex<JobQueue<C, G>>,
    context: Arc<C>,
    settings: PlannerSettings,
}

/// A call waiting for the worker.
struct Job<C, G>
where
    C: StateDataContext,
    G: ActionGenerator<C::StateData>,
{
    label: &'static str,
    dependency: JobHandle,
    task: Task<C, G>,
    handle: JobHandle,
}

/// Sending end of the worker's channel and the handle of the last job sent.
struct JobQueue<C, G>
where
    C: StateDataContext,
    G: ActionGenerator<C::StateData>,
{
    sender: Sender<Job<C, G>>,
    last: JobHandle,
}

/// Run jobs in arrival order until every sender is gone.
fn run_worker<C, G>(
    jobs: Receiver<Job<C, G>>,
    core: Arc<Mutex<PlannerCore<C, G>>>,
    pending: Arc<Mutex<PendingEvaluators<C::StateData>>>,
) where
    C: StateDataContext,
    G: ActionGenerator<C::StateData>,
{
    for job in jobs {
        let Job {
            label,
            dependency,
            task,
            handle,
        } = job;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            dependency.complete()?;
            let mut core = lock(&core);
            core.apply_pending(&pending);
            core.run(task)
        }));
        let result = outcome.unwrap_or_else(|_| {
            error!(job = label, "job panicked");
            Err(Error::JobFailed {
                message: format!("{label} job panicked"),
            })
        });
        handle.finish(result);
    }
    debug!("planner worker stopped");
}

impl<C, G> PlannerScheduler<C, G>
where
    C: StateDataContext + 'static,
    C::StateData: 'static,
    G: ActionGenerator<C::StateData> + 'static,
{
    /// Create a scheduler with the default estimator (`(0, 0, 0)`) and no
    /// terminal states.
    pub fn new(context: Arc<C>, generator: G, settings: PlannerSettings) -> Result<Self> {
        settings.validate()?;
        let core = PlannerCore {
            context: Arc::clone(&context),
            generator,
            estimator: Arc::new(DefaultCumulativeRewardEstimator),
            termination: Arc::new(NeverTerminal),
            plan_data: Arc::new(RwLock::new(PlanData::new())),
            request: None,
            settings: settings.clone(),
            observers: Vec::new(),
            iterations: 0,
            last_report: None,
            fault: None,
        };
        let core = Arc::new(Mutex::new(core));
        let pending = Arc::new(Mutex::new(PendingEvaluators::default()));
        let (sender, jobs) = mpsc::channel();
        let worker_core = Arc::clone(&core);
        let worker_pending = Arc::clone(&pending);
        thread::Builder::new()
            .name("boundplan-worker".to_string())
            .spawn(move || run_worker(jobs, worker_core, worker_pending))
            .map_err(|e| Error::JobFailed {
                message: format!("cannot start planner worker: {e}"),
            })?;
        Ok(Self {
            core,
            pending,
            queue: Mutex::new(JobQueue {
                sender,
                last: JobHandle::default(),
            }),
            context,
            settings,
        })
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// Replace the reward estimator from the next job on.
    pub fn set_cumulative_reward_estimator(
        &self,
        estimator: impl CumulativeRewardEstimator<C::StateData> + 'static,
    ) {
        lock(&self.pending).estimator = Some(Arc::new(estimator));
    }

    /// Replace the termination evaluator from the next job on.
    pub fn set_termination_evaluator(
        &self,
        termination: impl TerminationEvaluator<C::StateData> + 'static,
    ) {
        lock(&self.pending).termination = Some(Arc::new(termination));
    }

    /// Start a new plan request rooted at `root`.
    ///
    /// Any previous request is replaced. If `root` is already in the plan, or
    /// equal to a plan state, the graph is re-rooted; otherwise it is cleared
    /// and planning restarts from a copy of `root`.
    pub fn request_plan(
        &self,
        root: C::StateKey,
        completion: PlanCompletion,
    ) -> PlanRequest<C, G::ActionKey> {
        let request = PlanRequest::new(completion);
        let installed = request.clone();
        self.enqueue(JobHandle::default(), "request", move |core| {
            core.install_request(installed, root)
        });
        request
    }

    /// Move the current request's root to `root` once queued work finishes,
    /// pruning every state the new root cannot reach.
    pub fn update_plan_request_root_state(&self, root: C::StateKey) -> JobHandle {
        self.enqueue(JobHandle::default(), "reroot", move |core| {
            core.update_root(root)
        })
    }

    /// Queue one iteration to run after `dependency` and all earlier jobs.
    pub fn schedule(&self, dependency: JobHandle) -> JobHandle {
        self.enqueue(dependency, "iteration", PlannerCore::iterate)
    }

    /// Handle of the most recently queued job.
    pub fn current_job_handle(&self) -> JobHandle {
        lock(&self.queue).last.clone()
    }

    /// Attach an observer. Waits for an iteration in flight.
    pub fn add_observer(&self, observer: Box<dyn PlannerObserver>) {
        lock(&self.core).observers.push(observer);
    }

    /// Iterations run so far, including skipped ones.
    pub fn iteration_count(&self) -> usize {
        lock(&self.core).iterations
    }

    pub fn last_report(&self) -> Option<IterationReport> {
        lock(&self.core).last_report.clone()
    }

    pub fn is_faulted(&self) -> bool {
        lock(&self.core).fault.is_some()
    }

    /// The current request, if any.
    pub fn request(&self) -> Option<PlanRequest<C, G::ActionKey>> {
        lock(&self.core).request.clone()
    }

    /// Finish queued work and destroy every remaining plan state. Returns the
    /// number of destroyed states.
    pub fn dispose(self) -> usize {
        if let Err(e) = self.current_job_handle().complete() {
            debug!(error = %e, "last job failed before dispose");
        }
        let mut core = lock(&self.core);
        core.request = None;
        let destroyed = plan::write(&core.plan_data).clear(&*self.context);
        info!(destroyed, "scheduler disposed");
        destroyed
    }

    fn enqueue<F>(&self, dependency: JobHandle, label: &'static str, task: F) -> JobHandle
    where
        F: FnOnce(&mut PlannerCore<C, G>) -> Result<()> + Send + 'static,
    {
        let handle = JobHandle::pending();
        let job = Job {
            label,
            dependency,
            task: Box::new(task),
            handle: handle.clone(),
        };
        // Sending under the lock keeps `last` in channel order.
        let mut queue = lock(&self.queue);
        if let Err(mpsc::SendError(job)) = queue.sender.send(job) {
            job.handle.finish(Err(Error::JobFailed {
                message: format!("planner worker is gone; {label} job dropped"),
            }));
        }
        queue.last = handle.clone();
        handle
    }
}
