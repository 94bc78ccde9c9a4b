//! Observer port - hooks into the planning loop
//!
//! Observers receive a report after every completed iteration and on the
//! request lifecycle events, without coupling the scheduler to any particular
//! output (progress bars, logs, metrics).

use crate::{Result, planner::IterationReport};

/// Observer trait for monitoring planning.
///
/// # Event Sequence
///
/// 1. `on_reroot(pruned)` - whenever the graph is re-rooted or reset
/// 2. `on_iteration_complete(report)` - after every iteration
/// 3. `on_request_complete(report)` - once, when the request's completion
///    predicate is first satisfied
///
/// Observers run on the scheduler's worker thread while the engine is locked, so
/// they should be quick. An error returned by an observer is logged and does
/// not fail the iteration.
///
/// # Examples
///
/// ```
/// use boundplan::{planner::IterationReport, ports::PlannerObserver};
///
/// #[derive(Default)]
/// struct CountingObserver {
///     iterations: usize,
/// }
///
/// impl PlannerObserver for CountingObserver {
///     fn on_iteration_complete(&mut self, _report: &IterationReport) -> boundplan::Result<()> {
///         self.iterations += 1;
///         Ok(())
///     }
/// }
/// ```
pub trait PlannerObserver: Send {
    /// Called after every iteration, including ones that found nothing to do.
    fn on_iteration_complete(&mut self, _report: &IterationReport) -> Result<()> {
        Ok(())
    }

    /// Called once per request when its completion predicate holds.
    fn on_request_complete(&mut self, _report: &IterationReport) -> Result<()> {
        Ok(())
    }

    /// Called after the graph was re-rooted; `pruned_states` were destroyed.
    fn on_reroot(&mut self, _pruned_states: usize) -> Result<()> {
        Ok(())
    }
}
