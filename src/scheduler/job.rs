//! Completion handles for scheduled work.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::Result;

#[derive(Debug, Default)]
struct JobState {
    result: Mutex<Option<Result<()>>>,
    done: Condvar,
}

/// Handle to the asynchronous completion of one or more scheduled jobs.
///
/// Cloning shares the same underlying jobs. The default handle has no jobs
/// and is already complete.
#[derive(Debug, Clone, Default)]
pub struct JobHandle {
    jobs: Vec<Arc<JobState>>,
}

impl JobHandle {
    /// A handle that is already complete.
    pub fn completed() -> Self {
        Self::default()
    }

    pub(crate) fn pending() -> Self {
        Self {
            jobs: vec![Arc::new(JobState::default())],
        }
    }

    /// Record the outcome of a handle created with [`JobHandle::pending`].
    pub(crate) fn finish(&self, result: Result<()>) {
        for job in &self.jobs {
            let mut slot = job.result.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(result.clone());
            }
            job.done.notify_all();
        }
    }

    /// A handle that completes once every handle in `handles` has.
    pub fn combine<'a>(handles: impl IntoIterator<Item = &'a JobHandle>) -> Self {
        Self {
            jobs: handles
                .into_iter()
                .flat_map(|handle| handle.jobs.iter().cloned())
                .collect(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.jobs.iter().all(|job| {
            job.result
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        })
    }

    /// Block until every job has finished. Returns the first failure.
    pub fn complete(&self) -> Result<()> {
        let mut outcome = Ok(());
        for job in &self.jobs {
            let guard = job.result.lock().unwrap_or_else(PoisonError::into_inner);
            let guard = job
                .done
                .wait_while(guard, |result| result.is_none())
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(Err(error)) = guard.as_ref() {
                if outcome.is_ok() {
                    outcome = Err(error.clone());
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;
    use crate::Error;

    #[test]
    fn default_handle_is_complete() {
        let handle = JobHandle::default();
        assert!(handle.is_completed());
        assert!(handle.complete().is_ok());
    }

    #[test]
    fn complete_waits_for_the_worker() {
        let handle = JobHandle::pending();
        let worker = handle.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            worker.finish(Ok(()));
        });
        assert!(handle.complete().is_ok());
        assert!(handle.is_completed());
    }

    #[test]
    fn combined_handle_reports_the_first_failure() {
        let ok = JobHandle::pending();
        let failed = JobHandle::pending();
        ok.finish(Ok(()));
        failed.finish(Err(Error::NoPlanAssigned));
        let combined = JobHandle::combine([&ok, &failed]);
        assert_eq!(combined.complete(), Err(Error::NoPlanAssigned));
        assert!(ok.complete().is_ok());
    }

    #[test]
    fn first_outcome_wins() {
        let handle = JobHandle::pending();
        handle.finish(Err(Error::NoPlanAssigned));
        handle.finish(Ok(()));
        assert!(handle.complete().is_err());
    }
}
