//! Completion tracking for a dynamically growing set of tasks
//!
//! A [`JobCounter`] counts outstanding jobs. Every job holds a [`JobGuard`] taken with
//! [`JobCounter::enter`] *before* the job is spawned, so a job that discovers more work
//! (a directory containing subdirectories) registers its children while its own guard
//! still keeps the counter above zero. [`JobCounter::wait`] resolves once the counter
//! drops to zero.
//!
//! Failures are fail-fast: the first error passed to [`JobCounter::fail`] is kept and
//! raises a cancellation flag that jobs check before starting further I/O. `wait` still
//! lets every job drain before returning that error.

use crate::error::{TestIdError, TestIdResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    cancelled: AtomicBool,
    idle: Notify,
    failure: Mutex<Option<TestIdError>>,
}

/// Shared counter of outstanding jobs
#[derive(Debug, Clone, Default)]
pub struct JobCounter {
    inner: Arc<Inner>,
}

/// Keeps one job registered until dropped
#[derive(Debug)]
#[must_use = "the job is finished as soon as the guard is dropped"]
pub struct JobGuard {
    inner: Arc<Inner>,
}

impl JobCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job; call before spawning it
    pub fn enter(&self) -> JobGuard {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        JobGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Record a failure and cancel the remaining jobs; only the first error is kept
    pub fn fail(&self, error: TestIdError) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.inner.failure.lock() {
            if slot.is_none() {
                *slot = Some(error);
            } else {
                tracing::debug!(error = %error, "Suppressed error after first failure");
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until no job is outstanding, then report the first failure, if any
    pub async fn wait(&self) -> TestIdResult<()> {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking so a wake-up between the check and the
            // await is not lost
            notified.as_mut().enable();
            if self.pending() == 0 {
                break;
            }
            notified.await;
        }

        let failure = self
            .inner
            .failure
            .lock()
            .map_err(|_| TestIdError::internal("job failure slot poisoned"))?
            .take();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
