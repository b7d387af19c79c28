//! # Shared Worker Pool
//!
//! Work queues never own a thread. When a queue becomes runnable it hands a
//! job to a [`WorkerPool`], which runs it on whatever thread it likes.
//!
//! - [`TokioPool`] submits jobs to a tokio runtime (the production pool).
//! - [`ManualPool`] only records jobs; a test runs them one by one, which makes
//!   scheduling decisions observable and deterministic.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Handle;

/// A unit of work submitted to the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The shared execution resource behind every actor.
pub trait WorkerPool: Send + Sync + 'static {
    fn schedule(&self, job: Job);
}

/// Runs jobs as tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioPool {
    handle: Handle,
}

impl TokioPool {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime, like
    /// [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl WorkerPool for TokioPool {
    fn schedule(&self, job: Job) {
        // The job is synchronous; wrapping it keeps it on the worker threads
        // and gives waker-driven continuations a runtime context.
        self.handle.spawn(async move { job() });
    }
}

/// A pool that only queues jobs until the test runs them.
#[derive(Clone, Default)]
pub struct ManualPool {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl ManualPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Runs the oldest job. Returns `false` if there was none.
    pub fn run_next(&self) -> bool {
        // Release the lock before running: the job may schedule more jobs.
        let job = self.jobs.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs until the pool is empty, returning how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl WorkerPool for ManualPool {
    fn schedule(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }
}

impl std::fmt::Debug for ManualPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualPool")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn manual_pool_runs_in_submission_order() {
        let pool = ManualPool::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            pool.schedule(Box::new(move || log.lock().push(i)));
        }
        assert_eq!(pool.pending(), 3);
        assert_eq!(pool.run_until_idle(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn jobs_may_schedule_more_jobs() {
        let pool = ManualPool::new();
        let count = Arc::new(AtomicUsize::new(0));
        let inner_pool = pool.clone();
        let inner_count = count.clone();
        pool.schedule(Box::new(move || {
            inner_count.fetch_add(1, Ordering::SeqCst);
            let again = inner_count.clone();
            inner_pool.schedule(Box::new(move || {
                again.fetch_add(1, Ordering::SeqCst);
            }));
        }));
        assert_eq!(pool.run_until_idle(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tokio_pool_runs_jobs() {
        let pool = TokioPool::current();
        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.schedule(Box::new(move || {
            let _ = tx.send(7);
        }));
        assert_eq!(rx.await.unwrap(), 7);
    }
}
