//! # Actor Scheduler
//!
//! Bridges Rust's task machinery (futures and wakers) to one
//! [`WorkItemGroup`].
//!
//! Every unit of work an actor produces is an [`ActorTask`]: a boxed future
//! plus a "scheduled" flag. The task's [`Waker`] does not poll anything; it
//! pushes the task back onto the owning work group. So when actor logic awaits
//! something, the remainder of that logic is queued behind the continuations
//! that are already waiting, exactly like any other work item, and is never run
//! inline on the thread that woke it.

use crate::clock::{Clock, MonotonicClock};
use crate::config::ScheduleOptions;
use crate::pool::WorkerPool;
use crate::work_group::{WorkGroupState, WorkGroupStats, WorkItemGroup};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Wake, Waker};
use tokio::sync::oneshot;
use tracing::{error, warn};

/// Result of polling a continuation once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The future is waiting on something and will be woken later.
    Pending,
    Completed,
    /// The future had already completed; nothing ran.
    AlreadyFinished,
    /// Polling panicked; the future was dropped.
    Panicked,
}

/// Read-only description of a queued continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub id: u64,
    pub name: Option<String>,
}

/// A continuation owned by one actor.
pub struct ActorTask {
    id: u64,
    name: Option<String>,
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    scheduled: AtomicBool,
    group: Weak<WorkItemGroup>,
}

impl ActorTask {
    fn new(
        id: u64,
        name: Option<String>,
        future: BoxFuture<'static, ()>,
        group: Weak<WorkItemGroup>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            name,
            future: Mutex::new(Some(future)),
            scheduled: AtomicBool::new(false),
            group,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.future.lock().is_none()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// Queues the task on its group unless it is already queued.
    fn schedule(self: &Arc<Self>) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(group) = self.group.upgrade() {
            group.enqueue(Arc::clone(self));
        }
    }

    /// Drops the future without running it.
    ///
    /// A parked future can hold its own waker (through a channel it awaits),
    /// so a task that reaches an exited group has to break that cycle here.
    /// If the future is being polled right now, `run` releases it instead
    /// once the poll returns.
    pub(crate) fn release(&self) {
        let future = match self.future.try_lock() {
            Some(mut slot) => slot.take(),
            None => return,
        };
        // Dropping the future may wake other tasks; no lock is held here.
        drop(future);
    }

    fn group_exited(&self) -> bool {
        self.group
            .upgrade()
            .map_or(true, |group| group.state() == WorkGroupState::Exited)
    }

    /// Polls the future once on the calling thread.
    pub(crate) fn run(self: &Arc<Self>) -> RunOutcome {
        // Cleared before polling so a wake during the poll queues us again.
        self.scheduled.store(false, Ordering::Release);

        let mut slot = self.future.lock();
        let Some(future) = slot.as_mut() else {
            return RunOutcome::AlreadyFinished;
        };

        let waker = Waker::from(Arc::clone(self));
        let mut cx = Context::from_waker(&waker);
        match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
            Ok(Poll::Pending) => {
                // The group exited while we were polling; nobody will run us again.
                if self.group_exited() {
                    let future = slot.take();
                    drop(slot);
                    drop(future);
                }
                RunOutcome::Pending
            }
            Ok(Poll::Ready(())) => {
                *slot = None;
                RunOutcome::Completed
            }
            Err(payload) => {
                let future = slot.take();
                drop(slot);
                drop(future);
                error!(
                    task_id = self.id,
                    task = self.name.as_deref().unwrap_or("-"),
                    panic = %panic_message(payload.as_ref()),
                    "Continuation panicked"
                );
                RunOutcome::Panicked
            }
        }
    }
}

impl Wake for ActorTask {
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.schedule();
    }
}

impl std::fmt::Debug for ActorTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("scheduled", &self.scheduled.load(Ordering::Relaxed))
            .finish()
    }
}

/// Polls `task` now and reports whether it could run.
pub(crate) fn exec_task(task: &Arc<ActorTask>) -> RunOutcome {
    let outcome = task.run();
    if outcome == RunOutcome::AlreadyFinished {
        warn!(
            task_id = task.id,
            task = task.name.as_deref().unwrap_or("-"),
            "ActorScheduler.exec_task: continuation was not executed"
        );
    }
    outcome
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The per-actor scheduler handle.
///
/// Cloning is cheap; every clone feeds the same [`WorkItemGroup`].
#[derive(Clone)]
pub struct ActorScheduler {
    group: Arc<WorkItemGroup>,
    next_task_id: Arc<AtomicU64>,
}

impl ActorScheduler {
    pub fn new(
        label: impl Into<String>,
        options: ScheduleOptions,
        pool: Arc<dyn WorkerPool>,
    ) -> Self {
        Self::with_clock(label, options, pool, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        label: impl Into<String>,
        options: ScheduleOptions,
        pool: Arc<dyn WorkerPool>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            group: WorkItemGroup::new(label, options, pool, clock),
            next_task_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Queues `future` for execution on this actor.
    pub fn spawn<F>(&self, future: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit(None, future.boxed())
    }

    pub fn spawn_named<F>(&self, name: impl Into<String>, future: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit(Some(name.into()), future.boxed())
    }

    /// Queues `future` and returns a receiver for its output.
    ///
    /// The receiver errors if the actor exits before the future completes.
    pub fn spawn_with_result<F, T>(&self, future: F) -> oneshot::Receiver<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.spawn(async move {
            let _ = tx.send(future.await);
        });
        rx
    }

    /// Queues a plain closure as a continuation.
    pub fn submit_fn<F>(&self, f: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(async move { f() })
    }

    fn submit(&self, name: Option<String>, future: BoxFuture<'static, ()>) -> u64 {
        let id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let task = ActorTask::new(id, name, future, Arc::downgrade(&self.group));
        task.schedule();
        id
    }

    /// Queued continuations, for diagnostics.
    pub fn scheduled_tasks(&self) -> Vec<TaskSnapshot> {
        self.group.pending()
    }

    /// Polls a previously queued continuation on the calling thread.
    pub fn exec_task(&self, task: &Arc<ActorTask>) -> bool {
        !matches!(
            exec_task(task),
            RunOutcome::AlreadyFinished | RunOutcome::Panicked
        )
    }

    pub fn shutdown(&self) {
        self.group.exit();
    }

    pub fn state(&self) -> WorkGroupState {
        self.group.state()
    }

    pub fn pending_count(&self) -> usize {
        self.group.len()
    }

    pub fn stats(&self) -> WorkGroupStats {
        self.group.stats()
    }

    pub fn work_group(&self) -> &Arc<WorkItemGroup> {
        &self.group
    }
}

impl std::fmt::Debug for ActorScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ActorScheduler").field(&self.group).finish()
    }
}
