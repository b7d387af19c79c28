//! # Actor Work Queue
//!
//! A [`WorkItemGroup`] is the serial mailbox of one actor. It buffers pending
//! continuations and decides when to hand itself to the shared
//! [`WorkerPool`]. The pool thread then drains the queue until it is empty or
//! the throughput quota is used up, at which point the group re-submits itself
//! instead of starving the other actors sharing the pool.
//!
//! ## State machine
//!
//! ```text
//!            enqueue                 pool runs execute()
//! Waiting ───────────► Runnable ───────────────────────► Running
//!    ▲                    ▲                                 │
//!    │   queue empty      │  items left (quota hit)         │
//!    └────────────────────┴─────────────────────────────────┘
//!
//! any state ── exit() ──► Exited (terminal)
//! ```
//!
//! All transitions happen under one mutex that is only held for O(1) buffer
//! and state operations, never while a continuation runs. Because the group is
//! submitted only on the Waiting → Runnable edge (or re-submitted from the end
//! of its own turn), no two pool threads ever execute the same group.

use crate::clock::Clock;
use crate::config::ScheduleOptions;
use crate::pool::WorkerPool;
use crate::scheduler::{exec_task, panic_message, ActorTask, RunOutcome, TaskSnapshot};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkGroupState {
    /// Idle, not submitted to the pool.
    Waiting,
    /// Submitted to the pool, not yet running.
    Runnable,
    /// A pool thread is draining the queue.
    Running,
    /// Terminal. Work is dropped.
    Exited,
}

/// Counters for one work group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkGroupStats {
    pub executed: u64,
    pub slow_tasks: u64,
    pub panicked_tasks: u64,
    pub backlog_warnings: u64,
    /// Turns that ended with work left and re-submitted the group.
    pub resubmits: u64,
    /// Drain loops that failed outside of a continuation.
    pub faults: u64,
}

#[derive(Default)]
struct GroupCounters {
    executed: AtomicU64,
    slow_tasks: AtomicU64,
    panicked_tasks: AtomicU64,
    backlog_warnings: AtomicU64,
    resubmits: AtomicU64,
    faults: AtomicU64,
}

struct GroupInner {
    tasks: VecDeque<Arc<ActorTask>>,
    state: WorkGroupState,
    last_backlog_warning_ms: Option<u64>,
}

/// The serial work queue of one actor.
pub struct WorkItemGroup {
    label: String,
    inner: Mutex<GroupInner>,
    options: ScheduleOptions,
    pool: Arc<dyn WorkerPool>,
    clock: Arc<dyn Clock>,
    counters: GroupCounters,
}

impl WorkItemGroup {
    pub fn new(
        label: impl Into<String>,
        options: ScheduleOptions,
        pool: Arc<dyn WorkerPool>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            inner: Mutex::new(GroupInner {
                tasks: VecDeque::new(),
                state: WorkGroupState::Waiting,
                last_backlog_warning_ms: None,
            }),
            options,
            pool,
            clock,
            counters: GroupCounters::default(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> WorkGroupState {
        self.inner.lock().state
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the queued continuations, head first.
    pub fn pending(&self) -> Vec<TaskSnapshot> {
        self.inner
            .lock()
            .tasks
            .iter()
            .map(|task| task.snapshot())
            .collect()
    }

    pub fn stats(&self) -> WorkGroupStats {
        let c = &self.counters;
        WorkGroupStats {
            executed: c.executed.load(Ordering::Relaxed),
            slow_tasks: c.slow_tasks.load(Ordering::Relaxed),
            panicked_tasks: c.panicked_tasks.load(Ordering::Relaxed),
            backlog_warnings: c.backlog_warnings.load(Ordering::Relaxed),
            resubmits: c.resubmits.load(Ordering::Relaxed),
            faults: c.faults.load(Ordering::Relaxed),
        }
    }

    /// Appends a continuation and submits the group if it was idle.
    pub fn enqueue(self: &Arc<Self>, task: Arc<ActorTask>) {
        let mut inner = self.inner.lock();
        if inner.state == WorkGroupState::Exited {
            drop(inner);
            task.release();
            return;
        }

        let depth = inner.tasks.len();
        inner.tasks.push_back(task);

        let backlog_warning = self.check_backlog(&mut inner, depth);

        let submit = inner.state == WorkGroupState::Waiting;
        if submit {
            inner.state = WorkGroupState::Runnable;
        }
        drop(inner);

        if let Some(depth) = backlog_warning {
            warn!(
                actor = %self.label,
                depth,
                threshold = self.options.max_pending_work_items,
                "Too many work items queued"
            );
        }
        if submit {
            self.schedule();
        }
    }

    /// Pops the head continuation and marks the group Running.
    pub fn dequeue(&self) -> Option<Arc<ActorTask>> {
        let mut inner = self.inner.lock();
        if inner.state == WorkGroupState::Exited {
            return None;
        }
        inner.state = WorkGroupState::Running;
        inner.tasks.pop_front()
    }

    /// One scheduling turn. Invoked by the pool.
    pub fn execute(self: &Arc<Self>) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.drain())) {
            self.counters.faults.fetch_add(1, Ordering::Relaxed);
            error!(
                actor = %self.label,
                panic = %panic_message(payload.as_ref()),
                "Work group drain loop failed"
            );
        }
        self.finish_turn();
    }

    /// Stops all further scheduling. Idempotent.
    pub fn exit(&self) {
        let dropped = {
            let mut inner = self.inner.lock();
            inner.state = WorkGroupState::Exited;
            std::mem::take(&mut inner.tasks)
        };
        // Dropping futures can wake other tasks of this group; never under the lock.
        for task in dropped {
            task.release();
        }
    }

    fn check_backlog(&self, inner: &mut GroupInner, depth: usize) -> Option<usize> {
        let limit = self.options.max_pending_work_items;
        if limit == 0 || depth <= limit {
            return None;
        }
        let now = self.clock.now_ms();
        let due = inner
            .last_backlog_warning_ms
            .map_or(true, |last| {
                now.saturating_sub(last) >= self.options.backlog_warning_interval_ms
            });
        if !due {
            return None;
        }
        inner.last_backlog_warning_ms = Some(now);
        self.counters
            .backlog_warnings
            .fetch_add(1, Ordering::Relaxed);
        Some(depth)
    }

    fn drain(&self) {
        let warning_ms = self.options.execute_warning_threshold_ms;
        let quota_ms = self.options.throughput_quota_ms;

        let loop_start = self.clock.now_ms();
        let mut task_start = loop_start;
        while let Some(task) = self.dequeue() {
            // Woken during its final poll; nothing left to run.
            if task.is_finished() {
                continue;
            }
            let outcome = exec_task(&task);
            drop(task);

            let task_end = self.clock.now_ms();
            let elapsed_ms = task_end.saturating_sub(task_start);
            task_start = task_end;

            self.counters.executed.fetch_add(1, Ordering::Relaxed);
            if matches!(outcome, RunOutcome::Panicked) {
                self.counters.panicked_tasks.fetch_add(1, Ordering::Relaxed);
            }
            if elapsed_ms > warning_ms {
                self.counters.slow_tasks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    actor = %self.label,
                    elapsed_ms,
                    threshold_ms = warning_ms,
                    thread = ?std::thread::current().id(),
                    "Single work item ran too long"
                );
            }
            if quota_ms > 0 && task_end.saturating_sub(loop_start) >= quota_ms {
                break;
            }
        }
    }

    fn finish_turn(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        match inner.state {
            WorkGroupState::Exited => {}
            _ if !inner.tasks.is_empty() => {
                inner.state = WorkGroupState::Runnable;
                drop(inner);
                self.counters.resubmits.fetch_add(1, Ordering::Relaxed);
                self.schedule();
            }
            _ => inner.state = WorkGroupState::Waiting,
        }
    }

    fn schedule(self: &Arc<Self>) {
        let group = Arc::clone(self);
        self.pool.schedule(Box::new(move || group.execute()));
    }
}

impl std::fmt::Debug for WorkItemGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("WorkItemGroup")
            .field("label", &self.label)
            .field("state", &inner.state)
            .field("queued", &inner.tasks.len())
            .finish()
    }
}
