//! # Scheduling Options
//!
//! Pass-through configuration consumed by the work queues and the result pool.
//! The runtime never loads these values itself; the host process builds a
//! [`ScheduleOptions`] (directly, or by deserializing it from its own
//! configuration source) and hands it to each actor.

use crate::error::FrameworkError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the per-actor scheduler.
///
/// All durations are expressed in milliseconds so the struct maps cleanly onto
/// TOML/JSON/env based configuration formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleOptions {
    /// Maximum wall-clock time a queue may drain before yielding back to the
    /// pool. `0` disables the quota.
    pub throughput_quota_ms: u64,
    /// A single continuation running longer than this is reported.
    pub execute_warning_threshold_ms: u64,
    /// Queue depth above which backlog warnings are emitted. `0` disables them.
    pub max_pending_work_items: usize,
    /// Minimum time between two backlog warnings of the same queue.
    pub backlog_warning_interval_ms: u64,
    /// Number of free value slots kept per result type by the response pool.
    pub result_pool_max_retained: usize,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            throughput_quota_ms: 100,
            execute_warning_threshold_ms: 1_000,
            max_pending_work_items: 1_000,
            backlog_warning_interval_ms: 10_000,
            result_pool_max_retained: 256,
        }
    }
}

impl ScheduleOptions {
    pub fn with_throughput_quota(mut self, quota: Duration) -> Self {
        self.throughput_quota_ms = quota.as_millis() as u64;
        self
    }

    pub fn with_execute_warning_threshold(mut self, threshold: Duration) -> Self {
        self.execute_warning_threshold_ms = threshold.as_millis() as u64;
        self
    }

    pub fn with_max_pending_work_items(mut self, limit: usize) -> Self {
        self.max_pending_work_items = limit;
        self
    }

    pub fn with_backlog_warning_interval(mut self, interval: Duration) -> Self {
        self.backlog_warning_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_result_pool_max_retained(mut self, retained: usize) -> Self {
        self.result_pool_max_retained = retained;
        self
    }

    pub fn throughput_quota(&self) -> Duration {
        Duration::from_millis(self.throughput_quota_ms)
    }

    pub fn execute_warning_threshold(&self) -> Duration {
        Duration::from_millis(self.execute_warning_threshold_ms)
    }

    pub fn backlog_warning_interval(&self) -> Duration {
        Duration::from_millis(self.backlog_warning_interval_ms)
    }

    /// Rejects combinations the scheduler cannot honour.
    pub fn validate(&self) -> Result<(), FrameworkError> {
        if self.max_pending_work_items > 0 && self.backlog_warning_interval_ms == 0 {
            return Err(FrameworkError::InvalidConfig(
                "backlog_warning_interval_ms must be positive when max_pending_work_items is set"
                    .into(),
            ));
        }
        if self.execute_warning_threshold_ms == 0 {
            return Err(FrameworkError::InvalidConfig(
                "execute_warning_threshold_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
