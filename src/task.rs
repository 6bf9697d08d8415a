//! Periodic task capability consumed by the schedulers.
//!
//! The schedulers never own task code. They hold shared [`TaskHandle`]s and drive them through
//! the [`PeriodicTask`] trait; any synchronisation needed to run a slice lives in the
//! implementation.

use crate::error::SchedulerError;
use std::sync::Arc;
use std::time::Duration;

/// Periodic release parameters of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseParameters {
    /// Interval between successive releases.
    pub period: Duration,
    /// Relative deadline measured from each release.
    pub deadline: Duration,
    /// Offset of the first release from the clock epoch.
    pub start: Duration,
}

impl ReleaseParameters {
    /// Parameters with the deadline equal to the period and a zero start offset.
    pub const fn implicit(period: Duration) -> Self {
        Self {
            period,
            deadline: period,
            start: Duration::ZERO,
        }
    }

    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub const fn with_start(mut self, start: Duration) -> Self {
        self.start = start;
        self
    }

    /// Reject parameters the schedulers cannot work with.
    pub fn validate(&self, task: &str) -> Result<(), SchedulerError> {
        if self.period.is_zero() {
            return Err(SchedulerError::ZeroPeriod {
                task: task.to_string(),
            });
        }
        if self.deadline.is_zero() {
            return Err(SchedulerError::ZeroDeadline {
                task: task.to_string(),
            });
        }
        Ok(())
    }
}

/// A periodic task as seen by the scheduler.
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &str;

    fn release_parameters(&self) -> ReleaseParameters;

    /// Begin a new activation; called when the task is released.
    fn set_ready(&self);

    /// Run one execution slice. Returns once the slice completes or yields.
    fn run_slice(&self);

    /// Whether the current activation has finished its logical unit of work.
    fn is_finished(&self) -> bool;

    /// Invoked when the current activation misses its absolute deadline.
    fn handle_deadline_miss(&self);
}

/// Shared, non-owning reference to a task.
pub type TaskHandle = Arc<dyn PeriodicTask>;
