//! Per-task scheduling state.

use crate::queue::QueueOrder;
use crate::task::TaskHandle;
use crate::time::AbsoluteTime;
use std::fmt;
use std::time::Duration;

/// Index of a task in the set a scheduler was built from.
pub type TaskId = usize;

/// Scheduling state for one periodic task.
///
/// A descriptor lives in exactly one of the scheduler's queues at any time. Its `deadline` is
/// always `next_release + relative_deadline`.
pub struct TaskDescriptor {
    id: TaskId,
    task: TaskHandle,
    period: Duration,
    relative_deadline: Duration,
    next_release: AbsoluteTime,
    deadline: AbsoluteTime,
    misses: u64,
    completions: u64,
}

impl TaskDescriptor {
    /// Seed a descriptor with the task's first release (its start offset) and first deadline.
    pub fn new(id: TaskId, task: TaskHandle) -> Self {
        let params = task.release_parameters();
        let next_release = AbsoluteTime::from_duration(params.start);
        Self {
            id,
            task,
            period: params.period,
            relative_deadline: params.deadline,
            next_release,
            deadline: next_release + params.deadline,
            misses: 0,
            completions: 0,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn task(&self) -> &TaskHandle {
        &self.task
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn relative_deadline(&self) -> Duration {
        self.relative_deadline
    }

    pub fn next_release(&self) -> AbsoluteTime {
        self.next_release
    }

    pub fn deadline(&self) -> AbsoluteTime {
        self.deadline
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn completions(&self) -> u64 {
        self.completions
    }

    /// Move the release forward by one period and recompute the absolute deadline.
    pub fn advance_one_period(&mut self) {
        self.next_release += self.period;
        self.deadline = self.next_release + self.relative_deadline;
    }

    /// Advance period by period until the deadline lies strictly after `now`.
    ///
    /// Always advances at least once. Returns the number of periods skipped, which equals the
    /// number of deadlines that had elapsed by `now`.
    pub fn skip_missed_periods(&mut self, now: AbsoluteTime) -> u64 {
        let mut skipped = 0;
        loop {
            self.advance_one_period();
            skipped += 1;
            if self.deadline.is_greater_than(now) {
                return skipped;
            }
        }
    }

    pub(crate) fn record_misses(&mut self, count: u64) {
        self.misses += count;
    }

    pub(crate) fn record_completion(&mut self) {
        self.completions += 1;
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("id", &self.id)
            .field("task", &self.task.name())
            .field("next_release", &self.next_release)
            .field("deadline", &self.deadline)
            .field("misses", &self.misses)
            .field("completions", &self.completions)
            .finish()
    }
}

/// Suspended-list ordering: earliest next release first.
pub struct ByRelease;

impl QueueOrder<TaskDescriptor> for ByRelease {
    type Key = AbsoluteTime;

    fn key(item: &TaskDescriptor) -> AbsoluteTime {
        item.next_release
    }
}
