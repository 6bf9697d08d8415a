//! Release/run/reschedule loop shared by the rate-monotonic and EDF schedulers.
//!
//! Each iteration:
//! 1. Sample the clock.
//! 2. Promote every suspended task whose release time has come to the ready queue.
//! 3. Roll forward every ready task whose deadline has already passed, invoking its miss handler.
//! 4. If no miss was processed, run one slice of the ready queue's head; once its activation
//!    finishes, move it to the suspended queue for its next period.
//! 5. If no miss was processed and nothing is ready, sleep until the earliest release.
//! 6. Periodically log the miss ratio.
//!
//! The two policies differ only in the ready-queue ordering and the default [`MissHandling`].

use crate::config::{MissHandling, SchedulerConfig};
use crate::descriptor::{ByRelease, TaskDescriptor, TaskId};
use crate::error::SchedulerError;
use crate::idle::{IdleController, Sleeper};
use crate::queue::{OrderedQueue, QueueOrder};
use crate::scheduler::Scheduler;
use crate::stats::{MissStatistics, StatsSnapshot, TaskStats};
use crate::task::TaskHandle;
use crate::time::{AbsoluteTime, Clock};
use std::time::Duration;
use tracing::{debug, info};

/// Ready-queue ordering of a priority-driven policy.
pub trait ReadyPolicy: QueueOrder<TaskDescriptor> {
    const NAME: &'static str;
    const MISS_HANDLING: MissHandling;
}

/// Which queue currently holds a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Ready,
    Suspended,
}

/// Result of running one slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub task: TaskId,
    /// The slice ended the task's current activation.
    pub finished: bool,
    /// The activation finished after its absolute deadline and was counted as a miss.
    pub late: bool,
}

/// What happened during one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub now: AbsoluteTime,
    pub released: usize,
    pub missed: u64,
    pub dispatched: Option<Dispatch>,
    pub slept: Option<Duration>,
}

/// Priority-driven scheduler over a suspended list and a policy-ordered ready list.
pub struct PriorityDrivenScheduler<P: ReadyPolicy, C, S> {
    ready: OrderedQueue<TaskDescriptor, P>,
    suspended: OrderedQueue<TaskDescriptor, ByRelease>,
    clock: C,
    idle: IdleController<S>,
    stats: MissStatistics,
    miss_handling: MissHandling,
    task_count: usize,
}

impl<P, C, S> PriorityDrivenScheduler<P, C, S>
where
    P: ReadyPolicy,
    C: Clock,
    S: Sleeper,
{
    /// Build descriptors for every task and place them on the suspended list.
    pub fn new(
        tasks: Vec<TaskHandle>,
        clock: C,
        sleeper: S,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        if tasks.is_empty() {
            return Err(SchedulerError::EmptyTaskSet);
        }
        for task in &tasks {
            task.release_parameters().validate(task.name())?;
        }

        let task_count = tasks.len();
        let mut suspended = OrderedQueue::with_capacity(task_count);
        for (id, task) in tasks.into_iter().enumerate() {
            suspended.insert(TaskDescriptor::new(id, task));
        }

        let miss_handling = config.miss_handling.unwrap_or(P::MISS_HANDLING);
        info!(policy = P::NAME, tasks = task_count, ?miss_handling, "scheduler initiated");

        Ok(Self {
            ready: OrderedQueue::with_capacity(task_count),
            suspended,
            clock,
            idle: IdleController::new(sleeper),
            stats: MissStatistics::new(config.report_interval),
            miss_handling,
            task_count,
        })
    }

    /// Run one iteration of the scheduling loop.
    pub fn step(&mut self) -> StepOutcome {
        let now = self.clock.now();
        let released = self.release_due(now);
        let missed = self.handle_missed_deadlines(now);

        let mut dispatched = None;
        let mut slept = None;
        if missed == 0 {
            if !self.ready.is_empty() {
                dispatched = Some(self.dispatch_first());
            } else {
                slept = Some(self.idle_until_next_release(now));
            }
        }

        self.stats.end_iteration(P::NAME);
        StepOutcome {
            now,
            released,
            missed,
            dispatched,
            slept,
        }
    }

    /// Step until the clock reaches `horizon`. Returns the number of iterations run.
    pub fn run_until(&mut self, horizon: AbsoluteTime) -> u64 {
        let mut iterations = 0;
        while horizon.is_greater_than(self.clock.now()) {
            self.step();
            iterations += 1;
        }
        iterations
    }

    /// Re-anchor the clock epoch. [`Scheduler::start`] does this before entering the loop.
    pub fn reset_clock(&self) {
        self.clock.reset();
    }

    fn release_due(&mut self, now: AbsoluteTime) -> usize {
        let mut released = 0;
        while self
            .suspended
            .first()
            .is_some_and(|head| !head.next_release().is_greater_than(now))
        {
            let descriptor = self.suspended.remove_first();
            descriptor.task().set_ready();
            self.ready.insert(descriptor);
            released += 1;
        }
        released
    }

    fn handle_missed_deadlines(&mut self, now: AbsoluteTime) -> u64 {
        let mut missed = 0;
        while self
            .ready
            .first()
            .is_some_and(|head| !head.deadline().is_greater_than(now))
        {
            let mut descriptor = self.ready.remove_first();
            descriptor.task().handle_deadline_miss();
            let periods = match self.miss_handling {
                MissHandling::SkipAhead => descriptor.skip_missed_periods(now),
                MissHandling::SingleStep => {
                    descriptor.advance_one_period();
                    1
                }
            };
            debug!(
                task = descriptor.task().name(),
                periods,
                next_release = %descriptor.next_release(),
                "deadline missed"
            );
            descriptor.record_misses(periods);
            self.stats.record_misses(periods);
            missed += periods;
            self.suspended.insert(descriptor);
        }
        missed
    }

    fn dispatch_first(&mut self) -> Dispatch {
        let head = self.ready.peek_first();
        let id = head.id();
        let deadline = head.deadline();
        let task = head.task().clone();

        task.run_slice();
        if !task.is_finished() {
            return Dispatch {
                task: id,
                finished: false,
                late: false,
            };
        }

        let finished_at = self.clock.now();
        let mut descriptor = self.ready.remove_first();
        let late = finished_at.is_greater_than(deadline);
        if late {
            task.handle_deadline_miss();
            descriptor.record_misses(1);
            self.stats.record_misses(1);
            debug!(task = task.name(), %finished_at, %deadline, "activation finished late");
        } else {
            descriptor.record_completion();
            self.stats.record_completion();
        }
        descriptor.advance_one_period();
        self.suspended.insert(descriptor);

        Dispatch {
            task: id,
            finished: true,
            late,
        }
    }

    fn idle_until_next_release(&self, now: AbsoluteTime) -> Duration {
        let next_release = self.suspended.peek_first().next_release();
        self.idle.idle_until(now, next_release)
    }

    pub fn miss_handling(&self) -> MissHandling {
        self.miss_handling
    }

    pub fn stats(&self) -> &MissStatistics {
        &self.stats
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn suspended_len(&self) -> usize {
        self.suspended.len()
    }

    pub fn task_count(&self) -> usize {
        self.task_count
    }

    /// Head of the ready queue, i.e. the task the next dispatch would run.
    pub fn ready_head(&self) -> Option<&TaskDescriptor> {
        self.ready.first()
    }

    pub fn descriptor(&self, id: TaskId) -> Option<&TaskDescriptor> {
        self.descriptors().find(|d| d.id() == id)
    }

    /// Every queue that currently holds `id`. Always exactly one entry between iterations.
    pub fn locate(&self, id: TaskId) -> Vec<QueueKind> {
        let ready = self
            .ready
            .iter()
            .filter(|d| d.id() == id)
            .map(|_| QueueKind::Ready);
        let suspended = self
            .suspended
            .iter()
            .filter(|d| d.id() == id)
            .map(|_| QueueKind::Suspended);
        ready.chain(suspended).collect()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut tasks: Vec<&TaskDescriptor> = self.descriptors().collect();
        tasks.sort_by_key(|d| d.id());
        StatsSnapshot {
            policy: P::NAME.to_string(),
            iterations: self.stats.iterations(),
            missed: self.stats.missed(),
            completed: self.stats.completed(),
            miss_ratio: self.stats.miss_ratio(),
            tasks: tasks
                .into_iter()
                .map(|d| TaskStats {
                    name: d.task().name().to_string(),
                    misses: d.misses(),
                    completions: d.completions(),
                })
                .collect(),
        }
    }

    fn descriptors(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.ready.iter().chain(self.suspended.iter())
    }
}

impl<P, C, S> Scheduler for PriorityDrivenScheduler<P, C, S>
where
    P: ReadyPolicy,
    C: Clock,
    S: Sleeper,
{
    fn policy_name(&self) -> &'static str {
        P::NAME
    }

    fn start(&mut self) -> ! {
        self.reset_clock();
        loop {
            self.step();
        }
    }
}
