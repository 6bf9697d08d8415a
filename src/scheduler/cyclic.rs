//! Table-driven cyclic executive.
//!
//! Time is divided into minor cycles; a major cycle is a fixed sequence of minor cycles. Each
//! minor cycle runs a predetermined list of task invocations, then blocks until the next frame
//! boundary. Feasibility comes from how the table is built, so there are no queues, no online
//! admission control and no deadline checks.

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;
use crate::task::{PeriodicTask, TaskHandle};
use crate::time::{AbsoluteTime, Clock, ManualClock};
use crossbeam_channel::{Receiver, RecvError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// One entry of a minor-cycle plan. Task indexes refer to the scheduler's task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Run slices until the task's activation finishes.
    UntilFinished(usize),
    /// Run exactly this many slices.
    Times(usize, u32),
}

impl Invocation {
    fn task_index(&self) -> usize {
        match *self {
            Invocation::UntilFinished(index) | Invocation::Times(index, _) => index,
        }
    }
}

/// Ordered invocations executed within one minor cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinorCyclePlan {
    pub name: String,
    pub invocations: Vec<Invocation>,
}

impl MinorCyclePlan {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            invocations: Vec::new(),
        }
    }

    pub fn until_finished(mut self, task: usize) -> Self {
        self.invocations.push(Invocation::UntilFinished(task));
        self
    }

    pub fn times(mut self, task: usize, count: u32) -> Self {
        self.invocations.push(Invocation::Times(task, count));
        self
    }
}

/// Identifies a plan registered with a [`CyclicSchedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanId(usize);

/// Minor/major cycle lengths plus the sequence of plans making up one major cycle.
#[derive(Debug, Clone)]
pub struct CyclicSchedule {
    minor_cycle: Duration,
    major_cycle: Duration,
    plans: Vec<MinorCyclePlan>,
    /// Major cycle as consecutive runs of (plan, number of minor cycles).
    runs: Vec<(PlanId, usize)>,
}

impl CyclicSchedule {
    pub fn new(minor_cycle: Duration, major_cycle: Duration) -> Self {
        Self {
            minor_cycle,
            major_cycle,
            plans: Vec::new(),
            runs: Vec::new(),
        }
    }

    pub fn add_plan(&mut self, plan: MinorCyclePlan) -> PlanId {
        self.plans.push(plan);
        PlanId(self.plans.len() - 1)
    }

    /// Append `slots` consecutive minor cycles running `plan`.
    pub fn repeat(&mut self, plan: PlanId, slots: usize) -> &mut Self {
        self.runs.push((plan, slots));
        self
    }

    pub fn minor_cycle(&self) -> Duration {
        self.minor_cycle
    }

    pub fn major_cycle(&self) -> Duration {
        self.major_cycle
    }

    /// Number of minor cycles the table covers.
    pub fn slot_count(&self) -> usize {
        self.runs.iter().map(|(_, slots)| slots).sum()
    }

    /// Plan for a zero-based slot; slots wrap around every major cycle.
    ///
    /// # Panics
    /// Panics if the table is empty. [`CyclicSchedule::validate`] rejects such tables.
    pub fn plan_for_slot(&self, slot: usize) -> &MinorCyclePlan {
        let mut offset = slot % self.slot_count();
        for (plan, slots) in &self.runs {
            if offset < *slots {
                return &self.plans[plan.0];
            }
            offset -= slots;
        }
        unreachable!("slot offset is always below the slot count")
    }

    pub fn validate(&self, task_count: usize) -> Result<(), SchedulerError> {
        let cycles_invalid = self.minor_cycle.is_zero()
            || self.major_cycle < self.minor_cycle
            || self.major_cycle.as_nanos() % self.minor_cycle.as_nanos() != 0;
        if cycles_invalid {
            return Err(SchedulerError::InvalidCycleLengths {
                minor: self.minor_cycle,
                major: self.major_cycle,
            });
        }

        if let Some((plan, _)) = self.runs.iter().find(|(plan, _)| plan.0 >= self.plans.len()) {
            return Err(SchedulerError::UnknownPlan {
                plan: plan.0,
                available: self.plans.len(),
            });
        }

        let expected = (self.major_cycle.as_nanos() / self.minor_cycle.as_nanos()) as usize;
        let planned = self.slot_count();
        if planned != expected {
            return Err(SchedulerError::SlotCountMismatch { planned, expected });
        }

        let unknown = self
            .plans
            .iter()
            .flat_map(|plan| plan.invocations.iter())
            .map(Invocation::task_index)
            .find(|index| *index >= task_count);
        if let Some(index) = unknown {
            return Err(SchedulerError::UnknownTask {
                index,
                available: task_count,
            });
        }
        Ok(())
    }
}

/// Task indexes of the robot-controller task set.
pub mod robot {
    pub const IMAGE_PROCESSING: usize = 0;
    pub const PLANNERS: [usize; 3] = [1, 2, 3];
    pub const REACTORS: [usize; 3] = [4, 5, 6];
    pub const ACTUATOR: usize = 7;
    pub const TASK_COUNT: usize = 8;
}

/// Table for the robot controller: 50 ms minor cycle, 1 s major cycle.
///
/// The first three minor cycles also give each planner two slices; the remaining seventeen only
/// run image processing, the reactors and the actuator.
pub fn robot_controller_schedule() -> CyclicSchedule {
    let mut schedule = CyclicSchedule::new(Duration::from_millis(50), Duration::from_secs(1));

    let mut planning = MinorCyclePlan::new("planning").until_finished(robot::IMAGE_PROCESSING);
    for planner in robot::PLANNERS {
        planning = planning.times(planner, 2);
    }
    for reactor in robot::REACTORS {
        planning = planning.until_finished(reactor);
    }
    planning = planning.until_finished(robot::ACTUATOR);

    let mut reactive = MinorCyclePlan::new("reactive").until_finished(robot::IMAGE_PROCESSING);
    for reactor in robot::REACTORS {
        reactive = reactive.until_finished(reactor);
    }
    reactive = reactive.until_finished(robot::ACTUATOR);

    let planning = schedule.add_plan(planning);
    let reactive = schedule.add_plan(reactive);
    schedule.repeat(planning, 3).repeat(reactive, 17);
    schedule
}

/// Blocks until the infrastructure signals the next minor-cycle boundary.
pub trait FrameSignal {
    fn wait_for_cycle_boundary(&mut self) -> Result<(), SchedulerError>;
}

/// Frame boundaries generated locally every minor cycle.
pub struct TickerFrameSignal {
    ticker: Receiver<Instant>,
}

impl TickerFrameSignal {
    pub fn new(minor_cycle: Duration) -> Self {
        Self {
            ticker: crossbeam_channel::tick(minor_cycle),
        }
    }
}

impl FrameSignal for TickerFrameSignal {
    fn wait_for_cycle_boundary(&mut self) -> Result<(), SchedulerError> {
        self.ticker
            .recv()
            .map(|_| ())
            .map_err(|RecvError| SchedulerError::FrameSignalClosed)
    }
}

/// Frame boundaries delivered by an external sender.
pub struct ChannelFrameSignal {
    boundaries: Receiver<()>,
}

impl ChannelFrameSignal {
    pub fn new(boundaries: Receiver<()>) -> Self {
        Self { boundaries }
    }
}

impl FrameSignal for ChannelFrameSignal {
    fn wait_for_cycle_boundary(&mut self) -> Result<(), SchedulerError> {
        self.boundaries
            .recv()
            .map_err(|RecvError| SchedulerError::FrameSignalClosed)
    }
}

/// Frame boundaries on a [`ManualClock`]: waiting jumps the clock to the next boundary.
///
/// A plan that runs past its boundary is counted as an overrun and the boundaries it covered are
/// dropped.
pub struct ManualFrameSignal {
    clock: ManualClock,
    minor_cycle: Duration,
    next_boundary: AbsoluteTime,
    overruns: u64,
}

impl ManualFrameSignal {
    pub fn new(clock: ManualClock, minor_cycle: Duration) -> Self {
        Self {
            clock,
            minor_cycle,
            next_boundary: AbsoluteTime::ZERO + minor_cycle,
            overruns: 0,
        }
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

impl FrameSignal for ManualFrameSignal {
    fn wait_for_cycle_boundary(&mut self) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        if now.is_greater_than(self.next_boundary) {
            self.overruns += 1;
            while !self.next_boundary.is_greater_than(now) {
                self.next_boundary += self.minor_cycle;
            }
        }
        self.clock.set(self.next_boundary);
        self.next_boundary += self.minor_cycle;
        Ok(())
    }
}

/// Run one slice, starting a new activation if the previous one has finished.
pub fn fire_thread(task: &dyn PeriodicTask) {
    if task.is_finished() {
        task.set_ready();
    }
    task.run_slice();
}

/// Run slices until the task's current activation finishes. Returns the number of slices run.
pub fn fire_until_finished(task: &dyn PeriodicTask) -> u32 {
    if task.is_finished() {
        task.set_ready();
    }
    let mut slices = 0;
    loop {
        task.run_slice();
        slices += 1;
        if task.is_finished() {
            return slices;
        }
    }
}

/// Cyclic executive driving a fixed table of invocations.
pub struct CyclicScheduler<C, F> {
    tasks: Vec<TaskHandle>,
    schedule: CyclicSchedule,
    clock: C,
    frames: F,
    next_slot: usize,
    started_at: Option<AbsoluteTime>,
}

impl<C: Clock, F: FrameSignal> CyclicScheduler<C, F> {
    pub fn new(
        tasks: Vec<TaskHandle>,
        schedule: CyclicSchedule,
        clock: C,
        frames: F,
    ) -> Result<Self, SchedulerError> {
        if tasks.is_empty() {
            return Err(SchedulerError::EmptyTaskSet);
        }
        schedule.validate(tasks.len())?;
        info!(
            policy = "Cyclic",
            minor = ?schedule.minor_cycle(),
            major = ?schedule.major_cycle(),
            slots = schedule.slot_count(),
            "scheduler initiated"
        );
        Ok(Self {
            tasks,
            schedule,
            clock,
            frames,
            next_slot: 0,
            started_at: None,
        })
    }

    /// Record the scheduler start time. Done once before the first minor cycle.
    pub fn mark_start(&mut self) -> AbsoluteTime {
        self.clock.reset();
        let now = self.clock.now();
        self.started_at = Some(now);
        now
    }

    pub fn started_at(&self) -> Option<AbsoluteTime> {
        self.started_at
    }

    pub fn schedule(&self) -> &CyclicSchedule {
        &self.schedule
    }

    /// Zero-based slot the next minor cycle will execute, within the major cycle.
    pub fn next_slot(&self) -> usize {
        self.next_slot
    }

    /// Execute the current slot's plan, then wait for the frame boundary.
    /// Returns the slot that was executed.
    pub fn run_minor_cycle(&mut self) -> Result<usize, SchedulerError> {
        let slot = self.next_slot;
        let plan = self.schedule.plan_for_slot(slot);
        debug!(slot, plan = %plan.name, "minor cycle");
        for invocation in &plan.invocations {
            match *invocation {
                Invocation::UntilFinished(index) => {
                    fire_until_finished(self.tasks[index].as_ref());
                }
                Invocation::Times(index, count) => {
                    for _ in 0..count {
                        fire_thread(self.tasks[index].as_ref());
                    }
                }
            }
        }
        self.frames.wait_for_cycle_boundary()?;
        self.next_slot = (slot + 1) % self.schedule.slot_count();
        Ok(slot)
    }

    /// Run minor cycles until the table wraps back to slot 0.
    pub fn run_major_cycle(&mut self) -> Result<(), SchedulerError> {
        loop {
            self.run_minor_cycle()?;
            if self.next_slot == 0 {
                return Ok(());
            }
        }
    }
}

impl<C: Clock, F: FrameSignal> Scheduler for CyclicScheduler<C, F> {
    fn policy_name(&self) -> &'static str {
        "Cyclic"
    }

    fn start(&mut self) -> ! {
        self.mark_start();
        loop {
            if let Err(err) = self.run_minor_cycle() {
                error!(%err, "cyclic executive lost its frame signal");
                panic!("cyclic executive cannot continue: {err}");
            }
        }
    }
}
