//! Simulated periodic workloads.
//!
//! [`SimulatedTask`] burns a fixed execution cost per activation, split evenly across a number of
//! slices. Cost is burned either by spinning on the wall clock or by advancing a
//! [`ManualClock`], which makes whole schedules reproducible in tests.

use crate::config::TaskSpec;
use crate::task::{PeriodicTask, ReleaseParameters};
use crate::time::{AbsoluteTime, Clock, HighResolutionClock, ManualClock};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of most recent slice start times a [`SimulatedTask`] keeps.
pub const SLICE_HISTORY: usize = 1024;

/// How a simulated slice consumes its execution time.
#[derive(Debug, Clone)]
pub enum ExecutionModel {
    /// Busy-wait on the wall clock.
    Spin,
    /// Advance a simulated clock by the slice cost.
    Simulated(ManualClock),
}

impl ExecutionModel {
    fn burn(&self, cost: Duration) {
        match self {
            ExecutionModel::Spin => {
                let start = Instant::now();
                while start.elapsed() < cost {
                    std::hint::spin_loop();
                }
            }
            ExecutionModel::Simulated(clock) => clock.advance(cost),
        }
    }

    fn now(&self) -> AbsoluteTime {
        match self {
            ExecutionModel::Spin => HighResolutionClock.now(),
            ExecutionModel::Simulated(clock) => clock.now(),
        }
    }
}

#[derive(Debug, Default)]
struct ActivationState {
    remaining_slices: u32,
    activations: u64,
    slices_run: u64,
    misses: u64,
    slice_starts: VecDeque<AbsoluteTime>,
}

/// A periodic task with a fixed execution cost per activation.
#[derive(Debug)]
pub struct SimulatedTask {
    name: String,
    params: ReleaseParameters,
    slice_cost: Duration,
    slices: u32,
    execution: ExecutionModel,
    state: Mutex<ActivationState>,
}

impl SimulatedTask {
    /// `slices` of zero is treated as one.
    pub fn new(
        name: &str,
        params: ReleaseParameters,
        cost: Duration,
        slices: u32,
        execution: ExecutionModel,
    ) -> Self {
        let slices = slices.max(1);
        Self {
            name: name.to_string(),
            params,
            slice_cost: cost / slices,
            slices,
            execution,
            state: Mutex::new(ActivationState::default()),
        }
    }

    pub fn from_spec(spec: &TaskSpec, execution: ExecutionModel) -> Self {
        Self::new(
            &spec.name,
            spec.release_parameters(),
            spec.cost(),
            spec.slices,
            execution,
        )
    }

    pub fn activations(&self) -> u64 {
        self.state.lock().activations
    }

    pub fn slices_run(&self) -> u64 {
        self.state.lock().slices_run
    }

    /// Number of times the deadline-miss handler ran.
    pub fn misses(&self) -> u64 {
        self.state.lock().misses
    }

    /// Clock reading at the start of the last [`SLICE_HISTORY`] slices, oldest first.
    pub fn slice_starts(&self) -> Vec<AbsoluteTime> {
        self.state.lock().slice_starts.iter().copied().collect()
    }
}

impl PeriodicTask for SimulatedTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn release_parameters(&self) -> ReleaseParameters {
        self.params
    }

    fn set_ready(&self) {
        let mut state = self.state.lock();
        state.remaining_slices = self.slices;
        state.activations += 1;
    }

    fn run_slice(&self) {
        {
            let mut state = self.state.lock();
            if state.remaining_slices == 0 {
                return;
            }
            let started = self.execution.now();
            if state.slice_starts.len() == SLICE_HISTORY {
                state.slice_starts.pop_front();
            }
            state.slice_starts.push_back(started);
        }
        self.execution.burn(self.slice_cost);
        let mut state = self.state.lock();
        state.remaining_slices -= 1;
        state.slices_run += 1;
    }

    fn is_finished(&self) -> bool {
        self.state.lock().remaining_slices == 0
    }

    fn handle_deadline_miss(&self) {
        self.state.lock().misses += 1;
    }
}
