//! Time values and clock sources used by the schedulers.
//!
//! Absolute instants are measured as an offset from the clock epoch, which is fixed by
//! [`Clock::reset`] when a scheduler starts. Relative times are plain [`Duration`]s.

use crate::idle::{SleepError, Sleeper};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Add, AddAssign};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An instant on the scheduler timeline, expressed as the offset from the clock epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AbsoluteTime(Duration);

impl AbsoluteTime {
    /// The clock epoch itself.
    pub const ZERO: AbsoluteTime = AbsoluteTime(Duration::ZERO);

    pub const fn from_duration(offset: Duration) -> Self {
        AbsoluteTime(offset)
    }

    pub const fn from_millis(millis: u64) -> Self {
        AbsoluteTime(Duration::from_millis(millis))
    }

    pub const fn from_micros(micros: u64) -> Self {
        AbsoluteTime(Duration::from_micros(micros))
    }

    /// Offset of this instant from the clock epoch.
    pub const fn since_epoch(self) -> Duration {
        self.0
    }

    pub fn is_greater_than(self, other: AbsoluteTime) -> bool {
        self.0 > other.0
    }

    /// Relative time from `earlier` to `self`, clamped at zero when `earlier` is later.
    pub fn subtract(self, earlier: AbsoluteTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    pub fn as_micros(self) -> u128 {
        self.0.as_micros()
    }
}

impl Add<Duration> for AbsoluteTime {
    type Output = AbsoluteTime;

    /// Saturates at `Duration::MAX` instead of panicking on overflow.
    fn add(self, rhs: Duration) -> Self::Output {
        AbsoluteTime(self.0.checked_add(rhs).unwrap_or(Duration::MAX))
    }
}

impl AddAssign<Duration> for AbsoluteTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl fmt::Display for AbsoluteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{:.3}ms", self.0.as_secs_f64() * 1000.0)
    }
}

/// Monotonic time source consulted by the scheduling loop.
pub trait Clock {
    /// Re-anchor the epoch at the current instant. Called once when a scheduler starts.
    fn reset(&self);

    /// Current time relative to the epoch.
    fn now(&self) -> AbsoluteTime;
}

/// Process-wide epoch shared by every [`HighResolutionClock`] handle.
static EPOCH: RwLock<Option<Instant>> = parking_lot::const_rwlock(None);

/// Wall-clock source backed by [`Instant`] and a process-wide epoch.
///
/// All handles observe the same epoch. Reading the clock before any `reset` anchors the epoch
/// at that first read.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighResolutionClock;

impl HighResolutionClock {
    pub fn new() -> Self {
        HighResolutionClock
    }

    fn epoch() -> Instant {
        if let Some(epoch) = *EPOCH.read() {
            return epoch;
        }
        let mut guard = EPOCH.write();
        *guard.get_or_insert_with(Instant::now)
    }
}

impl Clock for HighResolutionClock {
    fn reset(&self) {
        *EPOCH.write() = Some(Instant::now());
    }

    fn now(&self) -> AbsoluteTime {
        AbsoluteTime(Self::epoch().elapsed())
    }
}

/// Number of most recent sleeps a [`ManualClock`] remembers.
pub const SLEEP_HISTORY: usize = 1024;

/// Deterministic clock for simulation and tests.
///
/// Time only moves when [`ManualClock::advance`] is called or when the clock is used as a
/// [`Sleeper`], in which case sleeping advances time by exactly the requested amount.
/// Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockState>>,
}

#[derive(Debug, Default)]
struct ManualClockState {
    now: Duration,
    sleeps: VecDeque<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.inner.lock();
        state.now = state.now.saturating_add(by);
    }

    pub fn set(&self, at: AbsoluteTime) {
        self.inner.lock().now = at.since_epoch();
    }

    /// The last [`SLEEP_HISTORY`] sleeps requested through the [`Sleeper`] impl, oldest first.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.iter().copied().collect()
    }
}

impl Clock for ManualClock {
    fn reset(&self) {
        let mut state = self.inner.lock();
        state.now = Duration::ZERO;
        state.sleeps.clear();
    }

    fn now(&self) -> AbsoluteTime {
        AbsoluteTime(self.inner.lock().now)
    }
}

impl Sleeper for ManualClock {
    fn sleep(&self, duration: Duration) -> Result<(), SleepError> {
        let mut state = self.inner.lock();
        if state.sleeps.len() == SLEEP_HISTORY {
            state.sleeps.pop_front();
        }
        state.sleeps.push_back(duration);
        state.now = state.now.saturating_add(duration);
        Ok(())
    }
}
