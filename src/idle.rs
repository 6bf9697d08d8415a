//! Idle handling: park the scheduler thread until the next release instead of spinning.
//!
//! Sleeping has millisecond resolution. Requested intervals are rounded up to the next whole
//! millisecond so the scheduler never wakes before a release; the wake itself may still overshoot
//! by a few milliseconds.

use crate::time::AbsoluteTime;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SleepError {
    #[error("sleep interrupted after {elapsed:?} of {requested:?}")]
    Interrupted {
        requested: Duration,
        elapsed: Duration,
    },
}

/// Blocks the caller for approximately the requested duration.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> Result<(), SleepError>;
}

impl<S: Sleeper + ?Sized> Sleeper for Arc<S> {
    fn sleep(&self, duration: Duration) -> Result<(), SleepError> {
        (**self).sleep(duration)
    }
}

/// Timed wait on a condition variable that another thread can cut short.
#[derive(Debug, Default)]
pub struct ThreadSleeper {
    interrupted: Mutex<bool>,
    wakeup: Condvar,
}

impl ThreadSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake a thread blocked in [`Sleeper::sleep`]; its sleep returns `Interrupted`.
    ///
    /// An interrupt raised while nobody sleeps is delivered to the next sleep.
    pub fn interrupt(&self) {
        *self.interrupted.lock() = true;
        self.wakeup.notify_all();
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), SleepError> {
        let started = Instant::now();
        let wake_at = started + duration;
        let mut interrupted = self.interrupted.lock();
        loop {
            if *interrupted {
                *interrupted = false;
                return Err(SleepError::Interrupted {
                    requested: duration,
                    elapsed: started.elapsed(),
                });
            }
            if self.wakeup.wait_until(&mut interrupted, wake_at).timed_out() {
                return Ok(());
            }
        }
    }
}

/// Round a wait up to whole milliseconds.
pub fn round_up_to_millis(duration: Duration) -> Duration {
    let millis = duration.as_nanos().div_ceil(1_000_000);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

/// Computes how long the scheduler may idle and parks it for that long.
pub struct IdleController<S> {
    sleeper: S,
}

impl<S: Sleeper> IdleController<S> {
    pub fn new(sleeper: S) -> Self {
        Self { sleeper }
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Sleep from `now` until `next_release`. Returns the interval actually requested.
    ///
    /// Returns zero without sleeping when the release is not in the future. An interrupted
    /// sleep is logged and treated as an early wake.
    pub fn idle_until(&self, now: AbsoluteTime, next_release: AbsoluteTime) -> Duration {
        let wait = round_up_to_millis(next_release.subtract(now));
        if wait.is_zero() {
            return Duration::ZERO;
        }
        if let Err(err) = self.sleeper.sleep(wait) {
            warn!(%err, "idle wait was interrupted");
        }
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Clock, ManualClock};

    #[test]
    fn rounds_up_never_down() {
        assert_eq!(round_up_to_millis(Duration::ZERO), Duration::ZERO);
        assert_eq!(
            round_up_to_millis(Duration::from_micros(1)),
            Duration::from_millis(1)
        );
        assert_eq!(
            round_up_to_millis(Duration::from_micros(2_500)),
            Duration::from_millis(3)
        );
        assert_eq!(
            round_up_to_millis(Duration::from_millis(40)),
            Duration::from_millis(40)
        );
    }

    #[test]
    fn idle_until_sleeps_for_the_gap() {
        let clock = ManualClock::new();
        let idle = IdleController::new(clock.clone());
        let slept = idle.idle_until(AbsoluteTime::from_millis(10), AbsoluteTime::from_micros(14_200));
        assert_eq!(slept, Duration::from_millis(5));
        assert_eq!(clock.now(), AbsoluteTime::from_millis(5));
    }

    #[test]
    fn no_sleep_when_release_already_due() {
        let clock = ManualClock::new();
        let idle = IdleController::new(clock.clone());
        let slept = idle.idle_until(AbsoluteTime::from_millis(10), AbsoluteTime::from_millis(10));
        assert_eq!(slept, Duration::ZERO);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn thread_sleeper_waits_at_least_requested() {
        let sleeper = ThreadSleeper::new();
        let start = Instant::now();
        sleeper.sleep(Duration::from_millis(5)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn interrupt_wakes_sleeper_early() {
        let sleeper = Arc::new(ThreadSleeper::new());
        let waker = sleeper.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            waker.interrupt();
        });

        let start = Instant::now();
        let result = sleeper.sleep(Duration::from_secs(10));
        handle.join().unwrap();

        assert!(matches!(result, Err(SleepError::Interrupted { .. })));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn interrupted_idle_is_not_fatal() {
        let sleeper = ThreadSleeper::new();
        sleeper.interrupt();
        let idle = IdleController::new(sleeper);
        let slept = idle.idle_until(AbsoluteTime::ZERO, AbsoluteTime::from_millis(50));
        assert_eq!(slept, Duration::from_millis(50));
        // The pending interrupt was consumed by the first sleep.
        assert!(idle.sleeper().sleep(Duration::from_millis(1)).is_ok());
    }
}
