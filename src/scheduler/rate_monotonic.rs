//! Rate-monotonic ("shortest period first") policy.
//!
//! Each task gets a static priority derived from its period: `MAX_PRIORITY` minus the period in
//! microseconds. Higher priority runs first, so the ready queue is ordered by descending priority,
//! i.e. ascending period. Missed periods are skipped in a single pass by default.

use crate::config::MissHandling;
use crate::descriptor::TaskDescriptor;
use crate::queue::QueueOrder;
use crate::scheduler::priority_driven::{PriorityDrivenScheduler, ReadyPolicy};
use std::cmp::Reverse;
use std::time::Duration;

/// Largest static priority; a task with a zero-length period would get exactly this.
pub const MAX_PRIORITY: u64 = u64::MAX;

/// Static rate-monotonic priority for a period.
///
/// Only periods longer than `u64::MAX` microseconds (over 500 000 years) collapse to priority 0.
pub fn rate_monotonic_priority(period: Duration) -> u64 {
    let micros = u64::try_from(period.as_micros()).unwrap_or(u64::MAX);
    MAX_PRIORITY.saturating_sub(micros)
}

/// Ready-queue ordering for rate-monotonic scheduling.
pub struct RateMonotonic;

impl QueueOrder<TaskDescriptor> for RateMonotonic {
    type Key = Reverse<u64>;

    fn key(item: &TaskDescriptor) -> Reverse<u64> {
        Reverse(rate_monotonic_priority(item.period()))
    }
}

impl ReadyPolicy for RateMonotonic {
    const NAME: &'static str = "Shortest Period First";
    const MISS_HANDLING: MissHandling = MissHandling::SkipAhead;
}

pub type RateMonotonicScheduler<C, S> = PriorityDrivenScheduler<RateMonotonic, C, S>;
