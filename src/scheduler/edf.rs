//! Earliest-deadline-first policy.
//!
//! The ready queue is ordered by each task's current absolute deadline, recomputed every period.
//! By default a missed deadline advances the task by a single period and the next release
//! re-checks it, so a task that is `k` periods behind is reported over `k` loop passes.

use crate::config::MissHandling;
use crate::descriptor::TaskDescriptor;
use crate::queue::QueueOrder;
use crate::scheduler::priority_driven::{PriorityDrivenScheduler, ReadyPolicy};
use crate::time::AbsoluteTime;

/// Ready-queue ordering for EDF scheduling.
pub struct EarliestDeadlineFirst;

impl QueueOrder<TaskDescriptor> for EarliestDeadlineFirst {
    type Key = AbsoluteTime;

    fn key(item: &TaskDescriptor) -> AbsoluteTime {
        item.deadline()
    }
}

impl ReadyPolicy for EarliestDeadlineFirst {
    const NAME: &'static str = "Earliest Deadline First";
    const MISS_HANDLING: MissHandling = MissHandling::SingleStep;
}

pub type EarliestDeadlineFirstScheduler<C, S> =
    PriorityDrivenScheduler<EarliestDeadlineFirst, C, S>;
