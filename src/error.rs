//! Configuration errors reported when a scheduler or task set is built.
//!
//! Deadline misses are not errors: they are counted by [`crate::stats::MissStatistics`].

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task `{task}` has a zero period")]
    ZeroPeriod { task: String },

    #[error("task `{task}` has a zero relative deadline")]
    ZeroDeadline { task: String },

    #[error("cannot schedule an empty task set")]
    EmptyTaskSet,

    #[error("minor cycle {minor:?} must be non-zero and divide major cycle {major:?}")]
    InvalidCycleLengths { minor: Duration, major: Duration },

    #[error("cyclic schedule covers {planned} minor cycles but the major cycle holds {expected}")]
    SlotCountMismatch { planned: usize, expected: usize },

    #[error("cyclic plan references task index {index} but only {available} tasks exist")]
    UnknownTask { index: usize, available: usize },

    #[error("cyclic schedule repeats plan {plan} but only {available} plans are registered")]
    UnknownPlan { plan: usize, available: usize },

    #[error("minor-cycle boundary signal closed")]
    FrameSignalClosed,

    #[error("unknown scheduling policy `{0}`")]
    UnknownPolicy(String),

    #[error("failed to read task set: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
