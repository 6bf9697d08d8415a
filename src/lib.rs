//! Scheduling core for periodic, deadline-bound control tasks.
//!
//! Three interchangeable policies are provided: rate-monotonic and earliest-deadline-first, which
//! share a release/run/reschedule loop over a suspended list and a ready list, and a table-driven
//! cyclic executive.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod idle;
pub mod queue;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod threading;
pub mod time;
pub mod workload;

pub use config::{MissHandling, SchedulerConfig, TaskSetConfig, TaskSpec};
pub use error::SchedulerError;
pub use scheduler::cyclic::{robot_controller_schedule, CyclicSchedule, CyclicScheduler};
pub use scheduler::edf::EarliestDeadlineFirstScheduler;
pub use scheduler::rate_monotonic::RateMonotonicScheduler;
pub use scheduler::{PolicyKind, Scheduler};
pub use task::{PeriodicTask, ReleaseParameters, TaskHandle};
pub use time::{AbsoluteTime, Clock, HighResolutionClock, ManualClock};
