//! Scheduling policies.
//!
//! Rate-monotonic and EDF share the priority-driven loop in [`priority_driven`] and differ only in
//! how the ready queue is ordered. The cyclic executive in [`cyclic`] is table driven and keeps
//! no queues at all.

pub mod cyclic;
pub mod edf;
pub mod priority_driven;
pub mod rate_monotonic;

use crate::error::SchedulerError;
use std::fmt;
use std::str::FromStr;

/// Common surface of every scheduling policy.
pub trait Scheduler {
    fn policy_name(&self) -> &'static str;

    /// Admission control is not performed; every task set is accepted.
    fn is_feasible(&self) -> bool {
        true
    }

    /// Reset the clock and run the scheduling loop for the lifetime of the process.
    ///
    /// # Panics
    /// The cyclic executive panics if its frame signal closes, since no further minor-cycle
    /// boundary can ever arrive. The priority-driven policies never return or panic.
    fn start(&mut self) -> !;
}

/// Policy selector used by the demo binary and task-set configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    #[default]
    RateMonotonic,
    EarliestDeadlineFirst,
    Cyclic,
}

impl FromStr for PolicyKind {
    type Err = SchedulerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "rm" | "rate-monotonic" | "rate_monotonic" | "spf" => Ok(PolicyKind::RateMonotonic),
            "edf" | "earliest-deadline-first" | "earliest_deadline_first" => {
                Ok(PolicyKind::EarliestDeadlineFirst)
            }
            "cyclic" | "cyclic-executive" | "ce" => Ok(PolicyKind::Cyclic),
            _ => Err(SchedulerError::UnknownPolicy(value.to_string())),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PolicyKind::RateMonotonic => "rate-monotonic",
            PolicyKind::EarliestDeadlineFirst => "edf",
            PolicyKind::Cyclic => "cyclic",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_aliases() {
        assert_eq!("RM".parse::<PolicyKind>().unwrap(), PolicyKind::RateMonotonic);
        assert_eq!(
            "edf".parse::<PolicyKind>().unwrap(),
            PolicyKind::EarliestDeadlineFirst
        );
        assert_eq!("cyclic".parse::<PolicyKind>().unwrap(), PolicyKind::Cyclic);
        assert!(matches!(
            "lottery".parse::<PolicyKind>(),
            Err(SchedulerError::UnknownPolicy(name)) if name == "lottery"
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for kind in [
            PolicyKind::RateMonotonic,
            PolicyKind::EarliestDeadlineFirst,
            PolicyKind::Cyclic,
        ] {
            assert_eq!(kind.to_string().parse::<PolicyKind>().unwrap(), kind);
        }
    }
}
