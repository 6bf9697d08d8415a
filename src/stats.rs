//! Deadline-miss accounting.
//!
//! The schedulers count missed and completed activations and periodically log the running miss
//! ratio. These numbers are an observability signal only; nothing in the scheduling decision
//! depends on them.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Default number of loop iterations between miss-ratio reports.
pub const DEFAULT_REPORT_INTERVAL: u64 = 10_000;

/// Running miss/completion counters for one scheduler.
#[derive(Debug, Clone)]
pub struct MissStatistics {
    missed: u64,
    completed: u64,
    iterations: u64,
    report_interval: u64,
    since_report: u64,
}

impl MissStatistics {
    /// A `report_interval` of zero disables periodic reporting.
    pub fn new(report_interval: u64) -> Self {
        Self {
            missed: 0,
            completed: 0,
            iterations: 0,
            report_interval,
            since_report: 0,
        }
    }

    pub fn record_misses(&mut self, count: u64) {
        self.missed += count;
    }

    pub fn record_completion(&mut self) {
        self.completed += 1;
    }

    pub fn missed(&self) -> u64 {
        self.missed
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// `missed / (missed + completed)`, or zero before any activation has been accounted.
    pub fn miss_ratio(&self) -> f64 {
        let total = self.missed + self.completed;
        if total == 0 {
            0.0
        } else {
            self.missed as f64 / total as f64
        }
    }

    /// Close one scheduler iteration. Returns `true` when a report was emitted.
    pub fn end_iteration(&mut self, policy: &str) -> bool {
        self.iterations += 1;
        if self.report_interval == 0 {
            return false;
        }
        self.since_report += 1;
        if self.since_report < self.report_interval {
            return false;
        }
        self.since_report = 0;
        info!(
            policy,
            missed = self.missed,
            completed = self.completed,
            miss_ratio = self.miss_ratio(),
            "miss ratio report"
        );
        true
    }
}

impl Default for MissStatistics {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_INTERVAL)
    }
}

/// Per-task counters included in a [`StatsSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub name: String,
    pub misses: u64,
    pub completions: u64,
}

/// Serializable view of a scheduler's counters, suitable for JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub policy: String,
    pub iterations: u64,
    pub missed: u64,
    pub completed: u64,
    pub miss_ratio: f64,
    pub tasks: Vec<TaskStats>,
}

impl StatsSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_zero_without_activations() {
        let stats = MissStatistics::default();
        assert_eq!(stats.miss_ratio(), 0.0);
    }

    #[test]
    fn ratio_counts_misses_over_all_activations() {
        let mut stats = MissStatistics::default();
        stats.record_misses(3);
        stats.record_completion();
        assert_eq!(stats.missed(), 3);
        assert_eq!(stats.completed(), 1);
        assert!((stats.miss_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn reports_every_interval() {
        let mut stats = MissStatistics::new(3);
        let reports: Vec<bool> = (0..7).map(|_| stats.end_iteration("test")).collect();
        assert_eq!(reports, vec![false, false, true, false, false, true, false]);
        assert_eq!(stats.iterations(), 7);
    }

    #[test]
    fn zero_interval_disables_reports() {
        let mut stats = MissStatistics::new(0);
        assert!((0..100).all(|_| !stats.end_iteration("test")));
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let snapshot = StatsSnapshot {
            policy: "Earliest Deadline First".into(),
            iterations: 10,
            missed: 1,
            completed: 4,
            miss_ratio: 0.2,
            tasks: vec![TaskStats {
                name: "actuator".into(),
                misses: 1,
                completions: 4,
            }],
        };
        let json = snapshot.to_json().unwrap();
        let parsed: StatsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tasks[0].name, "actuator");
        assert_eq!(parsed.missed, 1);
    }
}
