//! Scheduler and task-set configuration.
//!
//! [`SchedulerConfig`] tunes the priority-driven loop. [`TaskSetConfig`] describes a simulated
//! task set for the demo binary and can be loaded from JSON.

use crate::error::SchedulerError;
use crate::stats::DEFAULT_REPORT_INTERVAL;
use crate::task::ReleaseParameters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How a ready task whose deadline has already passed is rolled forward.
///
/// Both conventions end in the same release, deadline and total miss count. They differ in how
/// the misses are reported along the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissHandling {
    /// Skip every elapsed period in one pass and count them all at once. The miss handler runs
    /// once per pass.
    SkipAhead,
    /// Advance a single period per pass and re-check on the next release. The miss handler runs
    /// once per missed period.
    SingleStep,
}

/// Tuning knobs for the rate-monotonic and EDF schedulers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Loop iterations between miss-ratio log lines; zero disables them.
    pub report_interval: u64,
    /// Overrides the policy's own miss-handling convention when set.
    pub miss_handling: Option<MissHandling>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            report_interval: DEFAULT_REPORT_INTERVAL,
            miss_handling: None,
        }
    }
}

/// One simulated periodic task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub period_ms: u64,
    /// Relative deadline; defaults to the period.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub start_ms: u64,
    /// Execution time of one activation.
    pub cost_ms: u64,
    /// Number of slices one activation is split into.
    #[serde(default = "default_slices")]
    pub slices: u32,
}

fn default_slices() -> u32 {
    1
}

impl TaskSpec {
    pub fn new(name: &str, period_ms: u64, cost_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            period_ms,
            deadline_ms: None,
            start_ms: 0,
            cost_ms,
            slices: 1,
        }
    }

    pub fn release_parameters(&self) -> ReleaseParameters {
        ReleaseParameters::implicit(Duration::from_millis(self.period_ms))
            .with_deadline(Duration::from_millis(
                self.deadline_ms.unwrap_or(self.period_ms),
            ))
            .with_start(Duration::from_millis(self.start_ms))
    }

    pub fn cost(&self) -> Duration {
        Duration::from_millis(self.cost_ms)
    }
}

/// A task set, in the order tasks are handed to a scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSetConfig {
    pub tasks: Vec<TaskSpec>,
}

impl TaskSetConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SchedulerError> {
        let config: TaskSetConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.tasks.is_empty() {
            return Err(SchedulerError::EmptyTaskSet);
        }
        for spec in &self.tasks {
            spec.release_parameters().validate(&spec.name)?;
        }
        Ok(())
    }

    /// The robot-controller task set: image processing, three planners, three reactors and the
    /// actuator, in the index order the cyclic table expects.
    pub fn robot_controller() -> Self {
        let planner = |name: &str| TaskSpec {
            slices: 2,
            ..TaskSpec::new(name, 150, 6)
        };
        let planners = [
            planner("planner-1"),
            planner("planner-2"),
            planner("planner-3"),
        ];
        let reactor = |name: &str| TaskSpec::new(name, 50, 2);
        let mut tasks = vec![TaskSpec::new("image-processing", 50, 10)];
        tasks.extend(planners);
        tasks.extend([reactor("reactor-1"), reactor("reactor-2"), reactor("reactor-3")]);
        tasks.push(TaskSpec::new("actuator", 50, 3));
        Self { tasks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_task_set_with_defaults() {
        let json = r#"{
            "tasks": [
                { "name": "sensor", "period_ms": 20, "cost_ms": 4 },
                { "name": "planner", "period_ms": 100, "deadline_ms": 80, "start_ms": 5, "cost_ms": 30, "slices": 3 }
            ]
        }"#;
        let config = TaskSetConfig::from_json_str(json).unwrap();
        assert_eq!(config.tasks.len(), 2);

        let sensor = config.tasks[0].release_parameters();
        assert_eq!(sensor.deadline, Duration::from_millis(20));
        assert_eq!(sensor.start, Duration::ZERO);
        assert_eq!(config.tasks[0].slices, 1);

        let planner = config.tasks[1].release_parameters();
        assert_eq!(planner.deadline, Duration::from_millis(80));
        assert_eq!(planner.start, Duration::from_millis(5));
        assert_eq!(config.tasks[1].slices, 3);
    }

    #[test]
    fn rejects_zero_period() {
        let json = r#"{ "tasks": [ { "name": "bad", "period_ms": 0, "cost_ms": 1 } ] }"#;
        assert!(matches!(
            TaskSetConfig::from_json_str(json),
            Err(SchedulerError::ZeroPeriod { .. })
        ));
    }

    #[test]
    fn rejects_empty_task_set() {
        assert!(matches!(
            TaskSetConfig::from_json_str(r#"{ "tasks": [] }"#),
            Err(SchedulerError::EmptyTaskSet)
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            TaskSetConfig::from_json_str("{ tasks: "),
            Err(SchedulerError::Parse(_))
        ));
    }

    #[test]
    fn robot_controller_has_eight_tasks() {
        let config = TaskSetConfig::robot_controller();
        assert_eq!(config.tasks.len(), 8);
        assert_eq!(config.tasks[0].name, "image-processing");
        assert_eq!(config.tasks[7].name, "actuator");
        assert!(config.validate().is_ok());
    }
}
