// Demo binary - runs a simulated periodic task set under one scheduling policy
//
// By default the robot-controller task set runs on the wall clock with busy-wait workloads. With
// `--duration-ms` the loop stops after that long and prints a JSON report; without it the
// scheduler runs until the process is killed.

use rt_scheduler::config::{SchedulerConfig, TaskSetConfig};
use rt_scheduler::error::SchedulerError;
use rt_scheduler::idle::{Sleeper, ThreadSleeper};
use rt_scheduler::scheduler::cyclic::{
    robot_controller_schedule, CyclicSchedule, CyclicScheduler, FrameSignal, ManualFrameSignal,
    TickerFrameSignal,
};
use rt_scheduler::scheduler::edf::EarliestDeadlineFirst;
use rt_scheduler::scheduler::priority_driven::{PriorityDrivenScheduler, ReadyPolicy};
use rt_scheduler::scheduler::rate_monotonic::RateMonotonic;
use rt_scheduler::scheduler::{PolicyKind, Scheduler};
use rt_scheduler::task::{PeriodicTask, TaskHandle};
use rt_scheduler::threading::{pin_current_thread, promote_scheduler_thread};
use rt_scheduler::time::{AbsoluteTime, Clock, HighResolutionClock, ManualClock};
use rt_scheduler::workload::{ExecutionModel, SimulatedTask};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line options parsed from program arguments.
struct CliOptions {
    policy: PolicyKind,
    /// JSON task-set file; the robot-controller set when absent.
    tasks: Option<PathBuf>,
    /// Stop after this long and print a report; run forever when absent.
    duration: Option<Duration>,
    /// Run on a simulated clock instead of the wall clock.
    simulated: bool,
    core: Option<usize>,
}

fn parse_cli_options() -> Result<CliOptions, String> {
    let mut options = CliOptions {
        policy: PolicyKind::default(),
        tasks: None,
        duration: None,
        simulated: false,
        core: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let (key, inline_value) = match arg.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (arg.clone(), None),
        };
        if key == "--simulated" {
            options.simulated = true;
            continue;
        }
        let value = match inline_value.or_else(|| args.next()) {
            Some(value) => value,
            None => return Err(format!("missing value for {key}")),
        };
        match key.as_str() {
            "--policy" | "--scheduler" => {
                options.policy = value.parse().map_err(|e: SchedulerError| e.to_string())?;
            }
            "--tasks" => options.tasks = Some(PathBuf::from(value)),
            "--duration-ms" => {
                let millis: u64 = value
                    .parse()
                    .map_err(|_| format!("invalid duration `{value}`"))?;
                options.duration = Some(Duration::from_millis(millis));
            }
            "--core" => {
                let core = value.parse().map_err(|_| format!("invalid core `{value}`"))?;
                options.core = Some(core);
            }
            _ => return Err(format!("unknown option {key}")),
        }
    }
    Ok(options)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    init_tracing();

    let options = match parse_cli_options() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            eprintln!(
                "usage: rt_scheduler [--policy rm|edf|cyclic] [--tasks FILE] [--duration-ms N] [--simulated] [--core N]"
            );
            std::process::exit(2);
        }
    };

    if let Err(err) = run(options) {
        error!(%err, "scheduler failed");
        std::process::exit(1);
    }
}

fn run(options: CliOptions) -> Result<(), SchedulerError> {
    let task_set = match &options.tasks {
        Some(path) => TaskSetConfig::load(path)?,
        None => TaskSetConfig::robot_controller(),
    };

    if let Some(core) = options.core {
        if let Err(err) = pin_current_thread(core) {
            warn!(%err, core, "could not pin scheduler thread");
        }
    }
    if !options.simulated {
        if let Err(err) = promote_scheduler_thread() {
            warn!(%err, "running without real-time priority");
        }
    }

    info!(policy = %options.policy, tasks = task_set.tasks.len(), simulated = options.simulated, "starting");

    if options.simulated {
        let clock = ManualClock::new();
        let execution = ExecutionModel::Simulated(clock.clone());
        let tasks = build_tasks(&task_set, &execution);
        // Simulated runs always stop; default to one major cycle of the robot table.
        let duration = options.duration.unwrap_or(Duration::from_secs(1));
        match options.policy {
            PolicyKind::Cyclic => {
                let schedule = robot_controller_schedule();
                let frames = ManualFrameSignal::new(clock.clone(), schedule.minor_cycle());
                run_cyclic(&tasks, schedule, clock, frames, Some(duration))
            }
            PolicyKind::RateMonotonic => {
                run_priority_driven::<RateMonotonic, _, _>(&tasks, clock.clone(), clock, Some(duration))
            }
            PolicyKind::EarliestDeadlineFirst => run_priority_driven::<EarliestDeadlineFirst, _, _>(
                &tasks,
                clock.clone(),
                clock,
                Some(duration),
            ),
        }
    } else {
        let tasks = build_tasks(&task_set, &ExecutionModel::Spin);
        let clock = HighResolutionClock::new();
        match options.policy {
            PolicyKind::Cyclic => {
                let schedule = robot_controller_schedule();
                let frames = TickerFrameSignal::new(schedule.minor_cycle());
                run_cyclic(&tasks, schedule, clock, frames, options.duration)
            }
            PolicyKind::RateMonotonic => run_priority_driven::<RateMonotonic, _, _>(
                &tasks,
                clock,
                ThreadSleeper::new(),
                options.duration,
            ),
            PolicyKind::EarliestDeadlineFirst => run_priority_driven::<EarliestDeadlineFirst, _, _>(
                &tasks,
                clock,
                ThreadSleeper::new(),
                options.duration,
            ),
        }
    }
}

fn build_tasks(task_set: &TaskSetConfig, execution: &ExecutionModel) -> Vec<Arc<SimulatedTask>> {
    task_set
        .tasks
        .iter()
        .map(|spec| Arc::new(SimulatedTask::from_spec(spec, execution.clone())))
        .collect()
}

fn handles(tasks: &[Arc<SimulatedTask>]) -> Vec<TaskHandle> {
    tasks
        .iter()
        .map(|task| task.clone() as TaskHandle)
        .collect()
}

fn run_priority_driven<P, C, S>(
    tasks: &[Arc<SimulatedTask>],
    clock: C,
    sleeper: S,
    duration: Option<Duration>,
) -> Result<(), SchedulerError>
where
    P: ReadyPolicy,
    C: Clock,
    S: Sleeper,
{
    let mut scheduler = PriorityDrivenScheduler::<P, C, S>::new(
        handles(tasks),
        clock,
        sleeper,
        SchedulerConfig::default(),
    )?;
    let Some(duration) = duration else {
        scheduler.start()
    };

    scheduler.reset_clock();
    scheduler.run_until(AbsoluteTime::from_duration(duration));
    println!("{}", scheduler.snapshot().to_json()?);
    Ok(())
}

fn run_cyclic<C, F>(
    tasks: &[Arc<SimulatedTask>],
    schedule: CyclicSchedule,
    clock: C,
    frames: F,
    duration: Option<Duration>,
) -> Result<(), SchedulerError>
where
    C: Clock,
    F: FrameSignal,
{
    let major_cycle = schedule.major_cycle();
    let mut scheduler = CyclicScheduler::new(handles(tasks), schedule, clock, frames)?;
    let Some(duration) = duration else {
        scheduler.start()
    };

    scheduler.mark_start();
    let major_cycles = duration.as_nanos().div_ceil(major_cycle.as_nanos()).max(1);
    for _ in 0..major_cycles {
        scheduler.run_major_cycle()?;
    }
    for task in tasks {
        info!(
            task = task.name(),
            activations = task.activations(),
            slices = task.slices_run(),
            "cyclic run finished"
        );
    }
    Ok(())
}
