// Scenario tests for the priority-driven schedulers, run on a simulated clock

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rt_scheduler::config::{MissHandling, SchedulerConfig};
    use rt_scheduler::idle::Sleeper;
    use rt_scheduler::scheduler::edf::{EarliestDeadlineFirst, EarliestDeadlineFirstScheduler};
    use rt_scheduler::scheduler::priority_driven::{
        PriorityDrivenScheduler, QueueKind, ReadyPolicy, StepOutcome,
    };
    use rt_scheduler::scheduler::rate_monotonic::{RateMonotonic, RateMonotonicScheduler};
    use rt_scheduler::task::{ReleaseParameters, TaskHandle};
    use rt_scheduler::time::{AbsoluteTime, Clock, ManualClock};
    use rt_scheduler::workload::{ExecutionModel, SimulatedTask};

    fn simulated(
        clock: &ManualClock,
        name: &str,
        period_ms: u64,
        deadline_ms: u64,
        cost_ms: u64,
        slices: u32,
    ) -> Arc<SimulatedTask> {
        Arc::new(SimulatedTask::new(
            name,
            ReleaseParameters::implicit(Duration::from_millis(period_ms))
                .with_deadline(Duration::from_millis(deadline_ms)),
            Duration::from_millis(cost_ms),
            slices,
            ExecutionModel::Simulated(clock.clone()),
        ))
    }

    fn handles(tasks: &[Arc<SimulatedTask>]) -> Vec<TaskHandle> {
        tasks.iter().map(|t| t.clone() as TaskHandle).collect()
    }

    fn quiet() -> SchedulerConfig {
        SchedulerConfig {
            report_interval: 0,
            ..SchedulerConfig::default()
        }
    }

    /// Step until `horizon`, checking per-iteration invariants along the way.
    fn run_checked<P, C, S>(
        scheduler: &mut PriorityDrivenScheduler<P, C, S>,
        clock: &ManualClock,
        horizon: AbsoluteTime,
    ) -> Vec<StepOutcome>
    where
        P: ReadyPolicy,
        C: Clock,
        S: Sleeper,
    {
        let mut outcomes = Vec::new();
        while horizon.is_greater_than(clock.now()) {
            let outcome = scheduler.step();
            for id in 0..scheduler.task_count() {
                assert_eq!(scheduler.locate(id).len(), 1, "task {id} must be in one queue");
                let d = scheduler.descriptor(id).unwrap();
                assert_eq!(d.deadline(), d.next_release() + d.relative_deadline());
            }
            if outcome.slept.is_some() {
                assert_eq!(outcome.missed, 0);
                assert!(outcome.dispatched.is_none());
                assert_eq!(scheduler.ready_len(), 0);
            }
            if outcome.missed > 0 {
                assert!(outcome.dispatched.is_none());
                assert!(outcome.slept.is_none());
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    #[test]
    fn rate_monotonic_runs_fastest_task_every_period() {
        let clock = ManualClock::new();
        let tasks = vec![
            simulated(&clock, "a", 100, 100, 50, 1),
            simulated(&clock, "b", 200, 200, 50, 1),
            simulated(&clock, "c", 300, 300, 50, 1),
        ];
        let mut scheduler =
            RateMonotonicScheduler::new(handles(&tasks), clock.clone(), clock.clone(), quiet())
                .unwrap();
        scheduler.reset_clock();

        run_checked(&mut scheduler, &clock, AbsoluteTime::from_millis(1200));

        let expected: Vec<_> = (0..12).map(|i| AbsoluteTime::from_millis(i * 100)).collect();
        assert_eq!(tasks[0].slice_starts(), expected);
        assert_eq!(scheduler.stats().missed(), 0);
        assert!(tasks.iter().all(|t| t.misses() == 0));
        // Hyperperiod of 600ms: b runs 3 times and c twice per hyperperiod.
        assert_eq!(tasks[1].slices_run(), 6);
        assert_eq!(tasks[2].slices_run(), 4);
    }

    #[test]
    fn rate_monotonic_sleeps_until_next_release() {
        let clock = ManualClock::new();
        let tasks = vec![simulated(&clock, "sensor", 20, 20, 5, 1)];
        let mut scheduler =
            RateMonotonicScheduler::new(handles(&tasks), clock.clone(), clock.clone(), quiet())
                .unwrap();

        let outcomes = run_checked(&mut scheduler, &clock, AbsoluteTime::from_millis(100));
        let sleeps: Vec<_> = outcomes.iter().filter_map(|o| o.slept).collect();
        assert_eq!(sleeps.len(), 5);
        assert!(sleeps.iter().all(|s| *s == Duration::from_millis(15)));
        assert_eq!(scheduler.stats().completed(), 5);
    }

    #[test]
    fn multi_slice_activation_completes_before_rescheduling() {
        let clock = ManualClock::new();
        let tasks = vec![simulated(&clock, "planner", 100, 100, 30, 3)];
        let mut scheduler =
            RateMonotonicScheduler::new(handles(&tasks), clock.clone(), clock.clone(), quiet())
                .unwrap();

        let first = scheduler.step();
        let dispatch = first.dispatched.unwrap();
        assert!(!dispatch.finished);
        assert_eq!(scheduler.locate(0), vec![QueueKind::Ready]);

        scheduler.step();
        let third = scheduler.step();
        assert!(third.dispatched.unwrap().finished);
        assert_eq!(scheduler.locate(0), vec![QueueKind::Suspended]);
        assert_eq!(
            scheduler.descriptor(0).unwrap().next_release(),
            AbsoluteTime::from_millis(100)
        );
    }

    #[test]
    fn edf_overrunning_task_misses_every_activation() {
        let clock = ManualClock::new();
        let tasks = vec![simulated(&clock, "overrun", 10, 10, 15, 1)];
        let mut scheduler = EarliestDeadlineFirstScheduler::new(
            handles(&tasks),
            clock.clone(),
            clock.clone(),
            quiet(),
        )
        .unwrap();

        let outcomes = run_checked(&mut scheduler, &clock, AbsoluteTime::from_millis(1_000));

        let late: Vec<_> = outcomes.iter().filter_map(|o| o.dispatched).collect();
        assert!(late.len() > 10);
        assert!(late.iter().all(|d| d.finished && d.late));
        assert_eq!(scheduler.stats().completed(), 0);
        assert!(scheduler.stats().missed() > 60);
        assert_eq!(scheduler.stats().miss_ratio(), 1.0);
        assert_eq!(tasks[0].misses(), scheduler.stats().missed());
    }

    #[test]
    fn edf_meets_deadlines_at_high_utilisation() {
        let clock = ManualClock::new();
        // Utilisation 2/5 + 4/7 is just under 1.
        let tasks = vec![
            simulated(&clock, "short", 5, 5, 2, 1),
            simulated(&clock, "long", 7, 7, 4, 1),
        ];
        let mut scheduler = EarliestDeadlineFirstScheduler::new(
            handles(&tasks),
            clock.clone(),
            clock.clone(),
            quiet(),
        )
        .unwrap();

        run_checked(&mut scheduler, &clock, AbsoluteTime::from_millis(35));
        assert!(scheduler.stats().completed() >= 10);
        assert_eq!(scheduler.stats().missed(), 0);
    }

    fn converge<P: ReadyPolicy>(
        periods_behind: u64,
        handling: MissHandling,
    ) -> (u64, u64, AbsoluteTime, AbsoluteTime) {
        let clock = ManualClock::new();
        let tasks = vec![simulated(&clock, "late", 10, 10, 1, 1)];
        let config = SchedulerConfig {
            report_interval: 0,
            miss_handling: Some(handling),
        };
        let mut scheduler = PriorityDrivenScheduler::<P, _, _>::new(
            handles(&tasks),
            clock.clone(),
            clock.clone(),
            config,
        )
        .unwrap();

        // Deadlines at 10, 20, ... have all elapsed by `periods_behind * 10 + 5`.
        clock.set(AbsoluteTime::from_millis(periods_behind * 10 + 5));
        let mut passes = 0;
        loop {
            let outcome = scheduler.step();
            if outcome.missed == 0 {
                break;
            }
            passes += 1;
        }
        // The converging pass also dispatched the task, moving it one more period ahead.
        let descriptor = scheduler.descriptor(0).unwrap();
        let release = descriptor.next_release();
        let deadline = descriptor.deadline();
        (scheduler.stats().missed(), passes, release, deadline)
    }

    #[test]
    fn skip_ahead_and_single_step_converge_to_same_state() {
        for k in 1..=6 {
            let (skip_misses, skip_passes, skip_release, skip_deadline) =
                converge::<RateMonotonic>(k, MissHandling::SkipAhead);
            let (step_misses, step_passes, step_release, step_deadline) =
                converge::<EarliestDeadlineFirst>(k, MissHandling::SingleStep);

            assert_eq!(skip_misses, k);
            assert_eq!(step_misses, k);
            assert_eq!(skip_passes, 1);
            assert_eq!(step_passes, k);
            assert_eq!(skip_release, step_release);
            assert_eq!(skip_deadline, step_deadline);
            assert_eq!(skip_release, AbsoluteTime::from_millis((k + 1) * 10));
        }
    }
}
