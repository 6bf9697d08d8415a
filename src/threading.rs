//! Real-time priority and CPU pinning for the scheduler thread.
//!
//! Both helpers are best effort. On Linux they use `pthread_setschedparam` and
//! `pthread_setaffinity_np`, which usually require `CAP_SYS_NICE` or root; elsewhere they are
//! no-ops that report success.

use std::io;

/// `SCHED_FIFO` priority given to the scheduler thread on Linux.
pub const SCHEDULER_RT_PRIORITY: i32 = 90;

/// Put the calling thread under `SCHED_FIFO` so task slices are not preempted by ordinary
/// processes.
pub fn promote_scheduler_thread() -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use libc::{pthread_self, pthread_setschedparam, sched_param, SCHED_FIFO};

        // SAFETY: `param` is fully initialised and `pthread_self` is always a valid handle.
        let rc = unsafe {
            let mut param: sched_param = std::mem::zeroed();
            param.sched_priority = SCHEDULER_RT_PRIORITY;
            pthread_setschedparam(pthread_self(), SCHED_FIFO, &param)
        };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
    }
    Ok(())
}

/// Restrict the calling thread to a single core.
pub fn pin_current_thread(core_id: usize) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use libc::{cpu_set_t, pthread_self, pthread_setaffinity_np, CPU_SET, CPU_ZERO};

        // SAFETY: the cpu set is zero-initialised before use and sized by `size_of`.
        let rc = unsafe {
            let mut set: cpu_set_t = std::mem::zeroed();
            CPU_ZERO(&mut set);
            CPU_SET(core_id, &mut set);
            pthread_setaffinity_np(pthread_self(), std::mem::size_of::<cpu_set_t>(), &set)
        };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = core_id;
    }
    Ok(())
}
