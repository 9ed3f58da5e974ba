//! Cyclic control loop: read → update → write with drift-free pacing.
//!
//! ## RT setup sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` to lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` to pin the loop to an isolated core.
//! 4. `sched_setscheduler(SCHED_FIFO)` for RT priority.
//!
//! ## Pacing
//! With the `rt` feature the loop sleeps on `clock_nanosleep(TIMER_ABSTIME)`
//! against `CLOCK_MONOTONIC`; without it, `std::thread::sleep` gives
//! approximate timing for simulation.
//!
//! ## Tick body
//! The write phase runs entirely under the loop gate: run the controller
//! host, enforce limits, push the live commands. While the arbiter has the
//! gate's pause flag set the write phase is skipped, so a mode-switch batch
//! never interleaves with command application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::arbiter::Gate;
use crate::layer::Layer;
use crate::stack::{AxisSet, ControlStack};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics, updated without allocation.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl CycleStats {
    /// New zeroed stats.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record one cycle. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
        if latency_ns > self.max_latency_ns {
            self.max_latency_ns = latency_ns;
        }
    }

    /// Average cycle time [ns] (0 before the first cycle).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Controller Host ────────────────────────────────────────────────

/// The per-tick controller computation.
///
/// Called once per non-paused tick with the measured period. `reset` is set
/// on the first tick after a mode-switch batch so the host can clear its
/// internal controller state (integrators, trajectory interpolators) before
/// producing commands against the new modes.
pub trait ControllerHost: Send {
    fn update(&mut self, period: Duration, reset: bool, axes: &mut AxisSet);
}

/// A host that computes nothing. Axes coast on their last commands.
pub struct NullHost;

impl ControllerHost for NullHost {
    fn update(&mut self, _period: Duration, _reset: bool, _axes: &mut AxisSet) {}
}

// ─── Control Cycle Layer ────────────────────────────────────────────

/// Layer that owns the gated write phase of each tick.
///
/// Lock order is gate before axis set, matching the arbiter.
pub struct ControlCycle {
    gate: Arc<Mutex<Gate>>,
    axes: Arc<Mutex<AxisSet>>,
    host: Box<dyn ControllerHost>,
    period: Duration,
    last_tick: Option<Instant>,
}

impl ControlCycle {
    /// New cycle layer over the shared gate and axis set.
    pub fn new(
        gate: Arc<Mutex<Gate>>,
        axes: Arc<Mutex<AxisSet>>,
        host: Box<dyn ControllerHost>,
        period: Duration,
    ) -> Self {
        Self {
            gate,
            axes,
            host,
            period,
            last_tick: None,
        }
    }

}

impl Layer for ControlCycle {
    fn name(&self) -> &str {
        "control cycle"
    }

    fn read(&mut self) -> bool {
        true
    }

    fn write(&mut self) -> bool {
        // Timestamp before taking the gate so paused ticks still advance
        // last_tick and the first post-pause dt spans one period, not the
        // whole pause window.
        let now = Instant::now();
        let dt = match self.last_tick {
            Some(prev) => now.duration_since(prev),
            None => self.period,
        };
        self.last_tick = Some(now);

        // Lock through a clone so the guard does not pin `self` while the
        // host gets mutable access below.
        let gate = Arc::clone(&self.gate);
        let mut gate = gate.lock().unwrap_or_else(|e| e.into_inner());
        if gate.paused {
            // A switch batch is in flight; skip the whole write phase.
            return true;
        }
        let reset = std::mem::take(&mut gate.recover);

        let mut axes = self.axes.lock().unwrap_or_else(|e| e.into_inner());
        self.host.update(dt, reset, &mut axes);
        axes.enforce_limits(dt.as_secs_f64());
        axes.apply_all()
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Errors during RT setup or loop execution.
#[derive(Debug)]
pub enum CycleError {
    /// RT system call failed.
    RtSetup(String),
    /// Cycle overrun detected under the RT scheduler.
    CycleOverrun {
        /// Actual cycle duration [ns].
        actual_ns: i64,
        /// Configured cycle budget [ns].
        budget_ns: i64,
    },
    /// A layer reported failure during the loop.
    LayerFault(&'static str),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RtSetup(msg) => write!(f, "RT setup error: {msg}"),
            Self::CycleOverrun {
                actual_ns,
                budget_ns,
            } => write!(f, "cycle overrun: {actual_ns}ns > {budget_ns}ns budget"),
            Self::LayerFault(phase) => write!(f, "layer fault in {phase} phase"),
        }
    }
}

impl std::error::Error for CycleError {}

/// Lock all current and future memory pages.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(()) // No-op in simulation mode
}

/// Prefault stack pages so the loop never page-faults.
fn prefault_stack() {
    let mut buf = [0u8; 1024 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to a specific CPU core.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(()) // No-op in simulation mode
}

/// Set SCHED_FIFO with the given RT priority.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(()) // No-op in simulation mode
}

/// Full RT setup sequence; call before entering the loop.
///
/// In simulation mode (no `rt` feature) the RT calls are no-ops.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Loop Runner ────────────────────────────────────────────────────

/// Drives the assembled stack at the configured cycle time.
pub struct LoopRunner {
    stack: ControlStack,
    cycle_time_ns: i64,
    stats: CycleStats,
    stop: Arc<AtomicBool>,
}

impl LoopRunner {
    /// New runner; `stop` terminates the loop cleanly when set.
    pub fn new(stack: ControlStack, cycle_time: Duration, stop: Arc<AtomicBool>) -> Self {
        Self {
            stack,
            cycle_time_ns: cycle_time.as_nanos() as i64,
            stats: CycleStats::new(),
            stop,
        }
    }

    /// Timing statistics so far.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Init all layers and enter the loop; returns on stop or fault.
    pub fn run(&mut self) -> Result<(), CycleError> {
        if !self.stack.init() {
            return Err(CycleError::LayerFault("init"));
        }
        info!(cycle_time_ns = self.cycle_time_ns, "entering control loop");

        let result = {
            #[cfg(feature = "rt")]
            {
                self.run_rt_loop()
            }
            #[cfg(not(feature = "rt"))]
            {
                self.run_sim_loop()
            }
        };

        self.stack.shutdown();
        info!(
            cycles = self.stats.cycle_count,
            avg_ns = self.stats.avg_cycle_ns(),
            max_ns = self.stats.max_cycle_ns,
            overruns = self.stats.overruns,
            "control loop exited"
        );
        result
    }

    fn tick(&mut self) -> Result<(), CycleError> {
        if !self.stack.read() {
            return Err(CycleError::LayerFault("read"));
        }
        if !self.stack.write() {
            return Err(CycleError::LayerFault("write"));
        }
        Ok(())
    }

    /// RT loop on `clock_nanosleep(TIMER_ABSTIME)`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        while !self.stop.load(Ordering::Relaxed) {
            next_wake = timespec_add_ns(next_wake, self.cycle_time_ns);

            let cycle_start = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let wake_latency_ns = timespec_diff_ns(&cycle_start, &next_wake).abs();

            self.tick()?;

            let cycle_end = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);

            self.stats.record(duration_ns, wake_latency_ns);

            if duration_ns > self.cycle_time_ns {
                self.stats.overruns += 1;
                return Err(CycleError::CycleOverrun {
                    actual_ns: duration_ns,
                    budget_ns: self.cycle_time_ns,
                });
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
        Ok(())
    }

    /// Simulation loop on `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) -> Result<(), CycleError> {
        let cycle_duration = Duration::from_nanos(self.cycle_time_ns as u64);

        while !self.stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            self.tick()?;

            let elapsed = cycle_start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;
            self.stats.record(duration_ns, 0);

            if duration_ns > self.cycle_time_ns {
                // Simulation keeps running on overrun; only the RT loop aborts.
                self.stats.overruns += 1;
                if self.stats.overruns == 1 || self.stats.overruns.is_power_of_two() {
                    warn!(
                        actual_ns = duration_ns,
                        budget_ns = self.cycle_time_ns,
                        total = self.stats.overruns,
                        "cycle overrun"
                    );
                }
            }

            if let Some(remaining) = cycle_duration.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

/// Add nanoseconds to a TimeSpec.
#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// Difference (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────
