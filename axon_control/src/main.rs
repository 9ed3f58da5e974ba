//! # Axon Control
//!
//! Multi-axis drive-mode control loop.
//!
//! Loads the stack configuration TOML, builds one simulated drive per
//! configured axis, performs RT setup, activates a hold-position controller
//! over every axis, and enters the cyclic loop until SIGINT.
//!
//! Real fieldbus drives plug in by replacing the `SimDrive` construction
//! with the device discovery of the target bus; everything downstream of
//! the `MotorDrive` trait is unchanged.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use axon_common::drive::MotorDrive;
use axon_common::mode::{CommandKind, SupportedModes};
use axon_control::arbiter::ControllerClaim;
use axon_control::config::load_config;
use axon_control::cycle::{ControllerHost, LoopRunner, rt_setup};
use axon_control::sim::SimDrive;
use axon_control::stack::{AxisSet, setup};

/// Axon Control — cyclic multi-axis drive-mode control loop
#[derive(Parser, Debug)]
#[command(name = "axon_control")]
#[command(version)]
#[command(about = "Cyclic drive-mode control loop with limit enforcement")]
struct Args {
    /// Path to the stack configuration TOML.
    #[arg(default_value = "config/stack.toml")]
    config: PathBuf,

    /// CPU core to pin the RT thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Axon Control v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Axon Control shutdown complete");
}

/// Host that re-commands the position each axis held when it last reset.
///
/// Stands in for an external trajectory controller; axes whose live slot is
/// not positional are left on their mirrored commands.
struct HoldPositionHost {
    capture: bool,
    setpoints: Vec<f64>,
}

impl HoldPositionHost {
    fn new() -> Self {
        Self {
            capture: true,
            setpoints: Vec::new(),
        }
    }
}

impl ControllerHost for HoldPositionHost {
    fn update(&mut self, _period: Duration, reset: bool, axes: &mut AxisSet) {
        if reset || self.capture {
            self.capture = false;
            self.setpoints = (0..axes.len())
                .map(|i| axes.router(i).map(|r| r.state().position).unwrap_or(0.0))
                .collect();
        }
        for (i, setpoint) in self.setpoints.iter().enumerate() {
            if let Some(router) = axes.router_mut(i)
                && router.live_kind() == Some(CommandKind::Position)
            {
                router.set_command(CommandKind::Position, *setpoint);
            }
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    info!(
        "Config OK: cycle_time={}µs, axes={}",
        config.cycle_time_us,
        config.axes.len(),
    );

    // Simulated device discovery: one free-running drive per configured axis.
    let supported = SupportedModes::PROFILED_POSITION
        | SupportedModes::PROFILED_VELOCITY
        | SupportedModes::PROFILED_TORQUE;
    let drives: Vec<(String, Box<dyn MotorDrive>)> = config
        .axes
        .iter()
        .map(|axis| {
            (
                axis.name.clone(),
                Box::new(SimDrive::free_running(supported)) as Box<dyn MotorDrive>,
            )
        })
        .collect();

    let stack = setup(&config, drives, Box::new(HoldPositionHost::new()))?;
    let arbiter = stack.arbiter();

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    // Activate a hold-position claim over every configured axis.
    let claim = ControllerClaim {
        name: "hold_position".into(),
        required_mode: Some(axon_common::mode::OperationMode::ProfiledPosition as u8),
        resources: config.axes.iter().map(|a| a.name.clone()).collect(),
    };
    if let Err(e) = arbiter.activate(&[claim]) {
        warn!("hold-position activation incomplete: {e}");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let s = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.store(true, Ordering::SeqCst);
    })?;

    let mut runner = LoopRunner::new(stack, config.cycle_time(), stop);
    info!("entering control loop");
    if let Err(e) = runner.run() {
        error!("control loop error: {e}");
        return Err(Box::new(e) as Box<dyn std::error::Error>);
    }

    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
