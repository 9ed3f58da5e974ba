//! Axis-set composition and stack setup.
//!
//! `AxisSet` bundles every per-axis router with the six limit registries;
//! it is the single structure the loop thread and, during a paused window,
//! the arbiter thread contend for. `setup()` wires the whole stack from a
//! validated configuration plus the drives produced by device discovery.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use axon_common::drive::MotorDrive;
use axon_common::mode::CommandKind;

use crate::arbiter::{Gate, ModeArbiter};
use crate::axis::Axis;
use crate::config::StackConfig;
use crate::cycle::{ControlCycle, ControllerHost};
use crate::layer::{Layer, LayerGroup};
use crate::limits::LimitSet;
use crate::router::CommandRouter;

// ─── Axis Set ───────────────────────────────────────────────────────

/// All per-axis routers plus the limit registries.
///
/// Owned behind a single mutex shared by the control cycle and the arbiter.
/// The cycle's write phase holds it for one tick at a time; the arbiter
/// holds it for a whole switch batch while the cycle skips via the pause
/// flag, so the two never interleave axis-by-axis.
pub struct AxisSet {
    routers: LayerGroup<CommandRouter>,
    limits: LimitSet,
}

impl AxisSet {
    /// New empty set.
    pub fn new() -> Self {
        Self {
            routers: LayerGroup::new("axes"),
            limits: LimitSet::new(),
        }
    }

    /// Append a router; returns its axis index.
    pub fn add_axis(&mut self, router: CommandRouter) -> usize {
        self.routers.add(router);
        self.routers.len() - 1
    }

    /// Number of axes.
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    /// True when no axis is configured.
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    /// Router by axis index.
    pub fn router(&self, index: usize) -> Option<&CommandRouter> {
        self.routers.get(index)
    }

    /// Mutable router by axis index.
    pub fn router_mut(&mut self, index: usize) -> Option<&mut CommandRouter> {
        self.routers.get_mut(index)
    }

    /// Router by axis resource name.
    pub fn router_by_name(&self, name: &str) -> Option<&CommandRouter> {
        self.routers.iter().find(|r| r.name() == name)
    }

    /// Mutable router by axis resource name.
    pub fn router_by_name_mut(&mut self, name: &str) -> Option<&mut CommandRouter> {
        self.routers.iter_mut().find(|r| r.name() == name)
    }

    /// Limit registries (setup-time registration).
    pub fn limits_mut(&mut self) -> &mut LimitSet {
        &mut self.limits
    }

    /// Read phase: pull actual state through every router.
    pub fn refresh_all(&mut self) -> bool {
        self.routers.read()
    }

    /// Push every live command slot to its drive target.
    pub fn apply_all(&mut self) -> bool {
        self.routers.write()
    }

    /// Run the six limit registries in fixed order.
    pub fn enforce_limits(&mut self, dt_secs: f64) {
        self.limits.enforce_all(self.routers.members_mut(), dt_secs);
    }

    /// Re-prime all limit derivative state after a mode switch.
    pub fn reprime_limits(&mut self) {
        self.limits.reprime(self.routers.members_mut());
    }

    /// One-shot init of every router (auto-select boot-time modes).
    pub fn init_all(&mut self) -> bool {
        self.routers.init()
    }
}

impl Default for AxisSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Layer adapter driving the shared axis set from the stack.
///
/// Only the read phase acts here: the command push happens inside the
/// control cycle's gated write so it cannot interleave with a switch batch.
pub struct AxisLayer {
    axes: Arc<Mutex<AxisSet>>,
}

impl AxisLayer {
    /// Wrap a shared axis set.
    pub fn new(axes: Arc<Mutex<AxisSet>>) -> Self {
        Self { axes }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AxisSet> {
        self.axes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Layer for AxisLayer {
    fn name(&self) -> &str {
        "axes"
    }

    fn init(&mut self) -> bool {
        self.lock().init_all()
    }

    fn read(&mut self) -> bool {
        self.lock().refresh_all()
    }

    fn write(&mut self) -> bool {
        true
    }
}

// ─── Setup ──────────────────────────────────────────────────────────

/// Setup failure: a configured axis has no discovered drive.
#[derive(Debug)]
pub struct MissingDrive(pub String);

impl std::fmt::Display for MissingDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no drive discovered for configured axis '{}'", self.0)
    }
}

impl std::error::Error for MissingDrive {}

/// The assembled stack: layer group plus the shared handles.
pub struct ControlStack {
    layers: LayerGroup<Box<dyn Layer>>,
    gate: Arc<Mutex<Gate>>,
    axes: Arc<Mutex<AxisSet>>,
    arbiter: ModeArbiter,
}

impl ControlStack {
    /// Arbiter handle for the controller-activation thread.
    pub fn arbiter(&self) -> ModeArbiter {
        self.arbiter.clone()
    }

    /// Shared axis set (state/command surface).
    pub fn axes(&self) -> Arc<Mutex<AxisSet>> {
        Arc::clone(&self.axes)
    }

    /// Shared loop gate.
    pub fn gate(&self) -> Arc<Mutex<Gate>> {
        Arc::clone(&self.gate)
    }

    /// One-shot init of every layer.
    pub fn init(&mut self) -> bool {
        self.layers.init()
    }

    /// Per-tick read phase, invoked by the external scheduler.
    pub fn read(&mut self) -> bool {
        self.layers.read()
    }

    /// Per-tick write phase, invoked by the external scheduler.
    pub fn write(&mut self) -> bool {
        self.layers.write()
    }

    /// Orderly teardown.
    pub fn shutdown(&mut self) -> bool {
        self.layers.shutdown()
    }
}

/// Build the full stack from a validated config, the discovered drives, and
/// the controller host.
///
/// Fails when a configured axis has no matching drive. An axis without
/// limits is accepted with a warning and runs unconstrained.
pub fn setup(
    config: &StackConfig,
    mut drives: Vec<(String, Box<dyn MotorDrive>)>,
    host: Box<dyn ControllerHost>,
) -> Result<ControlStack, MissingDrive> {
    let mut axes = AxisSet::new();

    for axis_cfg in &config.axes {
        let pos = drives
            .iter()
            .position(|(name, _)| *name == axis_cfg.name)
            .ok_or_else(|| MissingDrive(axis_cfg.name.clone()))?;
        let (_, drive) = drives.swap_remove(pos);

        let axis = match axis_cfg.scale {
            Some(scale) => Axis::with_scale(drive, scale),
            None => Axis::new(drive),
        };
        let router = CommandRouter::new(axis_cfg.name.clone(), axis);
        let table = *router.info().capability_table();
        let index = axes.add_axis(router);

        match axis_cfg.limits {
            Some(limits) => {
                axes.limits_mut().register_axis(
                    index,
                    |kind: CommandKind| table.has_kind(kind),
                    limits,
                    axis_cfg.soft_limits,
                );
            }
            None => {
                warn!("no limits found for '{}', axis runs unconstrained", axis_cfg.name);
            }
        }
    }

    let infos = (0..axes.len())
        .filter_map(|i| axes.router(i).map(|r| r.info()))
        .collect();

    let gate = Arc::new(Mutex::new(Gate::default()));
    let axes = Arc::new(Mutex::new(axes));
    let arbiter = ModeArbiter::new(Arc::clone(&gate), Arc::clone(&axes), infos);

    let cycle = ControlCycle::new(
        Arc::clone(&gate),
        Arc::clone(&axes),
        host,
        config.cycle_time(),
    );

    let mut layers: LayerGroup<Box<dyn Layer>> = LayerGroup::new("control stack");
    layers.add(Box::new(AxisLayer::new(Arc::clone(&axes))));
    layers.add(Box::new(cycle));

    info!(
        axes = config.axes.len(),
        cycle_time_us = config.cycle_time_us,
        "control stack assembled"
    );

    Ok(ControlStack {
        layers,
        gate,
        axes,
        arbiter,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────
