//! Per-axis command routing and mode selection.
//!
//! Each axis owns one read-only state record and three command slots
//! (position, velocity, effort). At most one slot is *live* — connected to
//! the drive target — at any time, and liveness is derived from the axis's
//! active operation mode, never from which slots were written. The live
//! route is a tagged `Option<CommandKind>`; there is no pointer identity
//! anywhere.
//!
//! `refresh()` mirrors actual values into the non-live slots every tick so a
//! later switch starts from a continuous value instead of a stale or zero
//! one. This is the mechanism that prevents command discontinuities on mode
//! switch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use axon_common::drive::DriveError;
use axon_common::mode::{CommandKind, OperationMode, SupportedModes};

use crate::axis::Axis;
use crate::layer::Layer;

// ─── Capability Table ───────────────────────────────────────────────

/// Outcome of a capability query for one (axis, mode) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The axis never advertised support for this mode.
    Unsupported,
    /// The axis is already in this mode; nothing to do.
    AlreadyActive,
    /// The axis supports this mode and is not in it.
    Switchable,
}

/// Immutable mode→command-kind mapping for one axis.
///
/// Built once at setup from the drive's advertised mode set and never
/// recomputed. A command slot of kind K exists only if at least one
/// supported mode routes through K.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityTable {
    supported: SupportedModes,
    registered: [bool; 3],
}

impl CapabilityTable {
    /// Derive the table from a drive's supported-mode set.
    pub fn build(supported: SupportedModes) -> Self {
        let mut registered = [false; 3];
        for kind in CommandKind::ALL {
            registered[kind.index()] =
                kind.modes().iter().any(|&m| supported.supports(m));
        }
        Self {
            supported,
            registered,
        }
    }

    /// The command slot `mode` routes through, if the axis supports `mode`.
    #[inline]
    pub fn command_kind(&self, mode: OperationMode) -> Option<CommandKind> {
        if !self.supported.supports(mode) {
            return None;
        }
        mode.command_kind()
    }

    /// Whether a command slot of `kind` is exposed at all.
    #[inline]
    pub fn has_kind(&self, kind: CommandKind) -> bool {
        self.registered[kind.index()]
    }
}

// ─── Lock-Free Axis Info ────────────────────────────────────────────

/// Shared, lock-free view of one axis for the arbitration evaluate path.
///
/// The mode mirror is updated by the loop thread on every `refresh()` and by
/// the arbiter thread on a confirmed switch. `evaluate` reads it without
/// taking the axis-set lock; this read may race a concurrent refresh, which
/// is acceptable because it only classifies capability, never command state.
#[derive(Debug)]
pub struct AxisInfo {
    name: String,
    capability: CapabilityTable,
    mode: AtomicU8,
}

impl AxisInfo {
    fn new(name: String, capability: CapabilityTable, initial: OperationMode) -> Self {
        Self {
            name,
            capability,
            mode: AtomicU8::new(initial as u8),
        }
    }

    /// Axis resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Immutable capability table.
    pub fn capability_table(&self) -> &CapabilityTable {
        &self.capability
    }

    /// Last observed operation mode.
    pub fn mode(&self) -> OperationMode {
        // The mirror only ever holds values written from an OperationMode.
        OperationMode::from_u8(self.mode.load(Ordering::Relaxed)).unwrap_or_default()
    }

    fn store_mode(&self, mode: OperationMode) {
        self.mode.store(mode as u8, Ordering::Relaxed);
    }

    /// Classify a prospective switch of this axis to `mode`.
    ///
    /// `AlreadyActive` wins over `Switchable`: an axis already in `mode` is
    /// never reported switchable.
    pub fn capability(&self, mode: OperationMode) -> Capability {
        if self.mode() == mode {
            return Capability::AlreadyActive;
        }
        if self.capability.command_kind(mode).is_some() {
            return Capability::Switchable;
        }
        Capability::Unsupported
    }
}

// ─── Command Router ─────────────────────────────────────────────────

/// Read-only actual-state record exposed to the controller framework.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateRecord {
    /// Actual position [rad].
    pub position: f64,
    /// Actual velocity [rad/s].
    pub velocity: f64,
    /// Actual effort [Nm].
    pub effort: f64,
}

/// Per-axis command router: state record, three command slots, live route.
pub struct CommandRouter {
    axis: Axis,
    info: Arc<AxisInfo>,
    state: StateRecord,
    commands: [f64; 3],
    live: Option<CommandKind>,
}

impl CommandRouter {
    /// Build a router for `axis`, deriving the capability table from the
    /// drive's advertised modes.
    pub fn new(name: impl Into<String>, axis: Axis) -> Self {
        let table = CapabilityTable::build(axis.supported_modes());
        let info = Arc::new(AxisInfo::new(name.into(), table, axis.current_mode()));
        Self {
            axis,
            info,
            state: StateRecord::default(),
            commands: [0.0; 3],
            live: None,
        }
    }

    /// Shared lock-free info handle for the arbitration evaluate path.
    pub fn info(&self) -> Arc<AxisInfo> {
        Arc::clone(&self.info)
    }

    /// Axis resource name.
    pub fn name(&self) -> &str {
        self.info.name()
    }

    /// Actual-state record from the last `refresh()`.
    pub fn state(&self) -> &StateRecord {
        &self.state
    }

    /// The command slot currently connected to the drive target, if any.
    pub fn live_kind(&self) -> Option<CommandKind> {
        self.live
    }

    /// Command slot value, or `None` if the axis exposes no slot of `kind`.
    pub fn command(&self, kind: CommandKind) -> Option<f64> {
        self.info
            .capability_table()
            .has_kind(kind)
            .then(|| self.commands[kind.index()])
    }

    /// Write into a command slot.
    ///
    /// Returns `false` if the axis exposes no slot of `kind`; the value is
    /// dropped. Writing a non-live slot is allowed — the value simply is not
    /// pushed to the drive until a switch makes that slot live.
    pub fn set_command(&mut self, kind: CommandKind, value: f64) -> bool {
        if !self.info.capability_table().has_kind(kind) {
            return false;
        }
        self.commands[kind.index()] = value;
        true
    }

    /// Mutable command slot access for the limit enforcers.
    ///
    /// `None` if the axis exposes no slot of `kind`.
    pub(crate) fn slot_mut(&mut self, kind: CommandKind) -> Option<&mut f64> {
        self.info
            .capability_table()
            .has_kind(kind)
            .then(|| &mut self.commands[kind.index()])
    }

    /// Classify a prospective switch to `mode`.
    pub fn capability(&self, mode: OperationMode) -> Capability {
        self.info.capability(mode)
    }

    /// Switch the axis into `mode` and re-derive the live slot.
    ///
    /// Blocks until the drive confirms the mode. On failure the live route
    /// is left unchanged.
    pub fn switch_to(&mut self, mode: OperationMode) -> Result<(), DriveError> {
        let Some(kind) = self.info.capability_table().command_kind(mode) else {
            return Err(DriveError::UnsupportedMode(mode as u8));
        };
        self.axis.enter_mode_and_wait(mode)?;
        self.live = Some(kind);
        self.info.store_mode(mode);
        Ok(())
    }

    /// Derive the live slot from the mode the drive currently reports.
    ///
    /// Returns `false` only when the drive reports a mode this router has no
    /// slot for. `NoMode` clears the route and is not an error — the axis is
    /// idle.
    fn select_from_reported(&mut self) -> bool {
        let reported = self.axis.current_mode();
        self.info.store_mode(reported);
        if reported == OperationMode::NoMode {
            self.live = None;
            return true;
        }
        match self.info.capability_table().command_kind(reported) {
            Some(kind) => {
                self.live = Some(kind);
                true
            }
            None => false,
        }
    }

    /// Pull actual state from the drive and maintain slot continuity.
    ///
    /// Mirrors actuals into every command slot, then restores the live
    /// slot's value from the drive target so an externally-set target
    /// survives a tick with no controller write. If no slot is live,
    /// auto-selects from the drive's reported mode (covers modes entered
    /// outside this router, e.g. at startup).
    pub fn refresh(&mut self) -> bool {
        for kind in CommandKind::ALL {
            let actual = self.axis.actual(kind);
            match kind {
                CommandKind::Position => self.state.position = actual,
                CommandKind::Velocity => self.state.velocity = actual,
                CommandKind::Effort => self.state.effort = actual,
            }
            self.commands[kind.index()] = actual;
        }
        self.info.store_mode(self.axis.current_mode());
        if self.live.is_none() && !self.select_from_reported() {
            return false;
        }
        if let Some(kind) = self.live {
            self.commands[kind.index()] = self.axis.target(kind);
        }
        true
    }

    /// Push the live command slot to the drive target.
    ///
    /// With no live slot this is a silently-dropped write: success while the
    /// drive reports `NoMode` (idle is a valid steady state), failure if the
    /// drive is in a mode this router has no route for.
    pub fn apply(&mut self) -> bool {
        match self.live {
            Some(kind) => {
                self.axis.set_target(kind, self.commands[kind.index()]);
                true
            }
            None => self.axis.current_mode() == OperationMode::NoMode,
        }
    }
}

impl Layer for CommandRouter {
    fn name(&self) -> &str {
        self.info.name()
    }

    fn init(&mut self) -> bool {
        // Pick up a mode set outside this router, e.g. by the drive at boot.
        self.select_from_reported();
        true
    }

    fn read(&mut self) -> bool {
        self.refresh()
    }

    fn write(&mut self) -> bool {
        self.apply()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimDrive;

    fn router(supported: SupportedModes) -> CommandRouter {
        let drive = SimDrive::new(supported);
        CommandRouter::new("joint1", Axis::with_scale(Box::new(drive), 1.0))
    }

    fn pos_vel() -> SupportedModes {
        SupportedModes::PROFILED_POSITION | SupportedModes::PROFILED_VELOCITY
    }

    #[test]
    fn capability_table_registers_only_supported_kinds() {
        let table = CapabilityTable::build(pos_vel());
        assert!(table.has_kind(CommandKind::Position));
        assert!(table.has_kind(CommandKind::Velocity));
        assert!(!table.has_kind(CommandKind::Effort));
        assert_eq!(
            table.command_kind(OperationMode::ProfiledPosition),
            Some(CommandKind::Position)
        );
        // Same kind, but the mode itself was never advertised.
        assert_eq!(table.command_kind(OperationMode::CyclicSyncPosition), None);
    }

    #[test]
    fn capability_already_active_wins_over_switchable() {
        let mut r = router(pos_vel());
        r.switch_to(OperationMode::ProfiledPosition).unwrap();
        assert_eq!(
            r.capability(OperationMode::ProfiledPosition),
            Capability::AlreadyActive
        );
        assert_eq!(
            r.capability(OperationMode::ProfiledVelocity),
            Capability::Switchable
        );
        assert_eq!(
            r.capability(OperationMode::CyclicSyncTorque),
            Capability::Unsupported
        );
    }

    #[test]
    fn switch_selects_matching_live_slot() {
        let mut r = router(pos_vel());
        assert_eq!(r.live_kind(), None);
        r.switch_to(OperationMode::ProfiledVelocity).unwrap();
        assert_eq!(r.live_kind(), Some(CommandKind::Velocity));
        r.switch_to(OperationMode::ProfiledPosition).unwrap();
        assert_eq!(r.live_kind(), Some(CommandKind::Position));
    }

    #[test]
    fn switch_to_unregistered_mode_fails_without_route_change() {
        let mut r = router(pos_vel());
        r.switch_to(OperationMode::ProfiledPosition).unwrap();
        assert!(r.switch_to(OperationMode::CyclicSyncTorque).is_err());
        assert_eq!(r.live_kind(), Some(CommandKind::Position));
    }

    #[test]
    fn refresh_mirrors_actuals_into_all_slots() {
        let mut drive = SimDrive::new(pos_vel());
        drive.set_actual_position(1.25);
        drive.set_actual_velocity(-0.5);
        let mut r = CommandRouter::new("j", Axis::with_scale(Box::new(drive), 1.0));
        assert!(r.refresh());
        assert_eq!(r.state().position, 1.25);
        assert_eq!(r.state().velocity, -0.5);
        assert_eq!(r.command(CommandKind::Position), Some(1.25));
        assert_eq!(r.command(CommandKind::Velocity), Some(-0.5));
    }

    #[test]
    fn refresh_is_idempotent_on_live_slot() {
        let mut r = router(pos_vel());
        r.switch_to(OperationMode::ProfiledPosition).unwrap();
        r.set_command(CommandKind::Position, 2.0);
        assert!(r.apply());
        // Repeated refreshes keep reading the same target back.
        for _ in 0..3 {
            assert!(r.refresh());
            assert_eq!(r.command(CommandKind::Position), Some(2.0));
        }
    }

    #[test]
    fn refresh_autoselects_externally_entered_mode() {
        let mut drive = SimDrive::new(pos_vel());
        drive.force_mode(OperationMode::ProfiledVelocity);
        let mut r = CommandRouter::new("j", Axis::with_scale(Box::new(drive), 1.0));
        assert!(r.refresh());
        assert_eq!(r.live_kind(), Some(CommandKind::Velocity));
    }

    #[test]
    fn refresh_with_no_mode_is_idle_not_error() {
        let mut r = router(pos_vel());
        assert!(r.refresh());
        assert_eq!(r.live_kind(), None);
    }

    #[test]
    fn apply_idle_is_dropped_write() {
        let mut r = router(pos_vel());
        assert!(r.apply()); // NoMode: silently dropped, success
    }

    #[test]
    fn apply_fails_on_unroutable_reported_mode() {
        let mut drive = SimDrive::new(pos_vel());
        drive.force_mode(OperationMode::Homing); // no command slot
        let mut r = CommandRouter::new("j", Axis::with_scale(Box::new(drive), 1.0));
        assert!(!r.apply());
    }

    #[test]
    fn set_command_rejects_unregistered_kind() {
        let mut r = router(pos_vel());
        assert!(!r.set_command(CommandKind::Effort, 1.0));
        assert_eq!(r.command(CommandKind::Effort), None);
    }
}
