//! Scaled axis wrapper over a motor drive.
//!
//! Drives report position in raw device units (millidegrees for the CANopen
//! profile this stack targets); everything above this module works in user
//! units (rad, rad/s, Nm). `Axis` owns the drive and applies the conversion
//! in both directions.

use std::f64::consts::PI;

use axon_common::drive::{DriveError, MotorDrive};
use axon_common::mode::{CommandKind, OperationMode, SupportedModes};

/// Raw device units per user unit: millidegrees per radian.
pub const DEFAULT_SCALE: f64 = 360.0 * 1000.0 / (2.0 * PI);

/// One physical actuator behind a unit conversion.
pub struct Axis {
    drive: Box<dyn MotorDrive>,
    scale: f64,
}

impl Axis {
    /// Wrap `drive` with the default millidegree scale.
    pub fn new(drive: Box<dyn MotorDrive>) -> Self {
        Self::with_scale(drive, DEFAULT_SCALE)
    }

    /// Wrap `drive` with an explicit raw-units-per-user-unit factor.
    pub fn with_scale(drive: Box<dyn MotorDrive>, scale: f64) -> Self {
        debug_assert!(scale != 0.0);
        Self { drive, scale }
    }

    /// Modes the underlying drive advertises.
    pub fn supported_modes(&self) -> SupportedModes {
        self.drive.supported_modes()
    }

    /// Mode the drive currently reports.
    pub fn current_mode(&self) -> OperationMode {
        self.drive.current_mode()
    }

    /// Actual value for `kind` [user units].
    pub fn actual(&self, kind: CommandKind) -> f64 {
        let raw = match kind {
            CommandKind::Position => self.drive.actual_position(),
            CommandKind::Velocity => self.drive.actual_velocity(),
            CommandKind::Effort => self.drive.actual_effort(),
        };
        raw / self.scale
    }

    /// Current target for `kind` [user units].
    pub fn target(&self, kind: CommandKind) -> f64 {
        let raw = match kind {
            CommandKind::Position => self.drive.target_position(),
            CommandKind::Velocity => self.drive.target_velocity(),
            CommandKind::Effort => self.drive.target_effort(),
        };
        raw / self.scale
    }

    /// Set the target for `kind` [user units].
    pub fn set_target(&mut self, kind: CommandKind, value: f64) {
        let raw = value * self.scale;
        match kind {
            CommandKind::Position => self.drive.set_target_position(raw),
            CommandKind::Velocity => self.drive.set_target_velocity(raw),
            CommandKind::Effort => self.drive.set_target_effort(raw),
        }
    }

    /// Command the drive into `mode`, blocking until confirmed.
    pub fn enter_mode_and_wait(&mut self, mode: OperationMode) -> Result<(), DriveError> {
        self.drive.enter_mode_and_wait(mode)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
