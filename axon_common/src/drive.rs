//! Motor drive trait and error types.
//!
//! `MotorDrive` is the boundary to the device-level actuator stack (bus
//! transport, discovery, and the drive's own mode state machine live behind
//! it). All values crossing this trait are in raw device units; the control
//! stack wraps each drive in a scaling `Axis`.

use thiserror::Error;

use crate::mode::{OperationMode, SupportedModes};

/// Error types for drive operations.
#[derive(Debug, Clone, Error)]
pub enum DriveError {
    /// The drive does not implement the requested mode.
    #[error("mode {0} not supported by drive")]
    UnsupportedMode(u8),

    /// The drive did not confirm the mode within its protocol timeout.
    #[error("mode switch not confirmed: {0}")]
    SwitchNotConfirmed(String),

    /// Device-level communication error.
    #[error("drive communication error: {0}")]
    Communication(String),
}

/// Interface to one physical actuator.
///
/// # Lifecycle
///
/// Drives are produced by device discovery before `setup()` and live for the
/// process lifetime. The control loop calls the accessors every cycle;
/// `enter_mode_and_wait` is only called from the arbitration path while the
/// loop's write phase is paused.
///
/// # Blocking
///
/// `enter_mode_and_wait` blocks the calling thread until the drive's state
/// machine confirms the mode, bounded by the device protocol timeout. All
/// other operations are non-blocking.
pub trait MotorDrive: Send {
    /// Modes this drive advertises, discovered at setup.
    fn supported_modes(&self) -> SupportedModes;

    /// Mode the drive currently reports.
    fn current_mode(&self) -> OperationMode;

    /// Actual position [raw device units].
    fn actual_position(&self) -> f64;
    /// Actual velocity [raw device units/s].
    fn actual_velocity(&self) -> f64;
    /// Actual effort [raw device units].
    fn actual_effort(&self) -> f64;

    /// Current position target [raw device units].
    fn target_position(&self) -> f64;
    /// Current velocity target [raw device units/s].
    fn target_velocity(&self) -> f64;
    /// Current effort target [raw device units].
    fn target_effort(&self) -> f64;

    /// Set the position target [raw device units].
    fn set_target_position(&mut self, raw: f64);
    /// Set the velocity target [raw device units/s].
    fn set_target_velocity(&mut self, raw: f64);
    /// Set the effort target [raw device units].
    fn set_target_effort(&mut self, raw: f64);

    /// Command the drive into `mode` and block until confirmed.
    ///
    /// # Errors
    /// `DriveError::UnsupportedMode` if the drive rejects the mode outright,
    /// `DriveError::SwitchNotConfirmed` on protocol timeout.
    fn enter_mode_and_wait(&mut self, mode: OperationMode) -> Result<(), DriveError>;
}
