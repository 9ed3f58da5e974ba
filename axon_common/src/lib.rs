//! # Axon Common
//!
//! Shared types for the axon multi-axis drive-mode control stack: operation
//! modes and command-kind routing, kinematic limit structures, the motor
//! drive boundary trait, and the arbitration error taxonomy.
//!
//! Everything here is consumed by `axon_control`; nothing in this crate
//! performs I/O or holds runtime state.

pub mod drive;
pub mod error;
pub mod limits;
pub mod mode;

pub use drive::{DriveError, MotorDrive};
pub use error::{ArbitrationError, SwitchReport};
pub use limits::{AxisLimits, SoftLimits};
pub use mode::{CommandKind, OperationMode, SupportedModes};
