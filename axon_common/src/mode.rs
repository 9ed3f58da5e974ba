//! Drive operation modes and command-kind routing.
//!
//! `OperationMode` follows the CiA 402 "modes of operation" numbering so the
//! integer `required_drive_mode` parameter carried by controller claims maps
//! directly onto the value reported by the drive. Each axis supports a subset
//! of modes, discovered at setup. `CommandKind` names which of the three
//! command slots (position, velocity, effort) a mode consumes.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Drive operation mode (CiA 402 numbering).
///
/// `NoMode` means the axis is idle; this is a valid steady state, not an
/// error. `Homing` is device-internal and never routed to a command slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationMode {
    /// No mode active — axis is idle.
    NoMode = 0,
    /// Profiled position.
    ProfiledPosition = 1,
    /// Velocity (raw).
    Velocity = 2,
    /// Profiled velocity.
    ProfiledVelocity = 3,
    /// Profiled torque.
    ProfiledTorque = 4,
    /// Homing (device-internal, no command slot).
    Homing = 6,
    /// Interpolated position.
    InterpolatedPosition = 7,
    /// Cyclic synchronous position.
    CyclicSyncPosition = 8,
    /// Cyclic synchronous velocity.
    CyclicSyncVelocity = 9,
    /// Cyclic synchronous torque.
    CyclicSyncTorque = 10,
}

impl OperationMode {
    /// Convert from raw `u8`. Returns `None` for values outside CiA 402.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NoMode),
            1 => Some(Self::ProfiledPosition),
            2 => Some(Self::Velocity),
            3 => Some(Self::ProfiledVelocity),
            4 => Some(Self::ProfiledTorque),
            6 => Some(Self::Homing),
            7 => Some(Self::InterpolatedPosition),
            8 => Some(Self::CyclicSyncPosition),
            9 => Some(Self::CyclicSyncVelocity),
            10 => Some(Self::CyclicSyncTorque),
            _ => None,
        }
    }

    /// The command slot this mode consumes, if any.
    ///
    /// `NoMode` and `Homing` have no command slot.
    #[inline]
    pub const fn command_kind(self) -> Option<CommandKind> {
        match self {
            Self::ProfiledPosition | Self::InterpolatedPosition | Self::CyclicSyncPosition => {
                Some(CommandKind::Position)
            }
            Self::Velocity | Self::ProfiledVelocity | Self::CyclicSyncVelocity => {
                Some(CommandKind::Velocity)
            }
            Self::ProfiledTorque | Self::CyclicSyncTorque => Some(CommandKind::Effort),
            Self::NoMode | Self::Homing => None,
        }
    }

    /// Single-bit mask for supported-mode sets.
    #[inline]
    pub const fn mask(self) -> SupportedModes {
        SupportedModes::from_bits_truncate(1 << (self as u8))
    }
}

impl Default for OperationMode {
    fn default() -> Self {
        Self::NoMode
    }
}

/// Which of the three per-axis command slots a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandKind {
    Position = 0,
    Velocity = 1,
    Effort = 2,
}

impl CommandKind {
    /// All kinds, in enforcement order.
    pub const ALL: [Self; 3] = [Self::Position, Self::Velocity, Self::Effort];

    /// Slot index into a `[f64; 3]` command array.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The modes that route through this command slot.
    pub const fn modes(self) -> &'static [OperationMode] {
        match self {
            Self::Position => &[
                OperationMode::ProfiledPosition,
                OperationMode::InterpolatedPosition,
                OperationMode::CyclicSyncPosition,
            ],
            Self::Velocity => &[
                OperationMode::Velocity,
                OperationMode::ProfiledVelocity,
                OperationMode::CyclicSyncVelocity,
            ],
            Self::Effort => &[
                OperationMode::ProfiledTorque,
                OperationMode::CyclicSyncTorque,
            ],
        }
    }
}

bitflags! {
    /// Supported-mode set, one bit per CiA 402 mode number.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SupportedModes: u16 {
        const PROFILED_POSITION     = 1 << 1;
        const VELOCITY              = 1 << 2;
        const PROFILED_VELOCITY     = 1 << 3;
        const PROFILED_TORQUE       = 1 << 4;
        const HOMING                = 1 << 6;
        const INTERPOLATED_POSITION = 1 << 7;
        const CYCLIC_SYNC_POSITION  = 1 << 8;
        const CYCLIC_SYNC_VELOCITY  = 1 << 9;
        const CYCLIC_SYNC_TORQUE    = 1 << 10;
    }
}

impl SupportedModes {
    /// Whether `mode` is in the set.
    #[inline]
    pub const fn supports(self, mode: OperationMode) -> bool {
        self.intersects(mode.mask())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
