//! Arbitration error taxonomy.
//!
//! Configuration and capability conflicts are detected before any state
//! mutation and reject the whole activation batch. A switch failure is
//! detected mid-mutation: already-switched axes stay in their new mode (no
//! rollback) and the exact partition is reported to the caller.

use thiserror::Error;

/// Partition of a switch batch after `apply_switches`.
///
/// `switched + failed + not_attempted` covers the whole batch in request
/// order. `failed` is the first axis that did not confirm its mode; no
/// further switches are attempted after it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwitchReport {
    /// Axes that entered their requested mode.
    pub switched: Vec<String>,
    /// The axis whose switch failed, if any.
    pub failed: Option<String>,
    /// Axes after the failure point, left untouched.
    pub not_attempted: Vec<String>,
}

impl SwitchReport {
    /// True when every switch in the batch succeeded.
    #[inline]
    pub fn complete(&self) -> bool {
        self.failed.is_none() && self.not_attempted.is_empty()
    }
}

/// Errors raised while evaluating or applying a mode-switch batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ArbitrationError {
    /// A claimed axis resource is not among the known axes.
    #[error("axis resource '{0}' not found")]
    ResourceNotFound(String),

    /// The claimed drive mode number is not a known operation mode.
    #[error("required drive mode {0} is not a valid operation mode")]
    InvalidMode(u8),

    /// The axis never advertised support for the requested mode.
    #[error("mode {mode} is not available for '{axis}'")]
    ModeUnavailable {
        /// Axis resource name.
        axis: String,
        /// Raw mode number from the claim.
        mode: u8,
    },

    /// A switch in the batch failed mid-application. No rollback is
    /// performed; `report` names exactly which axes did and did not switch.
    #[error("mode switch batch failed (switched: {:?}, failed: {:?}, not attempted: {:?})",
        report.switched, report.failed, report.not_attempted)]
    SwitchFailed {
        /// Exact batch partition.
        report: SwitchReport,
    },
}

// ─── Tests ──────────────────────────────────────────────────────────
