//! Mode-switch arbitration.
//!
//! Controller activation runs on its own thread, decoupled from the cyclic
//! loop. Feasibility is evaluated lock-free against each axis's shared
//! `AxisInfo`; the actual switch batch then pauses the loop through the
//! gate, holds the axis set for the whole batch, re-primes limit state and
//! resumes with a one-shot recover flag.
//!
//! A batch is applied in claim order and stops at the first failed axis.
//! Axes already switched are NOT rolled back; the resulting partition is
//! reported so the caller can drive its own recovery.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use axon_common::error::{ArbitrationError, SwitchReport};
use axon_common::mode::OperationMode;

use crate::router::{AxisInfo, Capability};
use crate::stack::AxisSet;

// ─── Gate ───────────────────────────────────────────────────────────

/// Loop gate shared between the cyclic loop and the arbiter.
///
/// Lock order is always gate before axis set. The loop holds the gate for
/// the whole write phase of one tick; the arbiter flips `paused` under the
/// gate, releases it, and lets skipping ticks run while it holds the axis
/// set for the switch batch.
#[derive(Debug, Default)]
pub struct Gate {
    /// When set, the loop's write phase skips command application.
    pub paused: bool,
    /// One-shot: the first gated tick after a switch resets controller state.
    pub recover: bool,
}

// ─── Claims ─────────────────────────────────────────────────────────

/// One controller's declared needs: a drive mode and the axes it commands.
///
/// A claim without a required mode (a broadcaster, a diagnostic publisher)
/// participates in activation but never produces a switch.
#[derive(Debug, Clone)]
pub struct ControllerClaim {
    pub name: String,
    pub required_mode: Option<u8>,
    pub resources: Vec<String>,
}

/// A single feasible switch, resolved to an axis index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchRequest {
    pub axis: usize,
    pub mode: OperationMode,
}

// ─── Arbiter ────────────────────────────────────────────────────────

/// Arbitrates controller claims against axis capabilities and applies the
/// resulting mode switches while the loop is paused.
#[derive(Clone)]
pub struct ModeArbiter {
    gate: Arc<Mutex<Gate>>,
    axes: Arc<Mutex<AxisSet>>,
    infos: Vec<Arc<AxisInfo>>,
    /// Upper bound on the wait for an in-flight tick to drain after pausing.
    settle: Duration,
}

impl ModeArbiter {
    /// New arbiter over the shared gate, axis set and per-axis info blocks.
    pub fn new(
        gate: Arc<Mutex<Gate>>,
        axes: Arc<Mutex<AxisSet>>,
        infos: Vec<Arc<AxisInfo>>,
    ) -> Self {
        Self {
            gate,
            axes,
            infos,
            settle: Duration::from_millis(1),
        }
    }

    fn lock_gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_axes(&self) -> MutexGuard<'_, AxisSet> {
        self.axes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current pause state (observability only).
    pub fn is_paused(&self) -> bool {
        self.lock_gate().paused
    }

    fn find(&self, resource: &str) -> Option<(usize, &Arc<AxisInfo>)> {
        self.infos
            .iter()
            .enumerate()
            .find(|(_, info)| info.name() == resource)
    }

    /// Check a set of claims for feasibility without touching any drive.
    ///
    /// Runs lock-free against the shared info blocks, so it may be called
    /// while the loop is ticking. Claims without a required mode are
    /// skipped; axes already in the requested mode produce no request.
    pub fn evaluate(
        &self,
        claims: &[ControllerClaim],
    ) -> Result<Vec<SwitchRequest>, ArbitrationError> {
        let mut batch = Vec::new();
        for claim in claims {
            let Some(raw) = claim.required_mode else {
                debug!(controller = %claim.name, "claim carries no drive mode, skipping");
                continue;
            };
            let mode =
                OperationMode::from_u8(raw).ok_or(ArbitrationError::InvalidMode(raw))?;
            for resource in &claim.resources {
                let (axis, info) = self
                    .find(resource)
                    .ok_or_else(|| ArbitrationError::ResourceNotFound(resource.clone()))?;
                match info.capability(mode) {
                    Capability::AlreadyActive => {}
                    Capability::Switchable => batch.push(SwitchRequest { axis, mode }),
                    Capability::Unsupported => {
                        return Err(ArbitrationError::ModeUnavailable {
                            axis: resource.clone(),
                            mode: raw,
                        });
                    }
                }
            }
        }
        Ok(batch)
    }

    /// Apply a switch batch with the loop paused.
    ///
    /// Stops at the first failed axis; already-switched axes stay in their
    /// new mode. Limit derivative state is re-primed and the loop resumed
    /// with the recover flag set in either outcome.
    pub fn apply_switches(&self, batch: &[SwitchRequest]) -> Result<(), ArbitrationError> {
        if batch.is_empty() {
            return Ok(());
        }

        self.lock_gate().paused = true;
        // An in-flight tick may still hold the axis set; taking the lock
        // below waits it out, bounded by one cycle.
        thread::sleep(self.settle);

        let mut axes = self.lock_axes();
        let mut report = SwitchReport::default();
        let mut failed_at = None;

        for (i, req) in batch.iter().enumerate() {
            let name = self.infos[req.axis].name().to_string();
            match axes.router_mut(req.axis) {
                Some(router) => match router.switch_to(req.mode) {
                    Ok(()) => {
                        debug!(axis = %name, mode = ?req.mode, "mode switched");
                        report.switched.push(name);
                    }
                    Err(err) => {
                        warn!(axis = %name, mode = ?req.mode, %err, "mode switch failed");
                        report.failed = Some(name);
                        failed_at = Some(i);
                        break;
                    }
                },
                None => {
                    report.failed = Some(name);
                    failed_at = Some(i);
                    break;
                }
            }
        }

        if let Some(i) = failed_at {
            report.not_attempted = batch[i + 1..]
                .iter()
                .map(|r| self.infos[r.axis].name().to_string())
                .collect();
        }

        // Switched or not, every axis gets its limit derivative state
        // cleared before commands flow again.
        axes.reprime_limits();
        drop(axes);

        {
            let mut gate = self.lock_gate();
            gate.paused = false;
            gate.recover = true;
        }

        if report.complete() {
            info!(axes = report.switched.len(), "switch batch applied");
            Ok(())
        } else {
            Err(ArbitrationError::SwitchFailed { report })
        }
    }

    /// Evaluate and apply in one step: the activation path.
    pub fn activate(&self, claims: &[ControllerClaim]) -> Result<(), ArbitrationError> {
        let batch = self.evaluate(claims)?;
        self.apply_switches(&batch)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
