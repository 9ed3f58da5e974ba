//! Kinematic limit enforcement.
//!
//! Six enforcer registries — {position, velocity, effort} × {saturation,
//! soft} — clamp the per-axis command slots in place once per tick, in a
//! fixed order: position saturation, position soft, velocity saturation,
//! velocity soft, effort saturation, effort soft. Soft enforcement assumes
//! saturation has already run.
//!
//! The position and velocity filters carry the previous commanded value to
//! bound the command derivative. After any discontinuous change of command
//! source (a mode switch) this state must be re-primed by enforcing once
//! with an effectively-infinite time delta: every derivative bound becomes
//! vacuous, the clamp degenerates to plain saturation, and the previous
//! command is re-seeded from the current slot value.

use axon_common::limits::{AxisLimits, SoftLimits};
use axon_common::mode::CommandKind;

use crate::router::CommandRouter;

/// Re-prime time delta [s], large enough to void every derivative bound.
pub const RESET_DT_SECS: f64 = 1.0e9;

/// Enforcement flavor of one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Hard clamp to absolute bounds (derivative-aware where applicable).
    Saturation,
    /// Gain-shaped approach to the soft-limit zone.
    Soft,
}

/// One registered axis in an enforcer.
#[derive(Debug, Clone)]
struct Entry {
    axis: usize,
    limits: AxisLimits,
    soft: Option<SoftLimits>,
    prev_cmd: Option<f64>,
}

/// Clamps one command kind across all registered axes.
#[derive(Debug)]
pub struct LimitEnforcer {
    kind: CommandKind,
    strictness: Strictness,
    entries: Vec<Entry>,
}

impl LimitEnforcer {
    /// New empty registry for `(kind, strictness)`.
    pub fn new(kind: CommandKind, strictness: Strictness) -> Self {
        Self {
            kind,
            strictness,
            entries: Vec::new(),
        }
    }

    /// The command kind this registry clamps.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// The enforcement flavor of this registry.
    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Register an axis. `soft` is required for `Strictness::Soft`.
    pub fn register(&mut self, axis: usize, limits: AxisLimits, soft: Option<SoftLimits>) {
        debug_assert!(self.strictness == Strictness::Saturation || soft.is_some());
        self.entries.push(Entry {
            axis,
            limits,
            soft,
            prev_cmd: None,
        });
    }

    /// Number of registered axes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no axis is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clamp every registered axis's slot in place.
    pub fn enforce(&mut self, routers: &mut [CommandRouter], dt: f64) {
        for entry in &mut self.entries {
            let Some(router) = routers.get_mut(entry.axis) else {
                continue;
            };
            let state = *router.state();
            let Some(slot) = router.slot_mut(self.kind) else {
                continue;
            };
            let clamped = match (self.kind, self.strictness) {
                (CommandKind::Position, Strictness::Saturation) => {
                    position_saturation(entry, state.position, *slot, dt)
                }
                (CommandKind::Position, Strictness::Soft) => {
                    position_soft(entry, state.position, *slot, dt)
                }
                (CommandKind::Velocity, Strictness::Saturation) => {
                    velocity_saturation(entry, *slot, dt)
                }
                (CommandKind::Velocity, Strictness::Soft) => {
                    velocity_soft(entry, state.position, *slot, dt)
                }
                (CommandKind::Effort, Strictness::Saturation) => effort_saturation(entry, *slot),
                (CommandKind::Effort, Strictness::Soft) => {
                    effort_soft(entry, state.position, state.velocity, *slot)
                }
            };
            *slot = clamped;
            entry.prev_cmd = Some(clamped);
        }
    }
}

// ─── Clamp Math ─────────────────────────────────────────────────────

/// Clamp tolerating inverted bounds. Derived bounds can cross (an actual
/// position outside the hard range, a soft ceiling under the acceleration
/// floor); the tighter bound wins instead of panicking like `f64::clamp`.
fn saturate(cmd: f64, lo: f64, hi: f64) -> f64 {
    cmd.max(lo).min(hi)
}

/// Position command bounded by the hard range and by `max_velocity · dt`
/// around the previous command.
fn position_saturation(entry: &Entry, actual_pos: f64, cmd: f64, dt: f64) -> f64 {
    let l = &entry.limits;
    let prev = entry.prev_cmd.unwrap_or(actual_pos);
    let lo = (prev - l.max_velocity * dt).max(l.min_position);
    let hi = (prev + l.max_velocity * dt).min(l.max_position);
    saturate(cmd, lo, hi)
}

/// Position command shaped by gain-limited approach velocity toward the
/// soft range.
fn position_soft(entry: &Entry, actual_pos: f64, cmd: f64, dt: f64) -> f64 {
    let l = &entry.limits;
    // Registration guarantees soft limits for soft registries.
    let Some(s) = entry.soft else { return cmd };
    let prev = entry.prev_cmd.unwrap_or(actual_pos);
    let vel_lo = (-s.k_position * (prev - s.min_position)).clamp(-l.max_velocity, l.max_velocity);
    let vel_hi = (-s.k_position * (prev - s.max_position)).clamp(-l.max_velocity, l.max_velocity);
    saturate(cmd, prev + vel_lo * dt, prev + vel_hi * dt)
}

/// Velocity command bounded by `±max_velocity` and, when an acceleration
/// limit exists, by `max_acceleration · dt` around the previous command.
fn velocity_saturation(entry: &Entry, cmd: f64, dt: f64) -> f64 {
    let l = &entry.limits;
    let (mut lo, mut hi) = (-l.max_velocity, l.max_velocity);
    if let (Some(acc), Some(prev)) = (l.max_acceleration, entry.prev_cmd) {
        lo = lo.max(prev - acc * dt);
        hi = hi.min(prev + acc * dt);
    }
    saturate(cmd, lo, hi)
}

/// Velocity command bounded toward zero as the actual position nears the
/// soft range bounds.
fn velocity_soft(entry: &Entry, actual_pos: f64, cmd: f64, dt: f64) -> f64 {
    let l = &entry.limits;
    let Some(s) = entry.soft else { return cmd };
    let mut lo =
        (-s.k_position * (actual_pos - s.min_position)).clamp(-l.max_velocity, l.max_velocity);
    let mut hi =
        (-s.k_position * (actual_pos - s.max_position)).clamp(-l.max_velocity, l.max_velocity);
    if let (Some(acc), Some(prev)) = (l.max_acceleration, entry.prev_cmd) {
        lo = lo.max(prev - acc * dt);
        hi = hi.min(prev + acc * dt);
    }
    saturate(cmd, lo, hi)
}

/// Effort command clamped to `±max_effort` (no-op without an effort limit).
fn effort_saturation(entry: &Entry, cmd: f64) -> f64 {
    match entry.limits.max_effort {
        Some(max_eff) => cmd.clamp(-max_eff, max_eff),
        None => cmd,
    }
}

/// Effort command shaped by the velocity headroom toward the soft range.
fn effort_soft(entry: &Entry, actual_pos: f64, actual_vel: f64, cmd: f64) -> f64 {
    let l = &entry.limits;
    let Some(s) = entry.soft else { return cmd };
    let max_eff = l.max_effort.unwrap_or(f64::INFINITY);
    let vel_lo =
        (-s.k_position * (actual_pos - s.min_position)).clamp(-l.max_velocity, l.max_velocity);
    let vel_hi =
        (-s.k_position * (actual_pos - s.max_position)).clamp(-l.max_velocity, l.max_velocity);
    let eff_lo = (-s.k_velocity * (actual_vel - vel_lo)).clamp(-max_eff, max_eff);
    let eff_hi = (-s.k_velocity * (actual_vel - vel_hi)).clamp(-max_eff, max_eff);
    saturate(cmd, eff_lo.min(eff_hi), eff_hi.max(eff_lo))
}

// ─── Fixed-Order Set ────────────────────────────────────────────────

/// The six enforcer registries in their fixed run order.
#[derive(Debug)]
pub struct LimitSet {
    enforcers: [LimitEnforcer; 6],
}

impl LimitSet {
    /// Build the empty set in enforcement order.
    pub fn new() -> Self {
        Self {
            enforcers: [
                LimitEnforcer::new(CommandKind::Position, Strictness::Saturation),
                LimitEnforcer::new(CommandKind::Position, Strictness::Soft),
                LimitEnforcer::new(CommandKind::Velocity, Strictness::Saturation),
                LimitEnforcer::new(CommandKind::Velocity, Strictness::Soft),
                LimitEnforcer::new(CommandKind::Effort, Strictness::Saturation),
                LimitEnforcer::new(CommandKind::Effort, Strictness::Soft),
            ],
        }
    }

    /// Register one axis with every applicable registry.
    ///
    /// A saturation entry is added for each command kind in `kinds`; soft
    /// entries only when `soft` is present.
    pub fn register_axis(
        &mut self,
        axis: usize,
        kinds: impl Fn(CommandKind) -> bool,
        limits: AxisLimits,
        soft: Option<SoftLimits>,
    ) {
        for enforcer in &mut self.enforcers {
            if !kinds(enforcer.kind) {
                continue;
            }
            match enforcer.strictness {
                Strictness::Saturation => enforcer.register(axis, limits, None),
                Strictness::Soft => {
                    if let Some(s) = soft {
                        enforcer.register(axis, limits, Some(s));
                    }
                }
            }
        }
    }

    /// Run all six registries over the routers in fixed order.
    pub fn enforce_all(&mut self, routers: &mut [CommandRouter], dt: f64) {
        for enforcer in &mut self.enforcers {
            enforcer.enforce(routers, dt);
        }
    }

    /// Re-prime all derivative state after a command-source discontinuity.
    pub fn reprime(&mut self, routers: &mut [CommandRouter]) {
        self.enforce_all(routers, RESET_DT_SECS);
    }

    /// The registries, in run order.
    pub fn enforcers(&self) -> &[LimitEnforcer; 6] {
        &self.enforcers
    }
}

impl Default for LimitSet {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
