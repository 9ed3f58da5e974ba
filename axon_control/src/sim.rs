//! Simulated motor drive.
//!
//! A process-local `MotorDrive` with a first-order plant model, used by the
//! default binary and throughout the tests. All values are in raw device
//! units; scaling happens in the wrapping `Axis` exactly as it would for a
//! fieldbus drive.
//!
//! Tests advance the plant explicitly with [`SimDrive::step`]. The binary
//! uses [`SimDrive::free_running`], which steps the plant lazily from the
//! wall clock whenever an actual value is read.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axon_common::drive::{DriveError, MotorDrive};
use axon_common::mode::{CommandKind, OperationMode, SupportedModes};

/// Position tracking bandwidth of the simulated plant [1/s].
const POSITION_GAIN: f64 = 20.0;
/// Simulated rotor inertia for effort mode [raw units].
const INERTIA: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
struct Plant {
    mode: OperationMode,
    position: f64,
    velocity: f64,
    effort: f64,
    target: [f64; 3],
}

impl Plant {
    fn at_rest() -> Self {
        Self {
            mode: OperationMode::NoMode,
            position: 0.0,
            velocity: 0.0,
            effort: 0.0,
            target: [0.0; 3],
        }
    }

    fn step(&mut self, dt: f64) {
        match self.mode.command_kind() {
            Some(CommandKind::Position) => {
                let error = self.target[CommandKind::Position.index()] - self.position;
                self.velocity = error * POSITION_GAIN;
                self.position += self.velocity * dt;
            }
            Some(CommandKind::Velocity) => {
                self.velocity = self.target[CommandKind::Velocity.index()];
                self.position += self.velocity * dt;
            }
            Some(CommandKind::Effort) => {
                self.effort = self.target[CommandKind::Effort.index()];
                self.velocity += self.effort / INERTIA * dt;
                self.position += self.velocity * dt;
            }
            None => {
                self.velocity = 0.0;
                self.effort = 0.0;
            }
        }
    }
}

/// In-process drive simulation.
pub struct SimDrive {
    supported: SupportedModes,
    plant: RefCell<Plant>,
    /// Wall clock of the last lazy step; `None` for manually stepped drives.
    auto_clock: Option<RefCell<Instant>>,
    /// Test hook: the next `enter_mode_and_wait` reports a protocol timeout.
    fail_switch: AtomicBool,
}

impl SimDrive {
    /// New drive at rest in `NoMode`, advertising `supported`. The plant
    /// only moves when [`step`](Self::step) is called.
    pub fn new(supported: SupportedModes) -> Self {
        Self {
            supported,
            plant: RefCell::new(Plant::at_rest()),
            auto_clock: None,
            fail_switch: AtomicBool::new(false),
        }
    }

    /// New drive whose plant advances on the wall clock whenever an actual
    /// value is read.
    pub fn free_running(supported: SupportedModes) -> Self {
        Self {
            auto_clock: Some(RefCell::new(Instant::now())),
            ..Self::new(supported)
        }
    }

    /// Place the plant at a raw position (test scaffolding).
    pub fn set_actual_position(&mut self, raw: f64) {
        self.plant.borrow_mut().position = raw;
    }

    /// Set the plant's raw velocity (test scaffolding).
    pub fn set_actual_velocity(&mut self, raw: f64) {
        self.plant.borrow_mut().velocity = raw;
    }

    /// Put the drive into `mode` without going through the switch protocol,
    /// as if an external tool had commanded it over the bus.
    pub fn force_mode(&mut self, mode: OperationMode) {
        self.plant.borrow_mut().mode = mode;
    }

    /// Arm the switch-failure hook: the next mode switch times out.
    pub fn fail_next_switch(&self) {
        self.fail_switch.store(true, Ordering::Relaxed);
    }

    /// Advance the plant by `dt` seconds.
    ///
    /// Position modes track the target with a first-order lag, velocity
    /// modes integrate it directly, effort modes accelerate a unit inertia.
    pub fn step(&mut self, dt: f64) {
        self.plant.borrow_mut().step(dt);
    }

    fn auto_step(&self) {
        if let Some(clock) = &self.auto_clock {
            let mut last = clock.borrow_mut();
            // Cap the lazy step so a long gap between reads cannot make the
            // first-order position update overshoot.
            let dt = last.elapsed().as_secs_f64().min(0.5 / POSITION_GAIN);
            if dt > 0.0 {
                *last = Instant::now();
                self.plant.borrow_mut().step(dt);
            }
        }
    }
}

impl MotorDrive for SimDrive {
    fn supported_modes(&self) -> SupportedModes {
        self.supported
    }

    fn current_mode(&self) -> OperationMode {
        self.plant.borrow().mode
    }

    fn actual_position(&self) -> f64 {
        self.auto_step();
        self.plant.borrow().position
    }

    fn actual_velocity(&self) -> f64 {
        self.auto_step();
        self.plant.borrow().velocity
    }

    fn actual_effort(&self) -> f64 {
        self.auto_step();
        self.plant.borrow().effort
    }

    fn target_position(&self) -> f64 {
        self.plant.borrow().target[CommandKind::Position.index()]
    }

    fn target_velocity(&self) -> f64 {
        self.plant.borrow().target[CommandKind::Velocity.index()]
    }

    fn target_effort(&self) -> f64 {
        self.plant.borrow().target[CommandKind::Effort.index()]
    }

    fn set_target_position(&mut self, raw: f64) {
        self.plant.borrow_mut().target[CommandKind::Position.index()] = raw;
    }

    fn set_target_velocity(&mut self, raw: f64) {
        self.plant.borrow_mut().target[CommandKind::Velocity.index()] = raw;
    }

    fn set_target_effort(&mut self, raw: f64) {
        self.plant.borrow_mut().target[CommandKind::Effort.index()] = raw;
    }

    fn enter_mode_and_wait(&mut self, mode: OperationMode) -> Result<(), DriveError> {
        if !self.supported.supports(mode) {
            return Err(DriveError::UnsupportedMode(mode as u8));
        }
        if self.fail_switch.swap(false, Ordering::Relaxed) {
            return Err(DriveError::SwitchNotConfirmed(format!(
                "simulated timeout entering {mode:?}"
            )));
        }
        self.plant.borrow_mut().mode = mode;
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_rejects_unadvertised_mode() {
        let mut drive = SimDrive::new(SupportedModes::PROFILED_POSITION);
        let err = drive
            .enter_mode_and_wait(OperationMode::ProfiledVelocity)
            .unwrap_err();
        assert!(matches!(err, DriveError::UnsupportedMode(3)));
        assert_eq!(drive.current_mode(), OperationMode::NoMode);
    }

    #[test]
    fn failure_hook_fires_once() {
        let mut drive = SimDrive::new(SupportedModes::PROFILED_POSITION);
        drive.fail_next_switch();
        assert!(drive.enter_mode_and_wait(OperationMode::ProfiledPosition).is_err());
        assert!(drive.enter_mode_and_wait(OperationMode::ProfiledPosition).is_ok());
        assert_eq!(drive.current_mode(), OperationMode::ProfiledPosition);
    }

    #[test]
    fn velocity_mode_integrates_position() {
        let mut drive = SimDrive::new(SupportedModes::PROFILED_VELOCITY);
        drive.enter_mode_and_wait(OperationMode::ProfiledVelocity).unwrap();
        drive.set_target_velocity(2.0);
        for _ in 0..10 {
            drive.step(0.01);
        }
        assert!((drive.actual_position() - 0.2).abs() < 1e-9);
        assert!((drive.actual_velocity() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn position_mode_converges_to_target() {
        let mut drive = SimDrive::new(SupportedModes::PROFILED_POSITION);
        drive.enter_mode_and_wait(OperationMode::ProfiledPosition).unwrap();
        drive.set_target_position(1.0);
        for _ in 0..500 {
            drive.step(0.01);
        }
        assert!((drive.actual_position() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn idle_drive_holds_still() {
        let mut drive = SimDrive::new(SupportedModes::PROFILED_VELOCITY);
        drive.set_actual_position(3.0);
        drive.set_actual_velocity(1.0);
        drive.step(0.01);
        assert_eq!(drive.actual_position(), 3.0);
        assert_eq!(drive.actual_velocity(), 0.0);
    }

    #[test]
    fn manually_stepped_drive_ignores_wall_clock() {
        let drive = SimDrive::new(SupportedModes::PROFILED_VELOCITY);
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_eq!(drive.actual_position(), 0.0);
    }
}
