//! Integration test: controller activation end to end.
//!
//! Config string → stack setup → claim evaluation → mode switch → command
//! flow through the live slot to the drive target and back.

use std::time::Duration;

use axon_common::error::ArbitrationError;
use axon_common::mode::{CommandKind, OperationMode};
use axon_control::arbiter::ControllerClaim;
use axon_control::cycle::{ControllerHost, NullHost};
use axon_control::stack::{AxisSet, setup};

use super::{pos_vel, sim_drives, two_axis_config};

fn claim(mode: u8, resources: &[&str]) -> ControllerClaim {
    ControllerClaim {
        name: "test_controller".into(),
        required_mode: Some(mode),
        resources: resources.iter().map(|r| (*r).to_string()).collect(),
    }
}

#[test]
fn activate_position_then_velocity_across_both_axes() {
    let config = two_axis_config();
    let stack = setup(&config, sim_drives(&config, pos_vel()), Box::new(NullHost)).unwrap();
    let arbiter = stack.arbiter();
    let axes = stack.axes();

    arbiter.activate(&[claim(1, &["base", "elbow"])]).unwrap();
    {
        let guard = axes.lock().unwrap();
        for name in ["base", "elbow"] {
            let router = guard.router_by_name(name).unwrap();
            assert_eq!(router.live_kind(), Some(CommandKind::Position));
            assert_eq!(router.info().mode(), OperationMode::ProfiledPosition);
        }
    }

    // Re-activating the same mode is a no-op (all axes already active).
    arbiter.activate(&[claim(1, &["base", "elbow"])]).unwrap();

    arbiter.activate(&[claim(3, &["base", "elbow"])]).unwrap();
    {
        let guard = axes.lock().unwrap();
        for name in ["base", "elbow"] {
            let router = guard.router_by_name(name).unwrap();
            assert_eq!(router.live_kind(), Some(CommandKind::Velocity));
            assert_eq!(router.info().mode(), OperationMode::ProfiledVelocity);
        }
    }
    assert!(!arbiter.is_paused());
}

#[test]
fn activation_rejects_unavailable_mode_without_side_effects() {
    let config = two_axis_config();
    let stack = setup(&config, sim_drives(&config, pos_vel()), Box::new(NullHost)).unwrap();
    let arbiter = stack.arbiter();
    let axes = stack.axes();

    // Profiled torque (4) is not advertised by these drives.
    let err = arbiter.activate(&[claim(4, &["base"])]).unwrap_err();
    assert_eq!(
        err,
        ArbitrationError::ModeUnavailable {
            axis: "base".into(),
            mode: 4
        }
    );
    assert!(!arbiter.is_paused());
    let guard = axes.lock().unwrap();
    assert_eq!(guard.router_by_name("base").unwrap().live_kind(), None);
}

struct SmallStep;

impl ControllerHost for SmallStep {
    fn update(&mut self, _period: Duration, _reset: bool, axes: &mut AxisSet) {
        if let Some(router) = axes.router_by_name_mut("base")
            && router.live_kind() == Some(CommandKind::Position)
        {
            router.set_command(CommandKind::Position, 0.005);
        }
    }
}

#[test]
fn commands_round_trip_through_the_drive_target() {
    let config = two_axis_config();
    let mut stack = setup(
        &config,
        sim_drives(&config, pos_vel()),
        Box::new(SmallStep),
    )
    .unwrap();
    let arbiter = stack.arbiter();
    let axes = stack.axes();

    assert!(stack.init());
    arbiter.activate(&[claim(1, &["base"])]).unwrap();

    // Tick 1 writes the command into the slot, tick 2 pushes it to the
    // drive, tick 3's read phase reads the live target back.
    for _ in 0..3 {
        assert!(stack.read());
        assert!(stack.write());
    }

    let guard = axes.lock().unwrap();
    let cmd = guard
        .router_by_name("base")
        .unwrap()
        .command(CommandKind::Position)
        .unwrap();
    assert!((cmd - 0.005).abs() < 1e-12, "read-back command was {cmd}");
}

#[test]
fn idle_axis_ticks_cleanly_without_a_live_mode() {
    let config = two_axis_config();
    let mut stack = setup(&config, sim_drives(&config, pos_vel()), Box::new(NullHost)).unwrap();

    assert!(stack.init());
    for _ in 0..5 {
        assert!(stack.read());
        assert!(stack.write());
    }
    let axes = stack.axes();
    let guard = axes.lock().unwrap();
    assert_eq!(guard.router_by_name("base").unwrap().live_kind(), None);
}
