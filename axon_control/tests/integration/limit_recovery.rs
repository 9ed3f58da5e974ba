//! Integration test: limit state across mode switches.
//!
//! After a switch batch the limit derivative state must be primed from the
//! switch-time state, not from commands accumulated under the previous
//! mode.

use std::time::Duration;

use axon_common::mode::CommandKind;
use axon_control::arbiter::ControllerClaim;
use axon_control::cycle::ControllerHost;
use axon_control::stack::{AxisSet, setup};

use super::{pos_vel, sim_drives, two_axis_config};

fn claim(mode: u8, resource: &str) -> ControllerClaim {
    ControllerClaim {
        name: "test_controller".into(),
        required_mode: Some(mode),
        resources: vec![resource.to_string()],
    }
}

struct Command {
    kind: CommandKind,
    value: f64,
}

impl ControllerHost for Command {
    fn update(&mut self, _period: Duration, _reset: bool, axes: &mut AxisSet) {
        if let Some(router) = axes.router_by_name_mut("base")
            && router.live_kind() == Some(self.kind)
        {
            router.set_command(self.kind, self.value);
        }
    }
}

#[test]
fn first_position_command_after_switch_is_bounded_from_actual() {
    let config = two_axis_config();
    let mut stack = setup(
        &config,
        sim_drives(&config, pos_vel()),
        Box::new(Command {
            kind: CommandKind::Position,
            value: 0.1,
        }),
    )
    .unwrap();
    let arbiter = stack.arbiter();

    assert!(stack.init());
    arbiter.activate(&[claim(1, "base")]).unwrap();

    // First-ever tick uses the configured period (10 ms). With the actual
    // position at 0 and max_velocity 1.0, the 0.1 rad jump must come out
    // clamped to exactly one velocity-bounded step.
    assert!(stack.write());

    let axes = stack.axes();
    let guard = axes.lock().unwrap();
    let cmd = guard
        .router_by_name("base")
        .unwrap()
        .command(CommandKind::Position)
        .unwrap();
    assert!((cmd - 0.01).abs() < 1e-12, "clamped command was {cmd}");
}

#[test]
fn velocity_history_does_not_leak_into_position_mode() {
    let config = two_axis_config();
    let mut stack = setup(
        &config,
        sim_drives(&config, pos_vel()),
        Box::new(Command {
            kind: CommandKind::Velocity,
            value: 1.0,
        }),
    )
    .unwrap();
    let arbiter = stack.arbiter();

    assert!(stack.init());
    arbiter.activate(&[claim(3, "base")]).unwrap();
    for _ in 0..5 {
        assert!(stack.read());
        assert!(stack.write());
    }

    // Switch to position control. The velocity slot held 1.0; the position
    // enforcers must restart from the mirrored actual, and the next idle
    // tick must leave the (untouched) position command inside the hard
    // range.
    arbiter.activate(&[claim(1, "base")]).unwrap();
    assert!(stack.read());
    assert!(stack.write());

    let axes = stack.axes();
    let guard = axes.lock().unwrap();
    let router = guard.router_by_name("base").unwrap();
    assert_eq!(router.live_kind(), Some(CommandKind::Position));
    let cmd = router.command(CommandKind::Position).unwrap();
    assert!(
        (-3.14..=3.14).contains(&cmd),
        "position command {cmd} outside hard range"
    );
}

#[test]
fn hard_range_is_enforced_tick_over_tick() {
    let config = two_axis_config();
    let mut stack = setup(
        &config,
        sim_drives(&config, pos_vel()),
        Box::new(Command {
            kind: CommandKind::Velocity,
            value: 2.0, // over the 1.0 rad/s limit
        }),
    )
    .unwrap();
    let arbiter = stack.arbiter();

    assert!(stack.init());
    arbiter.activate(&[claim(3, "base")]).unwrap();
    for _ in 0..10 {
        assert!(stack.read());
        assert!(stack.write());
    }

    let axes = stack.axes();
    let guard = axes.lock().unwrap();
    let cmd = guard
        .router_by_name("base")
        .unwrap()
        .command(CommandKind::Velocity)
        .unwrap();
    assert!(cmd <= 1.0 + 1e-9, "velocity command {cmd} not clamped");
}
