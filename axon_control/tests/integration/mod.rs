mod activation;
mod concurrency;
mod limit_recovery;

use axon_common::drive::MotorDrive;
use axon_common::mode::SupportedModes;
use axon_control::config::{StackConfig, load_config_from_str};
use axon_control::sim::SimDrive;

// ── Shared fixtures ─────────────────────────────────────────────────

pub const TWO_AXIS_TOML: &str = r#"
cycle_time_us = 10000

[[axes]]
name = "base"
scale = 1.0

[axes.limits]
min_position = -3.14
max_position = 3.14
max_velocity = 1.0
max_acceleration = 4.0

[axes.soft_limits]
min_position = -3.0
max_position = 3.0
k_position = 10.0

[[axes]]
name = "elbow"
scale = 1.0

[axes.limits]
min_position = -2.0
max_position = 2.0
max_velocity = 0.5
"#;

pub fn two_axis_config() -> StackConfig {
    load_config_from_str(TWO_AXIS_TOML).expect("fixture config")
}

pub fn sim_drives(
    config: &StackConfig,
    supported: SupportedModes,
) -> Vec<(String, Box<dyn MotorDrive>)> {
    config
        .axes
        .iter()
        .map(|axis| {
            (
                axis.name.clone(),
                Box::new(SimDrive::new(supported)) as Box<dyn MotorDrive>,
            )
        })
        .collect()
}

pub fn pos_vel() -> SupportedModes {
    SupportedModes::PROFILED_POSITION | SupportedModes::PROFILED_VELOCITY
}
