//! TOML configuration loader with validation.
//!
//! Loads the stack configuration (cycle time plus the per-axis entries with
//! their scale and limit tables). Validates: cycle time bounds, axis name
//! uniqueness, limit table sanity, and soft-position nesting inside the
//! hard range.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use axon_common::limits::{AxisLimits, SoftLimits};

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    /// File I/O error.
    IoError(String),
    /// TOML parse error.
    ParseError(String),
    /// Parameter validation error.
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "config I/O error: {e}"),
            Self::ParseError(e) => write!(f, "config parse error: {e}"),
            Self::ValidationError(e) => write!(f, "config validation: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ─── Config Types ───────────────────────────────────────────────────

/// One configured axis.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisConfigEntry {
    /// Resource name controllers claim this axis by.
    pub name: String,
    /// Raw-units-per-user-unit conversion factor. Defaults to the CiA 402
    /// millidegree scale when absent.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Hard limit table. An axis without one runs unconstrained.
    #[serde(default)]
    pub limits: Option<AxisLimits>,
    /// Optional soft position band inside the hard range.
    #[serde(default)]
    pub soft_limits: Option<SoftLimits>,
}

/// Top-level stack configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StackConfig {
    /// Control cycle time [µs].
    pub cycle_time_us: u32,
    /// Axes, in loop order.
    #[serde(default)]
    pub axes: Vec<AxisConfigEntry>,
}

impl StackConfig {
    /// Cycle time as a `Duration`.
    pub fn cycle_time(&self) -> Duration {
        Duration::from_micros(u64::from(self.cycle_time_us))
    }

    /// Run all validation rules.
    pub fn validate(&self) -> Result<(), String> {
        if !(100..=100_000).contains(&self.cycle_time_us) {
            return Err(format!(
                "cycle_time_us {} out of range [100, 100000]",
                self.cycle_time_us
            ));
        }
        if self.axes.is_empty() {
            return Err("at least one axis must be configured".into());
        }

        let mut seen = HashSet::new();
        for axis in &self.axes {
            if axis.name.is_empty() {
                return Err("axis name must not be empty".into());
            }
            if !seen.insert(axis.name.as_str()) {
                return Err(format!("duplicate axis name '{}'", axis.name));
            }
            if let Some(scale) = axis.scale
                && scale == 0.0
            {
                return Err(format!("axis '{}': scale must be non-zero", axis.name));
            }
            if let Some(limits) = &axis.limits {
                limits
                    .validate()
                    .map_err(|e| format!("axis '{}': {e}", axis.name))?;
                if let Some(soft) = &axis.soft_limits {
                    soft.validate(limits)
                        .map_err(|e| format!("axis '{}': {e}", axis.name))?;
                }
            } else if axis.soft_limits.is_some() {
                return Err(format!(
                    "axis '{}': soft_limits require a limits table",
                    axis.name
                ));
            }
        }
        Ok(())
    }
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the stack configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<StackConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::IoError(format!("failed to read {}: {e}", path.display())))?;
    load_config_from_str(&text)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(text: &str) -> Result<StackConfig, ConfigError> {
    let config: StackConfig =
        toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate().map_err(ConfigError::ValidationError)?;
    Ok(config)
}

// ─── Tests ──────────────────────────────────────────────────────────
