//! Per-axis kinematic limit structures.
//!
//! Limit values arrive already resolved from the kinematic description plus
//! optional parameter overrides; this crate only defines the shapes. An axis
//! without limits is valid — it runs unconstrained and the setup path logs a
//! warning.

use serde::{Deserialize, Serialize};

/// Hard kinematic bounds for one axis, in user units (rad, rad/s, Nm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisLimits {
    /// Minimum position.
    pub min_position: f64,
    /// Maximum position.
    pub max_position: f64,
    /// Maximum absolute velocity.
    pub max_velocity: f64,
    /// Maximum absolute acceleration. `None` disables the derivative bound
    /// on velocity commands.
    #[serde(default)]
    pub max_acceleration: Option<f64>,
    /// Maximum absolute effort. `None` disables effort clamping.
    #[serde(default)]
    pub max_effort: Option<f64>,
}

impl AxisLimits {
    /// Validate internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_position >= self.max_position {
            return Err(format!(
                "min_position {} >= max_position {}",
                self.min_position, self.max_position
            ));
        }
        if self.max_velocity <= 0.0 {
            return Err(format!("max_velocity {} must be > 0", self.max_velocity));
        }
        if let Some(acc) = self.max_acceleration
            && acc <= 0.0
        {
            return Err(format!("max_acceleration {acc} must be > 0"));
        }
        if let Some(eff) = self.max_effort
            && eff <= 0.0
        {
            return Err(format!("max_effort {eff} must be > 0"));
        }
        Ok(())
    }
}

/// Soft-limit zone for one axis.
///
/// Inside `[min_position, max_position]` the soft filter is transparent;
/// approaching a bound it shapes the command using the position gain
/// `k_position` (and `k_velocity` for effort commands). The filter carries
/// previous-command state and must be re-primed after any command-source
/// discontinuity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftLimits {
    /// Soft minimum position (inside the hard range).
    pub min_position: f64,
    /// Soft maximum position (inside the hard range).
    pub max_position: f64,
    /// Position gain [1/s] shaping the approach velocity.
    pub k_position: f64,
    /// Velocity gain [Nm·s/rad] shaping effort near the bounds.
    #[serde(default = "SoftLimits::default_k_velocity")]
    pub k_velocity: f64,
}

impl SoftLimits {
    fn default_k_velocity() -> f64 {
        1.0
    }

    /// Validate internal consistency against the hard bounds.
    pub fn validate(&self, hard: &AxisLimits) -> Result<(), String> {
        if self.min_position >= self.max_position {
            return Err(format!(
                "soft min_position {} >= soft max_position {}",
                self.min_position, self.max_position
            ));
        }
        if self.min_position < hard.min_position || self.max_position > hard.max_position {
            return Err(format!(
                "soft range [{}, {}] exceeds hard range [{}, {}]",
                self.min_position, self.max_position, hard.min_position, hard.max_position
            ));
        }
        if self.k_position <= 0.0 {
            return Err(format!("k_position {} must be > 0", self.k_position));
        }
        if self.k_velocity <= 0.0 {
            return Err(format!("k_velocity {} must be > 0", self.k_velocity));
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn hard() -> AxisLimits {
        AxisLimits {
            min_position: -3.0,
            max_position: 3.0,
            max_velocity: 2.0,
            max_acceleration: Some(10.0),
            max_effort: Some(50.0),
        }
    }

    #[test]
    fn valid_limits_pass() {
        assert!(hard().validate().is_ok());
    }

    #[test]
    fn inverted_position_range_rejected() {
        let mut l = hard();
        l.min_position = 5.0;
        assert!(l.validate().is_err());
    }

    #[test]
    fn nonpositive_velocity_rejected() {
        let mut l = hard();
        l.max_velocity = 0.0;
        assert!(l.validate().is_err());
    }

    #[test]
    fn soft_range_must_nest_in_hard() {
        let soft = SoftLimits {
            min_position: -4.0,
            max_position: 2.5,
            k_position: 10.0,
            k_velocity: 1.0,
        };
        assert!(soft.validate(&hard()).is_err());

        let soft = SoftLimits {
            min_position: -2.5,
            max_position: 2.5,
            k_position: 10.0,
            k_velocity: 1.0,
        };
        assert!(soft.validate(&hard()).is_ok());
    }

    #[test]
    fn soft_gains_must_be_positive() {
        let soft = SoftLimits {
            min_position: -2.0,
            max_position: 2.0,
            k_position: 0.0,
            k_velocity: 1.0,
        };
        assert!(soft.validate(&hard()).is_err());
    }
}
