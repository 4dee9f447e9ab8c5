//! Sizing thresholds and multipliers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from validating a [`SizerPolicy`].
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("{name} must be in (0, 1], got {value}")]
    RatioOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be at least 1, got {value}")]
    MultiplierTooSmall { name: &'static str, value: f64 },

    #[error("thresholds must tighten with severity: mild {mild} > severe {severe} > critical {critical}")]
    ThresholdOrder {
        mild: f64,
        severe: f64,
        critical: f64,
    },
}

/// Standby-to-floor ratios below which a fleet under demand gets a larger
/// target, and how much larger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizerPolicy {
    pub mild_ratio: f64,
    pub severe_ratio: f64,
    pub critical_ratio: f64,
    pub mild_multiplier: f64,
    pub severe_multiplier: f64,
    pub critical_multiplier: f64,
}

impl Default for SizerPolicy {
    fn default() -> Self {
        Self {
            mild_ratio: 0.5,
            severe_ratio: 0.25,
            critical_ratio: 0.005,
            mild_multiplier: 1.5,
            severe_multiplier: 3.0,
            critical_multiplier: 4.0,
        }
    }
}

impl SizerPolicy {
    /// Check that the policy describes an escalation ladder.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (name, value) in [
            ("mild_ratio", self.mild_ratio),
            ("severe_ratio", self.severe_ratio),
            ("critical_ratio", self.critical_ratio),
        ] {
            if value.is_nan() || value <= 0.0 || value > 1.0 {
                return Err(PolicyError::RatioOutOfRange { name, value });
            }
        }
        for (name, value) in [
            ("mild_multiplier", self.mild_multiplier),
            ("severe_multiplier", self.severe_multiplier),
            ("critical_multiplier", self.critical_multiplier),
        ] {
            if value.is_nan() || value < 1.0 {
                return Err(PolicyError::MultiplierTooSmall { name, value });
            }
        }
        if self.mild_ratio <= self.severe_ratio || self.severe_ratio <= self.critical_ratio {
            return Err(PolicyError::ThresholdOrder {
                mild: self.mild_ratio,
                severe: self.severe_ratio,
                critical: self.critical_ratio,
            });
        }
        Ok(())
    }
}
