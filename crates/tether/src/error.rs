//! Configuration errors.

use thiserror::Error;

/// Configuration that cannot be clamped into something usable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{what} length must be finite and non-negative, got {value}")]
    InvalidLength { what: &'static str, value: f32 },
    #[error("node mass for mass-weighted correction must be positive, got {0}")]
    InvalidNodeMass(f32),
    #[error("{what} must be finite, got {value}")]
    NotFinite { what: &'static str, value: f32 },
}

/// Reject NaN/infinite or negative lengths.
pub(crate) fn check_length(what: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidLength { what, value })
    }
}

pub(crate) fn check_finite(what: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NotFinite { what, value })
    }
}
