//! Start-up settings for the acceleration curve.
//!
//! [`Settings`] is supplied once by the caller (CLI/config glue) and never changes
//! for the lifetime of a [`Controller`](crate::controller::Controller).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Acceleration parameters.
///
/// - `exp`: exponent applied to the estimated speed (`speed ** exp`).
/// - `multiplier`: flat linear factor applied on top of the curve.
/// - `verbose`: log every accelerated emission at `info` instead of `debug`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub exp: f64,
    pub multiplier: f64,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exp: 0.5,
            multiplier: 1.0,
            verbose: false,
        }
    }
}

impl Settings {
    /// Build validated settings.
    pub fn new(exp: f64, multiplier: f64, verbose: bool) -> Result<Self, ConfigError> {
        let settings = Self {
            exp,
            multiplier,
            verbose,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject non-finite or non-positive `exp`/`multiplier`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_finite("exp", self.exp)?;
        positive_finite("multiplier", self.multiplier)?;
        Ok(())
    }
}

pub(crate) fn positive_finite(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field, value });
    }
    if value <= 0.0 {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_and_negative() {
        let err = Settings::new(0.0, 1.0, false).unwrap_err();
        assert_eq!(err.field(), Some("exp"));

        let err = Settings::new(1.0, -2.0, false).unwrap_err();
        assert_eq!(err.field(), Some("multiplier"));
        assert!(matches!(err, ConfigError::NotPositive { .. }));
    }

    #[test]
    fn rejects_non_finite() {
        let err = Settings::new(f64::NAN, 1.0, false).unwrap_err();
        assert!(matches!(err, ConfigError::NotFinite { field: "exp", .. }));

        let err = Settings::new(1.0, f64::INFINITY, true).unwrap_err();
        assert!(matches!(err, ConfigError::NotFinite { field: "multiplier", .. }));
    }
}
