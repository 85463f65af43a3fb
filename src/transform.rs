//! Acceleration curve.
//!
//! Pure functions only. The curve is `speed ** exp`, scaled by the flat `multiplier`:
//!
//! ```text
//! accelerated_delta = raw_delta * speed^exp * multiplier
//! ```
//!
//! `exp = 0` disables the speed-dependent part. `0 ** 0` is defined as `1` so that
//! a zero speed with acceleration disabled still yields the flat multiplier.

use crate::settings::Settings;

/// Speed-dependent part of the multiplier: `speed ** exp`.
#[inline]
pub fn curve(speed: f64, exp: f64) -> f64 {
    if exp == 0.0 {
        return 1.0;
    }
    speed.powf(exp)
}

/// Full multiplier for a given speed: `curve(speed, exp) * multiplier`.
#[inline]
pub fn transform(speed: f64, settings: &Settings) -> f64 {
    curve(speed, settings.exp) * settings.multiplier
}

/// Apply the multiplier for `speed` to a raw delta.
#[inline]
pub fn accelerate(raw_delta: f64, speed: f64, settings: &Settings) -> f64 {
    raw_delta * transform(speed, settings)
}
