//! Per-axis scroll speed estimation.
//!
//! Each axis keeps a tiny [`AxisState`]: the time of the previous event and its delta.
//! Speed is `|delta| / elapsed` while a gesture is running and `|delta|` for the first
//! event of a gesture.
//!
//! A gesture ends when
//! - the gap since the previous event on that axis exceeds the idle window, or
//! - the scroll direction flips (if `reset_on_reversal` is enabled).
//!
//! All state is updated synchronously by [`SpeedEstimator::estimate`]; there is no
//! timer and nothing happens between events.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::event::{Axis, ScrollEvent};

/// Estimator tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    /// Gap after which the next event starts a new gesture.
    #[serde(with = "millis", rename = "idle_window_ms")]
    pub idle_window: Duration,
    /// Lower bound on elapsed time (ε), guards duplicate timestamps.
    #[serde(with = "millis", rename = "min_elapsed_ms")]
    pub min_elapsed: Duration,
    /// Upper clamp on the reported speed, in notches per second.
    pub max_speed: f64,
    /// Treat a direction flip as the start of a new gesture.
    pub reset_on_reversal: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            idle_window: Duration::from_millis(400),
            min_elapsed: Duration::from_millis(1),
            max_speed: 10_000.0,
            reset_on_reversal: true,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Rolling state for one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AxisState {
    /// Time of the last accepted event; `None` when idle.
    pub last_event_time: Option<Instant>,
    /// Delta of the last accepted event.
    pub last_delta: f64,
}

/// Result of one estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedSample {
    /// Finite, non-negative speed in notches per second.
    pub speed: f64,
    /// `true` when this event opened a new gesture.
    pub new_gesture: bool,
}

/// Converts raw events into instantaneous speed, one [`AxisState`] per axis.
#[derive(Clone, Debug, Default)]
pub struct SpeedEstimator {
    config: EstimatorConfig,
    axes: [AxisState; 2],
}

impl SpeedEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            axes: [AxisState::default(); 2],
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Current state for `axis`.
    pub fn state(&self, axis: Axis) -> &AxisState {
        &self.axes[axis.index()]
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.axes = [AxisState::default(); 2];
    }

    /// Estimate the user's scroll speed for `event` and update the axis state.
    pub fn estimate(&mut self, event: &ScrollEvent) -> SpeedSample {
        let cfg = self.config;
        let state = &mut self.axes[event.axis.index()];
        let magnitude = event.raw_delta.abs();

        let running = match state.last_event_time {
            None => None,
            Some(prev) => {
                // Out-of-order timestamps count as "no time passed".
                let elapsed = event.at.saturating_duration_since(prev);
                let reversed = cfg.reset_on_reversal
                    && state.last_delta != 0.0
                    && event.raw_delta != 0.0
                    && state.last_delta.signum() != event.raw_delta.signum();
                if elapsed > cfg.idle_window || reversed {
                    None
                } else {
                    Some(elapsed.max(cfg.min_elapsed))
                }
            }
        };

        let (raw_speed, new_gesture) = match running {
            Some(elapsed) => (magnitude / elapsed.as_secs_f64(), false),
            None => (magnitude, true),
        };

        state.last_event_time =
            Some(state.last_event_time.map_or(event.at, |prev| prev.max(event.at)));
        state.last_delta = event.raw_delta;

        SpeedSample {
            speed: clamp_speed(raw_speed, cfg.max_speed),
            new_gesture,
        }
    }
}

#[inline]
fn clamp_speed(speed: f64, max_speed: f64) -> f64 {
    if speed.is_nan() {
        0.0
    } else {
        speed.clamp(0.0, max_speed)
    }
}
