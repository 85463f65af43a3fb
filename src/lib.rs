//! scroll-accel: velocity-dependent scroll wheel acceleration.
//!
//! Captures wheel events from the platform, estimates how fast the user is scrolling,
//! scales each delta by `multiplier * speed^exp` and re-emits the result as synthetic
//! scroll, without ever re-accelerating its own output.
//!
//! ## Pipeline
//! [`EventSource`] → [`Controller`] ([`SpeedEstimator`] → [`transform`] →
//! [`EventSynthesizer`]) → [`EventSink`], one event at a time on one thread.
//!
//! ## Conventions
//! - Deltas are in **notches** (see [`event`]), positive = up / right.
//! - Speed is notches per second on one axis.
//! - Platform code lives under [`backends`]; everything else is platform-neutral and
//!   tested against [`backends::virtual_input`].

pub mod backends;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod estimator;
pub mod event;
pub mod settings;
pub mod signals;
pub mod suppression;
pub mod synthesizer;
pub mod transform;

pub use controller::{Controller, ControllerStats, Outcome, Shutdown};
pub use device::*;
pub use error::{ConfigError, DeviceError, Error, EventError, SinkError};
pub use estimator::{EstimatorConfig, SpeedEstimator, SpeedSample};
pub use event::*;
pub use settings::Settings;
pub use suppression::{SuppressionGuard, SuppressionToken};
pub use synthesizer::{EmissionPlan, EventSynthesizer, Resolution, SynthConfig};
pub use transform::transform;
