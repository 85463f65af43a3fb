//! Error taxonomy.
//!
//! Only [`ConfigError`] and [`DeviceError`] ever leave the core (wrapped in [`Error`]).
//! [`EventError`] and [`SinkError`] describe a single bad event or a single failed
//! emission; the controller logs them and keeps going.

use std::path::PathBuf;

use thiserror::Error;

use crate::event::Axis;

/// Invalid start-up configuration. The process refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{field}` must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("`{field}` must be a finite number (got {value})")]
    NotFinite { field: &'static str, value: f64 },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

impl ConfigError {
    /// Name of the offending field, when the error is about a single value.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::NotPositive { field, .. } | ConfigError::NotFinite { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}

/// A single malformed input event. Dropped locally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EventError {
    #[error("scroll event without an axis")]
    MissingAxis,

    #[error("non-finite {axis} scroll delta {value}")]
    NonFiniteDelta { axis: Axis, value: f64 },
}

/// The input hook could not be acquired or was lost. Fatal, never retried.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no scroll-capable input devices found (check permissions for /dev/input, e.g. the `input` group)")]
    NoDevices,

    #[error("failed to open input device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to grab input device {path}: {source}")]
    Grab {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create virtual output device: {0}")]
    VirtualDevice(#[source] std::io::Error),

    #[error("input device lost: {0}")]
    Lost(String),

    #[error("input hook failed: {0}")]
    Hook(String),

    #[error("backend `{0}` is not available on this platform/build")]
    Unsupported(&'static str),
}

/// One failed dispatch of a synthetic event.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write synthetic scroll: {0}")]
    Io(#[from] std::io::Error),

    #[error("platform rejected synthetic scroll: {0}")]
    Rejected(String),
}

/// Errors that cross the core boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Device(_) => 1,
            Error::Config(_) => 2,
        }
    }
}
