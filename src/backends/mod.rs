//! Input backends for `scroll-accel`.
//!
//! Each backend yields an [`EventSource`] + [`EventSink`] pair:
//!
//! - **`evdev_uinput`** (Linux; X11 and Wayland alike): grabs pointer devices with a scroll
//!   wheel, forwards everything that is not scroll through a uinput virtual device, and
//!   writes resynthesized scroll to the same virtual device.
//! - **`windows`**: a `WH_MOUSE_LL` hook swallows genuine wheel messages and queues
//!   them; synthetic scroll goes back through `SendInput` with a `dwExtraInfo`
//!   signature so the hook can recognise it.
//! - **`virtual_input`**: in-memory scripted source and recording sink.
//!
//! # Feature flags
//! - **`evdev-backend`**: Linux evdev/uinput backend (default).
//! - **`windows-hook`**: Windows low-level hook backend (default).
//!
//! The backend is picked once at start-up; there is no hot switching and no retry if
//! acquisition fails.

use std::fmt;
use std::path::PathBuf;

use crate::device::{EventSink, EventSource};
use crate::error::DeviceError;

#[cfg(all(feature = "evdev-backend", target_os = "linux"))]
#[cfg_attr(docsrs, doc(cfg(all(feature = "evdev-backend", target_os = "linux"))))]
pub mod evdev_uinput;

pub mod virtual_input;

#[cfg(all(feature = "windows-hook", target_os = "windows"))]
#[cfg_attr(docsrs, doc(cfg(all(feature = "windows-hook", target_os = "windows"))))]
pub mod windows;

/// Backend selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// Pick the native backend for this platform.
    #[default]
    Auto,
    Evdev,
    Windows,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Auto => f.write_str("auto"),
            BackendKind::Evdev => f.write_str("evdev"),
            BackendKind::Windows => f.write_str("windows"),
        }
    }
}

impl BackendKind {
    /// Resolve `Auto` to the native backend of the running platform.
    pub fn resolve(self) -> Result<BackendKind, DeviceError> {
        match self {
            BackendKind::Auto if cfg!(target_os = "linux") => Ok(BackendKind::Evdev),
            BackendKind::Auto if cfg!(target_os = "windows") => Ok(BackendKind::Windows),
            BackendKind::Auto => {
                if cfg!(target_os = "macos") {
                    tracing::warn!(
                        "macOS already accelerates scrolling natively; no backend is provided"
                    );
                }
                Err(DeviceError::Unsupported("auto"))
            }
            other => Ok(other),
        }
    }
}

/// Options shared by the native backends.
#[derive(Clone, Debug, Default)]
pub struct BackendOptions {
    /// Explicit device nodes (evdev only).
    pub devices: Vec<PathBuf>,
    /// Emit high-resolution wheel units where the platform distinguishes them (evdev).
    pub hi_res: bool,
}

pub type BackendPair = (Box<dyn EventSource>, Box<dyn EventSink>);

/// Acquire the input hook and output path for `kind`.
pub fn open(kind: BackendKind, options: &BackendOptions) -> Result<BackendPair, DeviceError> {
    match kind.resolve()? {
        BackendKind::Evdev => open_evdev(options),
        BackendKind::Windows => open_windows(options),
        BackendKind::Auto => Err(DeviceError::Unsupported("auto")),
    }
}

#[cfg(all(feature = "evdev-backend", target_os = "linux"))]
fn open_evdev(options: &BackendOptions) -> Result<BackendPair, DeviceError> {
    let (source, sink) = evdev_uinput::open(options)?;
    Ok((Box::new(source), Box::new(sink)))
}

#[cfg(not(all(feature = "evdev-backend", target_os = "linux")))]
fn open_evdev(_options: &BackendOptions) -> Result<BackendPair, DeviceError> {
    Err(DeviceError::Unsupported("evdev"))
}

#[cfg(all(feature = "windows-hook", target_os = "windows"))]
fn open_windows(options: &BackendOptions) -> Result<BackendPair, DeviceError> {
    let (source, sink) = windows::open(options)?;
    Ok((Box::new(source), Box::new(sink)))
}

#[cfg(not(all(feature = "windows-hook", target_os = "windows")))]
fn open_windows(_options: &BackendOptions) -> Result<BackendPair, DeviceError> {
    Err(DeviceError::Unsupported("windows"))
}
