#![cfg(target_os = "windows")]

//! Windows backend: low-level mouse hook in, `SendInput` out.
//!
//! - [`hook`] installs a `WH_MOUSE_LL` hook on a dedicated message-pump thread.
//!   Genuine `WM_MOUSEWHEEL` / `WM_MOUSEHWHEEL` messages are swallowed and queued;
//!   everything else passes through untouched.
//! - [`inject`] re-emits accelerated scroll with `SendInput`, stamping
//!   `dwExtraInfo` with [`INJECT_SIGNATURE`] so the hook recognises the echo.
//!
//! ## Conventions
//! - Wheel data is read as `WHEEL_DELTA` units (120 per notch) and divided by 120.
//!   Output resolution is [`Resolution::HI_RES`](crate::synthesizer::Resolution::HI_RES).
//! - The hook callback never blocks: if the queue is full the event is let through
//!   unaccelerated instead of being delayed.

use crate::backends::BackendOptions;
use crate::error::DeviceError;

pub mod hook;
pub mod inject;

pub use hook::HookSource;
pub use inject::InjectSink;

/// `WHEEL_DELTA`: one notch.
pub const WHEEL_DELTA: f64 = 120.0;

/// Marker written into `dwExtraInfo` of every injected event ("SCAC").
pub const INJECT_SIGNATURE: usize = 0x5343_4143;

/// Install the hook and prepare the injector.
pub fn open(options: &BackendOptions) -> Result<(HookSource, InjectSink), DeviceError> {
    if !options.devices.is_empty() {
        tracing::warn!("--device is ignored by the windows backend (the hook sees every mouse)");
    }
    let source = HookSource::install()?;
    Ok((source, InjectSink::new()))
}
