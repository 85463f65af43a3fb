//! Process signals → [`Shutdown`].
//!
//! Unix: SIGINT, SIGTERM and SIGHUP set the shutdown flag. The handlers are installed
//! without `SA_RESTART` so a blocking `poll` in the evdev source returns `EINTR` and the
//! run loop notices promptly.
//!
//! Windows: the console control handler (Ctrl+C, Ctrl+Break, console close) sets the
//! same flag.
//!
//! Only the first call to [`install`] takes effect; later calls keep the original flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::controller::Shutdown;
use crate::error::DeviceError;

static STOP: OnceLock<Arc<AtomicBool>> = OnceLock::new();

fn request_stop() {
    if let Some(flag) = STOP.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

/// Route termination signals to `shutdown`.
pub fn install(shutdown: &Shutdown) -> Result<(), DeviceError> {
    if STOP.set(shutdown.flag()).is_err() {
        tracing::debug!("signal handlers already installed");
        return Ok(());
    }
    platform::install()
}

#[cfg(unix)]
mod platform {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    use crate::error::DeviceError;

    extern "C" fn on_signal(_: nix::libc::c_int) {
        super::request_stop();
    }

    pub(super) fn install() -> Result<(), DeviceError> {
        let action = SigAction::new(
            SigHandler::Handler(on_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );
        for signal in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP] {
            // SAFETY: the handler only performs an atomic store.
            unsafe { sigaction(signal, &action) }
                .map_err(|e| DeviceError::Hook(format!("sigaction({signal}): {e}")))?;
        }
        Ok(())
    }
}

#[cfg(windows)]
mod platform {
    use windows_sys::Win32::Foundation::{BOOL, TRUE};
    use windows_sys::Win32::System::Console::SetConsoleCtrlHandler;

    use crate::error::DeviceError;

    unsafe extern "system" fn on_ctrl(_ctrl_type: u32) -> BOOL {
        super::request_stop();
        TRUE
    }

    pub(super) fn install() -> Result<(), DeviceError> {
        if unsafe { SetConsoleCtrlHandler(Some(on_ctrl), TRUE) } == 0 {
            return Err(DeviceError::Hook(format!(
                "SetConsoleCtrlHandler: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    pub(super) fn install() -> Result<(), crate::error::DeviceError> {
        Ok(())
    }
}
