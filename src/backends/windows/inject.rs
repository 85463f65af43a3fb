//! `SendInput` scroll injection.

#![cfg(target_os = "windows")]

use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_WHEEL, MOUSEINPUT,
};

use super::INJECT_SIGNATURE;
use crate::device::EventSink;
use crate::error::SinkError;
use crate::event::{Axis, SyntheticScroll};
use crate::suppression::SuppressionToken;
use crate::synthesizer::Resolution;

/// [`EventSink`] that injects wheel input through `SendInput`.
#[derive(Debug, Default)]
pub struct InjectSink;

impl InjectSink {
    pub fn new() -> Self {
        Self
    }
}

#[inline]
fn wheel_input(scroll: &SyntheticScroll) -> INPUT {
    let flags = match scroll.axis {
        Axis::Vertical => MOUSEEVENTF_WHEEL,
        Axis::Horizontal => MOUSEEVENTF_HWHEEL,
    };
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: scroll.steps as _,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: INJECT_SIGNATURE,
            },
        },
    }
}

impl EventSink for InjectSink {
    fn name(&self) -> &str {
        "SendInput"
    }

    fn resolution(&self) -> Resolution {
        Resolution::HI_RES
    }

    fn dispatch(
        &mut self,
        scroll: &SyntheticScroll,
        _token: &SuppressionToken<'_>,
    ) -> Result<(), SinkError> {
        let input = wheel_input(scroll);
        let sent = unsafe { SendInput(1, &input, core::mem::size_of::<INPUT>() as i32) };
        if sent == 1 {
            Ok(())
        } else {
            // Blocked by UIPI (e.g. an elevated foreground window) or out of resources.
            Err(SinkError::Rejected(format!(
                "SendInput: {}",
                std::io::Error::last_os_error()
            )))
        }
    }
}
