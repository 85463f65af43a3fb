//! `WH_MOUSE_LL` capture thread.
//!
//! Low-level hooks run on the thread that installed them, and only while that thread
//! pumps messages. [`HookSource::install`] therefore spawns a pump thread, waits for it
//! to report whether `SetWindowsHookExW` succeeded, and from then on receives wheel
//! records over a bounded channel.

#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, info, warn};
use windows_sys::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HC_ACTION, LLMHF_INJECTED, MSG, MSLLHOOKSTRUCT,
    WH_MOUSE_LL, WM_MOUSEHWHEEL, WM_MOUSEWHEEL, WM_QUIT,
};

use super::{INJECT_SIGNATURE, WHEEL_DELTA};
use crate::device::{EventSource, Polled};
use crate::error::DeviceError;
use crate::event::{Axis, Origin, RawScroll};

/// Queue depth between the hook and the controller.
const QUEUE_CAPACITY: usize = 1024;

struct HookContext {
    tx: Sender<RawScroll>,
}

thread_local! {
    static CONTEXT: RefCell<Option<HookContext>> = const { RefCell::new(None) };
}

/// Decode a hooked wheel message. Returns `None` for non-wheel messages.
#[inline]
pub(crate) fn decode(message: u32, info: &MSLLHOOKSTRUCT, at: Instant) -> Option<RawScroll> {
    let axis = match message {
        WM_MOUSEWHEEL => Axis::Vertical,
        WM_MOUSEHWHEEL => Axis::Horizontal,
        _ => return None,
    };
    // Wheel delta lives in the high word, signed.
    let units = ((info.mouseData >> 16) & 0xFFFF) as u16 as i16;
    let ours = (info.flags & LLMHF_INJECTED) != 0 && info.dwExtraInfo == INJECT_SIGNATURE;
    Some(RawScroll {
        at,
        axis: Some(axis),
        raw_delta: units as f64 / WHEEL_DELTA,
        origin: if ours { Origin::Synthetic } else { Origin::User },
    })
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 && lparam != 0 {
        let info = &*(lparam as *const MSLLHOOKSTRUCT);
        if let Some(raw) = decode(wparam as u32, info, Instant::now()) {
            let swallow = CONTEXT.with(|ctx| match ctx.borrow().as_ref() {
                Some(ctx) => match ctx.tx.try_send(raw) {
                    // Our own echo is reported for bookkeeping but must reach the OS.
                    Ok(()) => raw.origin == Origin::User,
                    Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
                },
                None => false,
            });
            if swallow {
                return 1;
            }
        }
    }
    CallNextHookEx(core::ptr::null_mut(), code, wparam, lparam)
}

fn pump(tx: Sender<RawScroll>, ready: Sender<Result<u32, String>>) {
    unsafe {
        let thread_id = GetCurrentThreadId();
        CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(HookContext { tx }));

        let module = GetModuleHandleW(core::ptr::null());
        let hook = SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), module, 0);
        if hook.is_null() {
            let err = std::io::Error::last_os_error();
            let _ = ready.send(Err(format!("SetWindowsHookExW failed: {err}")));
            return;
        }
        let _ = ready.send(Ok(thread_id));

        let mut msg: MSG = core::mem::zeroed();
        // 0 = WM_QUIT, -1 = error; both end the pump.
        while GetMessageW(&mut msg, core::ptr::null_mut(), 0, 0) > 0 {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        UnhookWindowsHookEx(hook);
        CONTEXT.with(|ctx| *ctx.borrow_mut() = None);
        debug!("mouse hook removed");
    }
}

/// [`EventSource`] fed by the low-level mouse hook.
pub struct HookSource {
    rx: Receiver<RawScroll>,
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl HookSource {
    /// Spawn the pump thread and install the hook on it.
    pub fn install() -> Result<Self, DeviceError> {
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        let (ready_tx, ready_rx) = bounded(1);

        let thread = std::thread::Builder::new()
            .name("scroll-accel-hook".into())
            .spawn(move || pump(tx, ready_tx))
            .map_err(|e| DeviceError::Hook(format!("cannot spawn hook thread: {e}")))?;

        let thread_id = match ready_rx.recv() {
            Ok(Ok(id)) => id,
            Ok(Err(reason)) => {
                let _ = thread.join();
                return Err(DeviceError::Hook(reason));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(DeviceError::Hook("hook thread exited during start-up".into()));
            }
        };

        info!("low-level mouse hook installed");
        Ok(Self {
            rx,
            thread_id,
            thread: Some(thread),
        })
    }
}

impl EventSource for HookSource {
    fn name(&self) -> &str {
        "WH_MOUSE_LL"
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Polled, DeviceError> {
        match self.rx.recv_timeout(timeout) {
            Ok(raw) => Ok(Polled::Event(raw)),
            Err(RecvTimeoutError::Timeout) => Ok(Polled::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(DeviceError::Lost("mouse hook thread stopped".into()))
            }
        }
    }
}

impl Drop for HookSource {
    fn drop(&mut self) {
        unsafe {
            if PostThreadMessageW(self.thread_id, WM_QUIT, 0, 0) == 0 {
                warn!("could not stop hook thread: {}", std::io::Error::last_os_error());
                return;
            }
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
