//! Linux evdev + uinput backend.
//!
//! Reads wheel motion straight from `/dev/input/event*`, so it works the same under
//! X11 and Wayland.
//!
//! ## How it works
//! - Every selected device is **grabbed** (`EVIOCGRAB`), so the compositor no longer
//!   sees its events directly.
//! - A single uinput virtual pointer is created with the union of the devices' key and
//!   relative-axis capabilities.
//! - Button and motion traffic is forwarded to the virtual pointer frame by frame
//!   (one batch per `SYN_REPORT`).
//! - Wheel events are **not** forwarded; they become [`RawScroll`] records and come
//!   back out through [`UinputSink`] after acceleration.
//!
//! ## Device selection
//! Without an explicit list, every device that has a wheel (`REL_WHEEL`/`REL_HWHEEL`)
//! and relative pointer motion, and no absolute axes, is taken. Touchpads are left
//! alone: their scrolling is produced by libinput from absolute contacts and never
//! appears as wheel events here.
//!
//! ## Self-origin
//! The virtual pointer is named [`VIRTUAL_DEVICE_NAME`]. Devices with that name are
//! skipped during discovery; if one is listed explicitly it is opened read-only
//! (never grabbed, never forwarded) and its wheel events are tagged
//! [`Origin::Synthetic`].
//!
//! ## High-resolution wheels
//! Devices that report `REL_WHEEL_HI_RES` are read in hi-res units (1/120 notch) and
//! their legacy `REL_WHEEL` duplicates are ignored. Output is legacy notches unless
//! `hi_res` is enabled, in which case the sink emits `REL_WHEEL_HI_RES` and derives
//! the legacy notch events from it, the way kernel drivers do.
//!
//! ## Permissions
//! The process needs read/write access to the event nodes and `/dev/uinput`
//! (typically membership in the `input` group plus a uinput udev rule).
//!
//! Grabs and the virtual device are released when [`EvdevSource`]/[`UinputSink`] are
//! dropped, and by the kernel when the process dies.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime};

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AttributeSet, Device, EventType, InputEvent, InputEventKind, Key, RelativeAxisType,
    Synchronization,
};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, info, warn};

use crate::backends::BackendOptions;
use crate::device::{EventSink, EventSource, Polled};
use crate::error::{DeviceError, SinkError};
use crate::event::{Axis, Origin, RawScroll, SyntheticScroll};
use crate::suppression::SuppressionToken;
use crate::synthesizer::Resolution;

/// Name of the uinput device this backend creates.
pub const VIRTUAL_DEVICE_NAME: &str = "scroll-accel virtual pointer";

/// Hi-res wheel units per notch (`REL_WHEEL_HI_RES`).
const HI_RES_PER_NOTCH: f64 = 120.0;

/// Drain bound per device per wakeup.
const MAX_EVENTS_PER_FETCH: usize = 256;

/// Open devices and the virtual pointer.
pub fn open(options: &BackendOptions) -> Result<(EvdevSource, UinputSink), DeviceError> {
    let inputs = if options.devices.is_empty() {
        discover()?
    } else {
        options
            .devices
            .iter()
            .map(|path| open_input(path))
            .collect::<Result<Vec<_>, _>>()?
    };

    if inputs.iter().all(|d| d.self_origin) {
        return Err(DeviceError::NoDevices);
    }

    let virtual_device = build_virtual_device(&inputs, options.hi_res)?;
    let shared = Rc::new(RefCell::new(virtual_device));

    let mut source = EvdevSource {
        name: format!("evdev ({} device(s))", inputs.len()),
        inputs,
        output: Rc::clone(&shared),
        pending: VecDeque::new(),
    };
    source.grab_all()?;

    let sink = UinputSink {
        output: shared,
        resolution: if options.hi_res {
            Resolution::HI_RES
        } else {
            Resolution::NOTCHES
        },
        legacy_carry: [0; 2],
    };

    Ok((source, sink))
}

/// One opened input node.
struct InputDevice {
    path: PathBuf,
    name: String,
    device: Device,
    /// Device reports `REL_WHEEL_HI_RES` / `REL_HWHEEL_HI_RES`.
    hi_res_vertical: bool,
    hi_res_horizontal: bool,
    /// This is our own virtual pointer.
    self_origin: bool,
    grabbed: bool,
    /// Non-scroll events of the current frame, flushed at `SYN_REPORT`.
    frame: Vec<InputEvent>,
}

fn is_scroll_pointer(device: &Device) -> bool {
    let Some(rel) = device.supported_relative_axes() else {
        return false;
    };
    let has_wheel =
        rel.contains(RelativeAxisType::REL_WHEEL) || rel.contains(RelativeAxisType::REL_HWHEEL);
    let has_motion = rel.contains(RelativeAxisType::REL_X) && rel.contains(RelativeAxisType::REL_Y);
    let has_abs = device
        .supported_absolute_axes()
        .is_some_and(|abs| abs.iter().next().is_some());
    has_wheel && has_motion && !has_abs
}

fn discover() -> Result<Vec<InputDevice>, DeviceError> {
    let mut found = Vec::new();
    for (path, device) in evdev::enumerate() {
        let name = device.name().unwrap_or_default().to_string();
        if name == VIRTUAL_DEVICE_NAME {
            debug!("skipping our own virtual pointer at {}", path.display());
            continue;
        }
        if !is_scroll_pointer(&device) {
            continue;
        }
        found.push(wrap(path, device)?);
    }
    if found.is_empty() {
        return Err(DeviceError::NoDevices);
    }
    Ok(found)
}

fn open_input(path: &Path) -> Result<InputDevice, DeviceError> {
    let device = Device::open(path).map_err(|source| DeviceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    wrap(path.to_path_buf(), device)
}

fn wrap(path: PathBuf, device: Device) -> Result<InputDevice, DeviceError> {
    set_nonblocking(&device).map_err(|errno| DeviceError::Open {
        path: path.clone(),
        source: std::io::Error::from(errno),
    })?;

    let name = device.name().unwrap_or("unknown").to_string();
    let rel = device.supported_relative_axes();
    let has = |axis: RelativeAxisType| rel.is_some_and(|r| r.contains(axis));

    let input = InputDevice {
        hi_res_vertical: has(RelativeAxisType::REL_WHEEL_HI_RES),
        hi_res_horizontal: has(RelativeAxisType::REL_HWHEEL_HI_RES),
        self_origin: name == VIRTUAL_DEVICE_NAME,
        grabbed: false,
        frame: Vec::new(),
        path,
        name,
        device,
    };
    info!(
        "input {} \"{}\" (hi-res wheel: {}, self: {})",
        input.path.display(),
        input.name,
        input.hi_res_vertical || input.hi_res_horizontal,
        input.self_origin
    );
    Ok(input)
}

fn set_nonblocking(device: &Device) -> nix::Result<()> {
    let fd = device.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

fn build_virtual_device(inputs: &[InputDevice], hi_res: bool) -> Result<VirtualDevice, DeviceError> {
    let mut keys: AttributeSet<Key> = AttributeSet::new();
    let mut rel: AttributeSet<RelativeAxisType> = AttributeSet::new();

    for input in inputs.iter().filter(|d| !d.self_origin) {
        if let Some(src_keys) = input.device.supported_keys() {
            for key in src_keys.iter() {
                keys.insert(key);
            }
        }
        if let Some(src_rel) = input.device.supported_relative_axes() {
            for axis in src_rel.iter() {
                rel.insert(axis);
            }
        }
    }

    // libinput prefers the hi-res axes when they exist, so only advertise them if we
    // actually emit them.
    if hi_res {
        rel.insert(RelativeAxisType::REL_WHEEL_HI_RES);
        rel.insert(RelativeAxisType::REL_HWHEEL_HI_RES);
    } else {
        rel.remove(RelativeAxisType::REL_WHEEL_HI_RES);
        rel.remove(RelativeAxisType::REL_HWHEEL_HI_RES);
    }
    rel.insert(RelativeAxisType::REL_WHEEL);
    rel.insert(RelativeAxisType::REL_HWHEEL);
    keys.insert(Key::BTN_LEFT);

    let device = VirtualDeviceBuilder::new()
        .and_then(|b| b.name(VIRTUAL_DEVICE_NAME).with_keys(&keys))
        .and_then(|b| b.with_relative_axes(&rel))
        .and_then(|b| b.build())
        .map_err(DeviceError::VirtualDevice)?;

    info!("created uinput device \"{VIRTUAL_DEVICE_NAME}\"");
    Ok(device)
}

/// Longest spread of kernel timestamps honoured inside one read batch.
const MAX_BATCH_LAG: Duration = Duration::from_millis(250);

/// Monotonic timestamp for an event read in the batch fetched at `now`.
///
/// Kernel timestamps are `CLOCK_REALTIME` and can step. Only their spacing inside one
/// batch is used, measured back from the batch's newest event and capped at
/// [`MAX_BATCH_LAG`], so a clock step never reaches the estimator.
#[inline]
fn stamp(now: Instant, newest: SystemTime, at: SystemTime) -> Instant {
    let lag = newest.duration_since(at).unwrap_or_default().min(MAX_BATCH_LAG);
    now.checked_sub(lag).unwrap_or(now)
}

/// Decode a relative event into `(axis, notches)` if it is a wheel event we read.
///
/// On a hi-res device the legacy code for that axis is ignored (it duplicates the hi-res
/// stream); on a legacy device the hi-res codes never appear.
fn decode_wheel(
    axis: RelativeAxisType,
    value: i32,
    hi_res_vertical: bool,
    hi_res_horizontal: bool,
) -> Option<(Axis, f64)> {
    match axis {
        RelativeAxisType::REL_WHEEL if !hi_res_vertical => Some((Axis::Vertical, value as f64)),
        RelativeAxisType::REL_HWHEEL if !hi_res_horizontal => {
            Some((Axis::Horizontal, value as f64))
        }
        RelativeAxisType::REL_WHEEL_HI_RES => {
            Some((Axis::Vertical, value as f64 / HI_RES_PER_NOTCH))
        }
        RelativeAxisType::REL_HWHEEL_HI_RES => {
            Some((Axis::Horizontal, value as f64 / HI_RES_PER_NOTCH))
        }
        _ => None,
    }
}

fn is_wheel_code(axis: RelativeAxisType) -> bool {
    matches!(
        axis,
        RelativeAxisType::REL_WHEEL
            | RelativeAxisType::REL_HWHEEL
            | RelativeAxisType::REL_WHEEL_HI_RES
            | RelativeAxisType::REL_HWHEEL_HI_RES
    )
}

/// [`EventSource`] over the grabbed input nodes.
pub struct EvdevSource {
    name: String,
    inputs: Vec<InputDevice>,
    output: Rc<RefCell<VirtualDevice>>,
    pending: VecDeque<RawScroll>,
}

impl EvdevSource {
    fn grab_all(&mut self) -> Result<(), DeviceError> {
        for input in self.inputs.iter_mut().filter(|d| !d.self_origin) {
            input.device.grab().map_err(|source| DeviceError::Grab {
                path: input.path.clone(),
                source,
            })?;
            input.grabbed = true;
            info!("grabbed {}", input.path.display());
        }
        Ok(())
    }

    /// Wait for readability on any input. Returns indices of ready devices.
    fn wait(&self, timeout: Duration) -> Result<Vec<usize>, DeviceError> {
        let mut fds: Vec<PollFd<'_>> = self
            .inputs
            .iter()
            .map(|input| {
                // SAFETY: the fd is owned by `input.device`, which outlives `fds`.
                let fd = unsafe { BorrowedFd::borrow_raw(input.device.as_raw_fd()) };
                PollFd::new(fd, PollFlags::POLLIN)
            })
            .collect();

        let millis = timeout.as_millis().min(u16::MAX as u128) as u16;
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => return Ok(Vec::new()),
            Ok(_) => {}
            // A signal arrived; let the caller re-check shutdown.
            Err(Errno::EINTR) => return Ok(Vec::new()),
            Err(errno) => return Err(DeviceError::Lost(format!("poll failed: {errno}"))),
        }

        let mut ready = Vec::new();
        for (idx, fd) in fds.iter().enumerate() {
            let revents = fd.revents().unwrap_or(PollFlags::empty());
            if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
                return Err(DeviceError::Lost(format!(
                    "{} ({}) disconnected",
                    self.inputs[idx].name,
                    self.inputs[idx].path.display()
                )));
            }
            if revents.contains(PollFlags::POLLIN) {
                ready.push(idx);
            }
        }
        Ok(ready)
    }

    fn drain(&mut self, idx: usize) -> Result<(), DeviceError> {
        let input = &mut self.inputs[idx];

        let events: Vec<InputEvent> = match input.device.fetch_events() {
            Ok(iter) => iter.take(MAX_EVENTS_PER_FETCH).collect(),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
            Err(err) => {
                return Err(DeviceError::Lost(format!(
                    "{} ({}): {err}",
                    input.name,
                    input.path.display()
                )))
            }
        };
        let now = Instant::now();
        let newest = events
            .iter()
            .map(InputEvent::timestamp)
            .max()
            .unwrap_or(SystemTime::UNIX_EPOCH);

        for ev in events {
            match ev.kind() {
                InputEventKind::RelAxis(axis) if is_wheel_code(axis) => {
                    if let Some((axis, notches)) = decode_wheel(
                        axis,
                        ev.value(),
                        input.hi_res_vertical,
                        input.hi_res_horizontal,
                    ) {
                        let at = stamp(now, newest, ev.timestamp());
                        self.pending.push_back(RawScroll {
                            at,
                            axis: Some(axis),
                            raw_delta: notches,
                            origin: if input.self_origin {
                                Origin::Synthetic
                            } else {
                                Origin::User
                            },
                        });
                    }
                }
                InputEventKind::Synchronization(Synchronization::SYN_REPORT) => {
                    if !input.frame.is_empty() {
                        let frame = std::mem::take(&mut input.frame);
                        if let Err(err) = self.output.borrow_mut().emit(&frame) {
                            warn!("failed to forward {} event(s): {err}", frame.len());
                        }
                    }
                }
                _ if input.self_origin => {}
                _ => {
                    let ty = ev.event_type();
                    if ty == EventType::KEY || ty == EventType::RELATIVE {
                        input.frame.push(ev);
                    }
                }
            }
        }
        Ok(())
    }
}

impl EventSource for EvdevSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Polled, DeviceError> {
        if let Some(raw) = self.pending.pop_front() {
            return Ok(Polled::Event(raw));
        }
        for idx in self.wait(timeout)? {
            self.drain(idx)?;
        }
        Ok(match self.pending.pop_front() {
            Some(raw) => Polled::Event(raw),
            None => Polled::Timeout,
        })
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        for input in self.inputs.iter_mut().filter(|d| d.grabbed) {
            match input.device.ungrab() {
                Ok(()) => debug!("released {}", input.path.display()),
                Err(err) => debug!("ungrab {} failed: {err}", input.path.display()),
            }
        }
    }
}

/// Splits hi-res units into legacy notches, carrying the remainder per axis.
#[inline]
fn take_legacy_notches(carry: &mut i32, hi_res_units: i32) -> i32 {
    if *carry != 0 && hi_res_units != 0 && carry.signum() != hi_res_units.signum() {
        *carry = 0;
    }
    *carry += hi_res_units;
    let notches = *carry / HI_RES_PER_NOTCH as i32;
    *carry -= notches * HI_RES_PER_NOTCH as i32;
    notches
}

/// [`EventSink`] writing to the uinput virtual pointer.
pub struct UinputSink {
    output: Rc<RefCell<VirtualDevice>>,
    resolution: Resolution,
    legacy_carry: [i32; 2],
}

impl EventSink for UinputSink {
    fn name(&self) -> &str {
        VIRTUAL_DEVICE_NAME
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn dispatch(
        &mut self,
        scroll: &SyntheticScroll,
        _token: &SuppressionToken<'_>,
    ) -> Result<(), SinkError> {
        let (legacy, hi_res) = match scroll.axis {
            Axis::Vertical => (
                RelativeAxisType::REL_WHEEL,
                RelativeAxisType::REL_WHEEL_HI_RES,
            ),
            Axis::Horizontal => (
                RelativeAxisType::REL_HWHEEL,
                RelativeAxisType::REL_HWHEEL_HI_RES,
            ),
        };

        let mut batch = Vec::with_capacity(2);
        if self.resolution == Resolution::HI_RES {
            batch.push(InputEvent::new(EventType::RELATIVE, hi_res.0, scroll.steps));
            let notches = take_legacy_notches(&mut self.legacy_carry[scroll.axis.index()], scroll.steps);
            if notches != 0 {
                batch.push(InputEvent::new(EventType::RELATIVE, legacy.0, notches));
            }
        } else {
            batch.push(InputEvent::new(EventType::RELATIVE, legacy.0, scroll.steps));
        }

        self.output.borrow_mut().emit(&batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_wheel_decodes_to_notches() {
        assert_eq!(
            decode_wheel(RelativeAxisType::REL_WHEEL, -2, false, false),
            Some((Axis::Vertical, -2.0))
        );
        assert_eq!(
            decode_wheel(RelativeAxisType::REL_HWHEEL, 1, false, false),
            Some((Axis::Horizontal, 1.0))
        );
    }

    #[test]
    fn hi_res_device_ignores_legacy_duplicate() {
        assert_eq!(decode_wheel(RelativeAxisType::REL_WHEEL, 1, true, false), None);
        assert_eq!(
            decode_wheel(RelativeAxisType::REL_WHEEL_HI_RES, 60, true, false),
            Some((Axis::Vertical, 0.5))
        );
        // Horizontal axis of the same device is still legacy.
        assert_eq!(
            decode_wheel(RelativeAxisType::REL_HWHEEL, 1, true, false),
            Some((Axis::Horizontal, 1.0))
        );
    }

    #[test]
    fn legacy_notches_follow_hi_res_stream() {
        let mut carry = 0;
        assert_eq!(take_legacy_notches(&mut carry, 60), 0);
        assert_eq!(take_legacy_notches(&mut carry, 90), 1);
        assert_eq!(carry, 30);
        assert_eq!(take_legacy_notches(&mut carry, -130), -1);
        assert_eq!(carry, -10);
    }

    #[test]
    fn batch_spacing_survives_but_wall_clock_steps_do_not() {
        let now = Instant::now();
        let newest = SystemTime::now();
        let earlier = newest - Duration::from_millis(10);
        assert_eq!(stamp(now, newest, newest), now);
        assert_eq!(stamp(now, newest, earlier), now - Duration::from_millis(10));
        // A forward step inside the batch is capped, a backward one is ignored.
        let stepped = newest - Duration::from_secs(3600);
        assert_eq!(stamp(now, newest, stepped), now - MAX_BATCH_LAG);
        assert_eq!(stamp(now, newest, newest + Duration::from_secs(5)), now);
    }

    #[test]
    fn wall_clock_behind_start_keeps_idle_gaps() {
        use crate::estimator::SpeedEstimator;

        // Kernel time is ten seconds behind, one-notch events a second apart, each
        // read in its own batch.
        let wall = SystemTime::now() - Duration::from_secs(10);
        let start = Instant::now();
        let mut estimator = SpeedEstimator::default();
        for i in 0..3u64 {
            let kernel = wall + Duration::from_secs(i);
            let at = stamp(start + Duration::from_secs(i), kernel, kernel);
            let raw = RawScroll::user(at, Axis::Vertical, 1.0);
            let sample = estimator.estimate(&raw.validate().unwrap());
            assert_eq!(sample.speed, 1.0, "event {i}");
            assert!(sample.new_gesture, "event {i}");
        }
    }
}
