//! Scroll events as seen by the acceleration core.
//!
//! Backends capture wheel motion as [`RawScroll`] records and the controller
//! validates them into [`ScrollEvent`]s before anything else touches them.
//!
//! ## Value conventions
//! - **Units:** deltas are expressed in **notches** on every backend. A legacy wheel
//!   detent is `1.0`; high-resolution sources report fractions of a notch
//!   (Windows `WHEEL_DELTA` and Linux `REL_*_HI_RES` values are divided by 120).
//! - **Sign:** positive vertical = away from the user (content scrolls up),
//!   positive horizontal = right. This matches both `REL_WHEEL` and `WM_MOUSEWHEEL`.
//! - **Time:** `at` is a monotonic [`Instant`] taken at capture time. Wall-clock
//!   timestamps from the platform never set it directly.
//!
//! ### Origin tagging
//! Every event carries an [`Origin`]. Backends set [`Origin::Synthetic`] when the
//! platform tells them an event came from our own injection path (uinput device name,
//! `dwExtraInfo` signature). The controller never accelerates such events.

use std::fmt;
use std::time::Instant;

use crate::error::EventError;

/// Scroll axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Vertical,
    Horizontal,
}

impl Axis {
    /// Dense index used by per-axis state tables.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis::Vertical => 0,
            Axis::Horizontal => 1,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Vertical => f.write_str("vertical"),
            Axis::Horizontal => f.write_str("horizontal"),
        }
    }
}

/// Who produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Origin {
    /// Genuine hardware input.
    #[default]
    User,
    /// Produced by this crate's synthesizer and observed again on the input side.
    Synthetic,
}

/// Unvalidated scroll record as produced by a backend.
///
/// `axis` is optional because some capture paths decode the axis from flag bits that
/// may be absent or unknown; such records are dropped during validation.
#[derive(Clone, Copy, Debug)]
pub struct RawScroll {
    pub at: Instant,
    pub axis: Option<Axis>,
    pub raw_delta: f64,
    pub origin: Origin,
}

impl RawScroll {
    /// Convenience constructor for a genuine user event.
    pub fn user(at: Instant, axis: Axis, raw_delta: f64) -> Self {
        Self {
            at,
            axis: Some(axis),
            raw_delta,
            origin: Origin::User,
        }
    }

    /// Convenience constructor for an event recognised as self-originated.
    pub fn synthetic(at: Instant, axis: Axis, raw_delta: f64) -> Self {
        Self {
            at,
            axis: Some(axis),
            raw_delta,
            origin: Origin::Synthetic,
        }
    }

    /// Validate into a [`ScrollEvent`].
    pub fn validate(self) -> Result<ScrollEvent, EventError> {
        let axis = self.axis.ok_or(EventError::MissingAxis)?;
        if !self.raw_delta.is_finite() {
            return Err(EventError::NonFiniteDelta {
                axis,
                value: self.raw_delta,
            });
        }
        Ok(ScrollEvent {
            at: self.at,
            axis,
            raw_delta: self.raw_delta,
            origin: self.origin,
        })
    }
}

/// Validated scroll event. Immutable once captured.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollEvent {
    /// Capture time (monotonic).
    pub at: Instant,
    /// Axis of motion.
    pub axis: Axis,
    /// Signed delta in notches, finite.
    pub raw_delta: f64,
    /// Genuine or self-originated.
    pub origin: Origin,
}

impl ScrollEvent {
    pub fn new(at: Instant, axis: Axis, raw_delta: f64) -> Self {
        Self {
            at,
            axis,
            raw_delta,
            origin: Origin::User,
        }
    }
}

/// One output scroll event handed to an [`EventSink`](crate::device::EventSink).
///
/// `steps` is the integral count in the sink's native unit (see
/// [`Resolution`](crate::synthesizer::Resolution)); `delta` is the same amount in
/// notches. Continuous sinks read `delta` and may ignore `steps`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticScroll {
    pub axis: Axis,
    pub delta: f64,
    pub steps: i32,
}

impl SyntheticScroll {
    /// Re-observe this emission as an input record, the way a backend would see it
    /// coming back through the hook.
    pub fn echo(&self, at: Instant) -> RawScroll {
        RawScroll::synthetic(at, self.axis, self.delta)
    }
}
