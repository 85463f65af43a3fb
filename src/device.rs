//! Backend capability traits.
//!
//! Every platform backend provides an [`EventSource`] (where scroll input comes from)
//! and an [`EventSink`] (where synthetic scroll goes). The controller only talks to
//! these two traits.

use std::time::Duration;

use crate::error::{DeviceError, SinkError};
use crate::event::{RawScroll, SyntheticScroll};
use crate::suppression::SuppressionToken;
use crate::synthesizer::Resolution;

/// Outcome of one wait on an [`EventSource`].
#[derive(Clone, Copy, Debug)]
pub enum Polled {
    /// A scroll record arrived.
    Event(RawScroll),
    /// Nothing arrived within the timeout.
    Timeout,
    /// The source ended cleanly (finite sources only).
    Closed,
}

/// Producer of raw scroll records.
///
/// Implementations must tag records they recognise as self-originated with
/// [`Origin::Synthetic`](crate::event::Origin::Synthetic). Losing the underlying hook
/// is reported as a [`DeviceError`] and ends the run.
pub trait EventSource {
    fn name(&self) -> &str;

    /// Wait up to `timeout` for the next scroll record.
    fn next_event(&mut self, timeout: Duration) -> Result<Polled, DeviceError>;
}

/// Consumer of synthetic scroll.
pub trait EventSink {
    fn name(&self) -> &str;

    /// Granularity this sink accepts.
    fn resolution(&self) -> Resolution;

    /// Emit one synthetic scroll. Must not block for long; runs inside the
    /// per-event critical section.
    fn dispatch(
        &mut self,
        scroll: &SyntheticScroll,
        token: &SuppressionToken<'_>,
    ) -> Result<(), SinkError>;
}

impl<T: EventSource + ?Sized> EventSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Polled, DeviceError> {
        (**self).next_event(timeout)
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn resolution(&self) -> Resolution {
        (**self).resolution()
    }

    fn dispatch(
        &mut self,
        scroll: &SyntheticScroll,
        token: &SuppressionToken<'_>,
    ) -> Result<(), SinkError> {
        (**self).dispatch(scroll, token)
    }
}
