//! In-memory backend: a scripted [`EventSource`] and a recording [`EventSink`].
//!
//! Used by tests and by anything that wants to drive the controller without a live
//! input device. Nothing here touches the OS.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::device::{EventSink, EventSource, Polled};
use crate::error::{DeviceError, SinkError};
use crate::event::{Axis, RawScroll, SyntheticScroll};
use crate::suppression::SuppressionToken;
use crate::synthesizer::Resolution;

/// Source that replays queued records.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    name: String,
    events: VecDeque<RawScroll>,
    fail_when_drained: bool,
}

impl ScriptedSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Queue a raw record.
    pub fn feed(&mut self, event: RawScroll) {
        self.events.push_back(event);
    }

    /// Queue a genuine user scroll.
    pub fn scroll(&mut self, at: Instant, axis: Axis, delta: f64) {
        self.feed(RawScroll::user(at, axis, delta));
    }

    /// Report a lost device instead of `Closed` once the queue is empty.
    pub fn fail_when_drained(mut self) -> Self {
        self.fail_when_drained = true;
        self
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

impl EventSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_event(&mut self, _timeout: Duration) -> Result<Polled, DeviceError> {
        match self.events.pop_front() {
            Some(event) => Ok(Polled::Event(event)),
            None if self.fail_when_drained => Err(DeviceError::Lost(format!(
                "{}: script exhausted",
                self.name
            ))),
            None => Ok(Polled::Closed),
        }
    }
}

/// Sink that records every dispatch.
#[derive(Debug)]
pub struct RecordingSink {
    resolution: Resolution,
    emitted: Vec<SyntheticScroll>,
    suppressed: Vec<bool>,
    fail_next: usize,
}

impl RecordingSink {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            emitted: Vec::new(),
            suppressed: Vec::new(),
            fail_next: 0,
        }
    }

    /// Reject the next `n` dispatches.
    pub fn fail_next(&mut self, n: usize) {
        self.fail_next = n;
    }

    pub fn emitted(&self) -> &[SyntheticScroll] {
        &self.emitted
    }

    /// Take everything recorded so far.
    pub fn drain(&mut self) -> Vec<SyntheticScroll> {
        self.suppressed.clear();
        std::mem::take(&mut self.emitted)
    }

    pub fn total_delta(&self) -> f64 {
        self.emitted.iter().map(|s| s.delta).sum()
    }

    pub fn total_steps(&self) -> i64 {
        self.emitted.iter().map(|s| s.steps as i64).sum()
    }

    /// `true` if the suppression token was active for every recorded dispatch.
    pub fn saw_suppression_on_every_dispatch(&self) -> bool {
        self.suppressed.iter().all(|s| *s)
    }
}

impl EventSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn dispatch(
        &mut self,
        scroll: &SyntheticScroll,
        token: &SuppressionToken<'_>,
    ) -> Result<(), SinkError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(SinkError::Rejected("scripted failure".into()));
        }
        self.suppressed.push(token.is_active());
        self.emitted.push(*scroll);
        Ok(())
    }
}
