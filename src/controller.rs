//! The event loop.
//!
//! [`Controller`] owns the settings, the [`SpeedEstimator`], the [`EventSynthesizer`]
//! and the [`SuppressionGuard`]. Each incoming record goes through
//! [`Controller::handle`] to completion before the next one is read:
//!
//! 1. discard if suppression is raised or the record is self-originated
//! 2. validate (malformed records are dropped and logged)
//! 3. estimate speed, apply the curve, synthesize, dispatch
//!
//! Per-event problems never escape `handle`. Only a lost [`EventSource`] ends
//! [`Controller::run`], as a [`DeviceError`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::device::{EventSink, EventSource, Polled};
use crate::error::{DeviceError, EventError, SinkError};
use crate::estimator::{EstimatorConfig, SpeedEstimator};
use crate::event::{Origin, RawScroll};
use crate::settings::Settings;
use crate::suppression::SuppressionGuard;
use crate::synthesizer::{EventSynthesizer, Resolution, SynthConfig};
use crate::transform::{accelerate, transform};

/// How long a single wait on the source may block before the loop re-checks shutdown.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// What happened to one record.
#[derive(Debug)]
pub enum Outcome {
    /// Synthetic scroll was dispatched.
    Emitted {
        speed: f64,
        factor: f64,
        delta: f64,
        events: usize,
    },
    /// Accelerated delta went into the step accumulator; nothing whole to emit yet.
    Accumulated { speed: f64, factor: f64 },
    /// Zero delta, nothing to do.
    Ignored,
    /// Self-originated or arrived while suppression was raised.
    DiscardedSelf,
    /// Malformed record.
    Dropped(EventError),
    /// The sink rejected the emission.
    SinkFailed(SinkError),
}

/// Running counters, logged at shutdown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub seen: u64,
    pub emitted: u64,
    pub accumulated: u64,
    pub ignored: u64,
    pub discarded_self: u64,
    pub dropped_malformed: u64,
    pub sink_failures: u64,
}

/// Cooperative stop request shared with signal handlers and timers.
#[derive(Clone, Debug, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also stop once `after` has elapsed from now.
    ///
    /// A duration too large to represent as an [`Instant`] sets no deadline.
    pub fn with_timeout(mut self, after: Duration) -> Self {
        self.deadline = Instant::now().checked_add(after);
        if self.deadline.is_none() {
            debug!("timeout of {after:?} is beyond the clock range, running without one");
        }
        self
    }

    /// The flag a signal handler should set.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Sequential scroll-acceleration pipeline.
#[derive(Debug)]
pub struct Controller {
    settings: Settings,
    estimator: SpeedEstimator,
    synthesizer: EventSynthesizer,
    guard: SuppressionGuard,
    stats: ControllerStats,
}

impl Controller {
    pub fn new(
        settings: Settings,
        estimator: EstimatorConfig,
        synth: SynthConfig,
        resolution: Resolution,
    ) -> Self {
        Self {
            settings,
            estimator: SpeedEstimator::new(estimator),
            synthesizer: EventSynthesizer::new(synth, resolution),
            guard: SuppressionGuard::new(),
            stats: ControllerStats::default(),
        }
    }

    /// Controller whose synthesizer matches `sink`'s resolution.
    pub fn for_sink<S: EventSink + ?Sized>(
        settings: Settings,
        estimator: EstimatorConfig,
        synth: SynthConfig,
        sink: &S,
    ) -> Self {
        Self::new(settings, estimator, synth, sink.resolution())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn estimator(&self) -> &SpeedEstimator {
        &self.estimator
    }

    pub fn synthesizer(&self) -> &EventSynthesizer {
        &self.synthesizer
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn is_suppressed(&self) -> bool {
        self.guard.is_active()
    }

    /// Process one record to completion.
    pub fn handle<S: EventSink + ?Sized>(&mut self, raw: RawScroll, sink: &mut S) -> Outcome {
        self.stats.seen += 1;

        // The guard cannot be raised here while tokens borrow it mutably; the check
        // backs up origin tagging for sinks that echo synchronously.
        if self.guard.is_active() || raw.origin == Origin::Synthetic {
            self.stats.discarded_self += 1;
            debug!(axis = ?raw.axis, delta = raw.raw_delta, "discarding self-originated scroll");
            return Outcome::DiscardedSelf;
        }

        let event = match raw.validate() {
            Ok(event) => event,
            Err(err) => {
                self.stats.dropped_malformed += 1;
                warn!("dropping malformed scroll event: {err}");
                return Outcome::Dropped(err);
            }
        };
        if event.raw_delta == 0.0 {
            self.stats.ignored += 1;
            return Outcome::Ignored;
        }

        let sample = self.estimator.estimate(&event);
        if sample.new_gesture {
            self.synthesizer.start_gesture(event.axis);
        }
        let factor = transform(sample.speed, &self.settings);
        let accelerated = accelerate(event.raw_delta, sample.speed, &self.settings);
        let plan = self.synthesizer.synthesize(&event, accelerated);

        if plan.is_empty() {
            self.stats.accumulated += 1;
            debug!(
                axis = %event.axis,
                speed = sample.speed,
                factor,
                remainder = self.synthesizer.accumulator(event.axis).remainder(),
                "accumulating sub-step scroll"
            );
            return Outcome::Accumulated {
                speed: sample.speed,
                factor,
            };
        }

        match self.synthesizer.dispatch(&plan, sink, &mut self.guard) {
            Ok(events) => {
                self.stats.emitted += 1;
                let delta = plan.total_delta();
                if self.settings.verbose {
                    info!(
                        "scroll {} {:+.2} at {:.2}/s -> x{:.2} -> {:+.2}",
                        event.axis, event.raw_delta, sample.speed, factor, delta
                    );
                } else {
                    debug!(
                        axis = %event.axis,
                        raw = event.raw_delta,
                        speed = sample.speed,
                        factor,
                        delta,
                        "accelerated scroll"
                    );
                }
                Outcome::Emitted {
                    speed: sample.speed,
                    factor,
                    delta,
                    events,
                }
            }
            Err(err) => {
                self.stats.sink_failures += 1;
                warn!("{} failed to emit scroll: {err}", sink.name());
                Outcome::SinkFailed(err)
            }
        }
    }

    /// Pull from `source` until shutdown, source close, or device loss.
    pub fn run<Src, Snk>(
        &mut self,
        source: &mut Src,
        sink: &mut Snk,
        shutdown: &Shutdown,
    ) -> Result<ControllerStats, DeviceError>
    where
        Src: EventSource + ?Sized,
        Snk: EventSink + ?Sized,
    {
        info!(
            "accelerating scroll from {} into {} (exp {}, multiplier {})",
            source.name(),
            sink.name(),
            self.settings.exp,
            self.settings.multiplier
        );

        while !shutdown.requested() {
            match source.next_event(POLL_INTERVAL)? {
                Polled::Event(raw) => {
                    self.handle(raw, sink);
                }
                Polled::Timeout => {}
                Polled::Closed => {
                    info!("{} closed", source.name());
                    break;
                }
            }
        }

        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::{RecordingSink, ScriptedSource};
    use crate::event::Axis;

    fn controller(resolution: Resolution) -> Controller {
        Controller::new(
            Settings {
                exp: 1.0,
                multiplier: 1.0,
                verbose: false,
            },
            EstimatorConfig::default(),
            SynthConfig::default(),
            resolution,
        )
    }

    #[test]
    fn synthetic_records_are_discarded() {
        let mut ctl = controller(Resolution::Continuous);
        let mut sink = RecordingSink::new(Resolution::Continuous);
        let out = ctl.handle(RawScroll::synthetic(Instant::now(), Axis::Vertical, 5.0), &mut sink);
        assert!(matches!(out, Outcome::DiscardedSelf));
        assert!(sink.emitted().is_empty());
        assert_eq!(ctl.stats().discarded_self, 1);
    }

    #[test]
    fn malformed_records_are_dropped() {
        let mut ctl = controller(Resolution::Continuous);
        let mut sink = RecordingSink::new(Resolution::Continuous);
        let raw = RawScroll {
            at: Instant::now(),
            axis: None,
            raw_delta: 1.0,
            origin: Origin::User,
        };
        assert!(matches!(ctl.handle(raw, &mut sink), Outcome::Dropped(EventError::MissingAxis)));
        let nan = RawScroll::user(Instant::now(), Axis::Vertical, f64::NAN);
        assert!(matches!(ctl.handle(nan, &mut sink), Outcome::Dropped(_)));
        assert_eq!(ctl.stats().dropped_malformed, 2);
        assert!(ctl.estimator().state(Axis::Vertical).last_event_time.is_none());
    }

    #[test]
    fn zero_delta_is_ignored() {
        let mut ctl = controller(Resolution::Continuous);
        let mut sink = RecordingSink::new(Resolution::Continuous);
        let out = ctl.handle(RawScroll::user(Instant::now(), Axis::Vertical, 0.0), &mut sink);
        assert!(matches!(out, Outcome::Ignored));
    }

    #[test]
    fn sink_failure_is_contained() {
        let mut ctl = controller(Resolution::Continuous);
        let mut sink = RecordingSink::new(Resolution::Continuous);
        sink.fail_next(1);
        let t0 = Instant::now();
        let out = ctl.handle(RawScroll::user(t0, Axis::Vertical, 1.0), &mut sink);
        assert!(matches!(out, Outcome::SinkFailed(_)));
        assert!(!ctl.is_suppressed());

        let out = ctl.handle(
            RawScroll::user(t0 + Duration::from_millis(100), Axis::Vertical, 1.0),
            &mut sink,
        );
        assert!(matches!(out, Outcome::Emitted { .. }));
    }

    #[test]
    fn run_stops_when_source_closes() {
        let mut ctl = controller(Resolution::Continuous);
        let mut sink = RecordingSink::new(Resolution::Continuous);
        let mut source = ScriptedSource::new("script");
        let t0 = Instant::now();
        source.scroll(t0, Axis::Vertical, 1.0);
        source.scroll(t0 + Duration::from_millis(100), Axis::Vertical, 1.0);

        let stats = ctl.run(&mut source, &mut sink, &Shutdown::new()).unwrap();
        assert_eq!(stats.seen, 2);
        assert_eq!(stats.emitted, 2);
        assert!((sink.total_delta() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn run_surfaces_device_loss() {
        let mut ctl = controller(Resolution::Continuous);
        let mut sink = RecordingSink::new(Resolution::Continuous);
        let mut source = ScriptedSource::new("script").fail_when_drained();
        let err = ctl.run(&mut source, &mut sink, &Shutdown::new()).unwrap_err();
        assert!(matches!(err, DeviceError::Lost(_)));
    }

    #[test]
    fn oversized_timeout_means_no_deadline() {
        let shutdown = Shutdown::new().with_timeout(Duration::from_secs(u64::MAX));
        assert!(!shutdown.requested());
        assert!(Shutdown::new().with_timeout(Duration::ZERO).requested());
    }

    #[test]
    fn run_honours_shutdown() {
        let mut ctl = controller(Resolution::Continuous);
        let mut sink = RecordingSink::new(Resolution::Continuous);
        let mut source = ScriptedSource::new("script");
        source.scroll(Instant::now(), Axis::Vertical, 1.0);
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let stats = ctl.run(&mut source, &mut sink, &shutdown).unwrap();
        assert_eq!(stats.seen, 0);
        assert_eq!(source.pending(), 1);
    }
}
