//! End-to-end behaviour of the acceleration pipeline over the in-memory backend.

use std::time::{Duration, Instant};

use proptest::prelude::*;
use scroll_accel::backends::virtual_input::{RecordingSink, ScriptedSource};
use scroll_accel::{
    Axis, Controller, EstimatorConfig, EventSynthesizer, Outcome, RawScroll, Resolution,
    ScrollEvent, Settings, Shutdown, SpeedEstimator, SynthConfig,
};

fn linear() -> Settings {
    Settings {
        exp: 1.0,
        multiplier: 1.0,
        verbose: false,
    }
}

fn controller(resolution: Resolution) -> Controller {
    Controller::new(
        linear(),
        EstimatorConfig::default(),
        SynthConfig::default(),
        resolution,
    )
}

#[test]
fn two_notches_100ms_apart_emit_ten() {
    for resolution in [Resolution::Continuous, Resolution::NOTCHES, Resolution::HI_RES] {
        let mut ctl = controller(resolution);
        let mut sink = RecordingSink::new(resolution);
        let t0 = Instant::now();

        ctl.handle(RawScroll::user(t0, Axis::Vertical, 1.0), &mut sink);
        sink.drain();

        let out = ctl.handle(
            RawScroll::user(t0 + Duration::from_millis(100), Axis::Vertical, 1.0),
            &mut sink,
        );
        match out {
            Outcome::Emitted { speed, factor, .. } => {
                assert!((speed - 10.0).abs() < 1e-9, "{resolution:?}: speed {speed}");
                assert!((factor - 10.0).abs() < 1e-9);
            }
            other => panic!("{resolution:?}: expected emission, got {other:?}"),
        }
        assert!(
            (sink.total_delta() - 10.0).abs() < 1e-6,
            "{resolution:?}: emitted {}",
            sink.total_delta()
        );
        assert!(sink.saw_suppression_on_every_dispatch());
    }
}

#[test]
fn echoed_output_is_discarded_exactly_once() {
    let mut ctl = controller(Resolution::NOTCHES);
    let mut sink = RecordingSink::new(Resolution::NOTCHES);
    let t0 = Instant::now();
    ctl.handle(RawScroll::user(t0, Axis::Vertical, 2.0), &mut sink);
    ctl.handle(
        RawScroll::user(t0 + Duration::from_millis(50), Axis::Vertical, 2.0),
        &mut sink,
    );

    let echoes: Vec<RawScroll> = sink
        .drain()
        .iter()
        .map(|s| s.echo(t0 + Duration::from_millis(60)))
        .collect();
    assert!(!echoes.is_empty());

    let before = ctl.stats();
    for echo in &echoes {
        assert!(matches!(ctl.handle(*echo, &mut sink), Outcome::DiscardedSelf));
    }
    let after = ctl.stats();

    assert_eq!(after.discarded_self - before.discarded_self, echoes.len() as u64);
    assert_eq!(after.emitted, before.emitted);
    assert!(sink.emitted().is_empty());
    // Echoes must not feed the speed estimate either.
    assert_eq!(
        ctl.estimator().state(Axis::Vertical).last_event_time,
        Some(t0 + Duration::from_millis(50))
    );
}

#[test]
fn gesture_restarts_after_idle_window() {
    let cfg = EstimatorConfig::default();
    let mut estimator = SpeedEstimator::new(cfg);
    let t0 = Instant::now();
    estimator.estimate(&ScrollEvent::new(t0, Axis::Vertical, 1.0));

    let later = t0 + cfg.idle_window + Duration::from_millis(1);
    let sample = estimator.estimate(&ScrollEvent::new(later, Axis::Vertical, 3.0));
    assert!(sample.new_gesture);
    assert_eq!(sample.speed, 3.0);
}

#[test]
fn axes_do_not_share_timing() {
    let mut estimator = SpeedEstimator::default();
    let t0 = Instant::now();
    estimator.estimate(&ScrollEvent::new(t0, Axis::Vertical, 1.0));
    let sample = estimator.estimate(&ScrollEvent::new(
        t0 + Duration::from_millis(10),
        Axis::Horizontal,
        1.0,
    ));
    assert!(sample.new_gesture);
    assert_eq!(sample.speed, 1.0);
}

#[test]
fn huge_delta_is_capped() {
    let mut ctl = Controller::new(
        Settings {
            exp: 2.0,
            multiplier: 1.0,
            verbose: false,
        },
        EstimatorConfig::default(),
        SynthConfig::default(),
        Resolution::Continuous,
    );
    let mut sink = RecordingSink::new(Resolution::Continuous);
    let t0 = Instant::now();
    ctl.handle(RawScroll::user(t0, Axis::Vertical, 1.0), &mut sink);
    sink.drain();
    // 5 notches in 1 ms: speed 5000, factor 25e6.
    ctl.handle(
        RawScroll::user(t0 + Duration::from_millis(1), Axis::Vertical, 5.0),
        &mut sink,
    );
    assert_eq!(sink.total_delta(), SynthConfig::default().max_delta);
}

#[test]
fn scripted_session_runs_to_completion() {
    let mut ctl = controller(Resolution::Continuous);
    let mut sink = RecordingSink::new(Resolution::Continuous);
    let mut source = ScriptedSource::new("script");
    let t0 = Instant::now();
    source.scroll(t0, Axis::Vertical, 1.0);
    source.feed(RawScroll::synthetic(t0, Axis::Vertical, 1.0));
    source.scroll(t0 + Duration::from_millis(200), Axis::Vertical, -1.0);
    source.scroll(t0 + Duration::from_millis(300), Axis::Horizontal, 0.0);

    let stats = ctl.run(&mut source, &mut sink, &Shutdown::new()).unwrap();
    assert_eq!(stats.seen, 4);
    assert_eq!(stats.emitted, 2);
    assert_eq!(stats.discarded_self, 1);
    assert_eq!(stats.ignored, 1);
    // The reversal starts a new gesture, so the second emission is 1:1.
    assert!((sink.total_delta() - 0.0).abs() < 1e-9);
}

proptest! {
    #[test]
    fn fractional_deltas_accumulate_into_whole_notches(
        d in 0.01f64..0.99,
        n in 1usize..300,
    ) {
        let mut synth = EventSynthesizer::new(SynthConfig::default(), Resolution::NOTCHES);
        let ev = ScrollEvent::new(Instant::now(), Axis::Vertical, 1.0);
        let mut emitted: i64 = 0;
        for _ in 0..n {
            emitted += synth.synthesize(&ev, d).total_steps();
        }
        let ideal = (n as f64 * d).floor() as i64;
        prop_assert!((emitted - ideal).abs() <= 1, "emitted {} ideal {}", emitted, ideal);
        let remainder = synth.accumulator(Axis::Vertical).remainder();
        prop_assert!(remainder.abs() < 1.0);
        prop_assert!((emitted as f64 + remainder - n as f64 * d).abs() < 1e-6);
    }
}
