//! Turning accelerated deltas back into scroll events.
//!
//! The synthesizer produces an [`EmissionPlan`] for each accelerated delta and
//! dispatches it through an [`EventSink`] while the controller's suppression guard is
//! raised.
//!
//! ## Resolution
//! Sinks declare what they can emit:
//! - [`Resolution::Continuous`]: any fractional notch value; the plan carries the
//!   accelerated delta unchanged.
//! - [`Resolution::Steps(n)`](Resolution::Steps): only whole multiples of `1/n` notch
//!   (`Steps(1)` is the legacy notch API, `Steps(120)` is `WHEEL_DELTA`/hi-res units).
//!   A per-axis accumulator keeps the fractional remainder in step units and carries
//!   it to the next call, so rounding never drifts by more than one step.
//!
//! ## Accumulator reset policy
//! - Direction reversal always clears the remainder (a leftover `+0.8` must not eat the
//!   first notch of a downward scroll).
//! - A new gesture clears it only when `reset_accumulator_on_gesture` is set.

use serde::{Deserialize, Serialize};

use crate::device::EventSink;
use crate::error::SinkError;
use crate::event::{Axis, ScrollEvent, SyntheticScroll};
use crate::suppression::SuppressionGuard;

/// Output granularity of a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Continuous,
    Steps(u32),
}

impl Resolution {
    /// Legacy whole-notch output.
    pub const NOTCHES: Resolution = Resolution::Steps(1);
    /// 1/120 notch (`WHEEL_DELTA`, `REL_WHEEL_HI_RES`).
    pub const HI_RES: Resolution = Resolution::Steps(120);
}

/// Synthesizer tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthConfig {
    /// Largest magnitude (in notches) a single emission may carry.
    pub max_delta: f64,
    /// Drop the carried remainder when a new gesture starts.
    pub reset_accumulator_on_gesture: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            max_delta: 100.0,
            reset_accumulator_on_gesture: false,
        }
    }
}

/// Fractional remainder carried between calls, in step units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NotchAccumulator {
    remainder: f64,
}

impl NotchAccumulator {
    #[inline]
    pub fn remainder(&self) -> f64 {
        self.remainder
    }

    pub fn reset(&mut self) {
        self.remainder = 0.0;
    }

    /// Add `units` and take out the whole part. The remainder stays in `(-1, 1)`.
    pub fn push(&mut self, units: f64) -> i64 {
        if self.remainder != 0.0 && units != 0.0 && self.remainder.signum() != units.signum() {
            self.remainder = 0.0;
        }
        self.remainder += units;
        let whole = self.remainder.trunc();
        self.remainder -= whole;
        whole as i64
    }
}

/// Events to emit for one input event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmissionPlan {
    items: Vec<SyntheticScroll>,
}

impl EmissionPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyntheticScroll> {
        self.items.iter()
    }

    /// Sum of all planned deltas, in notches.
    pub fn total_delta(&self) -> f64 {
        self.items.iter().map(|s| s.delta).sum()
    }

    /// Sum of all planned step counts.
    pub fn total_steps(&self) -> i64 {
        self.items.iter().map(|s| s.steps as i64).sum()
    }
}

/// Builds and dispatches emission plans.
#[derive(Clone, Debug)]
pub struct EventSynthesizer {
    config: SynthConfig,
    resolution: Resolution,
    accumulators: [NotchAccumulator; 2],
}

impl EventSynthesizer {
    pub fn new(config: SynthConfig, resolution: Resolution) -> Self {
        Self {
            config,
            resolution,
            accumulators: [NotchAccumulator::default(); 2],
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn accumulator(&self, axis: Axis) -> &NotchAccumulator {
        &self.accumulators[axis.index()]
    }

    /// Gesture boundary on `axis`; applies the accumulator reset policy.
    pub fn start_gesture(&mut self, axis: Axis) {
        if self.config.reset_accumulator_on_gesture {
            self.accumulators[axis.index()].reset();
        }
    }

    /// Plan the output for `original` scaled to `accelerated_delta`.
    pub fn synthesize(&mut self, original: &ScrollEvent, accelerated_delta: f64) -> EmissionPlan {
        let axis = original.axis;
        let delta = self.cap(accelerated_delta);
        let mut plan = EmissionPlan::default();
        if delta == 0.0 {
            return plan;
        }

        match self.resolution {
            Resolution::Continuous => plan.items.push(SyntheticScroll {
                axis,
                delta,
                steps: delta.round() as i32,
            }),
            Resolution::Steps(per_notch) => {
                let per_notch = per_notch.max(1);
                let whole = self.accumulators[axis.index()].push(delta * per_notch as f64);
                if whole != 0 {
                    let steps = whole.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
                    plan.items.push(SyntheticScroll {
                        axis,
                        delta: steps as f64 / per_notch as f64,
                        steps,
                    });
                }
            }
        }
        plan
    }

    /// Emit `plan` through `sink` with suppression raised for the whole plan.
    ///
    /// The guard is lowered when this returns, including on the error path.
    pub fn dispatch<S: EventSink + ?Sized>(
        &self,
        plan: &EmissionPlan,
        sink: &mut S,
        guard: &mut SuppressionGuard,
    ) -> Result<usize, SinkError> {
        if plan.is_empty() {
            return Ok(0);
        }
        let token = guard.engage();
        for scroll in plan.iter() {
            sink.dispatch(scroll, &token)?;
        }
        Ok(plan.len())
    }

    fn cap(&self, delta: f64) -> f64 {
        let max = self.config.max_delta;
        if delta.is_nan() {
            0.0
        } else {
            delta.clamp(-max, max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::RecordingSink;
    use std::time::Instant;

    fn event(delta: f64) -> ScrollEvent {
        ScrollEvent::new(Instant::now(), Axis::Vertical, delta)
    }

    #[test]
    fn continuous_passes_fraction_through() {
        let mut synth = EventSynthesizer::new(SynthConfig::default(), Resolution::Continuous);
        let plan = synth.synthesize(&event(1.0), 2.5);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.total_delta(), 2.5);
    }

    #[test]
    fn sign_and_axis_preserved() {
        let mut synth = EventSynthesizer::new(SynthConfig::default(), Resolution::NOTCHES);
        let ev = ScrollEvent::new(Instant::now(), Axis::Horizontal, -1.0);
        let plan = synth.synthesize(&ev, -3.0);
        let out: Vec<_> = plan.iter().copied().collect();
        assert_eq!(
            out,
            vec![SyntheticScroll {
                axis: Axis::Horizontal,
                delta: -3.0,
                steps: -3
            }]
        );
    }

    #[test]
    fn steps_carry_remainder() {
        let mut synth = EventSynthesizer::new(SynthConfig::default(), Resolution::NOTCHES);
        let ev = event(1.0);
        assert!(synth.synthesize(&ev, 0.6).is_empty());
        let plan = synth.synthesize(&ev, 0.6);
        assert_eq!(plan.total_steps(), 1);
        assert!((synth.accumulator(Axis::Vertical).remainder() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn reversal_clears_remainder() {
        let mut synth = EventSynthesizer::new(SynthConfig::default(), Resolution::NOTCHES);
        synth.synthesize(&event(1.0), 0.9);
        let plan = synth.synthesize(&event(-1.0), -1.2);
        assert_eq!(plan.total_steps(), -1);
    }

    #[test]
    fn hi_res_steps() {
        let mut synth = EventSynthesizer::new(SynthConfig::default(), Resolution::HI_RES);
        let plan = synth.synthesize(&event(1.0), 1.5);
        assert_eq!(plan.total_steps(), 180);
        assert_eq!(plan.total_delta(), 1.5);
    }

    #[test]
    fn delta_is_capped() {
        let mut synth = EventSynthesizer::new(
            SynthConfig {
                max_delta: 10.0,
                ..SynthConfig::default()
            },
            Resolution::Continuous,
        );
        assert_eq!(synth.synthesize(&event(1.0), 1e9).total_delta(), 10.0);
        assert_eq!(synth.synthesize(&event(-1.0), -1e9).total_delta(), -10.0);
    }

    #[test]
    fn gesture_reset_policy() {
        let mut keep = EventSynthesizer::new(SynthConfig::default(), Resolution::NOTCHES);
        keep.synthesize(&event(1.0), 0.5);
        keep.start_gesture(Axis::Vertical);
        assert_eq!(keep.accumulator(Axis::Vertical).remainder(), 0.5);

        let mut reset = EventSynthesizer::new(
            SynthConfig {
                reset_accumulator_on_gesture: true,
                ..SynthConfig::default()
            },
            Resolution::NOTCHES,
        );
        reset.synthesize(&event(1.0), 0.5);
        reset.start_gesture(Axis::Vertical);
        assert_eq!(reset.accumulator(Axis::Vertical).remainder(), 0.0);
    }

    #[test]
    fn dispatch_raises_and_lowers_guard() {
        let mut synth = EventSynthesizer::new(SynthConfig::default(), Resolution::Continuous);
        let mut sink = RecordingSink::new(Resolution::Continuous);
        let mut guard = SuppressionGuard::new();
        let plan = synth.synthesize(&event(1.0), 4.0);

        let sent = synth.dispatch(&plan, &mut sink, &mut guard).unwrap();
        assert_eq!(sent, 1);
        assert!(!guard.is_active());
        assert!(sink.saw_suppression_on_every_dispatch());
        assert_eq!(sink.total_delta(), 4.0);
    }

    #[test]
    fn failed_dispatch_still_lowers_guard() {
        let mut synth = EventSynthesizer::new(SynthConfig::default(), Resolution::Continuous);
        let mut sink = RecordingSink::new(Resolution::Continuous);
        sink.fail_next(1);
        let mut guard = SuppressionGuard::new();
        let plan = synth.synthesize(&event(1.0), 4.0);

        assert!(synth.dispatch(&plan, &mut sink, &mut guard).is_err());
        assert!(!guard.is_active());
    }
}
