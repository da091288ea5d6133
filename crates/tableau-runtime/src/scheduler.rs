#![forbid(unsafe_code)]

//! The frame scheduler: one logical clock tick per rendered frame.
//!
//! The scheduler owns the [`ClockState`] and the fixed order in which a
//! step runs; everything it steps is reached through [`FrameTarget`].
//!
//! # Step order
//!
//! | Step | Work | Runs when |
//! |------|------|-----------|
//! | a | `frame_started` | always |
//! | b | frame counter + 1 | always |
//! | c | `dt *= speed`, non-finite becomes 0 | always |
//! | d | pending resize | resize pending |
//! | e | clamp to the current screen's `max_dt` | always |
//! | f | `elapsed += dt` | `dt > 0` |
//! | g | step timer | `dt > 0` |
//! | h | current screen model | `dt > 0` |
//! | i | camera and animators | `dt > 0` |
//! | j | current screen view | `dt > 0` |
//! | k | `update_display` | not restoring |
//! | l | `frame_ended` | always |
//!
//! An error at any step halts the scheduler: `frame_ended` is not emitted
//! and every later step returns [`SimError::Halted`].

use tableau_core::geometry::Size;

use crate::error::{SimError, SimResult};
use crate::layout::ResizeOutcome;

/// Clock bookkeeping. The frame counter and elapsed time never decrease.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockState {
    /// Host timestamp of the previous frame, in milliseconds.
    pub last_tick_ms: Option<f64>,
    pub frame_counter: u64,
    pub resize_pending: bool,
    /// Dimensions of a deferred resize (playback mode). `None` means "use
    /// the host window size".
    pub pending_size: Option<Size>,
    /// Total simulated seconds.
    pub elapsed: f64,
}

/// Result of measuring one host frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickDecision {
    Step(f64),
    /// `dt <= 0` or non-finite.
    Skip { dt: f64 },
}

/// What one call to [`FrameScheduler::step_simulation`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// 1-based index of this frame.
    pub frame: u64,
    /// `dt` after speed and clamping.
    pub dt: f64,
    /// Whether steps f through j ran.
    pub advanced: bool,
    pub resize: Option<ResizeOutcome>,
    pub displayed: bool,
}

/// What one host animation frame did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Stepped(StepReport),
    Skipped { dt: f64 },
    /// Playback mode ignores host frames.
    Playback,
    /// An earlier failure stopped the loop; no frame was requested.
    Halted,
}

/// Everything a step touches.
pub trait FrameTarget {
    fn frame_started(&mut self, frame: u64);
    /// Apply a pending resize. `None` means the host window size.
    fn resize_to(&mut self, size: Option<Size>) -> SimResult<ResizeOutcome>;
    /// Cap of the current screen.
    fn max_dt(&self) -> Option<f64>;
    fn step_timer(&mut self, dt: f64);
    fn step_model(&mut self, dt: f64) -> SimResult<()>;
    fn step_ancillary(&mut self, dt: f64) -> SimResult<()>;
    fn step_view(&mut self, dt: f64) -> SimResult<()>;
    fn is_restoring(&self) -> bool;
    fn update_display(&mut self);
    fn frame_ended(&mut self, frame: u64);
}

#[derive(Debug)]
pub struct FrameScheduler {
    clock: ClockState,
    fallback_dt: f64,
    speed: f64,
    playback: bool,
    halted: bool,
}

impl FrameScheduler {
    pub fn new(fallback_dt: f64, speed: f64, playback: bool) -> Self {
        Self {
            clock: ClockState::default(),
            fallback_dt,
            speed,
            playback,
            halted: false,
        }
    }

    pub fn clock(&self) -> &ClockState {
        &self.clock
    }

    pub fn frame_counter(&self) -> u64 {
        self.clock.frame_counter
    }

    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_playback(&self) -> bool {
        self.playback
    }

    pub fn set_playback(&mut self, playback: bool) {
        self.playback = playback;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Flag a relayout for the next step, using the host window size.
    pub fn request_resize(&mut self) {
        self.clock.resize_pending = true;
    }

    /// Flag a relayout to explicit dimensions. Last call wins.
    pub fn defer_resize(&mut self, size: Size) {
        self.clock.resize_pending = true;
        self.clock.pending_size = Some(size);
    }

    /// Seconds since the previous frame, or the fallback on the first one.
    /// Always records `now_ms` as the previous frame time.
    pub fn compute_dt(&mut self, now_ms: f64) -> TickDecision {
        let dt = match self.clock.last_tick_ms {
            Some(last) => (now_ms - last) / 1000.0,
            None => self.fallback_dt,
        };
        self.clock.last_tick_ms = Some(now_ms);
        if dt.is_finite() && dt > 0.0 {
            TickDecision::Step(dt)
        } else {
            TickDecision::Skip { dt }
        }
    }

    /// Run steps a through l.
    pub fn step_simulation(&mut self, dt: f64, target: &mut dyn FrameTarget) -> SimResult<StepReport> {
        if self.halted {
            return Err(SimError::Halted);
        }
        let frame = self.clock.frame_counter + 1;
        let _span = tracing::debug_span!("step_simulation", frame, dt).entered();
        let result = self.run_steps(frame, dt, target);
        if let Err(err) = &result {
            tracing::error!(frame, error = %err, "step failed, halting scheduler");
            self.halted = true;
        }
        result
    }

    fn run_steps(&mut self, frame: u64, dt: f64, target: &mut dyn FrameTarget) -> SimResult<StepReport> {
        target.frame_started(frame);
        self.clock.frame_counter = frame;

        let mut dt = dt * self.speed;
        if !dt.is_finite() {
            tracing::warn!(frame, dt, "non-finite dt treated as zero");
            dt = 0.0;
        }

        let resize = if self.clock.resize_pending {
            self.clock.resize_pending = false;
            let size = self.clock.pending_size.take();
            Some(target.resize_to(size)?)
        } else {
            None
        };

        if let Some(max_dt) = target.max_dt() {
            dt = dt.min(max_dt);
        }

        let advanced = dt > 0.0;
        if advanced {
            self.clock.elapsed += dt;
            target.step_timer(dt);
            target.step_model(dt)?;
            target.step_ancillary(dt)?;
            target.step_view(dt)?;
        } else {
            tracing::trace!(dt, "non-positive dt, screens not stepped");
        }

        let displayed = !target.is_restoring();
        if displayed {
            target.update_display();
        }

        target.frame_ended(frame);
        Ok(StepReport {
            frame,
            dt,
            advanced,
            resize,
            displayed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Trace {
        calls: Vec<String>,
        max_dt: Option<f64>,
        fail_model: bool,
        restoring: bool,
    }

    impl FrameTarget for Trace {
        fn frame_started(&mut self, frame: u64) {
            self.calls.push(format!("started {frame}"));
        }
        fn resize_to(&mut self, size: Option<Size>) -> SimResult<ResizeOutcome> {
            self.calls.push(format!("resize {:?}", size.map(|s| s.width)));
            Ok(ResizeOutcome::Unchanged)
        }
        fn max_dt(&self) -> Option<f64> {
            self.max_dt
        }
        fn step_timer(&mut self, _dt: f64) {
            self.calls.push("timer".into());
        }
        fn step_model(&mut self, dt: f64) -> SimResult<()> {
            self.calls.push(format!("model {dt}"));
            if self.fail_model {
                return Err(SimError::ScreenStep {
                    screen: "A".into(),
                    phase: crate::error::StepPhase::Model,
                    source: "nope".into(),
                });
            }
            Ok(())
        }
        fn step_ancillary(&mut self, _dt: f64) -> SimResult<()> {
            self.calls.push("ancillary".into());
            Ok(())
        }
        fn step_view(&mut self, _dt: f64) -> SimResult<()> {
            self.calls.push("view".into());
            Ok(())
        }
        fn is_restoring(&self) -> bool {
            self.restoring
        }
        fn update_display(&mut self) {
            self.calls.push("display".into());
        }
        fn frame_ended(&mut self, frame: u64) {
            self.calls.push(format!("ended {frame}"));
        }
    }

    #[test]
    fn full_step_order() {
        let mut scheduler = FrameScheduler::new(1.0 / 60.0, 2.0, false);
        scheduler.request_resize();
        let mut target = Trace::default();
        let report = scheduler.step_simulation(0.25, &mut target).unwrap();
        assert_eq!(
            target.calls,
            vec![
                "started 1",
                "resize None",
                "timer",
                "model 0.5",
                "ancillary",
                "view",
                "display",
                "ended 1",
            ]
        );
        assert_eq!(report.dt, 0.5);
        assert!(report.advanced);
        assert_eq!(scheduler.elapsed(), 0.5);
    }

    #[test]
    fn max_dt_clamps_after_speed() {
        let mut scheduler = FrameScheduler::new(1.0 / 60.0, 4.0, false);
        let mut target = Trace {
            max_dt: Some(0.1),
            ..Trace::default()
        };
        let report = scheduler.step_simulation(0.5, &mut target).unwrap();
        assert_eq!(report.dt, 0.1);
        assert_eq!(scheduler.elapsed(), 0.1);
    }

    #[test]
    fn zero_dt_skips_screen_work_but_not_bookkeeping() {
        let mut scheduler = FrameScheduler::new(1.0 / 60.0, 1.0, false);
        scheduler.defer_resize(Size::new(640.0, 480.0));
        let mut target = Trace::default();
        scheduler.step_simulation(0.0, &mut target).unwrap();
        assert_eq!(
            target.calls,
            vec!["started 1", "resize Some(640.0)", "display", "ended 1"]
        );
        assert_eq!(scheduler.frame_counter(), 1);
        assert_eq!(scheduler.elapsed(), 0.0);
    }

    #[test]
    fn non_finite_dt_is_a_skip_even_when_capped() {
        for dt in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            for max_dt in [None, Some(0.1)] {
                let mut scheduler = FrameScheduler::new(1.0 / 60.0, 1.0, false);
                let mut target = Trace {
                    max_dt,
                    ..Trace::default()
                };
                let report = scheduler.step_simulation(dt, &mut target).unwrap();
                assert!(!report.advanced, "dt {dt} max_dt {max_dt:?}");
                assert_eq!(report.dt, 0.0);
                assert_eq!(target.calls, vec!["started 1", "display", "ended 1"]);
                assert_eq!(scheduler.frame_counter(), 1);
                assert_eq!(scheduler.elapsed(), 0.0);
            }
        }
    }

    #[test]
    fn restoring_suppresses_display() {
        let mut scheduler = FrameScheduler::new(1.0 / 60.0, 1.0, false);
        let mut target = Trace {
            restoring: true,
            ..Trace::default()
        };
        let report = scheduler.step_simulation(0.1, &mut target).unwrap();
        assert!(!report.displayed);
        assert!(!target.calls.iter().any(|c| c == "display"));
    }

    #[test]
    fn failure_halts_without_frame_ended() {
        let mut scheduler = FrameScheduler::new(1.0 / 60.0, 1.0, false);
        let mut target = Trace {
            fail_model: true,
            ..Trace::default()
        };
        assert!(scheduler.step_simulation(0.1, &mut target).is_err());
        assert!(scheduler.is_halted());
        assert!(!target.calls.iter().any(|c| c.starts_with("ended")));
        assert!(!target.calls.iter().any(|c| c == "view"));

        target.fail_model = false;
        target.calls.clear();
        assert!(matches!(
            scheduler.step_simulation(0.1, &mut target),
            Err(SimError::Halted)
        ));
        assert!(target.calls.is_empty());
    }

    #[test]
    fn first_frame_uses_fallback_dt() {
        let mut scheduler = FrameScheduler::new(0.02, 1.0, false);
        assert_eq!(scheduler.compute_dt(5000.0), TickDecision::Step(0.02));
        assert_eq!(scheduler.compute_dt(5100.0), TickDecision::Step(0.1));
        assert_eq!(scheduler.compute_dt(5100.0), TickDecision::Skip { dt: 0.0 });
        assert_eq!(scheduler.compute_dt(5000.0), TickDecision::Skip { dt: -0.1 });
        assert_eq!(scheduler.clock().last_tick_ms, Some(5000.0));
    }

    proptest! {
        #[test]
        fn elapsed_is_sum_of_positive_dts(
            dts in proptest::collection::vec(
                prop_oneof![
                    8 => -1.0f64..1.0,
                    1 => Just(f64::NAN),
                    1 => Just(f64::INFINITY),
                    1 => Just(f64::NEG_INFINITY),
                ],
                0..40,
            ),
            max_dt in proptest::option::of(0.05f64..0.5),
        ) {
            let mut scheduler = FrameScheduler::new(1.0 / 60.0, 1.0, false);
            let mut target = Trace {
                max_dt,
                ..Trace::default()
            };
            let mut expected = 0.0;
            for dt in &dts {
                scheduler.step_simulation(*dt, &mut target).unwrap();
                if dt.is_finite() && *dt > 0.0 {
                    expected += max_dt.map_or(*dt, |cap| dt.min(cap));
                }
            }
            prop_assert_eq!(scheduler.frame_counter(), dts.len() as u64);
            prop_assert!(scheduler.elapsed().is_finite());
            prop_assert!((scheduler.elapsed() - expected).abs() < 1e-9);
        }

        #[test]
        fn elapsed_never_decreases(
            dts in proptest::collection::vec(
                prop_oneof![4 => -1.0f64..1.0, 1 => Just(f64::NAN), 1 => Just(f64::INFINITY)],
                1..40,
            ),
        ) {
            let mut scheduler = FrameScheduler::new(1.0 / 60.0, 1.0, false);
            let mut target = Trace::default();
            let mut last = 0.0;
            for dt in dts {
                scheduler.step_simulation(dt, &mut target).unwrap();
                prop_assert!(scheduler.elapsed() >= last);
                last = scheduler.elapsed();
            }
        }
    }
}
