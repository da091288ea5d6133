#![forbid(unsafe_code)]

//! Counts beats from accumulated simulation time.

use std::cell::RefCell;
use std::rc::Rc;

use tableau::{BoxError, LayoutBounds, Layoutable, Screen, ScreenModel, Steppable};
use tracing::debug;

pub const NAME: &str = "Metronome";

const BEATS_PER_MINUTE: f64 = 90.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetronomeModel {
    pub time: f64,
    pub beats: u64,
}

impl MetronomeModel {
    fn beat_length() -> f64 {
        60.0 / BEATS_PER_MINUTE
    }

    /// Position inside the current beat, `[0, 1)`.
    pub fn phase(&self) -> f64 {
        (self.time / Self::beat_length()).fract()
    }
}

impl Steppable for MetronomeModel {
    fn step(&mut self, dt: f64) -> Result<(), BoxError> {
        self.time += dt;
        let beats = (self.time / Self::beat_length()).floor() as u64;
        if beats != self.beats {
            self.beats = beats;
            debug!(beats, "tick");
        }
        Ok(())
    }
}

impl ScreenModel for MetronomeModel {
    fn fingerprint(&self) -> u64 {
        self.time.to_bits() ^ self.beats
    }
}

pub struct MetronomeView {
    model: Rc<RefCell<MetronomeModel>>,
    half_width: f64,
    pub needle_x: f64,
    origin_x: f64,
}

impl MetronomeView {
    fn new(model: &Rc<RefCell<MetronomeModel>>) -> Self {
        Self {
            model: Rc::clone(model),
            half_width: 0.0,
            needle_x: 0.0,
            origin_x: 0.0,
        }
    }
}

impl Steppable for MetronomeView {
    fn step(&mut self, _dt: f64) -> Result<(), BoxError> {
        let model = self.model.borrow();
        // Swing left on even beats, right on odd ones.
        let sweep = 2.0 * model.phase() - 1.0;
        let direction = if model.beats % 2 == 0 { 1.0 } else { -1.0 };
        self.needle_x = self.origin_x + direction * sweep * self.half_width;
        Ok(())
    }
}

impl Layoutable for MetronomeView {
    fn layout(&mut self, bounds: &LayoutBounds) {
        self.origin_x = bounds.content.center().0;
        self.half_width = bounds.content.width() * 0.25;
    }
}

pub fn screen() -> Screen {
    Screen::new(NAME, MetronomeModel::default, MetronomeView::new)
}
