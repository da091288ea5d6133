#![forbid(unsafe_code)]

//! Planets on circular orbits around a fixed star.

use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;

use tableau::{BoxError, Color, LayoutBounds, Layoutable, Screen, ScreenModel, Steppable};
use tracing::trace;

pub const NAME: &str = "Orbit";

/// (orbit radius as a fraction of the content half-extent, period in seconds)
const PLANETS: [(f64, f64); 3] = [(0.3, 4.0), (0.55, 9.0), (0.85, 21.0)];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrbitModel {
    /// One phase per planet, in `[0, TAU)`.
    pub phases: [f64; 3],
}

impl Steppable for OrbitModel {
    fn step(&mut self, dt: f64) -> Result<(), BoxError> {
        for (phase, (_, period)) in self.phases.iter_mut().zip(PLANETS) {
            *phase = (*phase + TAU * dt / period).rem_euclid(TAU);
        }
        Ok(())
    }
}

impl ScreenModel for OrbitModel {
    fn fingerprint(&self) -> u64 {
        self.phases
            .iter()
            .fold(0u64, |acc, p| acc.rotate_left(21) ^ p.to_bits())
    }
}

pub struct OrbitView {
    model: Rc<RefCell<OrbitModel>>,
    center: (f64, f64),
    extent: f64,
    pub positions: [(f64, f64); 3],
}

impl OrbitView {
    fn new(model: &Rc<RefCell<OrbitModel>>) -> Self {
        Self {
            model: Rc::clone(model),
            center: (0.0, 0.0),
            extent: 0.0,
            positions: [(0.0, 0.0); 3],
        }
    }
}

impl Steppable for OrbitView {
    fn step(&mut self, _dt: f64) -> Result<(), BoxError> {
        let model = self.model.borrow();
        for ((pos, phase), (radius, _)) in self.positions.iter_mut().zip(model.phases).zip(PLANETS)
        {
            let r = radius * self.extent;
            *pos = (self.center.0 + r * phase.cos(), self.center.1 + r * phase.sin());
        }
        Ok(())
    }
}

impl Layoutable for OrbitView {
    fn layout(&mut self, bounds: &LayoutBounds) {
        self.center = bounds.content.center();
        self.extent = bounds.content.width().min(bounds.content.height()) / 2.0;
        trace!(extent = self.extent, "orbit layout");
    }
}

pub fn screen() -> Screen {
    Screen::new(NAME, OrbitModel::default, OrbitView::new).with_background(Color::rgb(8, 10, 32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_period_returns_to_start() {
        let mut model = OrbitModel::default();
        for _ in 0..400 {
            model.step(0.01).unwrap();
        }
        // 4 s is exactly one period of the inner planet.
        assert!(model.phases[0].min(TAU - model.phases[0]) < 1e-9);
        assert!(model.phases[1] > 0.0);
    }

    #[test]
    fn phases_stay_wrapped() {
        let mut model = OrbitModel::default();
        model.step(1000.0).unwrap();
        assert!(model.phases.iter().all(|p| (0.0..TAU).contains(p)));
    }
}
