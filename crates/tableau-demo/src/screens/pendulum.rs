#![forbid(unsafe_code)]

//! A damped pendulum.

use std::cell::RefCell;
use std::rc::Rc;

use tableau::{BoxError, Color, LayoutBounds, Layoutable, Screen, ScreenModel, Steppable};

pub const NAME: &str = "Pendulum";

const GRAVITY: f64 = 9.81;
const LENGTH: f64 = 1.5;
const DAMPING: f64 = 0.05;
/// Larger steps make the explicit integrator unstable.
const MAX_DT: f64 = 1.0 / 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PendulumModel {
    /// Radians from vertical.
    pub angle: f64,
    pub velocity: f64,
}

impl Default for PendulumModel {
    fn default() -> Self {
        Self {
            angle: 1.0,
            velocity: 0.0,
        }
    }
}

impl Steppable for PendulumModel {
    fn step(&mut self, dt: f64) -> Result<(), BoxError> {
        let accel = -(GRAVITY / LENGTH) * self.angle.sin() - DAMPING * self.velocity;
        self.velocity += accel * dt;
        self.angle += self.velocity * dt;
        Ok(())
    }
}

impl ScreenModel for PendulumModel {
    fn fingerprint(&self) -> u64 {
        self.angle.to_bits() ^ self.velocity.to_bits().rotate_left(32)
    }
}

/// Places the pivot and bob in pixels.
pub struct PendulumView {
    model: Rc<RefCell<PendulumModel>>,
    pivot: (f64, f64),
    arm: f64,
    pub bob: (f64, f64),
}

impl PendulumView {
    fn new(model: &Rc<RefCell<PendulumModel>>) -> Self {
        Self {
            model: Rc::clone(model),
            pivot: (0.0, 0.0),
            arm: 0.0,
            bob: (0.0, 0.0),
        }
    }
}

impl Steppable for PendulumView {
    fn step(&mut self, _dt: f64) -> Result<(), BoxError> {
        let angle = self.model.borrow().angle;
        self.bob = (
            self.pivot.0 + self.arm * angle.sin(),
            self.pivot.1 + self.arm * angle.cos(),
        );
        Ok(())
    }
}

impl Layoutable for PendulumView {
    fn layout(&mut self, bounds: &LayoutBounds) {
        let (cx, _) = bounds.content.center();
        self.pivot = (cx, bounds.content.min_y + 40.0 * bounds.scale);
        self.arm = (bounds.content.height() * 0.6).max(0.0);
    }
}

pub fn screen() -> Screen {
    Screen::new(NAME, PendulumModel::default, PendulumView::new)
        .with_background(Color::rgb(0xf4, 0xf1, 0xe8))
        .with_max_dt(MAX_DT)
}
