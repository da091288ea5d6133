#![forbid(unsafe_code)]

//! Pan/zoom state shared by all screens.
//!
//! The camera eases its published [`CameraTransform`] toward a target each
//! frame. A screen switch calls [`Camera::reset`], which snaps back to the
//! identity transform without animation.

use tableau_core::observable::{Property, ReadOnlyProperty};

use crate::error::BoxError;
use crate::screen::Steppable;

/// Uniform zoom followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    pub scale: f64,
    pub dx: f64,
    pub dy: f64,
}

impl CameraTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        dx: 0.0,
        dy: 0.0,
    };

    /// Map a point from scene to view coordinates.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.dx, y * self.scale + self.dy)
    }

    fn lerp(&self, target: &Self, t: f64) -> Self {
        Self {
            scale: self.scale + (target.scale - self.scale) * t,
            dx: self.dx + (target.dx - self.dx) * t,
            dy: self.dy + (target.dy - self.dy) * t,
        }
    }

    fn close_to(&self, other: &Self) -> bool {
        const EPS: f64 = 1e-6;
        (self.scale - other.scale).abs() < EPS
            && (self.dx - other.dx).abs() < EPS
            && (self.dy - other.dy).abs() < EPS
    }
}

impl Default for CameraTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Zoom limits.
pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 8.0;

/// Rate (per second) of the exponential approach toward the target.
const EASE_RATE: f64 = 12.0;

#[derive(Debug)]
pub struct Camera {
    transform: Property<CameraTransform>,
    target: CameraTransform,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub fn new() -> Self {
        Self {
            transform: Property::new(CameraTransform::IDENTITY),
            target: CameraTransform::IDENTITY,
        }
    }

    pub fn transform(&self) -> ReadOnlyProperty<CameraTransform> {
        self.transform.read_only()
    }

    pub fn target(&self) -> CameraTransform {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        self.transform.get() == self.target
    }

    pub fn pan_to(&mut self, dx: f64, dy: f64) {
        self.target.dx = dx;
        self.target.dy = dy;
    }

    /// Clamped to [`MIN_ZOOM`]..=[`MAX_ZOOM`].
    pub fn zoom_to(&mut self, scale: f64) {
        self.target.scale = scale.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Snap to the identity transform.
    pub fn reset(&mut self) {
        self.target = CameraTransform::IDENTITY;
        self.transform.set(CameraTransform::IDENTITY);
    }
}

impl Steppable for Camera {
    fn step(&mut self, dt: f64) -> Result<(), BoxError> {
        let current = self.transform.get();
        if current == self.target {
            return Ok(());
        }
        let t = 1.0 - (-EASE_RATE * dt).exp();
        let next = current.lerp(&self.target, t);
        if next.close_to(&self.target) {
            self.transform.set(self.target);
        } else {
            self.transform.set(next);
        }
        Ok(())
    }
}
