#![forbid(unsafe_code)]

//! Core: geometry primitives and single-threaded reactive values.

pub mod geometry;
pub mod observable;

pub use geometry::{Bounds, Color, Size};
pub use observable::{Emitter, Property, ReadOnlyProperty, Subscription};
