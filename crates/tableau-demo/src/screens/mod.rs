#![forbid(unsafe_code)]

//! Demo screens, in declaration order.

pub mod metronome;
pub mod orbit;
pub mod pendulum;

use tableau::Screen;

/// Names in declaration order; the 1-based position is the screen number.
pub const SCREEN_NAMES: [&str; 3] = [pendulum::NAME, orbit::NAME, metronome::NAME];

/// Every demo screen, uninstantiated.
pub fn all() -> Vec<Screen> {
    vec![pendulum::screen(), orbit::screen(), metronome::screen()]
}
