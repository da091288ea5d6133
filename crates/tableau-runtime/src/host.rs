#![forbid(unsafe_code)]

//! Host-side collaborators consumed by the runtime.
//!
//! The runtime never draws or handles input itself. It drives a [`Scene`]
//! (the scene graph and input layer) and a [`HostEnvironment`] (window
//! size, clock, animation-frame scheduling). Both are traits so the same
//! runtime runs inside a real host or the headless
//! [`simulator`](crate::simulator).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tableau_core::geometry::{Color, Size};

use crate::layout::NavigationBarLayout;
use crate::screen::ScreenKey;

/// Identity of an overlay shown through the modal stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Subtree whose in-flight input should be interrupted, or which receives
/// input next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputTarget {
    /// The whole scene.
    Root,
    /// A single screen's subtree.
    Screen(ScreenKey),
    /// A shown overlay.
    Overlay(OverlayId),
}

/// Scene graph and input layer.
///
/// Calls arrive in the order the runtime's state transitions require; an
/// implementation only has to apply them.
pub trait Scene {
    /// Cancel presses, drags and focus in progress under `target`.
    fn interrupt_input(&mut self, target: InputTarget);

    fn set_screen_visible(&mut self, key: ScreenKey, visible: bool);

    /// Enable or disable input for every screen subtree at once.
    fn set_screens_interactive(&mut self, interactive: bool);

    fn set_background(&mut self, color: Color);

    /// Show or hide the translucent barrier behind modal overlays.
    fn set_barrier_visible(&mut self, visible: bool);

    fn add_overlay(&mut self, id: OverlayId);

    fn remove_overlay(&mut self, id: OverlayId);

    fn layout_navigation_bar(&mut self, layout: &NavigationBarLayout);

    /// Flush pending visual changes to the display.
    fn update_display(&mut self);
}

/// Shared handle to the host scene.
pub type SharedScene = Rc<RefCell<dyn Scene>>;

/// Window, clock and frame scheduling provided by the host.
pub trait HostEnvironment {
    /// Current window size in host pixels.
    fn window_size(&self) -> Size;

    /// Monotonic timestamp in milliseconds.
    fn now_ms(&self) -> f64;

    /// Ask the host to call
    /// [`Sim::on_animation_frame`](crate::sim::Sim::on_animation_frame)
    /// once more.
    fn request_animation_frame(&mut self);
}
