#![forbid(unsafe_code)]

//! Headless host for testing.
//!
//! [`HeadlessScene`] records every [`Scene`] call as a [`SceneCall`] and
//! [`ManualEnvironment`] exposes a hand-driven clock and window size, so a
//! [`Sim`](crate::sim::Sim) can run deterministically without a display.
//!
//! # Example
//!
//! ```
//! use tableau_runtime::simulator::{HeadlessScene, ManualEnvironment};
//! use tableau_core::geometry::Size;
//!
//! let (scene, shared) = HeadlessScene::shared();
//! let env = ManualEnvironment::new(Size::new(1024.0, 618.0));
//! env.advance_ms(16.0);
//! assert_eq!(env.now(), 16.0);
//! # let _ = (scene, shared);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tableau_core::geometry::{Color, Size};

use crate::host::{HostEnvironment, InputTarget, OverlayId, Scene, SharedScene};
use crate::layout::NavigationBarLayout;
use crate::screen::ScreenKey;

/// Record of a call made on a [`HeadlessScene`].
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCall {
    InterruptInput(InputTarget),
    SetScreenVisible(ScreenKey, bool),
    SetScreensInteractive(bool),
    SetBackground(Color),
    SetBarrierVisible(bool),
    AddOverlay(OverlayId),
    RemoveOverlay(OverlayId),
    LayoutNavigationBar(NavigationBarLayout),
    UpdateDisplay,
}

/// A [`Scene`] that only remembers what it was told.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    calls: Vec<SceneCall>,
    visible: Vec<ScreenKey>,
    overlays: Vec<OverlayId>,
    interactive: bool,
    barrier: bool,
    background: Option<Color>,
    display_updates: u64,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }

    /// A concrete handle for inspection and the same scene as a
    /// [`SharedScene`] for the runtime.
    pub fn shared() -> (Rc<RefCell<HeadlessScene>>, SharedScene) {
        let scene = Rc::new(RefCell::new(Self::new()));
        let shared: SharedScene = scene.clone();
        (scene, shared)
    }

    pub fn calls(&self) -> &[SceneCall] {
        &self.calls
    }

    /// Forget recorded calls, keeping the derived state.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn visible_screens(&self) -> &[ScreenKey] {
        &self.visible
    }

    pub fn overlays(&self) -> &[OverlayId] {
        &self.overlays
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn is_barrier_visible(&self) -> bool {
        self.barrier
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn display_updates(&self) -> u64 {
        self.display_updates
    }
}

impl Scene for HeadlessScene {
    fn interrupt_input(&mut self, target: InputTarget) {
        self.calls.push(SceneCall::InterruptInput(target));
    }

    fn set_screen_visible(&mut self, key: ScreenKey, visible: bool) {
        self.calls.push(SceneCall::SetScreenVisible(key, visible));
        self.visible.retain(|k| *k != key);
        if visible {
            self.visible.push(key);
        }
    }

    fn set_screens_interactive(&mut self, interactive: bool) {
        self.calls.push(SceneCall::SetScreensInteractive(interactive));
        self.interactive = interactive;
    }

    fn set_background(&mut self, color: Color) {
        self.calls.push(SceneCall::SetBackground(color));
        self.background = Some(color);
    }

    fn set_barrier_visible(&mut self, visible: bool) {
        self.calls.push(SceneCall::SetBarrierVisible(visible));
        self.barrier = visible;
    }

    fn add_overlay(&mut self, id: OverlayId) {
        self.calls.push(SceneCall::AddOverlay(id));
        self.overlays.push(id);
    }

    fn remove_overlay(&mut self, id: OverlayId) {
        self.calls.push(SceneCall::RemoveOverlay(id));
        self.overlays.retain(|o| *o != id);
    }

    fn layout_navigation_bar(&mut self, layout: &NavigationBarLayout) {
        self.calls.push(SceneCall::LayoutNavigationBar(*layout));
    }

    fn update_display(&mut self) {
        self.calls.push(SceneCall::UpdateDisplay);
        self.display_updates += 1;
    }
}

#[derive(Debug)]
struct EnvState {
    now_ms: Cell<f64>,
    window: Cell<Size>,
    frame_requests: Cell<u64>,
}

/// Hand-driven clock and window. Clones share state.
#[derive(Debug, Clone)]
pub struct ManualEnvironment {
    state: Rc<EnvState>,
}

impl ManualEnvironment {
    pub fn new(window: Size) -> Self {
        Self {
            state: Rc::new(EnvState {
                now_ms: Cell::new(0.0),
                window: Cell::new(window),
                frame_requests: Cell::new(0),
            }),
        }
    }

    pub fn now(&self) -> f64 {
        self.state.now_ms.get()
    }

    pub fn set_now(&self, ms: f64) {
        self.state.now_ms.set(ms);
    }

    pub fn advance_ms(&self, ms: f64) {
        self.state.now_ms.set(self.state.now_ms.get() + ms);
    }

    pub fn set_window_size(&self, size: Size) {
        self.state.window.set(size);
    }

    /// How many times the runtime asked for another frame.
    pub fn frame_requests(&self) -> u64 {
        self.state.frame_requests.get()
    }
}

impl HostEnvironment for ManualEnvironment {
    fn window_size(&self) -> Size {
        self.state.window.get()
    }

    fn now_ms(&self) -> f64 {
        self.state.now_ms.get()
    }

    fn request_animation_frame(&mut self) {
        self.state
            .frame_requests
            .set(self.state.frame_requests.get() + 1);
    }
}
