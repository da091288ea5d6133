#![forbid(unsafe_code)]

//! The running simulation.
//!
//! [`Sim`] ties selection, switching, layout, the modal stack and the frame
//! scheduler together behind one host-driven API:
//!
//! - the host calls [`Sim::on_animation_frame`] once per rendered frame;
//! - window size changes go through [`Sim::request_resize`] (coalesced into
//!   the next step) or [`Sim::resize`] (immediate);
//! - screen changes go through [`Sim::switch_screen`];
//! - overlays go through [`Sim::show_overlay`] / [`Sim::hide_overlay`].
//!
//! Resizes, steps, switches and toolbar width changes are [`Command`]s and
//! are reported to every registered [`CommandRecorder`].
//!
//! # Example
//!
//! ```
//! use tableau_runtime::prelude::*;
//! use tableau_runtime::simulator::{HeadlessScene, ManualEnvironment};
//!
//! struct Empty;
//! impl Steppable for Empty {}
//! impl Layoutable for Empty {}
//! impl ScreenModel for Empty {}
//!
//! let _serial = tableau_runtime::context::serial_guard();
//! let (_scene, shared) = HeadlessScene::shared();
//! let env = ManualEnvironment::new(Size::new(1024.0, 618.0));
//! let screens = vec![Screen::new("Only", || Empty, |_| Empty)];
//! let mut sim = SimBuilder::new(screens).build(shared, Box::new(env.clone())).unwrap();
//! sim.start();
//! env.advance_ms(16.0);
//! sim.on_animation_frame().unwrap();
//! assert_eq!(sim.frame_counter(), 1);
//! ```

use std::fmt;
use std::rc::Rc;

use tableau_core::geometry::Size;
use tableau_core::observable::{ReadOnlyProperty, Subscription};

use crate::camera::Camera;
use crate::command::{Command, CommandEffect, CommandOutcome, CommandRecorder};
use crate::config::{InstantiationPolicy, LaunchOptions, RuntimeConfig};
use crate::context::RuntimeContext;
use crate::digest::Fnv1a;
use crate::error::{SimError, SimResult};
use crate::home::home_screen;
use crate::host::{HostEnvironment, InputTarget, OverlayId, SharedScene};
use crate::layout::{
    LayoutBounds, LayoutCoordinator, LayoutSink, NavigationBarLayout, ResizeOutcome,
    ViewportGeometry,
};
use crate::modal::{ModalStack, Overlay};
use crate::scheduler::{ClockState, FrameOutcome, FrameScheduler, FrameTarget, StepReport, TickDecision};
use crate::screen::{Screen, ScreenInfo, ScreenKey, ScreenSet, Steppable};
use crate::selection::{ScreenSelection, select_screens};
use crate::step_timer::StepTimer;
use crate::switcher::ScreenSwitchController;

type HomeFactory = Box<dyn FnOnce(&[ScreenInfo]) -> Screen>;

/// Configures and builds a [`Sim`].
pub struct SimBuilder {
    screens: Vec<Screen>,
    config: RuntimeConfig,
    launch: LaunchOptions,
    home_factory: Option<HomeFactory>,
}

impl fmt::Debug for SimBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimBuilder")
            .field("screens", &self.screens.len())
            .field("config", &self.config)
            .field("launch", &self.launch)
            .field("custom_home", &self.home_factory.is_some())
            .finish()
    }
}

impl SimBuilder {
    pub fn new(screens: Vec<Screen>) -> Self {
        Self {
            screens,
            config: RuntimeConfig::default(),
            launch: LaunchOptions::default(),
            home_factory: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Launch options. Their `speed` and `playback` override the config.
    #[must_use]
    pub fn launch(mut self, launch: LaunchOptions) -> Self {
        self.launch = launch;
        self
    }

    /// Replace the built-in home screen.
    #[must_use]
    pub fn home_screen(mut self, factory: impl FnOnce(&[ScreenInfo]) -> Screen + 'static) -> Self {
        self.home_factory = Some(Box::new(factory));
        self
    }

    pub fn build(self, scene: SharedScene, env: Box<dyn HostEnvironment>) -> SimResult<Sim> {
        let config = self.config.with_launch(&self.launch);
        let context = RuntimeContext::new(config.clone())?;

        let selected = match self.home_factory {
            Some(factory) => select_screens(self.screens, &self.launch, factory),
            None => select_screens(self.screens, &self.launch, home_screen),
        }?;
        let selection = selected.selection;
        let mut screens = selected.screens;

        let switcher = ScreenSwitchController::new(&selection);
        if config.instantiation == InstantiationPolicy::Eager {
            screens.instantiate_all()?;
        }

        let modals = ModalStack::new();
        let barrier_scene = Rc::clone(&scene);
        let barrier_sub = modals.barrier().subscribe(move |visible, _| {
            let mut scene = barrier_scene.borrow_mut();
            scene.set_barrier_visible(*visible);
            scene.set_screens_interactive(!*visible);
        });

        switcher.initialize(&mut screens, &scene)?;

        tracing::info!(
            screens = selection.len(),
            initial = %selection.initial(),
            speed = config.speed,
            playback = config.playback,
            "simulation built"
        );

        Ok(Sim {
            scheduler: FrameScheduler::new(config.fallback_dt, config.speed, config.playback),
            stage: Stage {
                layout: LayoutCoordinator::new(config.reference_size, config.nav_bar_height),
                context,
                selection,
                screens,
                switcher,
                modals,
                camera: Camera::new(),
                animators: Vec::new(),
                scene,
                env,
                recorders: Vec::new(),
                depth: 0,
                _barrier: barrier_sub,
            },
        })
    }
}

/// Everything a frame touches, kept apart from the scheduler so the
/// scheduler can borrow it mutably as a [`FrameTarget`].
struct Stage {
    context: RuntimeContext,
    selection: ScreenSelection,
    screens: ScreenSet,
    switcher: ScreenSwitchController,
    layout: LayoutCoordinator,
    modals: ModalStack,
    camera: Camera,
    animators: Vec<Box<dyn Steppable>>,
    scene: SharedScene,
    env: Box<dyn HostEnvironment>,
    recorders: Vec<Box<dyn CommandRecorder>>,
    depth: usize,
    _barrier: Subscription,
}

struct LayoutPass<'a> {
    screens: &'a mut ScreenSet,
    modals: &'a mut ModalStack,
    scene: &'a SharedScene,
}

impl LayoutSink for LayoutPass<'_> {
    fn layout_navigation_bar(&mut self, layout: &NavigationBarLayout) {
        self.scene.borrow_mut().layout_navigation_bar(layout);
    }

    fn layout_screens(&mut self, bounds: &LayoutBounds) {
        self.screens.layout_all(bounds);
    }

    fn layout_overlays(&mut self, bounds: &LayoutBounds) {
        self.modals.layout_overlays(bounds);
    }
}

impl Stage {
    fn begin(&mut self, command: &Command) -> usize {
        let depth = self.depth;
        tracing::trace!(command = command.name(), depth, "command started");
        for recorder in &mut self.recorders {
            recorder.on_command_start(command, depth);
        }
        self.depth += 1;
        depth
    }

    fn end(&mut self, command: &Command, depth: usize, outcome: &CommandOutcome) {
        self.depth = depth;
        for recorder in &mut self.recorders {
            recorder.on_command_end(command, depth, outcome);
        }
    }

    fn apply_resize(&mut self, size: Size) -> ResizeOutcome {
        let mut pass = LayoutPass {
            screens: &mut self.screens,
            modals: &mut self.modals,
            scene: &self.scene,
        };
        self.layout.resize(size, &mut pass)
    }

    fn switch(&mut self, key: ScreenKey) -> SimResult<bool> {
        let switched =
            self.switcher
                .switch_to(key, &mut self.screens, &self.scene, &mut self.camera)?;
        if switched {
            self.layout.mark_dirty();
        }
        Ok(switched)
    }
}

impl FrameTarget for Stage {
    fn frame_started(&mut self, frame: u64) {
        self.context.frame_started().emit(&frame);
    }

    fn resize_to(&mut self, size: Option<Size>) -> SimResult<ResizeOutcome> {
        let size = size.unwrap_or_else(|| self.env.window_size());
        let command = Command::Resize {
            width: size.width,
            height: size.height,
        };
        let depth = self.begin(&command);
        let outcome = self.apply_resize(size);
        self.end(&command, depth, &CommandOutcome::Applied { digest: None });
        Ok(outcome)
    }

    fn max_dt(&self) -> Option<f64> {
        self.screens.max_dt(self.switcher.current())
    }

    fn step_timer(&mut self, dt: f64) {
        self.context.step_timer().emit(dt);
    }

    fn step_model(&mut self, dt: f64) -> SimResult<()> {
        self.screens.step_model(self.switcher.current(), dt)
    }

    fn step_ancillary(&mut self, dt: f64) -> SimResult<()> {
        self.camera
            .step(dt)
            .map_err(|source| SimError::Animator { source })?;
        for animator in &mut self.animators {
            animator
                .step(dt)
                .map_err(|source| SimError::Animator { source })?;
        }
        Ok(())
    }

    fn step_view(&mut self, dt: f64) -> SimResult<()> {
        self.screens.step_view(self.switcher.current(), dt)
    }

    fn is_restoring(&self) -> bool {
        self.context.restoring().get()
    }

    fn update_display(&mut self) {
        self.scene.borrow_mut().update_display();
    }

    fn frame_ended(&mut self, frame: u64) {
        self.context.frame_ended().emit(&frame);
    }
}

/// A running simulation. Not `Send`: it lives on the host's UI thread.
pub struct Sim {
    scheduler: FrameScheduler,
    stage: Stage,
}

impl fmt::Debug for Sim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sim")
            .field("clock", self.scheduler.clock())
            .field("current", &self.stage.switcher.current())
            .field("modals", &self.stage.modals)
            .finish()
    }
}

impl Sim {
    /// Request the first relayout and the first animation frame.
    pub fn start(&mut self) {
        self.scheduler.request_resize();
        self.stage.env.request_animation_frame();
        tracing::info!(screen = %self.current_screen(), "simulation started");
    }

    /// Host animation-frame callback.
    ///
    /// Measures `dt`, steps unless `dt <= 0` or playback is on, then asks
    /// for the next frame. After an error the loop stops: the error is
    /// returned once, later calls return [`FrameOutcome::Halted`] and no
    /// further frames are requested.
    pub fn on_animation_frame(&mut self) -> SimResult<FrameOutcome> {
        if self.scheduler.is_halted() {
            return Ok(FrameOutcome::Halted);
        }
        let now = self.stage.env.now_ms();
        let decision = self.scheduler.compute_dt(now);
        let outcome = if self.scheduler.is_playback() {
            FrameOutcome::Playback
        } else {
            match decision {
                TickDecision::Skip { dt } => {
                    tracing::debug!(dt, "skipping frame");
                    FrameOutcome::Skipped { dt }
                }
                TickDecision::Step(dt) => FrameOutcome::Stepped(self.step_simulation(dt)?),
            }
        };
        self.stage.env.request_animation_frame();
        Ok(outcome)
    }

    /// Run `command` and notify recorders.
    pub fn execute(&mut self, command: Command) -> SimResult<CommandEffect> {
        match command {
            Command::Resize { width, height } => self.resize(width, height),
            Command::StepSimulation { dt } => self.step_simulation(dt).map(CommandEffect::Stepped),
            Command::SwitchScreen { key } => self.switch_screen(key).map(CommandEffect::Switched),
            Command::SetToolbarWidth { width } => {
                self.set_toolbar_width(width).map(CommandEffect::ToolbarSet)
            }
        }
    }

    fn run<T>(
        &mut self,
        command: Command,
        op: impl FnOnce(&mut Self) -> SimResult<T>,
    ) -> SimResult<T> {
        let depth = self.stage.begin(&command);
        let result = op(self);
        let outcome = match &result {
            Ok(_) => CommandOutcome::Applied {
                digest: (depth == 0).then(|| self.state_digest()),
            },
            Err(err) => CommandOutcome::Failed(err.to_string()),
        };
        self.stage.end(&command, depth, &outcome);
        result
    }

    /// Advance the simulation by `dt` host seconds (before speed). A
    /// non-finite `dt` counts a frame without advancing time, and is
    /// reported to recorders as `0.0`.
    pub fn step_simulation(&mut self, dt: f64) -> SimResult<StepReport> {
        let dt = if dt.is_finite() { dt } else { 0.0 };
        self.run(Command::StepSimulation { dt }, |sim| {
            sim.scheduler.step_simulation(dt, &mut sim.stage)
        })
    }

    /// Lay out for a window of `width` x `height` now. In playback mode a
    /// valid resize is deferred to the next step instead.
    pub fn resize(&mut self, width: f64, height: f64) -> SimResult<CommandEffect> {
        self.run(Command::Resize { width, height }, |sim| {
            let size = Size::new(width, height);
            if sim.scheduler.is_playback() && size.is_positive() {
                sim.scheduler.defer_resize(size);
                Ok(CommandEffect::ResizeDeferred)
            } else {
                Ok(CommandEffect::Resized(sim.stage.apply_resize(size)))
            }
        })
    }

    /// Relayout to the host window size at the next step.
    pub fn request_resize(&mut self) {
        self.scheduler.request_resize();
    }

    /// Make `key` the visible screen. Returns `false` if it already was.
    pub fn switch_screen(&mut self, key: ScreenKey) -> SimResult<bool> {
        self.run(Command::SwitchScreen { key }, |sim| {
            let switched = sim.stage.switch(key)?;
            if switched {
                sim.scheduler.request_resize();
            }
            Ok(switched)
        })
    }

    pub fn show_overlay(&mut self, overlay: Box<dyn Overlay>, is_modal: bool) -> SimResult<()> {
        let bounds = self.stage.layout.current_bounds();
        self.stage
            .modals
            .show(overlay, is_modal, &self.stage.scene, bounds.as_ref())?;
        Ok(())
    }

    pub fn hide_overlay(&mut self, id: OverlayId, is_modal: bool) -> SimResult<Box<dyn Overlay>> {
        Ok(self.stage.modals.hide(id, is_modal, &self.stage.scene)?)
    }

    /// The topmost modal overlay, else the current screen.
    pub fn input_target(&self) -> InputTarget {
        self.stage.modals.input_target(self.current_screen())
    }

    /// Left inset of the content bounds; a change relayouts at the next
    /// step. Non-finite widths are ignored. Returns whether the width
    /// changed.
    pub fn set_toolbar_width(&mut self, width: f64) -> SimResult<bool> {
        self.run(Command::SetToolbarWidth { width }, |sim| {
            if !width.is_finite() {
                tracing::debug!(width, "ignoring non-finite toolbar width");
                return Ok(false);
            }
            let changed = sim.stage.layout.toolbar_width().get() != width;
            sim.stage.layout.set_toolbar_width(width);
            if changed {
                sim.scheduler.request_resize();
            }
            Ok(changed)
        })
    }

    /// Suppress `update_display` while a bulk state restore is running.
    pub fn set_restoring(&mut self, restoring: bool) {
        self.stage.context.set_restoring(restoring);
    }

    pub fn set_playback(&mut self, playback: bool) {
        tracing::info!(playback, "playback mode changed");
        self.scheduler.set_playback(playback);
    }

    /// Stepped after the camera, in registration order.
    pub fn add_animator(&mut self, animator: Box<dyn Steppable>) {
        self.stage.animators.push(animator);
    }

    pub fn add_recorder(&mut self, recorder: Box<dyn CommandRecorder>) {
        self.stage.recorders.push(recorder);
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.stage.context
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.stage.context.config()
    }

    pub fn step_timer(&self) -> Rc<StepTimer> {
        Rc::clone(self.stage.context.step_timer())
    }

    pub fn selection(&self) -> &ScreenSelection {
        &self.stage.selection
    }

    pub fn screens(&self) -> &ScreenSet {
        &self.stage.screens
    }

    pub fn current_screen(&self) -> ScreenKey {
        self.stage.switcher.current()
    }

    pub fn current_screen_property(&self) -> ReadOnlyProperty<ScreenKey> {
        self.stage.switcher.current_property()
    }

    pub fn geometry(&self) -> ReadOnlyProperty<Option<ViewportGeometry>> {
        self.stage.layout.geometry()
    }

    pub fn barrier(&self) -> ReadOnlyProperty<bool> {
        self.stage.modals.barrier()
    }

    pub fn modal_stack(&self) -> &ModalStack {
        &self.stage.modals
    }

    pub fn camera(&self) -> &Camera {
        &self.stage.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.stage.camera
    }

    pub fn scene(&self) -> &SharedScene {
        &self.stage.scene
    }

    pub fn clock(&self) -> &ClockState {
        self.scheduler.clock()
    }

    pub fn frame_counter(&self) -> u64 {
        self.scheduler.frame_counter()
    }

    pub fn elapsed(&self) -> f64 {
        self.scheduler.elapsed()
    }

    pub fn is_halted(&self) -> bool {
        self.scheduler.is_halted()
    }

    pub fn is_playback(&self) -> bool {
        self.scheduler.is_playback()
    }

    /// Hash of the replayable state: frame counter, elapsed time, current
    /// screen, viewport geometry and every instantiated model's
    /// fingerprint.
    ///
    /// Overlays are host objects outside the command stream and are not
    /// included.
    pub fn state_digest(&self) -> u64 {
        let mut hash = Fnv1a::new();
        hash.write_u64(self.scheduler.frame_counter())
            .write_f64(self.scheduler.elapsed());
        write_key(&mut hash, self.current_screen());
        match self.stage.layout.current() {
            Some(g) => {
                hash.write_bool(true)
                    .write_f64(g.window.width)
                    .write_f64(g.window.height)
                    .write_f64(g.scale)
                    .write_f64(g.content.min_x);
            }
            None => {
                hash.write_bool(false);
            }
        }
        for (key, fingerprint) in self.stage.screens.fingerprints() {
            write_key(&mut hash, key);
            hash.write_u64(fingerprint);
        }
        hash.finish()
    }
}

fn write_key(hash: &mut Fnv1a, key: ScreenKey) {
    match key {
        ScreenKey::Home => hash.write_u64(0),
        ScreenKey::Content(i) => hash.write_u64(i as u64 + 1),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::serial_guard;
    use crate::screen::{Layoutable, ScreenModel};
    use crate::simulator::{HeadlessScene, ManualEnvironment};

    struct Empty;
    impl Steppable for Empty {}
    impl Layoutable for Empty {}
    impl ScreenModel for Empty {}

    fn screens(n: usize) -> Vec<Screen> {
        (1..=n)
            .map(|i| Screen::new(format!("S{i}"), || Empty, |_| Empty))
            .collect()
    }

    #[test]
    fn build_fails_on_bad_selection_and_releases_context() {
        let _serial = serial_guard();
        let (_scene, shared) = HeadlessScene::shared();
        let env = ManualEnvironment::new(Size::new(800.0, 600.0));
        let err = SimBuilder::new(Vec::new())
            .build(shared, Box::new(env))
            .unwrap_err();
        assert!(matches!(err, SimError::Selection(_)));
        assert!(!crate::context::is_context_active());
    }

    #[test]
    fn start_requests_layout_and_frame() {
        let _serial = serial_guard();
        let (_scene, shared) = HeadlessScene::shared();
        let env = ManualEnvironment::new(Size::new(800.0, 600.0));
        let mut sim = SimBuilder::new(screens(2))
            .build(shared, Box::new(env.clone()))
            .unwrap();
        sim.start();
        assert_eq!(env.frame_requests(), 1);
        assert!(sim.clock().resize_pending);
        let report = sim.step_simulation(0.016).unwrap();
        assert!(report.resize.is_some_and(|r| r.is_applied()));
        assert_eq!(sim.geometry().get().map(|g| g.window), Some(Size::new(800.0, 600.0)));
    }

    #[test]
    fn digest_changes_with_state() {
        let _serial = serial_guard();
        let (_scene, shared) = HeadlessScene::shared();
        let env = ManualEnvironment::new(Size::new(800.0, 600.0));
        let mut sim = SimBuilder::new(screens(2))
            .build(shared, Box::new(env))
            .unwrap();
        let before = sim.state_digest();
        assert_eq!(before, sim.state_digest());
        sim.switch_screen(ScreenKey::Content(1)).unwrap();
        assert_ne!(before, sim.state_digest());
    }

    #[test]
    fn non_finite_step_counts_a_frame_without_advancing() {
        let _serial = serial_guard();
        let (_scene, shared) = HeadlessScene::shared();
        let env = ManualEnvironment::new(Size::new(800.0, 600.0));
        let screen = Screen::new("Capped", || Empty, |_| Empty).with_max_dt(0.1);
        let mut sim = SimBuilder::new(vec![screen])
            .build(shared, Box::new(env))
            .unwrap();
        sim.step_simulation(0.05).unwrap();
        for dt in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let effect = sim.execute(Command::StepSimulation { dt }).unwrap();
            assert!(matches!(effect, CommandEffect::Stepped(report) if !report.advanced));
        }
        assert_eq!(sim.frame_counter(), 4);
        assert_eq!(sim.elapsed(), 0.05);
    }

    #[test]
    fn toolbar_width_relayouts_at_next_step() {
        let _serial = serial_guard();
        let (_scene, shared) = HeadlessScene::shared();
        let env = ManualEnvironment::new(Size::new(800.0, 600.0));
        let mut sim = SimBuilder::new(screens(1))
            .build(shared, Box::new(env))
            .unwrap();
        sim.start();
        sim.step_simulation(0.016).unwrap();
        assert_eq!(sim.geometry().get().map(|g| g.content.min_x), Some(0.0));

        assert!(sim.set_toolbar_width(50.0).unwrap());
        assert!(!sim.set_toolbar_width(50.0).unwrap());
        assert!(!sim.set_toolbar_width(f64::NAN).unwrap());
        assert!(sim.clock().resize_pending);
        let report = sim.step_simulation(0.016).unwrap();
        assert!(report.resize.is_some_and(|r| r.is_applied()));
        assert_eq!(sim.geometry().get().map(|g| g.content.min_x), Some(50.0));
    }
}
