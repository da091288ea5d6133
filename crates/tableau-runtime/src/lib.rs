#![forbid(unsafe_code)]

//! Tableau Runtime
//!
//! The runtime shell that turns a set of independently authored screens into
//! one running application.
//!
//! # Key Components
//!
//! - [`select_screens`] - filters declared screens by launch options and
//!   decides on the home screen and the initial screen
//! - [`ScreenSwitchController`] - which single screen is visible and active
//! - [`FrameScheduler`] - one clock tick per host frame, fixed step order
//! - [`LayoutCoordinator`] - window size to scale and per-screen bounds
//! - [`ModalStack`] - overlays and input suspension behind modals
//! - [`Command`] / [`CommandRecorder`] - deterministic record and replay hook
//! - [`Sim`] - all of the above behind one host-driven API
//!
//! # How it fits in the system
//! The runtime consumes a [`Scene`] and a [`HostEnvironment`] from the host
//! and the reactive values of `tableau-core`. It never renders. Session
//! persistence lives in `tableau-playback`.

pub mod camera;
pub mod command;
pub mod config;
pub mod context;
pub mod digest;
pub mod error;
pub mod home;
pub mod host;
pub mod layout;
pub mod modal;
pub mod scheduler;
pub mod screen;
pub mod selection;
pub mod sim;
pub mod simulator;
pub mod step_timer;
pub mod switcher;

pub use camera::{Camera, CameraTransform};
pub use command::{Command, CommandEffect, CommandOutcome, CommandRecorder};
pub use config::{InstantiationPolicy, LaunchOptions, RuntimeConfig};
pub use context::RuntimeContext;
pub use error::{
    BoxError, ConfigError, LaunchError, ModalError, SelectionError, SimError, SimResult, StepPhase,
};
pub use host::{HostEnvironment, InputTarget, OverlayId, Scene, SharedScene};
pub use layout::{
    LayoutBounds, LayoutCoordinator, NavigationBarLayout, ResizeOutcome, ViewportGeometry,
};
pub use modal::{ModalStack, Overlay};
pub use scheduler::{ClockState, FrameOutcome, FrameScheduler, StepReport};
pub use screen::{
    Layoutable, Screen, ScreenInfo, ScreenKey, ScreenModel, ScreenSet, ScreenView, Steppable,
};
pub use selection::{ScreenSelection, Selected, select_screens};
pub use sim::{Sim, SimBuilder};
pub use step_timer::{StepTimer, TimeoutId};
pub use switcher::ScreenSwitchController;

/// Everything a screen author usually needs.
pub mod prelude {
    pub use crate::error::{BoxError, SimError, SimResult};
    pub use crate::host::{OverlayId, Scene, SharedScene};
    pub use crate::layout::LayoutBounds;
    pub use crate::modal::Overlay;
    pub use crate::screen::{Layoutable, Screen, ScreenKey, ScreenModel, Steppable};
    pub use crate::sim::{Sim, SimBuilder};
    pub use tableau_core::geometry::{Bounds, Color, Size};
    pub use tableau_core::observable::{Emitter, Property, Subscription};
}
