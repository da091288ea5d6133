#![forbid(unsafe_code)]

//! Tableau public facade crate.
//!
//! Re-exports the types an application needs to declare screens, hand them
//! to a [`Sim`] and drive it from a host, plus a prelude for day-to-day use.

use thiserror::Error;

// --- Core re-exports -------------------------------------------------------

pub use tableau_core::geometry::{Bounds, Color, Size};
pub use tableau_core::observable::{Emitter, Property, ReadOnlyProperty, Subscription};

// --- Runtime re-exports ----------------------------------------------------

pub use tableau_runtime::{
    BoxError, Command, CommandEffect, CommandRecorder, FrameOutcome, HostEnvironment,
    InputTarget, LaunchOptions, LayoutBounds, Layoutable, Overlay, OverlayId, RuntimeConfig,
    Scene, Screen, ScreenKey, ScreenModel, SharedScene, Sim, SimBuilder, SimError, StepReport,
    Steppable,
};

// --- Playback re-exports ---------------------------------------------------

#[cfg(feature = "playback")]
pub use tableau_playback::{ReplayResult, SessionRecorder, SessionTrace, replay};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for Tableau apps.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure reading or writing traces and config files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error(transparent)]
    Launch(#[from] tableau_runtime::LaunchError),
    #[error(transparent)]
    Config(#[from] tableau_runtime::ConfigError),
    #[cfg(feature = "playback")]
    #[error(transparent)]
    Trace(#[from] tableau_playback::TraceError),
    #[cfg(feature = "playback")]
    #[error(transparent)]
    Replay(#[from] tableau_playback::ReplayError),
}

/// Standard result type for Tableau APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        BoxError, Bounds, Color, Error, LayoutBounds, Layoutable, Overlay, OverlayId, Property,
        Result, Scene, Screen, ScreenKey, ScreenModel, Sim, SimBuilder, Size, Steppable,
    };

    pub use crate::{core, runtime};
}

pub use tableau_core as core;
#[cfg(feature = "playback")]
pub use tableau_playback as playback;
pub use tableau_runtime as runtime;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_convert_into_facade_error() {
        let err: Error = SimError::Halted.into();
        assert!(matches!(err, Error::Sim(SimError::Halted)));
        assert_eq!(
            err.to_string(),
            "scheduler halted after an earlier step failure"
        );
    }

    #[cfg(feature = "playback")]
    #[test]
    fn trace_errors_convert_into_facade_error() {
        let err: Error = SessionTrace::from_jsonl("not json").unwrap_err().into();
        assert!(matches!(err, Error::Trace(_)));
        assert!(err.to_string().starts_with("line 1:"));
    }
}
