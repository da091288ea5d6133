#![forbid(unsafe_code)]

//! Error types for the runtime.
//!
//! # Taxonomy
//!
//! | Kind | Examples | Behavior |
//! |------|----------|----------|
//! | Configuration | empty screen list, bad launch option, modal misuse | `Err` at the point of call |
//! | Transient | zero-area resize, `dt <= 0` | skipped locally, never an error |
//! | Screen step | a model or view `step` fails | fatal to the tick, scheduler halts |
//!
//! Transient conditions are reported through outcome enums
//! ([`ResizeOutcome`](crate::layout::ResizeOutcome),
//! [`FrameOutcome`](crate::scheduler::FrameOutcome)) rather than errors.

use std::fmt;

use crate::host::OverlayId;
use crate::screen::ScreenKey;

/// Boxed error returned by screen and animator step callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for runtime operations.
pub type SimResult<T> = Result<T, SimError>;

/// Invalid screen selection at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("no screens declared")]
    NoScreens,
    #[error("screen subset is empty")]
    EmptySubset,
    #[error("unknown screen {number} (declared screens: 1..={declared})")]
    UnknownScreen { number: usize, declared: usize },
    #[error("screen {number} listed more than once in subset")]
    DuplicateScreen { number: usize },
    #[error("initial screen {index} out of range (declared screens: 1..={declared})")]
    InitialScreenOutOfRange { index: usize, declared: usize },
    #[error("initial screen {number} is not part of the selected screens")]
    InitialScreenNotSelected { number: usize },
    #[error("initial screen 0 requested but there is no home screen")]
    InitialHomeUnavailable,
}

/// Malformed launch option.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    #[error("invalid value for `{key}`: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Invalid [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Misuse of the modal stack contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModalError {
    #[error("overlay {0} is already shown")]
    AlreadyShown(OverlayId),
    #[error("overlay {0} is not shown")]
    NotShown(OverlayId),
    #[error("overlay {id} was shown with is_modal={shown_modal} but hidden with is_modal={hidden_modal}")]
    ModalityMismatch {
        id: OverlayId,
        shown_modal: bool,
        hidden_modal: bool,
    },
}

/// Which callback of a screen failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Model,
    View,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("model"),
            Self::View => f.write_str("view"),
        }
    }
}

/// Top-level runtime error.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Modal(#[from] ModalError),
    #[error("screen {0} is not part of the selection")]
    UnknownScreen(ScreenKey),
    #[error("another runtime context is already active in this process")]
    ContextActive,
    #[error("{phase} step of screen `{screen}` failed: {source}")]
    ScreenStep {
        screen: String,
        phase: StepPhase,
        #[source]
        source: BoxError,
    },
    #[error("animator step failed: {source}")]
    Animator {
        #[source]
        source: BoxError,
    },
    #[error("scheduler halted after an earlier step failure")]
    Halted,
}
