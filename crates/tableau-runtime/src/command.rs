#![forbid(unsafe_code)]

//! Deterministic commands and the recorder hook.
//!
//! Every state change that replay must reproduce goes through
//! [`Sim::execute`](crate::sim::Sim::execute) as a [`Command`]. Registered
//! [`CommandRecorder`]s are told when each command starts and ends, with
//! the nesting depth: a resize applied inside a step is reported at depth 1.
//!
//! # Recording order
//!
//! `on_command_end` fires when a command *completes*, so a nested resize
//! ends before its enclosing step. A recorder that logs on completion
//! therefore writes the resize first; replaying that log in playback mode
//! defers the resize until the step that follows it, which is exactly where
//! it originally happened.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::layout::ResizeOutcome;
use crate::scheduler::StepReport;
use crate::screen::ScreenKey;

/// A replayable operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Resize { width: f64, height: f64 },
    StepSimulation { dt: f64 },
    SwitchScreen { key: ScreenKey },
    /// Left inset of the content bounds.
    SetToolbarWidth { width: f64 },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "resize",
            Self::StepSimulation { .. } => "step_simulation",
            Self::SwitchScreen { .. } => "switch_screen",
            Self::SetToolbarWidth { .. } => "set_toolbar_width",
        }
    }

    /// Positional arguments as JSON values.
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::Resize { width, height } => vec![json!(width), json!(height)],
            Self::StepSimulation { dt } => vec![json!(dt)],
            Self::SwitchScreen { key } => vec![json!(key)],
            Self::SetToolbarWidth { width } => vec![json!(width)],
        }
    }
}

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// `digest` is [`Sim::state_digest`](crate::sim::Sim::state_digest)
    /// after a top-level command, `None` for nested ones.
    Applied { digest: Option<u64> },
    Failed(String),
}

/// What a command did, returned by `execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEffect {
    Resized(ResizeOutcome),
    /// Playback mode: stored until the next step.
    ResizeDeferred,
    Stepped(StepReport),
    /// `false` when the target was already current.
    Switched(bool),
    /// `false` when the width was unchanged or not finite.
    ToolbarSet(bool),
}

/// Observer of executed commands.
pub trait CommandRecorder {
    fn on_command_start(&mut self, command: &Command, depth: usize) {
        let _ = (command, depth);
    }

    fn on_command_end(&mut self, command: &Command, depth: usize, outcome: &CommandOutcome);
}
