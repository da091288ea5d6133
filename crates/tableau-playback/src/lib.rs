#![forbid(unsafe_code)]

//! Tableau Playback
//!
//! Records the command stream of a [`Sim`](tableau_runtime::Sim) into a
//! JSONL session trace and replays it with checksum verification.
//!
//! # Key Components
//!
//! - [`SessionRecorder`] - a [`CommandRecorder`](tableau_runtime::CommandRecorder)
//!   that builds a [`SessionTrace`]
//! - [`SessionTrace`] - header, commands, frame checksums, summary
//! - [`replay`] - runs a trace through a fresh `Sim` in playback mode

pub mod session_record;

pub use session_record::{
    ReplayError, ReplayMismatch, ReplayResult, SCHEMA_VERSION, SessionRecorder, SessionTrace,
    TraceError, TraceRecord, TraceValidationError, replay,
};
