#![forbid(unsafe_code)]

//! Deterministic session recording and replay.
//!
//! [`SessionRecorder`] observes every [`Command`] a [`Sim`] executes and
//! writes a [`SessionTrace`]; [`replay`] feeds the trace through a freshly
//! built `Sim` in playback mode and checks that each step lands on the same
//! state digest.
//!
//! # Trace layout
//!
//! - **Header**: schema version and the names of the selected screens.
//! - **Command**: an executed command with its nesting depth.
//! - **Frame**: written after each top-level step, with the state digest and
//!   the running checksum chain.
//! - **Summary**: total frames and the final checksum chain.
//!
//! # Determinism contract
//!
//! Given the same screens and the same command stream, replay must produce
//! identical frame checksums. This holds because:
//!
//! 1. Time only advances through recorded `step_simulation` commands.
//! 2. Resizes are recorded where they complete; in playback they are
//!    deferred to the step that follows, which is where the nested ones
//!    originally ran.
//! 3. Screen models report their state through `ScreenModel::fingerprint`.
//!
//! # Example
//!
//! ```ignore
//! let mut sim = build_sim()?;
//! let recorder = SessionRecorder::attach(&mut sim);
//! sim.step_simulation(1.0 / 60.0)?;
//! let trace = recorder.finish();
//! drop(sim);
//!
//! let result = replay(build_sim, &trace)?;
//! assert!(result.ok());
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tableau_runtime::command::{Command, CommandOutcome, CommandRecorder};
use tableau_runtime::digest;
use tableau_runtime::error::{SimError, SimResult};
use tableau_runtime::sim::Sim;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Schema identifier written into every trace header.
pub const SCHEMA_VERSION: &str = "tableau-trace-v1";

/// A single line of a session trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceRecord {
    Header {
        schema_version: String,
        screens: Vec<String>,
    },
    Command {
        depth: usize,
        command: Command,
    },
    Frame {
        frame_idx: u64,
        checksum: u64,
        checksum_chain: u64,
    },
    Summary {
        total_frames: u64,
        final_checksum_chain: u64,
    },
}

/// A complete recorded session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTrace {
    pub records: Vec<TraceRecord>,
}

impl SessionTrace {
    pub fn frame_count(&self) -> u64 {
        self.records
            .iter()
            .filter(|r| matches!(r, TraceRecord::Frame { .. }))
            .count() as u64
    }

    /// Final checksum chain from the summary record, if present.
    pub fn final_checksum_chain(&self) -> Option<u64> {
        self.records.iter().rev().find_map(|r| match r {
            TraceRecord::Summary {
                final_checksum_chain,
                ..
            } => Some(*final_checksum_chain),
            _ => None,
        })
    }

    /// Screen names from the header, if present.
    pub fn screens(&self) -> Option<&[String]> {
        match self.records.first() {
            Some(TraceRecord::Header { screens, .. }) => Some(screens),
            _ => None,
        }
    }

    /// Commands in recorded order, with their depth.
    pub fn commands(&self) -> impl Iterator<Item = (usize, &Command)> {
        self.records.iter().filter_map(|r| match r {
            TraceRecord::Command { depth, command } => Some((*depth, command)),
            _ => None,
        })
    }

    /// Validate structural invariants.
    ///
    /// This checks:
    /// - header exists, is first, and names a supported schema
    /// - summary exists and is the last record
    /// - frame indices are contiguous from zero and each chain link is
    ///   `chain(previous, checksum)`
    /// - summary totals match the frame records
    /// - every command carries finite numbers
    pub fn validate(&self) -> Result<(), TraceValidationError> {
        if self.records.is_empty() {
            return Err(TraceValidationError::EmptyTrace);
        }

        let mut header_count: usize = 0;
        let mut summary: Option<(usize, u64, u64)> = None;
        let mut frame_count: u64 = 0;
        let mut last_checksum_chain: u64 = 0;

        for (idx, record) in self.records.iter().enumerate() {
            if let Some((summary_index, _, _)) = summary {
                return Err(match record {
                    TraceRecord::Summary { .. } => TraceValidationError::MultipleSummaries,
                    _ => TraceValidationError::SummaryNotLast { summary_index },
                });
            }
            match record {
                TraceRecord::Header { schema_version, .. } => {
                    if schema_version != SCHEMA_VERSION {
                        return Err(TraceValidationError::UnsupportedSchema(
                            schema_version.clone(),
                        ));
                    }
                    header_count += 1;
                }
                TraceRecord::Summary {
                    total_frames,
                    final_checksum_chain,
                } => {
                    summary = Some((idx, *total_frames, *final_checksum_chain));
                }
                TraceRecord::Frame {
                    frame_idx,
                    checksum,
                    checksum_chain,
                } => {
                    if *frame_idx != frame_count {
                        return Err(TraceValidationError::FrameIndexMismatch {
                            expected: frame_count,
                            actual: *frame_idx,
                        });
                    }
                    if digest::chain(last_checksum_chain, *checksum) != *checksum_chain {
                        return Err(TraceValidationError::BrokenChain {
                            frame_idx: *frame_idx,
                        });
                    }
                    frame_count += 1;
                    last_checksum_chain = *checksum_chain;
                }
                TraceRecord::Command { command, .. } => {
                    if !is_finite(command) {
                        return Err(TraceValidationError::NonFiniteCommand { index: idx });
                    }
                }
            }
        }

        if header_count == 0 {
            return Err(TraceValidationError::MissingHeader);
        }
        if header_count > 1 {
            return Err(TraceValidationError::MultipleHeaders);
        }
        if !matches!(self.records.first(), Some(TraceRecord::Header { .. })) {
            return Err(TraceValidationError::HeaderNotFirst);
        }

        let Some((_, summary_frames, summary_chain)) = summary else {
            return Err(TraceValidationError::MissingSummary);
        };
        if summary_frames != frame_count {
            return Err(TraceValidationError::SummaryFrameCountMismatch {
                expected: frame_count,
                actual: summary_frames,
            });
        }
        if summary_chain != last_checksum_chain {
            return Err(TraceValidationError::SummaryChecksumChainMismatch {
                expected: last_checksum_chain,
                actual: summary_chain,
            });
        }

        Ok(())
    }

    /// One JSON object per line.
    pub fn to_jsonl(&self) -> Result<String, TraceError> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record).map_err(TraceError::Serialize)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse JSONL. Blank lines are skipped; line numbers in errors are
    /// 1-based.
    pub fn from_jsonl(input: &str) -> Result<Self, TraceError> {
        let mut records = Vec::new();
        for (i, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str(line)
                .map_err(|source| TraceError::Parse { line: i + 1, source })?;
            records.push(record);
        }
        Ok(Self { records })
    }

    /// Parse JSONL and validate the result.
    pub fn from_jsonl_validated(input: &str) -> Result<Self, TraceError> {
        let trace = Self::from_jsonl(input)?;
        trace.validate()?;
        Ok(trace)
    }
}

fn is_finite(command: &Command) -> bool {
    match command {
        Command::Resize { width, height } => width.is_finite() && height.is_finite(),
        Command::StepSimulation { dt } => dt.is_finite(),
        Command::SwitchScreen { .. } => true,
        Command::SetToolbarWidth { width } => width.is_finite(),
    }
}

/// Typed validation failures for [`SessionTrace`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceValidationError {
    #[error("trace is empty")]
    EmptyTrace,
    #[error("trace is missing header")]
    MissingHeader,
    #[error("trace header is not the first record")]
    HeaderNotFirst,
    #[error("trace contains multiple headers")]
    MultipleHeaders,
    #[error("unsupported trace schema `{0}`")]
    UnsupportedSchema(String),
    #[error("trace is missing summary")]
    MissingSummary,
    #[error("trace contains multiple summaries")]
    MultipleSummaries,
    #[error("trace summary at index {summary_index} is not the final record")]
    SummaryNotLast { summary_index: usize },
    #[error("frame index mismatch: expected {expected}, got {actual}")]
    FrameIndexMismatch { expected: u64, actual: u64 },
    #[error("checksum chain broken at frame {frame_idx}")]
    BrokenChain { frame_idx: u64 },
    #[error("command record {index} holds a non-finite number")]
    NonFiniteCommand { index: usize },
    #[error("summary frame-count mismatch: expected {expected}, got {actual}")]
    SummaryFrameCountMismatch { expected: u64, actual: u64 },
    #[error("summary checksum-chain mismatch: expected {expected:016x}, got {actual:016x}")]
    SummaryChecksumChainMismatch { expected: u64, actual: u64 },
}

/// Errors reading or writing a JSONL trace.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize trace record: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] TraceValidationError),
}

#[derive(Debug, Default)]
struct RecorderState {
    records: Vec<TraceRecord>,
    frames: u64,
    checksum_chain: u64,
}

/// Records the commands of one [`Sim`] into a [`SessionTrace`].
///
/// The recorder is a shared handle: one clone is registered with the `Sim`
/// as a [`CommandRecorder`], the caller keeps another to [`finish`] with.
///
/// Only successful commands are recorded. A top-level `step_simulation`
/// also produces a frame record carrying the `Sim`'s state digest.
///
/// [`finish`]: SessionRecorder::finish
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    state: Rc<RefCell<RecorderState>>,
}

impl SessionRecorder {
    pub fn new(screens: Vec<String>) -> Self {
        let header = TraceRecord::Header {
            schema_version: SCHEMA_VERSION.to_string(),
            screens,
        };
        Self {
            state: Rc::new(RefCell::new(RecorderState {
                records: vec![header],
                ..RecorderState::default()
            })),
        }
    }

    /// Create a recorder for `sim`'s screens and register it.
    pub fn attach(sim: &mut Sim) -> Self {
        let recorder = Self::new(screen_names(sim));
        sim.add_recorder(Box::new(recorder.clone()));
        recorder
    }

    pub fn frame_count(&self) -> u64 {
        self.state.borrow().frames
    }

    /// Snapshot the trace so far, closed with a summary record.
    ///
    /// Recording may continue afterwards; a later `finish` includes the
    /// newer commands.
    pub fn finish(&self) -> SessionTrace {
        let state = self.state.borrow();
        let mut records = state.records.clone();
        records.push(TraceRecord::Summary {
            total_frames: state.frames,
            final_checksum_chain: state.checksum_chain,
        });
        info!(
            frames = state.frames,
            records = records.len(),
            "session trace finished"
        );
        SessionTrace { records }
    }
}

impl CommandRecorder for SessionRecorder {
    fn on_command_end(&mut self, command: &Command, depth: usize, outcome: &CommandOutcome) {
        let digest = match outcome {
            CommandOutcome::Applied { digest } => *digest,
            CommandOutcome::Failed(reason) => {
                debug!(command = command.name(), %reason, "failed command not recorded");
                return;
            }
        };
        // A non-finite resize or toolbar width leaves the state untouched and
        // cannot be encoded. Steps reach recorders with `dt` already finite.
        if !is_finite(command) {
            debug!(command = command.name(), "non-finite command not recorded");
            return;
        }

        let mut state = self.state.borrow_mut();
        state.records.push(TraceRecord::Command {
            depth,
            command: command.clone(),
        });

        if let (Command::StepSimulation { .. }, 0, Some(checksum)) = (command, depth, digest) {
            let frame_idx = state.frames;
            let checksum_chain = digest::chain(state.checksum_chain, checksum);
            state.records.push(TraceRecord::Frame {
                frame_idx,
                checksum,
                checksum_chain,
            });
            state.frames += 1;
            state.checksum_chain = checksum_chain;
        }
    }
}

fn screen_names(sim: &Sim) -> Vec<String> {
    sim.selection()
        .keys()
        .iter()
        .filter_map(|key| sim.screens().name(*key).map(str::to_string))
        .collect()
}

/// Result of replaying a session trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResult {
    /// Total frames replayed.
    pub total_frames: u64,
    /// Final checksum chain from replay.
    pub final_checksum_chain: u64,
    /// First frame where a checksum mismatch was detected, if any.
    pub first_mismatch: Option<ReplayMismatch>,
}

impl ReplayResult {
    /// Whether the replay produced identical checksums.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.first_mismatch.is_none()
    }
}

/// Description of a checksum mismatch during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    pub frame_idx: u64,
    pub expected: u64,
    pub actual: u64,
}

/// Errors that stop a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("invalid trace: {0}")]
    InvalidTrace(#[from] TraceValidationError),
    #[error("replay screens {actual:?} do not match recorded screens {expected:?}")]
    ScreenMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Replay a recorded session through a freshly built [`Sim`].
///
/// `build` must produce a `Sim` over the same screens as the recording;
/// since only one runtime context may be live, the recording `Sim` has to
/// be dropped first. The replayed `Sim` runs in playback mode and executes
/// every command record, nested ones included. Each frame record is
/// compared with the digest after the step that precedes it.
pub fn replay(
    build: impl FnOnce() -> SimResult<Sim>,
    trace: &SessionTrace,
) -> Result<ReplayResult, ReplayError> {
    trace.validate()?;
    let expected = trace.screens().map(<[String]>::to_vec).unwrap_or_default();

    let mut sim = build()?;
    let actual = screen_names(&sim);
    if actual != expected {
        return Err(ReplayError::ScreenMismatch { expected, actual });
    }
    sim.set_playback(true);

    let mut total_frames: u64 = 0;
    let mut checksum_chain: u64 = 0;
    let mut first_mismatch: Option<ReplayMismatch> = None;
    let mut last_digest = sim.state_digest();

    for record in &trace.records {
        match record {
            TraceRecord::Command { command, .. } => {
                sim.execute(command.clone())?;
                last_digest = sim.state_digest();
            }
            TraceRecord::Frame {
                frame_idx,
                checksum,
                ..
            } => {
                checksum_chain = digest::chain(checksum_chain, last_digest);
                if last_digest != *checksum && first_mismatch.is_none() {
                    warn!(
                        frame = frame_idx,
                        expected = format_args!("{checksum:016x}"),
                        actual = format_args!("{last_digest:016x}"),
                        "replay diverged"
                    );
                    first_mismatch = Some(ReplayMismatch {
                        frame_idx: *frame_idx,
                        expected: *checksum,
                        actual: last_digest,
                    });
                }
                total_frames += 1;
            }
            TraceRecord::Header { .. } | TraceRecord::Summary { .. } => {}
        }
    }

    Ok(ReplayResult {
        total_frames,
        final_checksum_chain: checksum_chain,
        first_mismatch,
    })
}
