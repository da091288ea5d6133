#![forbid(unsafe_code)]

//! Drives a `Sim` headlessly from parsed [`Opts`].

use std::fs;

use tableau::{
    Error, FrameOutcome, ReplayResult, RuntimeConfig, ScreenKey, SessionRecorder, SessionTrace,
    Sim, SimBuilder, replay,
};
use tableau_runtime::error::SimResult;
use tableau_runtime::simulator::{HeadlessScene, ManualEnvironment};
use tableau_runtime::OverlayId;
use tracing::{debug, info};

use crate::cli::Opts;
use crate::overlay::HelpOverlay;
use crate::screens;

/// How long the help card stays up after start.
pub const HELP_FRAMES: u64 = 60;
const HELP_ID: OverlayId = OverlayId(1);

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stepped: u64,
    pub skipped: u64,
    pub elapsed: f64,
    pub current: ScreenKey,
    pub digest: u64,
    /// Frames written to the trace, when recording.
    pub recorded_frames: Option<u64>,
}

/// Load the config file named in `opts`, or the defaults.
pub fn load_config(opts: &Opts) -> tableau::Result<RuntimeConfig> {
    match &opts.config {
        Some(path) => Ok(RuntimeConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(RuntimeConfig::default()),
    }
}

pub fn build_sim(opts: &Opts, config: &RuntimeConfig, env: &ManualEnvironment) -> SimResult<Sim> {
    let (_scene, shared) = HeadlessScene::shared();
    SimBuilder::new(screens::all())
        .config(config.clone())
        .launch(opts.launch.clone())
        .build(shared, Box::new(env.clone()))
}

/// The key after `current` in selection order, wrapping around.
pub fn next_key(keys: &[ScreenKey], current: ScreenKey) -> ScreenKey {
    let idx = keys.iter().position(|k| *k == current).unwrap_or(0);
    keys.get((idx + 1) % keys.len().max(1))
        .copied()
        .unwrap_or(current)
}

/// Run `opts.frames` animation frames, cycling screens and recording if
/// asked to.
pub fn run(opts: &Opts) -> tableau::Result<RunSummary> {
    let config = load_config(opts)?;
    let env = ManualEnvironment::new(opts.window);
    let mut sim = build_sim(opts, &config, &env)?;
    let recorder = opts
        .record
        .is_some()
        .then(|| SessionRecorder::attach(&mut sim));
    let keys = sim.selection().keys().to_vec();

    sim.start();
    sim.show_overlay(Box::new(HelpOverlay::new(HELP_ID)), true)?;
    debug!(target_input = ?sim.input_target(), "help shown");

    let (mut stepped, mut skipped) = (0, 0);
    for frame in 1..=opts.frames {
        match sim.on_animation_frame()? {
            FrameOutcome::Stepped(_) => stepped += 1,
            FrameOutcome::Skipped { .. } => skipped += 1,
            FrameOutcome::Playback | FrameOutcome::Halted => {}
        }
        env.advance_ms(opts.frame_ms);

        if frame == HELP_FRAMES && sim.modal_stack().is_shown(HELP_ID) {
            sim.hide_overlay(HELP_ID, true)?;
        }
        if opts.switch_every > 0 && frame % opts.switch_every == 0 {
            sim.switch_screen(next_key(&keys, sim.current_screen()))?;
        }
    }

    let recorded_frames = match (recorder, &opts.record) {
        (Some(recorder), Some(path)) => {
            let trace = recorder.finish();
            fs::write(path, trace.to_jsonl()?)?;
            info!(path = %path.display(), frames = trace.frame_count(), "trace written");
            Some(trace.frame_count())
        }
        _ => None,
    };

    Ok(RunSummary {
        stepped,
        skipped,
        elapsed: sim.elapsed(),
        current: sim.current_screen(),
        digest: sim.state_digest(),
        recorded_frames,
    })
}

/// Replay the JSONL trace at `opts.replay` against the demo screens.
pub fn replay_file(opts: &Opts) -> tableau::Result<ReplayResult> {
    let Some(path) = &opts.replay else {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no trace to replay",
        )));
    };
    let config = load_config(opts)?;
    let trace = SessionTrace::from_jsonl_validated(&fs::read_to_string(path)?)?;
    let env = ManualEnvironment::new(opts.window);
    let result = replay(|| build_sim(opts, &config, &env), &trace)?;
    info!(
        frames = result.total_frames,
        ok = result.ok(),
        "replay finished"
    );
    Ok(result)
}
