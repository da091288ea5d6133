#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Parses args manually to keep the binary lean. Environment variables
//! supply defaults: `TABLEAU_*` for launch options (shared with every
//! Tableau host) and `TABLEAU_DEMO_*` for the driver itself. Explicit flags
//! win over both.

use std::env;
use std::path::PathBuf;
use std::process;

use tableau::{LaunchOptions, Size};
use tableau_runtime::LaunchError;
use thiserror::Error;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
Tableau Demo - headless runtime shell driven by a manual clock

USAGE:
    tableau-demo [OPTIONS]

OPTIONS:
    --screens=LIST         Comma-separated 1-based screens to include
    --home-screen=BOOL     Show the home screen (default: true if >1 screen)
    --no-home              Same as --home-screen=false
    --initial-screen=N     Start on screen N (0 = home)
    --speed=X              Simulation speed multiplier (default: 1)
    --query=QUERY          Launch options as a query string, e.g.
                           'screens=1,3&initialScreen=3'
    --frames=N             Animation frames to run (default: 600)
    --frame-ms=MS          Host frame interval in ms (default: 16.667)
    --size=WxH             Window size (default: 1024x618)
    --switch-every=N       Cycle screens every N frames, 0 = never (default: 120)
    --config=PATH          Runtime config JSON file
    --record=PATH          Write a JSONL session trace to PATH
    --replay=PATH          Replay a JSONL session trace and verify it
    --help, -h             Show this help message
    --version, -V          Show version

SCREENS:
    1  Pendulum           Damped pendulum integrated every step
    2  Orbit              Planets on circular orbits
    3  Metronome          Beats counted from accumulated time

ENVIRONMENT VARIABLES:
    TABLEAU_SCREENS              Default for --screens
    TABLEAU_HOME_SCREEN          Default for --home-screen
    TABLEAU_INITIAL_SCREEN       Default for --initial-screen
    TABLEAU_SPEED                Default for --speed
    TABLEAU_PLAYBACK             Start in playback mode
    TABLEAU_DEMO_FRAMES          Default for --frames
    TABLEAU_DEMO_FRAME_MS        Default for --frame-ms
    TABLEAU_DEMO_SIZE            Default for --size
    TABLEAU_DEMO_SWITCH_EVERY    Default for --switch-every
    TABLEAU_DEMO_RECORD          Default for --record
    RUST_LOG                     Log filter (default: info)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    pub launch: LaunchOptions,
    /// Animation frames to drive.
    pub frames: u64,
    /// Host clock advance per frame, in milliseconds.
    pub frame_ms: f64,
    pub window: Size,
    /// Cycle to the next screen every this many frames (0 = never).
    pub switch_every: u64,
    pub config: Option<PathBuf>,
    pub record: Option<PathBuf>,
    pub replay: Option<PathBuf>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            launch: LaunchOptions::default(),
            frames: 600,
            frame_ms: 1000.0 / 60.0,
            window: Size::new(1024.0, 618.0),
            switch_every: 120,
            config: None,
            record: None,
            replay: None,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Run(Opts),
    Help,
    Version,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid {flag} value: {value}")]
    InvalidValue { flag: &'static str, value: String },
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl Opts {
    /// Parse `std::env::args` and the process environment, exiting on
    /// `--help`, `--version` or bad input.
    pub fn parse() -> Self {
        match Self::parse_from(env::args().skip(1), |key| env::var(key).ok()) {
            Ok(Invocation::Run(opts)) => opts,
            Ok(Invocation::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Invocation::Version) => {
                println!("tableau-demo {VERSION}");
                process::exit(0);
            }
            Err(err) => {
                eprintln!("{err}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Parse `args` with `lookup` standing in for the environment.
    pub fn parse_from(
        args: impl IntoIterator<Item = String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Invocation, CliError> {
        let mut opts = Self::default();
        let env_launch = LaunchOptions::from_lookup(&lookup)?;

        // Environment defaults first
        if let Some(val) = lookup("TABLEAU_DEMO_FRAMES") {
            opts.frames = parse_value("TABLEAU_DEMO_FRAMES", &val)?;
        }
        if let Some(val) = lookup("TABLEAU_DEMO_FRAME_MS") {
            opts.frame_ms = parse_frame_ms("TABLEAU_DEMO_FRAME_MS", &val)?;
        }
        if let Some(val) = lookup("TABLEAU_DEMO_SIZE") {
            opts.window = parse_size("TABLEAU_DEMO_SIZE", &val)?;
        }
        if let Some(val) = lookup("TABLEAU_DEMO_SWITCH_EVERY") {
            opts.switch_every = parse_value("TABLEAU_DEMO_SWITCH_EVERY", &val)?;
        }
        if let Some(val) = lookup("TABLEAU_DEMO_RECORD") {
            opts.record = Some(PathBuf::from(val));
        }

        // Flags override the environment
        let mut launch = LaunchOptions::default();
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Invocation::Help),
                "--version" | "-V" => return Ok(Invocation::Version),
                "--no-home" => launch.home_screen = Some(false),
                other => {
                    let Some((flag, val)) = other.split_once('=') else {
                        return Err(CliError::UnknownArgument(other.to_string()));
                    };
                    match flag {
                        "--screens" => {
                            launch = LaunchOptions::from_query(&format!("screens={val}"))?.or(launch);
                        }
                        "--home-screen" => {
                            launch =
                                LaunchOptions::from_query(&format!("homeScreen={val}"))?.or(launch);
                        }
                        "--initial-screen" => {
                            launch = LaunchOptions::from_query(&format!("initialScreen={val}"))?
                                .or(launch);
                        }
                        "--speed" => {
                            launch = LaunchOptions::from_query(&format!("speed={val}"))?.or(launch);
                        }
                        "--query" => launch = LaunchOptions::from_query(val)?.or(launch),
                        "--frames" => opts.frames = parse_value("--frames", val)?,
                        "--frame-ms" => opts.frame_ms = parse_frame_ms("--frame-ms", val)?,
                        "--size" => opts.window = parse_size("--size", val)?,
                        "--switch-every" => opts.switch_every = parse_value("--switch-every", val)?,
                        "--config" => opts.config = Some(PathBuf::from(val)),
                        "--record" => opts.record = Some(PathBuf::from(val)),
                        "--replay" => opts.replay = Some(PathBuf::from(val)),
                        _ => return Err(CliError::UnknownArgument(other.to_string())),
                    }
                }
            }
        }

        opts.launch = launch.or(env_launch);
        Ok(Invocation::Run(opts))
    }
}

fn parse_value<T: std::str::FromStr>(flag: &'static str, val: &str) -> Result<T, CliError> {
    val.trim().parse().map_err(|_| CliError::InvalidValue {
        flag,
        value: val.to_string(),
    })
}

fn parse_frame_ms(flag: &'static str, val: &str) -> Result<f64, CliError> {
    let ms: f64 = parse_value(flag, val)?;
    if ms.is_finite() && ms >= 0.0 {
        Ok(ms)
    } else {
        Err(CliError::InvalidValue {
            flag,
            value: val.to_string(),
        })
    }
}

fn parse_size(flag: &'static str, val: &str) -> Result<Size, CliError> {
    let invalid = || CliError::InvalidValue {
        flag,
        value: val.to_string(),
    };
    let (w, h) = val.split_once(['x', 'X']).ok_or_else(invalid)?;
    let size = Size::new(
        w.trim().parse().map_err(|_| invalid())?,
        h.trim().parse().map_err(|_| invalid())?,
    );
    if size.is_positive() {
        Ok(size)
    } else {
        Err(invalid())
    }
}
