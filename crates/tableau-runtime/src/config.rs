#![forbid(unsafe_code)]

//! Runtime configuration and launch options.
//!
//! [`RuntimeConfig`] holds the fixed layout and clock parameters for a
//! [`Sim`](crate::sim::Sim). [`LaunchOptions`] holds the per-launch screen
//! selection criteria, parsed from a query string or the environment.
//!
//! # Launch keys
//!
//! | Query key | Environment variable | Meaning |
//! |-----------|----------------------|---------|
//! | `screens=2,3` | `TABLEAU_SCREENS` | 1-based subset of declared screens |
//! | `homeScreen=false` | `TABLEAU_HOME_SCREEN` | enable/disable the home screen |
//! | `initialScreen=2` | `TABLEAU_INITIAL_SCREEN` | 0 = home, otherwise a declared screen number |
//! | `speed=2` | `TABLEAU_SPEED` | global time multiplier |
//! | `playbackMode` | `TABLEAU_PLAYBACK` | drive the clock from external ticks only |
//!
//! A key that is absent stays `None`; `Some` marks the value as explicitly
//! provided, which the screen selection rules depend on.

use std::env;

use serde::{Deserialize, Serialize};
use tableau_core::geometry::Size;

use crate::error::{ConfigError, LaunchError};

/// Default layout size screens are designed against.
pub const DEFAULT_REFERENCE_SIZE: Size = Size::new(1024.0, 618.0);

/// Navigation bar height at scale 1.0.
pub const DEFAULT_NAV_BAR_HEIGHT: f64 = 40.0;

/// Elapsed time assumed for the first frame, in seconds.
pub const DEFAULT_FALLBACK_DT: f64 = 1.0 / 60.0;

/// When screen models and views are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstantiationPolicy {
    /// Every selected screen is instantiated at startup.
    #[default]
    Eager,
    /// Only the initial screen is instantiated at startup; the rest on first
    /// activation.
    OnFirstActivation,
}

/// Fixed parameters of a running simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Layout size screens are authored against.
    pub reference_size: Size,
    /// Navigation bar height at scale 1.0.
    pub nav_bar_height: f64,
    /// `dt` used for the very first frame.
    pub fallback_dt: f64,
    /// Multiplier applied to every `dt`.
    pub speed: f64,
    /// When screen models/views are created.
    pub instantiation: InstantiationPolicy,
    /// Ignore host frames; advance only on externally supplied steps.
    pub playback: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reference_size: DEFAULT_REFERENCE_SIZE,
            nav_bar_height: DEFAULT_NAV_BAR_HEIGHT,
            fallback_dt: DEFAULT_FALLBACK_DT,
            speed: 1.0,
            instantiation: InstantiationPolicy::Eager,
            playback: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a JSON config. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_reference_size(mut self, size: Size) -> Self {
        self.reference_size = size;
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn with_instantiation(mut self, policy: InstantiationPolicy) -> Self {
        self.instantiation = policy;
        self
    }

    #[must_use]
    pub fn with_playback(mut self, playback: bool) -> Self {
        self.playback = playback;
        self
    }

    /// Apply the explicitly provided fields of `launch`.
    #[must_use]
    pub fn with_launch(mut self, launch: &LaunchOptions) -> Self {
        if let Some(speed) = launch.speed {
            self.speed = speed;
        }
        if let Some(playback) = launch.playback {
            self.playback = playback;
        }
        self
    }

    /// Reject values the scheduler and layout cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("reference_size.width", self.reference_size.width),
            ("reference_size.height", self.reference_size.height),
            ("nav_bar_height", self.nav_bar_height),
            ("fallback_dt", self.fallback_dt),
            ("speed", self.speed),
        ];
        for (field, value) in checks {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        Ok(())
    }
}

/// Per-launch screen selection criteria.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchOptions {
    /// 1-based subset of declared screens.
    pub screens: Option<Vec<usize>>,
    /// Whether the home screen should be shown.
    pub home_screen: Option<bool>,
    /// 0 = home screen, otherwise a 1-based declared screen number.
    pub initial_screen: Option<usize>,
    /// Global speed multiplier.
    pub speed: Option<f64>,
    /// Playback mode.
    pub playback: Option<bool>,
}

impl LaunchOptions {
    /// Parse `?key=value&key=value` (leading `?` optional).
    ///
    /// Unknown keys are ignored. A bare `playbackMode` key means `true`.
    pub fn from_query(query: &str) -> Result<Self, LaunchError> {
        let mut opts = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (pair, None),
            };
            match key {
                "screens" => {
                    opts.screens = Some(parse_screen_list("screens", value.unwrap_or(""))?);
                }
                "homeScreen" => {
                    opts.home_screen = Some(parse_bool("homeScreen", value.unwrap_or("true"))?);
                }
                "initialScreen" => {
                    opts.initial_screen = Some(parse_number("initialScreen", value.unwrap_or(""))?);
                }
                "speed" => {
                    opts.speed = Some(parse_speed("speed", value.unwrap_or(""))?);
                }
                "playbackMode" => {
                    opts.playback = Some(parse_bool("playbackMode", value.unwrap_or("true"))?);
                }
                other => {
                    tracing::debug!(key = other, "ignoring unknown launch option");
                }
            }
        }
        Ok(opts)
    }

    /// Read `TABLEAU_*` environment variables.
    pub fn from_env() -> Result<Self, LaunchError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LaunchError> {
        let mut opts = Self::default();
        if let Some(val) = lookup("TABLEAU_SCREENS") {
            opts.screens = Some(parse_screen_list("TABLEAU_SCREENS", &val)?);
        }
        if let Some(val) = lookup("TABLEAU_HOME_SCREEN") {
            opts.home_screen = Some(parse_bool("TABLEAU_HOME_SCREEN", &val)?);
        }
        if let Some(val) = lookup("TABLEAU_INITIAL_SCREEN") {
            opts.initial_screen = Some(parse_number("TABLEAU_INITIAL_SCREEN", &val)?);
        }
        if let Some(val) = lookup("TABLEAU_SPEED") {
            opts.speed = Some(parse_speed("TABLEAU_SPEED", &val)?);
        }
        if let Some(val) = lookup("TABLEAU_PLAYBACK") {
            opts.playback = Some(parse_bool("TABLEAU_PLAYBACK", &val)?);
        }
        Ok(opts)
    }

    /// Fill every field not set here from `fallback`.
    #[must_use]
    pub fn or(self, fallback: LaunchOptions) -> Self {
        Self {
            screens: self.screens.or(fallback.screens),
            home_screen: self.home_screen.or(fallback.home_screen),
            initial_screen: self.initial_screen.or(fallback.initial_screen),
            speed: self.speed.or(fallback.speed),
            playback: self.playback.or(fallback.playback),
        }
    }
}

fn invalid(key: &'static str, value: &str) -> LaunchError {
    LaunchError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, LaunchError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<usize, LaunchError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_speed(key: &'static str, value: &str) -> Result<f64, LaunchError> {
    match value.trim().parse::<f64>() {
        Ok(speed) if speed.is_finite() && speed > 0.0 => Ok(speed),
        _ => Err(invalid(key, value)),
    }
}

fn parse_screen_list(key: &'static str, value: &str) -> Result<Vec<usize>, LaunchError> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|part| parse_number(key, part).map_err(|_| invalid(key, value)))
        .collect()
}
