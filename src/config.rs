//! Configuration management for autorun
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `AUTORUN_*` environment variables, then whatever was passed on the command line.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::debouncer::DEFAULT_QUIET_DURATION;
use crate::dispatcher::DEFAULT_MARKER;
use crate::error::{AutorunError, Result};
use crate::filter::FilterConfig;

/// Longest quiet period accepted from configuration: one day.
pub const MAX_QUIET_SECS: f64 = 86_400.0;

/// Runtime settings for the watch pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutorunConfig {
    /// Seconds to wait after a change is noticed before running the command
    pub quiet_secs: f64,
    /// Character replaced by the changed path in the command
    pub marker: char,
    /// Glob patterns a path must match (any of) to trigger the command
    pub include: Vec<String>,
    /// Glob patterns that stop a path from triggering the command
    pub exclude: Vec<String>,
    /// Watch subdirectories too
    pub recursive: bool,
}

impl Default for AutorunConfig {
    fn default() -> Self {
        Self {
            quiet_secs: DEFAULT_QUIET_DURATION.as_secs_f64(),
            marker: DEFAULT_MARKER,
            include: Vec::new(),
            exclude: Vec::new(),
            recursive: true,
        }
    }
}

impl AutorunConfig {
    /// Load a TOML file on top of the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|err| AutorunError::Config(format!("{}: {}", path.display(), err)))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| AutorunError::Config(err.to_string()))
    }

    /// Override fields from `AUTORUN_QUIET` and `AUTORUN_MARKER` when present and parseable.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("AUTORUN_QUIET") {
            match val.parse::<f64>() {
                Ok(secs) => self.quiet_secs = secs,
                Err(_) => tracing::warn!(value = %val, "ignoring unparseable AUTORUN_QUIET"),
            }
        }

        if let Ok(val) = std::env::var("AUTORUN_MARKER") {
            let mut chars = val.chars();
            match (chars.next(), chars.next()) {
                (Some(marker), None) => self.marker = marker,
                _ => tracing::warn!(value = %val, "AUTORUN_MARKER must be a single character"),
            }
        }
    }

    /// Out-of-range values fall back to the default; `validate` rejects them up front.
    pub fn quiet_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.quiet_secs.min(MAX_QUIET_SECS))
            .unwrap_or(DEFAULT_QUIET_DURATION)
    }

    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig::new(self.include.clone(), self.exclude.clone())
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = self.quiet_secs > 0.0 && self.quiet_secs <= MAX_QUIET_SECS;
        if !in_range || Duration::try_from_secs_f64(self.quiet_secs).is_err() {
            return Err(AutorunError::InvalidQuietDuration(self.quiet_secs));
        }

        if self.marker.is_whitespace() || self.marker.is_control() {
            return Err(AutorunError::InvalidMarker(self.marker));
        }

        self.filter_config().validate()
    }
}
