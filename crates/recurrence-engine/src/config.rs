//! Engine-wide safety caps and behavior switches.
//!
//! All limits live in one immutable [`EngineConfig`] value that is handed to
//! the extractor, sequencer and synchronizer. Nothing reads process globals,
//! so a deployment (or a test) can tighten or relax caps without touching
//! the engine.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hard ceiling on sequencer iterations. Not configurable.
pub const MAX_ITERATIONS: u32 = 100;

pub const DEFAULT_MAX_REPEAT_COUNT: u32 = 100;
pub const DEFAULT_MAX_REPEAT_INTERVAL: u32 = 365;
pub const DEFAULT_MAX_YEARS_IN_FUTURE: u32 = 5;
pub const DEFAULT_BATCH_THRESHOLD: usize = 50;
pub const DEFAULT_FLUSH_EVERY: usize = 10;
pub const DEFAULT_TITLE_MAX_LEN: usize = 255;

/// Limits and switches for one engine deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for `repeat_count`.
    pub max_repeat_count: u32,
    /// Upper bound for the cadence multiplier.
    pub max_repeat_interval: u32,
    /// How far ahead of "now" a recurring series may start.
    pub max_years_in_future: u32,
    /// Expansions larger than this are handed to the batch queue.
    pub batch_threshold: usize,
    /// Invoke the resource hook after this many materializations.
    pub flush_every: usize,
    /// Maximum length (in characters) of a generated occurrence title.
    pub title_max_len: usize,
    /// Reject out-of-range values and enforce field/delete checks.
    ///
    /// When `false`, the legacy behavior applies: out-of-range values are
    /// clamped, the future-date guard is skipped, and cleanup/projection do
    /// not consult per-record access checks.
    pub strict: bool,
    /// Wall-clock timezone used for cadence arithmetic and title dates.
    pub timezone: Tz,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_repeat_count: DEFAULT_MAX_REPEAT_COUNT,
            max_repeat_interval: DEFAULT_MAX_REPEAT_INTERVAL,
            max_years_in_future: DEFAULT_MAX_YEARS_IN_FUTURE,
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            flush_every: DEFAULT_FLUSH_EVERY,
            title_max_len: DEFAULT_TITLE_MAX_LEN,
            strict: true,
            timezone: chrono_tz::UTC,
        }
    }
}

impl EngineConfig {
    /// Legacy configuration: clamp instead of reject, no per-record checks.
    pub fn permissive() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    /// Replace the timezone by IANA name.
    pub fn with_timezone(mut self, name: &str) -> Result<Self, ConfigError> {
        self.timezone = name
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))?;
        Ok(self)
    }

    /// Check that every cap is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_repeat_count == 0 {
            return Err(ConfigError::ZeroLimit("max_repeat_count"));
        }
        if self.max_repeat_interval == 0 {
            return Err(ConfigError::ZeroLimit("max_repeat_interval"));
        }
        if self.flush_every == 0 {
            return Err(ConfigError::ZeroLimit("flush_every"));
        }
        if self.title_max_len == 0 {
            return Err(ConfigError::ZeroLimit("title_max_len"));
        }
        Ok(())
    }
}
