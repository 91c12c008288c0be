//! Pacing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for request pacing.
///
/// Unset fields take the run profile's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Minimum delay after each task (milliseconds).
    #[serde(default)]
    pub min_delay_ms: Option<u64>,

    /// Maximum delay after each task (milliseconds).
    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    /// Pause for `batch_pause_secs` after this many tasks of one worker (0 = never).
    #[serde(default)]
    pub batch_size: Option<u32>,

    #[serde(default)]
    pub batch_pause_secs: Option<u64>,

    /// Cap on requests per minute across all workers (0 = no cap).
    #[serde(default)]
    pub requests_per_minute: u32,

    /// Timeout for one extraction call (seconds).
    #[serde(default)]
    pub extract_timeout_secs: Option<u64>,
}

/// Resolved pacing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingSettings {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub batch_size: u32,
    pub batch_pause: Duration,
    pub requests_per_minute: u32,
    pub extract_timeout: Duration,
}

impl PacingConfig {
    /// Fill unset fields from `defaults`.
    pub fn resolve(&self, defaults: &PacingSettings) -> PacingSettings {
        PacingSettings {
            min_delay: self
                .min_delay_ms
                .map_or(defaults.min_delay, Duration::from_millis),
            max_delay: self
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            batch_pause: self
                .batch_pause_secs
                .map_or(defaults.batch_pause, Duration::from_secs),
            requests_per_minute: self.requests_per_minute,
            extract_timeout: self
                .extract_timeout_secs
                .map_or(defaults.extract_timeout, Duration::from_secs),
        }
    }
}
