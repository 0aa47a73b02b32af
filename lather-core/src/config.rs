//! Runtime and application configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields the stock 20 second countdown.
//!
//! ```json
//! {
//!   "scheduler": { "max_flush_passes": 100 },
//!   "timer": { "total_seconds": 20, "interval_ms": 1000 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub timer: TimerConfig,
}

impl Config {
    /// Parse configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Scheduler limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on update passes within a single flush. Components that
    /// keep dirtying each other past this bound abort the flush.
    pub max_flush_passes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: 100,
        }
    }
}

/// Countdown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Length of the countdown in seconds.
    pub total_seconds: u32,
    /// Period of the countdown tick in milliseconds.
    pub interval_ms: u64,
}

impl TimerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            total_seconds: 20,
            interval_ms: 1000,
        }
    }
}
