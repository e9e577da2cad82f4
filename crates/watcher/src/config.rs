//! Watcher configuration
//!
//! Loaded from TOML by callers that want a file; every field has a default so
//! an empty document is valid. Values reach watchers only through their
//! constructors.

use fslog_core::{EventFlags, SinceWhen};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Event kinds to report; stream-level flags are always reported
    pub interest: EventFlags,
    pub kqueue: KqueueConfig,
    pub fsevents: FsEventsConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interest: EventFlags::DEFAULT_INTEREST,
            kqueue: KqueueConfig::default(),
            fsevents: FsEventsConfig::default(),
        }
    }
}

/// kqueue backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KqueueConfig {
    /// Records read per wake-up
    pub max_events: usize,
    /// Bounded wait per poll; absent blocks until an event or close
    pub poll_timeout_ms: Option<u64>,
    /// Diff directory listings to report created/removed children
    pub track_directory_entries: bool,
}

impl Default for KqueueConfig {
    fn default() -> Self {
        Self {
            max_events: 64,
            poll_timeout_ms: None,
            track_directory_entries: true,
        }
    }
}

impl KqueueConfig {
    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_ms.map(Duration::from_millis)
    }
}

/// FSEvents backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsEventsConfig {
    /// Coalescing window before the OS delivers a batch
    pub latency_ms: u64,
    /// Replay from this event id; absent starts from now
    pub since: Option<u64>,
    /// Per-file instead of per-directory granularity
    pub file_events: bool,
    /// Deliver the first event of a quiet period immediately
    pub no_defer: bool,
    /// Report changes to the path leading up to each root
    pub watch_root: bool,
    /// Suppress events caused by this process
    pub ignore_self: bool,
}

impl Default for FsEventsConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1000,
            since: None,
            file_events: true,
            no_defer: false,
            watch_root: false,
            ignore_self: false,
        }
    }
}

impl FsEventsConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn since_when(&self) -> SinceWhen {
        SinceWhen::from_checkpoint(self.since)
    }
}

impl WatchConfig {
    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=4096).contains(&self.kqueue.max_events) {
            return Err(ConfigError::Invalid(format!(
                "kqueue.max_events must be 1-4096, got {}",
                self.kqueue.max_events
            )));
        }
        if self.kqueue.poll_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "kqueue.poll_timeout_ms must be at least 1; omit it to block".to_string(),
            ));
        }
        if self.fsevents.latency_ms > 60_000 {
            return Err(ConfigError::Invalid(format!(
                "fsevents.latency_ms must be 0-60000, got {}",
                self.fsevents.latency_ms
            )));
        }
        if self.interest.is_empty() {
            return Err(ConfigError::Invalid(
                "interest must name at least one event kind".to_string(),
            ));
        }
        Ok(())
    }
}
