//! File system watching for fslog
//!
//! This crate provides OS-native change notification behind one contract:
//! - kqueue vnode filters on the BSD family (`KernelQueueWatcher`)
//! - FSEvents history/live streams on macOS (`HistoryStreamWatcher`)
//! - One dedicated dispatch task per watcher feeding an ordered stream
//! - Deterministic cancellation by closing the owned OS handle

pub mod config;
pub mod dispatch;
pub mod error;
pub mod platform;
pub mod state;
pub mod stream;

pub use config::{ConfigError, FsEventsConfig, KqueueConfig, WatchConfig};
pub use error::{Result, WatchError};
pub use state::WatcherState;
pub use stream::EventStream;

pub use fslog_core::{Batch, Event, EventFlags, EventId, SinceWhen};

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Kernel facility behind a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// kqueue `EVFILT_VNODE` filters on open descriptors
    KernelQueue,
    /// FSEvents path-based streams
    HistoryStream,
}

impl Backend {
    /// True if this build can open the backend
    pub fn is_available(&self) -> bool {
        match self {
            Self::KernelQueue => cfg!(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_os = "dragonfly"
            )),
            Self::HistoryStream => cfg!(target_os = "macos"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KernelQueue => f.write_str("kqueue"),
            Self::HistoryStream => f.write_str("fsevents"),
        }
    }
}

/// Something to watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// Opened and owned by the watcher; events carry this path
    Path(PathBuf),
    /// Caller-owned descriptor; the watcher only registers filters on it
    #[cfg(unix)]
    Descriptor(std::os::fd::RawFd),
}

impl WatchTarget {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            #[cfg(unix)]
            Self::Descriptor(fd) => write!(f, "fd {}", fd),
        }
    }
}

impl From<PathBuf> for WatchTarget {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&std::path::Path> for WatchTarget {
    fn from(path: &std::path::Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

/// Consumer-facing capability shared by every backend
pub trait Watcher: Send {
    /// Spin up the dispatch task; valid once, from `Opened`
    fn start(&mut self) -> Result<()>;

    /// Stop delivery and release kernel resources
    ///
    /// Idempotent. Once it returns, no further batches are sent and the
    /// stream is closed.
    fn close(&mut self) -> Result<()>;

    /// Stream of batches; clones race for batches
    fn events(&self) -> EventStream;

    fn state(&self) -> WatcherState;

    /// Error that terminated the dispatch task, if any
    fn take_error(&self) -> Option<WatchError>;

    fn backend(&self) -> Backend;

    /// Resume token for history-capable backends
    fn checkpoint(&self) -> Option<EventId> {
        None
    }
}
