//! Watcher error taxonomy

use crate::config::ConfigError;
use crate::state::WatcherState;
use crate::Backend;
use std::io;
use thiserror::Error;

/// Errors raised by watcher operations and by the dispatch task
#[derive(Debug, Error)]
pub enum WatchError {
    /// The kernel could not allocate a queue or stream
    #[error("kernel could not allocate {resource}: {source}")]
    ResourceExhausted {
        resource: &'static str,
        #[source]
        source: io::Error,
    },

    /// A watch target was closed, missing or otherwise unusable
    #[error("invalid watch target {target}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Operation invoked outside its lifecycle state
    #[error("`{operation}` is not valid while the watcher is {state}")]
    InvalidState {
        operation: &'static str,
        state: WatcherState,
    },

    /// Any other OS call failure
    #[error("{call} failed: {source}")]
    Syscall {
        call: &'static str,
        #[source]
        source: io::Error,
    },

    /// Backend not available on this platform
    #[error("{backend} backend is not available on this platform")]
    Unsupported { backend: Backend },

    /// Neither backend exists on this platform
    #[error("no file watching backend is available on this platform")]
    NoBackend,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WatchError {
    pub(crate) fn syscall(call: &'static str, source: io::Error) -> Self {
        Self::Syscall { call, source }
    }

    /// Classify a failed allocation: descriptor or memory limits become
    /// `ResourceExhausted`, anything else stays a plain syscall error
    #[cfg(unix)]
    pub(crate) fn allocation(call: &'static str, resource: &'static str, source: io::Error) -> Self {
        match source.raw_os_error() {
            Some(libc::EMFILE) | Some(libc::ENFILE) | Some(libc::ENOMEM) => {
                Self::ResourceExhausted { resource, source }
            }
            _ => Self::Syscall { call, source },
        }
    }

    /// Wrap a registration failure, attributing `EBADF`/`ENOENT` to the target
    #[cfg(unix)]
    pub(crate) fn registration(call: &'static str, target: String, source: io::Error) -> Self {
        match source.raw_os_error() {
            Some(libc::EBADF) | Some(libc::ENOENT) => Self::InvalidTarget { target, source },
            _ => Self::Syscall { call, source },
        }
    }

    /// True for errors the caller may retry after backing off
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
