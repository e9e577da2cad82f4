//! Platform-specific file watching implementations

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
pub mod kqueue;

#[cfg(target_os = "macos")]
pub mod fsevent;

use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::{Backend, Watcher};
use std::path::PathBuf;

/// Backend used when the caller does not pick one
///
/// FSEvents on macOS, kqueue on the other BSDs, `None` elsewhere.
pub fn recommended_backend() -> Option<Backend> {
    if Backend::HistoryStream.is_available() {
        Some(Backend::HistoryStream)
    } else if Backend::KernelQueue.is_available() {
        Some(Backend::KernelQueue)
    } else {
        None
    }
}

/// Open a watcher of the chosen backend over `paths`
///
/// The watcher is returned in the `Opened` state; call
/// [`Watcher::start`] to begin delivery.
pub fn open_watcher(
    backend: Backend,
    paths: &[PathBuf],
    config: &WatchConfig,
) -> Result<Box<dyn Watcher>> {
    config.validate()?;
    tracing::debug!("opening {} watcher over {} path(s)", backend, paths.len());

    match backend {
        Backend::KernelQueue => open_kernel_queue(paths, config),
        Backend::HistoryStream => open_history_stream(paths, config),
    }
}

/// Open the recommended backend
pub fn open_recommended(paths: &[PathBuf], config: &WatchConfig) -> Result<Box<dyn Watcher>> {
    let backend = recommended_backend().ok_or(WatchError::NoBackend)?;
    open_watcher(backend, paths, config)
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn open_kernel_queue(paths: &[PathBuf], config: &WatchConfig) -> Result<Box<dyn Watcher>> {
    let targets = paths.iter().cloned().map(crate::WatchTarget::Path);
    let watcher = kqueue::KernelQueueWatcher::with_config(targets, config.interest, &config.kqueue)?;
    Ok(Box::new(watcher))
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn open_kernel_queue(_paths: &[PathBuf], _config: &WatchConfig) -> Result<Box<dyn Watcher>> {
    Err(WatchError::Unsupported {
        backend: Backend::KernelQueue,
    })
}

#[cfg(target_os = "macos")]
fn open_history_stream(paths: &[PathBuf], config: &WatchConfig) -> Result<Box<dyn Watcher>> {
    let watcher = fsevent::HistoryStreamWatcher::with_config(paths, config.interest, &config.fsevents)?;
    Ok(Box::new(watcher))
}

#[cfg(not(target_os = "macos"))]
fn open_history_stream(_paths: &[PathBuf], _config: &WatchConfig) -> Result<Box<dyn Watcher>> {
    Err(WatchError::Unsupported {
        backend: Backend::HistoryStream,
    })
}
