//! Watcher lifecycle
//!
//! `Created -> Opened -> Running -> Closed`, with `Opened -> Closed` allowed
//! for watchers that never started. `Closed` is terminal.

use crate::error::{Result, WatchError};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherState {
    Created,
    Opened,
    Running,
    Closed,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Opened => "opened",
            Self::Running => "running",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared, lock-protected lifecycle state
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<WatcherState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WatcherState::Created),
        }
    }

    pub fn get(&self) -> WatcherState {
        *self.state.lock()
    }

    /// Fail with `InvalidState` unless the current state is in `allowed`
    pub fn ensure(&self, operation: &'static str, allowed: &[WatcherState]) -> Result<WatcherState> {
        let state = *self.state.lock();
        if allowed.contains(&state) {
            Ok(state)
        } else {
            Err(WatchError::InvalidState { operation, state })
        }
    }

    /// Move from one of `from` to `to`, atomically
    pub fn transition(
        &self,
        operation: &'static str,
        from: &[WatcherState],
        to: WatcherState,
    ) -> Result<WatcherState> {
        let mut state = self.state.lock();
        if !from.contains(&*state) {
            return Err(WatchError::InvalidState {
                operation,
                state: *state,
            });
        }
        let previous = *state;
        *state = to;
        Ok(previous)
    }

    /// Enter `Closed`, returning the previous state
    ///
    /// Never fails: closing an already closed watcher is a no-op.
    pub fn close(&self) -> WatcherState {
        std::mem::replace(&mut *self.state.lock(), WatcherState::Closed)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
