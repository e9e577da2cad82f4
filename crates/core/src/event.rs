//! Decoded file-system events

use crate::flags::EventFlags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque stream position assigned by the OS
///
/// Only meaningful to the backend that produced it. Callers may persist it
/// and hand it back to request history replay, but must not decode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a history stream starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SinceWhen {
    /// Only events that happen after the stream starts
    #[default]
    Now,
    /// Replay retained history after this checkpoint, then go live
    Event(EventId),
}

impl SinceWhen {
    /// `None` means now
    pub fn from_checkpoint(checkpoint: Option<u64>) -> Self {
        match checkpoint {
            Some(raw) => Self::Event(EventId::from_raw(raw)),
            None => Self::Now,
        }
    }
}

/// One decoded kernel record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stream position; history streams only
    pub id: Option<EventId>,
    /// Affected path, when the backend knows it
    pub path: Option<PathBuf>,
    /// Kernel identifier of the watched descriptor; descriptor backends only
    pub ident: Option<u64>,
    pub flags: EventFlags,
}

impl Event {
    pub fn new(flags: EventFlags) -> Self {
        Self {
            id: None,
            path: None,
            ident: None,
            flags,
        }
    }

    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_ident(mut self, ident: u64) -> Self {
        self.ident = Some(ident);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True if the consumer should treat its view of this subtree as stale
    pub fn needs_rescan(&self) -> bool {
        self.flags.is_data_loss()
    }
}

/// Events delivered together from one kernel wake-up
pub type Batch = Vec<Event>;
