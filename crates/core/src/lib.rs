//! Core data model for fslog
//!
//! This crate provides:
//! - The backend-neutral [`EventFlags`] vocabulary
//! - [`Event`] and the opaque [`EventId`] checkpoint token
//! - Pure decoders from kqueue and FSEvents flag bits

pub mod decode;
pub mod event;
pub mod flags;

// Re-exports
pub use event::{Batch, Event, EventId, SinceWhen};
pub use flags::{EventFlags, UnknownFlag};
