//! Building blocks of the `fslog` binary
//!
//! Everything here is independent of a live watcher so it can be tested on
//! any platform: flag descriptions, event rendering, target expansion,
//! option parsing and the interrupt-driven drain loop.

pub mod describe;
pub mod logging;
pub mod options;
pub mod output;
pub mod paths;
pub mod session;
