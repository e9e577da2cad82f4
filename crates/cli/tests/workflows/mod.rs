//! Workflow integration tests
//!
//! Argument handling runs everywhere; live watching only where the backend
//! exists.

pub mod arguments;
pub mod watching;
