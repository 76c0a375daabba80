//! Domain model for tracelens
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via the newtype pattern (a `Pid` is never an arena index)
//! - Self-documenting function signatures
//! - Structured error handling per pipeline stage

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{AsyncEventId, EventId, NodeId, Pid, ThreadId, Tid};

pub use errors::{ModelError, ProfileError, QueryError, TraceError};
