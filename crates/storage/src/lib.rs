//! Checkpoint storage for benchplan sessions.
//!
//! This crate provides a trait-based checkpoint interface with a
//! directory-per-session implementation that survives crashes mid-save.

#![warn(missing_docs)]

pub mod trait_;
pub mod session_storage;
pub mod repository;

pub use trait_::{CheckpointStore, StorageError, Result};
pub use session_storage::SessionStorage;
pub use repository::{SessionRepository, StorageConfig};
