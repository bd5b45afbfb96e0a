//! Checkpoint storage trait abstraction.

use std::path::PathBuf;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A `session.next` file from an interrupted save is still present
    #[error("storage is locked, {} exists (interrupted save?)", .0.display())]
    Locked(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes written than requested
    #[error("short write: {written} of {expected} bytes")]
    PartialWrite {
        /// Bytes actually written
        written: usize,
        /// Bytes requested
        expected: usize,
    },

    /// Fewer bytes read than the file holds
    #[error("short read: {read} of {expected} bytes")]
    PartialRead {
        /// Bytes actually read
        read: usize,
        /// File size
        expected: usize,
    },

    /// Session not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Durable store for one session checkpoint.
///
/// Implementations guarantee that a reader observes either the previous or
/// the new checkpoint, never a mix.
pub trait CheckpointStore: Send + Sync {
    /// Load the current checkpoint; empty when nothing was saved yet.
    fn load_checkpoint(&self) -> Result<Vec<u8>>;

    /// Atomically replace the checkpoint.
    fn save_checkpoint(&self, data: &[u8]) -> Result<()>;

    /// Remove a stale lock left by an interrupted save.
    fn break_lock(&self) -> Result<()>;
}
