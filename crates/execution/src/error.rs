//! Error types for session execution.

use benchplan_core::{JobId, TestPlanId};
use benchplan_selection::SelectionError;
use benchplan_storage::StorageError;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised while driving a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Checkpoint storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Checkpoint could not be encoded or decoded
    #[error("malformed checkpoint: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Checkpoint written by an incompatible version
    #[error("unsupported checkpoint version {found}, expected {expected}")]
    IncompatibleSnapshot {
        /// Version in the checkpoint
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// Job not in the catalog
    #[error("unknown job: {0}")]
    UnknownJob(JobId),

    /// Test plan not in the catalog
    #[error("unknown test plan: {0}")]
    UnknownTestPlan(TestPlanId),

    /// Test plan patterns do not compile
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Operation needs a started session
    #[error("no session in progress")]
    NoSession,

    /// Operation needs a selected test plan
    #[error("no test plan selected")]
    NoTestPlan,

    /// `finish_job` without a preceding `run_job`
    #[error("no job is running")]
    NoRunningJob,

    /// Launcher configuration is unusable
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error outside checkpoint storage
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
