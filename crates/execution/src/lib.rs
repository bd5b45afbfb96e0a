//! Execution layer - job readiness, dependency solving, session state and
//! the session assistant that drives it all.

#![warn(missing_docs)]

pub mod assistant;
pub mod config;
pub mod engine;
mod error;
pub mod inhibitor;
pub mod job_state;
pub mod manager;
pub mod metadata;
pub mod runner;
pub mod snapshot;
pub mod solver;
pub mod state;

pub use assistant::{JobRun, PreparedJob, RerunKind, SessionAssistant, FLAG_NORETURN};
pub use config::LauncherConfig;
pub use engine::{CycleResult, EngineConfig, ExecutionEngine, Unattended, Verifier};
pub use error::{Result, SessionError};
pub use inhibitor::{InhibitorCause, InhibitorError, JobReadinessInhibitor};
pub use job_state::{JobState, DEFAULT_ATTEMPTS};
pub use manager::SessionManager;
pub use metadata::SessionMetadata;
pub use runner::{JobRunner, ShellRunner};
pub use snapshot::{SessionSnapshot, SNAPSHOT_VERSION};
pub use solver::{DepGraph, Dependency, DependencyError, DependencyKind};
pub use state::{DefinitionProblem, Progress, SessionState};
