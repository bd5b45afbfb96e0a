//! The call contract between controller and target.

use std::sync::Arc;

use async_trait::async_trait;
use benchplan_core::{JobId, JobResult, SessionId, TestPlanId};
use benchplan_execution::{LauncherConfig, RerunKind};

use crate::error::{Result, TransportError};
use crate::protocol::{
    ControlSessionState, JobStatus, SessionProgress, StatePayload, TestPlanSummary,
};

/// A connected target session. Every call is one request/response exchange.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Protocol version of the target. Must be the first call.
    async fn get_remote_api_version(&self) -> Result<u32>;

    /// Current phase and its payload.
    async fn state(&self) -> Result<(ControlSessionState, StatePayload)>;

    /// Start a session; returns the offered test plans.
    async fn start_session(&self, config: LauncherConfig) -> Result<Vec<TestPlanSummary>>;

    /// Pick the test plan.
    async fn select_test_plan(&self, id: TestPlanId) -> Result<()>;

    /// Run all bootstrap jobs; returns the job list to confirm.
    async fn bootstrap(&self) -> Result<Vec<JobId>>;

    /// Confirm the jobs to run.
    async fn save_todo_list(&self, jobs: Vec<JobId>) -> Result<()>;

    /// Start a job in the background.
    async fn run_job(&self, id: JobId) -> Result<()>;

    /// Poll the job in flight.
    async fn monitor_job(&self) -> Result<JobStatus>;

    /// Record the job in flight; `None` keeps the result the job produced.
    async fn finish_job(&self, result: Option<JobResult>) -> Result<()>;

    /// Progress report.
    async fn get_session_progress(&self) -> Result<SessionProgress>;

    /// Jobs worth running again.
    async fn get_rerun_candidates(&self, kind: RerunKind) -> Result<Vec<JobId>>;

    /// Queue jobs to run again.
    async fn prepare_rerun_candidates(&self, jobs: Vec<JobId>) -> Result<()>;

    /// Sessions that can be resumed.
    async fn get_resumable_sessions(&self) -> Result<Vec<SessionId>>;

    /// Resume a stored session.
    async fn resume_session(&self, id: SessionId) -> Result<()>;

    /// Mark the session complete and go idle.
    async fn finalize_session(&self) -> Result<()>;

    /// Abandon the session without finalizing it and go idle.
    async fn terminate(&self) -> Result<()>;
}

/// Opens connections to a target.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect once; no retries.
    async fn connect(&self) -> std::result::Result<Arc<dyn RemoteSession>, TransportError>;
}
