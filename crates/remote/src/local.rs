//! In-process transport: the controller talks to a target in the same
//! process through a shared lock.

use std::sync::Arc;

use async_trait::async_trait;
use benchplan_core::{JobId, JobResult, SessionId, TestPlanId};
use benchplan_execution::{LauncherConfig, RerunKind};
use tokio::sync::Mutex;

use crate::channel::{Connector, RemoteSession};
use crate::error::{Result, TransportError};
use crate::protocol::{
    ControlSessionState, JobStatus, SessionProgress, StatePayload, TestPlanSummary,
};
use crate::service::RemoteSessionAssistant;

/// Connects to a [`RemoteSessionAssistant`] living in this process.
#[derive(Clone)]
pub struct LocalConnector {
    service: Arc<Mutex<RemoteSessionAssistant>>,
}

impl LocalConnector {
    /// Serve `service` to local controllers.
    pub fn new(service: RemoteSessionAssistant) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
        }
    }

    /// The served target.
    pub fn service(&self) -> Arc<Mutex<RemoteSessionAssistant>> {
        self.service.clone()
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(&self) -> std::result::Result<Arc<dyn RemoteSession>, TransportError> {
        Ok(Arc::new(LocalSession {
            service: self.service.clone(),
        }))
    }
}

struct LocalSession {
    service: Arc<Mutex<RemoteSessionAssistant>>,
}

#[async_trait]
impl RemoteSession for LocalSession {
    async fn get_remote_api_version(&self) -> Result<u32> {
        Ok(self.service.lock().await.get_remote_api_version())
    }

    async fn state(&self) -> Result<(ControlSessionState, StatePayload)> {
        self.service.lock().await.state()
    }

    async fn start_session(&self, config: LauncherConfig) -> Result<Vec<TestPlanSummary>> {
        self.service.lock().await.start_session(config)
    }

    async fn select_test_plan(&self, id: TestPlanId) -> Result<()> {
        self.service.lock().await.select_test_plan(&id)
    }

    async fn bootstrap(&self) -> Result<Vec<JobId>> {
        self.service.lock().await.bootstrap().await
    }

    async fn save_todo_list(&self, jobs: Vec<JobId>) -> Result<()> {
        self.service.lock().await.save_todo_list(jobs)
    }

    async fn run_job(&self, id: JobId) -> Result<()> {
        self.service.lock().await.run_job(&id)
    }

    async fn monitor_job(&self) -> Result<JobStatus> {
        self.service.lock().await.monitor_job().await
    }

    async fn finish_job(&self, result: Option<JobResult>) -> Result<()> {
        self.service.lock().await.finish_job(result).await
    }

    async fn get_session_progress(&self) -> Result<SessionProgress> {
        self.service.lock().await.get_session_progress()
    }

    async fn get_rerun_candidates(&self, kind: RerunKind) -> Result<Vec<JobId>> {
        self.service.lock().await.get_rerun_candidates(kind)
    }

    async fn prepare_rerun_candidates(&self, jobs: Vec<JobId>) -> Result<()> {
        self.service.lock().await.prepare_rerun_candidates(&jobs)
    }

    async fn get_resumable_sessions(&self) -> Result<Vec<SessionId>> {
        self.service.lock().await.get_resumable_sessions()
    }

    async fn resume_session(&self, id: SessionId) -> Result<()> {
        self.service.lock().await.resume_session(&id)
    }

    async fn finalize_session(&self) -> Result<()> {
        self.service.lock().await.finalize_session()
    }

    async fn terminate(&self) -> Result<()> {
        self.service.lock().await.terminate();
        Ok(())
    }
}
