use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use benchplan_core::{
    Catalog, Interaction, JobDefinition, JobId, JobPlugin, JobResult, Outcome, SessionId,
    TestPlan, TestPlanId,
};
use benchplan_execution::{JobRunner, LauncherConfig, RerunKind, SessionAssistant};
use benchplan_remote::{
    Connector, ControlSessionState, ControllerConfig, ControllerExit, JobStatus, LocalConnector,
    Operator, RemoteController, RemoteError, RemoteSession, RemoteSessionAssistant, Result,
    SessionProgress, StatePayload, TestPlanSummary, TransportError, REMOTE_API_VERSION,
};
use benchplan_storage::{SessionRepository, StorageConfig};
use tempfile::TempDir;

struct FakeRunner;

#[async_trait]
impl JobRunner for FakeRunner {
    async fn run(&self, job: &JobDefinition) -> JobResult {
        let mut result = JobResult::with_outcome(if job.id.as_str() == "ns::flaky" {
            Outcome::Fail
        } else {
            Outcome::Pass
        });
        if job.is_resource() {
            result.stdout = "arch: x86_64\n".into();
        }
        result
    }
}

struct FirstPlan;

impl Operator for FirstPlan {
    fn choose_test_plan(&self, plans: &[TestPlanSummary]) -> Option<TestPlanId> {
        plans.first().map(|plan| plan.id.clone())
    }

    fn interact(&self, _id: &JobId, _i: &[Interaction], _r: &JobResult) -> JobResult {
        JobResult::with_outcome(Outcome::Pass)
    }
}

fn target(dir: &TempDir) -> LocalConnector {
    let mut plan = TestPlan::new("ns::plan", "Plan")
        .with_include(".*")
        .with_bootstrap_include("platform");
    plan.namespace = Some("ns".into());
    let mut flaky = JobDefinition::new("ns::flaky", Some("false"));
    flaky.auto_retry = true;
    let catalog = Catalog::new(
        vec![
            JobDefinition::new("ns::platform", Some("uname -m")).with_plugin(JobPlugin::Resource),
            JobDefinition::new("ns::x86", Some("true")).with_requires("platform.arch == 'x86_64'"),
            JobDefinition::new("ns::look", None).with_plugin(JobPlugin::Manual),
            flaky,
        ],
        vec![plan],
    );
    let repo = SessionRepository::new(&StorageConfig {
        base_dir: dir.path().to_path_buf(),
    });
    let assistant =
        SessionAssistant::new(Arc::new(catalog), repo).with_runner(Arc::new(FakeRunner));
    LocalConnector::new(RemoteSessionAssistant::new(assistant))
}

fn fast() -> ControllerConfig {
    ControllerConfig {
        connect_timeout: Duration::from_millis(200),
        retry_interval: Duration::from_millis(5),
        reconnect_initial: Duration::from_millis(5),
        reconnect_max: Duration::from_millis(20),
        poll_interval: Duration::from_millis(5),
    }
}

/// A session speaking another protocol version.
struct OldTarget;

#[async_trait]
impl RemoteSession for OldTarget {
    async fn get_remote_api_version(&self) -> Result<u32> {
        Ok(REMOTE_API_VERSION - 1)
    }
    async fn state(&self) -> Result<(ControlSessionState, StatePayload)> {
        Ok((ControlSessionState::Idle, StatePayload::None))
    }
    async fn start_session(&self, _config: LauncherConfig) -> Result<Vec<TestPlanSummary>> {
        Ok(Vec::new())
    }
    async fn select_test_plan(&self, _id: TestPlanId) -> Result<()> {
        Ok(())
    }
    async fn bootstrap(&self) -> Result<Vec<JobId>> {
        Ok(Vec::new())
    }
    async fn save_todo_list(&self, _jobs: Vec<JobId>) -> Result<()> {
        Ok(())
    }
    async fn run_job(&self, _id: JobId) -> Result<()> {
        Ok(())
    }
    async fn monitor_job(&self) -> Result<JobStatus> {
        Ok(JobStatus::Running)
    }
    async fn finish_job(&self, _result: Option<JobResult>) -> Result<()> {
        Ok(())
    }
    async fn get_session_progress(&self) -> Result<SessionProgress> {
        Ok(SessionProgress::default())
    }
    async fn get_rerun_candidates(&self, _kind: RerunKind) -> Result<Vec<JobId>> {
        Ok(Vec::new())
    }
    async fn prepare_rerun_candidates(&self, _jobs: Vec<JobId>) -> Result<()> {
        Ok(())
    }
    async fn get_resumable_sessions(&self) -> Result<Vec<SessionId>> {
        Ok(Vec::new())
    }
    async fn resume_session(&self, _id: SessionId) -> Result<()> {
        Ok(())
    }
    async fn finalize_session(&self) -> Result<()> {
        Ok(())
    }
    async fn terminate(&self) -> Result<()> {
        Ok(())
    }
}

struct OldConnector {
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for OldConnector {
    async fn connect(&self) -> std::result::Result<Arc<dyn RemoteSession>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(OldTarget))
    }
}

/// Refuses the first connection, then hands out sessions whose `state` call
/// fails once with EOF.
struct FlakyConnector {
    inner: LocalConnector,
    attempts: Arc<AtomicUsize>,
    state_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for FlakyConnector {
    async fn connect(&self) -> std::result::Result<Arc<dyn RemoteSession>, TransportError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(TransportError::ConnectionRefused);
        }
        Ok(Arc::new(FlakySession {
            inner: self.inner.connect().await?,
            state_calls: self.state_calls.clone(),
        }))
    }
}

struct FlakySession {
    inner: Arc<dyn RemoteSession>,
    state_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteSession for FlakySession {
    async fn get_remote_api_version(&self) -> Result<u32> {
        self.inner.get_remote_api_version().await
    }
    async fn state(&self) -> Result<(ControlSessionState, StatePayload)> {
        if self.state_calls.fetch_add(1, Ordering::SeqCst) == 3 {
            return Err(TransportError::Eof.into());
        }
        self.inner.state().await
    }
    async fn start_session(&self, config: LauncherConfig) -> Result<Vec<TestPlanSummary>> {
        self.inner.start_session(config).await
    }
    async fn select_test_plan(&self, id: TestPlanId) -> Result<()> {
        self.inner.select_test_plan(id).await
    }
    async fn bootstrap(&self) -> Result<Vec<JobId>> {
        self.inner.bootstrap().await
    }
    async fn save_todo_list(&self, jobs: Vec<JobId>) -> Result<()> {
        self.inner.save_todo_list(jobs).await
    }
    async fn run_job(&self, id: JobId) -> Result<()> {
        self.inner.run_job(id).await
    }
    async fn monitor_job(&self) -> Result<JobStatus> {
        self.inner.monitor_job().await
    }
    async fn finish_job(&self, result: Option<JobResult>) -> Result<()> {
        self.inner.finish_job(result).await
    }
    async fn get_session_progress(&self) -> Result<SessionProgress> {
        self.inner.get_session_progress().await
    }
    async fn get_rerun_candidates(&self, kind: RerunKind) -> Result<Vec<JobId>> {
        self.inner.get_rerun_candidates(kind).await
    }
    async fn prepare_rerun_candidates(&self, jobs: Vec<JobId>) -> Result<()> {
        self.inner.prepare_rerun_candidates(jobs).await
    }
    async fn get_resumable_sessions(&self) -> Result<Vec<SessionId>> {
        self.inner.get_resumable_sessions().await
    }
    async fn resume_session(&self, id: SessionId) -> Result<()> {
        self.inner.resume_session(id).await
    }
    async fn finalize_session(&self) -> Result<()> {
        self.inner.finalize_session().await
    }
    async fn terminate(&self) -> Result<()> {
        self.inner.terminate().await
    }
}

#[tokio::test]
async fn test_drives_session_to_finalization() {
    let dir = TempDir::new().unwrap();
    let connector = target(&dir);
    let service = connector.service();
    let mut controller = RemoteController::new(
        Box::new(connector),
        Box::new(FirstPlan),
        LauncherConfig::default(),
    )
    .with_config(fast());

    assert_eq!(controller.run().await.unwrap(), ControllerExit::Finished);

    let service = service.lock().await;
    assert_eq!(service.phase(), ControlSessionState::Idle);
    assert!(service.assistant().get_resumable_sessions().unwrap().is_empty());
}

#[tokio::test]
async fn test_auto_retry_before_finalizing() {
    let dir = TempDir::new().unwrap();
    let connector = target(&dir);
    let service = connector.service();
    let launcher = LauncherConfig {
        auto_retry: true,
        delay_before_retry_secs: 0,
        ..Default::default()
    };
    let mut controller = RemoteController::new(Box::new(connector), Box::new(FirstPlan), launcher)
        .with_config(fast());

    assert_eq!(controller.run().await.unwrap(), ControllerExit::Finished);
    // the session is closed after finalizing; its storage is the only one
    let repo = SessionRepository::new(&StorageConfig {
        base_dir: dir.path().to_path_buf(),
    });
    assert_eq!(repo.list().unwrap().len(), 1);
    assert_eq!(service.lock().await.phase(), ControlSessionState::Idle);
}

#[tokio::test]
async fn test_version_mismatch_is_not_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut controller = RemoteController::new(
        Box::new(OldConnector {
            attempts: attempts.clone(),
        }),
        Box::new(FirstPlan),
        LauncherConfig::default(),
    )
    .with_config(fast());

    let err = controller.run().await.unwrap_err();
    assert!(matches!(
        err,
        RemoteError::VersionMismatch { controller, target }
            if controller == REMOTE_API_VERSION && target == REMOTE_API_VERSION - 1
    ));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transient_failures_reconnect() {
    let dir = TempDir::new().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));
    let state_calls = Arc::new(AtomicUsize::new(0));
    let mut controller = RemoteController::new(
        Box::new(FlakyConnector {
            inner: target(&dir),
            attempts: attempts.clone(),
            state_calls: state_calls.clone(),
        }),
        Box::new(FirstPlan),
        LauncherConfig::default(),
    )
    .with_config(fast());

    assert_eq!(controller.run().await.unwrap(), ControllerExit::Finished);
    // refused once, connected, dropped once mid-session, reconnected
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_first_connection_gives_up_after_timeout() {
    struct Nobody;

    #[async_trait]
    impl Connector for Nobody {
        async fn connect(&self) -> std::result::Result<Arc<dyn RemoteSession>, TransportError> {
            Err(TransportError::ConnectionRefused)
        }
    }

    let mut controller =
        RemoteController::new(Box::new(Nobody), Box::new(FirstPlan), LauncherConfig::default())
            .with_config(fast());
    let err = controller.run().await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_interrupt_stops_target_session() {
    let dir = TempDir::new().unwrap();
    let connector = target(&dir);
    let service = connector.service();
    let mut controller = RemoteController::new(
        Box::new(connector),
        Box::new(FirstPlan),
        LauncherConfig::default(),
    )
    .with_config(fast());
    controller
        .interrupt_flag()
        .store(true, Ordering::SeqCst);

    assert_eq!(controller.run().await.unwrap(), ControllerExit::Stopped);
    assert_eq!(service.lock().await.phase(), ControlSessionState::Idle);
}

struct AbandonOnInterrupt;

impl Operator for AbandonOnInterrupt {
    fn choose_test_plan(&self, plans: &[TestPlanSummary]) -> Option<TestPlanId> {
        plans.first().map(|plan| plan.id.clone())
    }

    fn interact(&self, _id: &JobId, _i: &[Interaction], _r: &JobResult) -> JobResult {
        JobResult::with_outcome(Outcome::Pass)
    }

    fn on_interrupt(&self) -> benchplan_remote::InterruptChoice {
        benchplan_remote::InterruptChoice::Abandon
    }
}

#[tokio::test]
async fn test_abandon_finalizes_with_jobs_left() {
    let dir = TempDir::new().unwrap();
    let connector = target(&dir);
    let service = connector.service();
    {
        let mut service = service.lock().await;
        service.start_session(LauncherConfig::default()).unwrap();
        service.select_test_plan(&TestPlanId::new("ns::plan")).unwrap();
        let jobs = service.bootstrap().await.unwrap();
        service.save_todo_list(jobs).unwrap();
    }
    let mut controller = RemoteController::new(
        Box::new(connector),
        Box::new(AbandonOnInterrupt),
        LauncherConfig::default(),
    )
    .with_config(fast());
    controller.interrupt_flag().store(true, Ordering::SeqCst);

    assert_eq!(controller.run().await.unwrap(), ControllerExit::Abandoned);
    let service = service.lock().await;
    assert_eq!(service.phase(), ControlSessionState::Idle);
    assert!(service.assistant().get_resumable_sessions().unwrap().is_empty());
}
