//! Controller side: drives a target session to completion.
//!
//! The controller is a loop over the target's state: each turn it asks the
//! target where it is and makes the one call that moves it forward. Because
//! all progress lives on the target, a dropped connection is handled by
//! reconnecting and asking again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use benchplan_core::{Interaction, JobId, JobResult, Outcome, SessionId, TestPlanId};
use benchplan_execution::{LauncherConfig, RerunKind};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::{Connector, RemoteSession};
use crate::error::{RemoteError, Result};
use crate::protocol::{
    ControlSessionState, JobStatus, StatePayload, TestPlanSummary, REMOTE_API_VERSION,
};

/// What to do after the operator interrupted the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptChoice {
    /// Carry on
    Resume,
    /// Exit the controller and leave the target as it is
    Detach,
    /// Drop the target session; it can be resumed later
    Stop,
    /// Give up on the remaining jobs and finalize the session
    Abandon,
}

/// How the controller loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerExit {
    /// The session was finalized
    Finished,
    /// The controller left, the target session is untouched
    Detached,
    /// The target session was dropped unfinished
    Stopped,
    /// The session was finalized with jobs left unrun
    Abandoned,
}

/// Decisions only a person can make.
pub trait Operator: Send + Sync {
    /// Pick a session to resume instead of starting a new one.
    fn choose_resume(&self, _sessions: &[SessionId]) -> Option<SessionId> {
        None
    }

    /// Pick the test plan; `None` gives up.
    fn choose_test_plan(&self, plans: &[TestPlanSummary]) -> Option<TestPlanId>;

    /// Review the proposed job list.
    fn edit_todo_list(&self, jobs: Vec<JobId>) -> Vec<JobId> {
        jobs
    }

    /// Decide the result of a job that needs a verdict.
    fn interact(&self, job_id: &JobId, interactions: &[Interaction], result: &JobResult)
        -> JobResult;

    /// Pick jobs to run again before finalizing.
    fn choose_rerun(&self, _candidates: &[JobId]) -> Vec<JobId> {
        Vec::new()
    }

    /// Called after the interrupt flag was raised.
    fn on_interrupt(&self) -> InterruptChoice {
        InterruptChoice::Stop
    }
}

/// Timing of the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long to keep trying the first connection
    pub connect_timeout: Duration,
    /// Pause between first-connection attempts
    pub retry_interval: Duration,
    /// First pause when reconnecting to an established session
    pub reconnect_initial: Duration,
    /// Upper bound of the reconnect pause
    pub reconnect_max: Duration,
    /// Pause between `monitor_job` polls
    pub poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(600),
            retry_interval: Duration::from_secs(1),
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Drives a remote session through an [`Operator`].
pub struct RemoteController {
    connector: Box<dyn Connector>,
    operator: Box<dyn Operator>,
    launcher: LauncherConfig,
    config: ControllerConfig,
    interrupted: Arc<AtomicBool>,
    keep_running: bool,
    started: bool,
    last_state: Option<ControlSessionState>,
}

impl RemoteController {
    /// Create a controller. `launcher` is sent with `start_session`.
    pub fn new(
        connector: Box<dyn Connector>,
        operator: Box<dyn Operator>,
        launcher: LauncherConfig,
    ) -> Self {
        Self {
            connector,
            operator,
            launcher,
            config: ControllerConfig::default(),
            interrupted: Arc::new(AtomicBool::new(false)),
            keep_running: false,
            started: false,
            last_state: None,
        }
    }

    /// Set the timing.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Flag to raise from a signal handler to interrupt the loop.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    async fn handshake(&self) -> Result<Arc<dyn RemoteSession>> {
        let session = self.connector.connect().await?;
        let target = session.get_remote_api_version().await?;
        if target != REMOTE_API_VERSION {
            return Err(RemoteError::VersionMismatch {
                controller: REMOTE_API_VERSION,
                target,
            });
        }
        Ok(session)
    }

    /// Connect and check the protocol version.
    ///
    /// Before the first successful handshake, transient failures are retried
    /// until `connect_timeout`. Afterwards the controller reconnects with
    /// growing pauses for as long as it takes.
    pub async fn connect(&mut self) -> Result<Arc<dyn RemoteSession>> {
        let deadline = Instant::now() + self.config.connect_timeout;
        let mut backoff = self.config.reconnect_initial;
        loop {
            match self.handshake().await {
                Ok(session) => {
                    debug!(version = REMOTE_API_VERSION, "connected to target");
                    self.keep_running = true;
                    return Ok(session);
                }
                Err(e) if e.is_transient() && self.keep_running => {
                    warn!(error = %e, ?backoff, "lost target, reconnecting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.config.reconnect_max);
                }
                Err(e) if e.is_transient() && Instant::now() < deadline => {
                    debug!(error = %e, "target not reachable yet");
                    tokio::time::sleep(self.config.retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run until the session is finalized or the operator stops it.
    pub async fn run(&mut self) -> Result<ControllerExit> {
        let mut session = self.connect().await?;
        loop {
            if self.interrupted.swap(false, Ordering::SeqCst) {
                match self.operator.on_interrupt() {
                    InterruptChoice::Resume => {}
                    InterruptChoice::Detach => {
                        info!("detaching from target");
                        return Ok(ControllerExit::Detached);
                    }
                    InterruptChoice::Stop => {
                        session.terminate().await?;
                        info!("target session stopped");
                        return Ok(ControllerExit::Stopped);
                    }
                    InterruptChoice::Abandon => {
                        self.abandon(session.as_ref()).await?;
                        return Ok(ControllerExit::Abandoned);
                    }
                }
            }

            match self.step(session.as_ref()).await {
                Ok(true) => {}
                Ok(false) => return Ok(ControllerExit::Finished),
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "call failed");
                    session = self.connect().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One turn of the loop. Returns false once the session is finalized.
    async fn step(&mut self, session: &dyn RemoteSession) -> Result<bool> {
        let (state, payload) = session.state().await?;
        if self.last_state != Some(state) {
            info!(%state, "target state");
            self.last_state = Some(state);
        }
        if state != ControlSessionState::Idle {
            self.started = true;
        }
        match state {
            ControlSessionState::Idle => {
                if self.started {
                    return Ok(false);
                }
                self.open_session(session).await?;
            }
            ControlSessionState::Started => {
                let StatePayload::TestPlans { plans } = payload else {
                    return Err(unexpected("state", state));
                };
                self.select_plan(session, &plans).await?;
            }
            ControlSessionState::Bootstrapping => {
                // bootstrap was cut short; its results cannot be trusted
                warn!("target stuck in bootstrap, restarting the session");
                session.terminate().await?;
                self.started = false;
            }
            ControlSessionState::Bootstrapped => {
                let jobs = payload.jobs().map(<[JobId]>::to_vec).unwrap_or_default();
                let jobs = self.operator.edit_todo_list(jobs);
                session.save_todo_list(jobs).await?;
            }
            ControlSessionState::TestsSelected => {
                match payload.jobs().and_then(|jobs| jobs.first()) {
                    Some(id) => {
                        let progress = session.get_session_progress().await?;
                        info!(job_id = %id, done = progress.done, total = progress.total, "running job");
                        session.run_job(id.clone()).await?;
                    }
                    None => return Err(unexpected("run_job", state)),
                }
            }
            ControlSessionState::Running => match session.monitor_job().await? {
                JobStatus::Running => tokio::time::sleep(self.config.poll_interval).await,
                JobStatus::Finished { result } => {
                    debug!(outcome = ?result.outcome, "job finished");
                    session.finish_job(None).await?;
                }
                JobStatus::NeedsVerdict { .. } => {}
            },
            ControlSessionState::Interacting => {
                let Some((job_id, interactions, result)) = payload.interaction() else {
                    return Err(unexpected("interact", state));
                };
                let verdict = self.operator.interact(job_id, interactions, result);
                session.finish_job(Some(verdict)).await?;
            }
            ControlSessionState::Finalizing => {
                if !self.rerun(session).await? {
                    session.finalize_session().await?;
                    info!("session finalized");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Skip the job in flight, if any, and finalize what there is.
    async fn abandon(&self, session: &dyn RemoteSession) -> Result<()> {
        let (state, _) = session.state().await?;
        match state {
            ControlSessionState::Running | ControlSessionState::Interacting => {
                let skipped = JobResult::with_outcome(Outcome::Skip)
                    .with_comments("session abandoned by the operator");
                session.finish_job(Some(skipped)).await?;
                session.finalize_session().await?;
            }
            ControlSessionState::TestsSelected
            | ControlSessionState::Bootstrapped
            | ControlSessionState::Finalizing => session.finalize_session().await?,
            ControlSessionState::Started | ControlSessionState::Bootstrapping => {
                session.terminate().await?
            }
            ControlSessionState::Idle => {}
        }
        info!(%state, "session abandoned");
        Ok(())
    }

    async fn open_session(&mut self, session: &dyn RemoteSession) -> Result<()> {
        let resumable = session.get_resumable_sessions().await?;
        if let Some(id) = self.operator.choose_resume(&resumable) {
            session.resume_session(id.clone()).await?;
            info!(session_id = %id, "resumed session");
        } else {
            let plans = session.start_session(self.launcher.clone()).await?;
            self.select_plan(session, &plans).await?;
        }
        self.started = true;
        Ok(())
    }

    async fn select_plan(&self, session: &dyn RemoteSession, plans: &[TestPlanSummary]) -> Result<()> {
        match self.operator.choose_test_plan(plans) {
            Some(id) => {
                info!(test_plan = %id, "test plan chosen");
                session.select_test_plan(id).await?;
                let jobs = session.bootstrap().await?;
                info!(jobs = jobs.len(), "bootstrap finished");
                Ok(())
            }
            None => {
                session.terminate().await?;
                Err(RemoteError::NoTestPlan)
            }
        }
    }

    /// Queue retries. Returns false when nothing is left to run.
    async fn rerun(&self, session: &dyn RemoteSession) -> Result<bool> {
        let mut jobs = Vec::new();
        if self.launcher.auto_retry {
            jobs = session.get_rerun_candidates(RerunKind::Auto).await?;
            if !jobs.is_empty() {
                let delay = self.launcher.delay_before_retry();
                info!(count = jobs.len(), ?delay, "retrying failed jobs");
                tokio::time::sleep(delay).await;
            }
        }
        if jobs.is_empty() {
            let candidates = session.get_rerun_candidates(RerunKind::Manual).await?;
            if !candidates.is_empty() {
                jobs = self.operator.choose_rerun(&candidates);
            }
        }
        if jobs.is_empty() {
            return Ok(false);
        }
        session.prepare_rerun_candidates(jobs).await?;
        Ok(true)
    }
}

fn unexpected(call: &'static str, state: ControlSessionState) -> RemoteError {
    RemoteError::WrongState { call, state }
}
