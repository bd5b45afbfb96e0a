//! Target side: a session assistant behind the remote call contract.
//!
//! Each call is checked against the current [`ControlSessionState`]; calls
//! that make no sense in that phase fail with [`RemoteError::WrongState`]
//! and leave the session untouched. Jobs run in a background task so the
//! controller can poll them with `monitor_job`.

use std::collections::VecDeque;

use benchplan_core::{JobId, JobResult, Outcome, SessionId, TestPlanId};
use benchplan_execution::metadata::FLAG_BOOTSTRAPPING;
use benchplan_execution::{JobRun, LauncherConfig, RerunKind, SessionAssistant, SessionError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RemoteError, Result};
use crate::protocol::{
    ControlSessionState, JobStatus, SessionProgress, StatePayload, TestPlanSummary,
    REMOTE_API_VERSION,
};

use ControlSessionState as S;

/// Job started by `run_job` and not yet recorded.
struct InFlight {
    job_id: JobId,
    handle: Option<JoinHandle<JobRun>>,
    run: Option<JobRun>,
}

impl InFlight {
    /// Collect the job's run once its task is done. Returns `None` while it
    /// is still going.
    async fn poll(&mut self) -> Option<&JobRun> {
        if let Some(handle) = &self.handle {
            if !handle.is_finished() {
                return None;
            }
        }
        self.wait().await;
        self.run.as_ref()
    }

    async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            let run = match handle.await {
                Ok(run) => run,
                Err(e) => {
                    warn!(job_id = %self.job_id, error = %e, "job task failed");
                    JobRun {
                        job_id: self.job_id.clone(),
                        interactions: Vec::new(),
                        result: JobResult::with_outcome(Outcome::Crash)
                            .with_comments(format!("job task failed: {}", e)),
                        blocked: false,
                    }
                }
            };
            self.run = Some(run);
        }
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// A [`SessionAssistant`] driven through remote calls.
pub struct RemoteSessionAssistant {
    assistant: SessionAssistant,
    phase: ControlSessionState,
    offered: Vec<TestPlanSummary>,
    in_flight: Option<InFlight>,
    rerun_queue: VecDeque<JobId>,
}

impl RemoteSessionAssistant {
    /// Wrap an assistant with no session open.
    pub fn new(assistant: SessionAssistant) -> Self {
        Self {
            assistant,
            phase: S::Idle,
            offered: Vec::new(),
            in_flight: None,
            rerun_queue: VecDeque::new(),
        }
    }

    /// The wrapped assistant.
    pub fn assistant(&self) -> &SessionAssistant {
        &self.assistant
    }

    /// Current phase.
    pub fn phase(&self) -> ControlSessionState {
        self.phase
    }

    fn guard(&self, call: &'static str, allowed: &[ControlSessionState]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            debug!(call, state = %self.phase, "call rejected");
            Err(RemoteError::WrongState {
                call,
                state: self.phase,
            })
        }
    }

    /// Reruns first, then the regular todo list.
    fn pending_jobs(&self) -> Result<Vec<JobId>> {
        let mut jobs: Vec<JobId> = self.rerun_queue.iter().cloned().collect();
        for id in self.assistant.todo_list()? {
            if !jobs.contains(&id) {
                jobs.push(id);
            }
        }
        Ok(jobs)
    }

    fn settle(&mut self) -> Result<()> {
        self.phase = if self.pending_jobs()?.is_empty() {
            S::Finalizing
        } else {
            S::TestsSelected
        };
        Ok(())
    }

    /// Protocol version spoken by this target.
    pub fn get_remote_api_version(&self) -> u32 {
        REMOTE_API_VERSION
    }

    /// Current phase with its payload.
    pub fn state(&self) -> Result<(ControlSessionState, StatePayload)> {
        let payload = match self.phase {
            S::Started => StatePayload::TestPlans {
                plans: self.offered.clone(),
            },
            S::Bootstrapped | S::TestsSelected => StatePayload::JobList {
                jobs: self.pending_jobs()?,
            },
            S::Running => match &self.in_flight {
                Some(job) => StatePayload::RunningJob {
                    job_id: job.job_id.clone(),
                },
                None => StatePayload::None,
            },
            S::Interacting => match &self.in_flight {
                Some(InFlight {
                    run: Some(run), ..
                }) => StatePayload::Interaction {
                    job_id: run.job_id.clone(),
                    interactions: run.interactions.clone(),
                    result: run.result.clone(),
                },
                _ => StatePayload::None,
            },
            S::Idle | S::Bootstrapping | S::Finalizing => StatePayload::None,
        };
        Ok((self.phase, payload))
    }

    /// Start a new session.
    pub fn start_session(&mut self, config: LauncherConfig) -> Result<Vec<TestPlanSummary>> {
        self.guard("start_session", &[S::Idle])?;
        let plans = self.assistant.start_session(config)?;
        self.offered = plans.iter().map(TestPlanSummary::from).collect();
        self.rerun_queue.clear();
        self.phase = S::Started;
        Ok(self.offered.clone())
    }

    /// Select the test plan; bootstrap jobs are queued.
    pub fn select_test_plan(&mut self, id: &TestPlanId) -> Result<()> {
        self.guard("select_test_plan", &[S::Started])?;
        for problem in self.assistant.select_test_plan(id)? {
            warn!(error = %problem, "bootstrap job dropped");
        }
        self.phase = S::Bootstrapping;
        Ok(())
    }

    /// Run the remaining bootstrap jobs and build the selection.
    pub async fn bootstrap(&mut self) -> Result<Vec<JobId>> {
        self.guard("bootstrap", &[S::Bootstrapping])?;
        for id in self.assistant.get_bootstrap_todo_list()? {
            self.assistant.run_bootstrapping_job(&id).await?;
        }
        let run_list = self.assistant.finish_bootstrap()?;
        self.phase = S::Bootstrapped;
        Ok(run_list)
    }

    /// Confirm the operator's selection.
    pub fn save_todo_list(&mut self, jobs: Vec<JobId>) -> Result<()> {
        self.guard("save_todo_list", &[S::Bootstrapped, S::TestsSelected])?;
        for problem in self.assistant.save_todo_list(jobs)? {
            warn!(error = %problem, "job dropped from selection");
        }
        self.settle()
    }

    /// Start a job in a background task.
    pub fn run_job(&mut self, id: &JobId) -> Result<()> {
        self.guard("run_job", &[S::TestsSelected, S::Finalizing])?;
        let prepared = self.assistant.begin_job(id)?;
        self.rerun_queue.retain(|queued| queued != id);
        info!(job_id = %id, "job started");
        self.in_flight = Some(InFlight {
            job_id: id.clone(),
            handle: Some(tokio::spawn(prepared.execute())),
            run: None,
        });
        self.phase = S::Running;
        Ok(())
    }

    /// Poll the job in flight. An undecided result moves the session to
    /// `interacting`.
    pub async fn monitor_job(&mut self) -> Result<JobStatus> {
        self.guard("monitor_job", &[S::Running, S::Interacting])?;
        let job = self
            .in_flight
            .as_mut()
            .ok_or(RemoteError::Session(SessionError::NoRunningJob))?;
        let Some(run) = job.poll().await else {
            return Ok(JobStatus::Running);
        };
        if run.result.outcome == Some(Outcome::Undecided) {
            let status = JobStatus::NeedsVerdict {
                interactions: run.interactions.clone(),
                result: run.result.clone(),
            };
            self.phase = S::Interacting;
            Ok(status)
        } else {
            Ok(JobStatus::Finished {
                result: run.result.clone(),
            })
        }
    }

    /// Record the job in flight. Without an explicit result the job's own
    /// result is used, waiting for it if needed; an undecided job needs an
    /// explicit one.
    pub async fn finish_job(&mut self, result: Option<JobResult>) -> Result<()> {
        self.guard("finish_job", &[S::Running, S::Interacting])?;
        let mut job = self
            .in_flight
            .take()
            .ok_or(RemoteError::Session(SessionError::NoRunningJob))?;
        let result = match result {
            Some(result) => {
                job.abort();
                result
            }
            None => {
                job.wait().await;
                match job.run.take() {
                    Some(run) if run.result.outcome != Some(Outcome::Undecided) => run.result,
                    run => {
                        job.run = run;
                        self.in_flight = Some(job);
                        self.phase = S::Interacting;
                        return Err(RemoteError::WrongState {
                            call: "finish_job",
                            state: self.phase,
                        });
                    }
                }
            }
        };
        if let Err(e) = self.assistant.finish_job(result) {
            // the result may be recorded in memory even though the checkpoint failed
            warn!(job_id = %job.job_id, error = %e, "cannot record job result");
            if let Err(settle) = self.settle() {
                debug!(error = %settle, "cannot settle after failed finish_job");
            }
            return Err(e.into());
        }
        self.settle()
    }

    /// Progress report.
    pub fn get_session_progress(&self) -> Result<SessionProgress> {
        let state = self.assistant.state()?;
        let progress = state.progress();
        Ok(SessionProgress {
            done: progress.done,
            total: progress.total,
            current_job: state.metadata().running_job.clone(),
        })
    }

    /// Jobs worth running again.
    pub fn get_rerun_candidates(&self, kind: RerunKind) -> Result<Vec<JobId>> {
        self.guard("get_rerun_candidates", &[S::Finalizing, S::TestsSelected])?;
        Ok(self.assistant.get_rerun_candidates(kind)?)
    }

    /// Queue jobs to run again.
    pub fn prepare_rerun_candidates(&mut self, jobs: &[JobId]) -> Result<()> {
        self.guard("prepare_rerun_candidates", &[S::Finalizing, S::TestsSelected])?;
        for id in self.assistant.prepare_rerun_candidates(jobs)? {
            if !self.rerun_queue.contains(&id) {
                self.rerun_queue.push_back(id);
            }
        }
        self.settle()
    }

    /// Stored sessions that can be resumed.
    pub fn get_resumable_sessions(&self) -> Result<Vec<SessionId>> {
        self.guard("get_resumable_sessions", &[S::Idle])?;
        Ok(self
            .assistant
            .get_resumable_sessions()?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Resume a stored session. A job interrupted by the crash gets its
    /// result first.
    pub fn resume_session(&mut self, id: &SessionId) -> Result<()> {
        self.guard("resume_session", &[S::Idle])?;
        self.assistant.resume_session(id)?;
        if let Some((job_id, outcome)) = self.assistant.conclude_interrupted_job()? {
            info!(job_id = %job_id, %outcome, "recorded interrupted job");
        }
        self.rerun_queue.clear();

        let meta = self.assistant.state()?.metadata();
        if meta.has_flag(FLAG_BOOTSTRAPPING) {
            self.phase = S::Bootstrapping;
        } else if meta.test_plan_id.is_none() && !meta.custom_joblist {
            self.offered = self
                .assistant
                .catalog()
                .test_plans
                .iter()
                .map(TestPlanSummary::from)
                .collect();
            self.offered.sort_by(|a, b| a.name.cmp(&b.name));
            self.phase = S::Started;
        } else {
            self.settle()?;
        }
        info!(session_id = %id, state = %self.phase, "remote session resumed");
        Ok(())
    }

    /// Mark the session complete and go idle.
    pub fn finalize_session(&mut self) -> Result<()> {
        self.guard(
            "finalize_session",
            &[S::Finalizing, S::TestsSelected, S::Bootstrapped],
        )?;
        self.assistant.finalize_session()?;
        self.close();
        Ok(())
    }

    /// Drop the session without finalizing it. Allowed in any phase.
    pub fn terminate(&mut self) {
        if let Some(mut job) = self.in_flight.take() {
            warn!(job_id = %job.job_id, "aborting running job");
            job.abort();
        }
        self.close();
    }

    fn close(&mut self) {
        self.assistant.close_session();
        self.offered.clear();
        self.rerun_queue.clear();
        self.in_flight = None;
        self.phase = S::Idle;
    }
}
