//! Session assistant: the operations a front end uses to drive a session.
//!
//! The assistant owns at most one session at a time. Every operation that
//! changes state checkpoints before returning, so a crash at any point can be
//! resumed from the last completed call.

use std::sync::Arc;

use benchplan_core::{
    Catalog, Interaction, InteractionKind, JobDefinition, JobId, JobPlugin, JobResult, Outcome,
    SessionId, TestPlan, TestPlanId,
};
use benchplan_selection::testplan::{bootstrap_qualifier, mandatory_qualifier, qualifier};
use benchplan_selection::{select_jobs, Overrides};
use benchplan_storage::SessionRepository;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LauncherConfig;
use crate::error::{Result, SessionError};
use crate::manager::SessionManager;
use crate::metadata::{
    SessionMetadata, FLAG_BOOTSTRAPPING, FLAG_INCOMPLETE, FLAG_TESTPLANLESS,
};
use crate::runner::{JobRunner, ShellRunner};
use crate::solver::DependencyError;
use crate::state::{Progress, SessionState};

/// Flag of jobs expected to take the machine down (reboot, poweroff).
pub const FLAG_NORETURN: &str = "noreturn";

/// Which rerun candidates to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerunKind {
    /// Anything the operator may want to run again
    Manual,
    /// Failures eligible for automatic retry
    Auto,
}

/// Outcome of [`SessionAssistant::run_job`].
#[derive(Debug, Clone, PartialEq)]
pub struct JobRun {
    /// Job that was run
    pub job_id: JobId,
    /// Events to show the operator, in order
    pub interactions: Vec<Interaction>,
    /// Result to hand to [`SessionAssistant::finish_job`]; `undecided` when
    /// the operator has to judge
    pub result: JobResult,
    /// The job was not started because it is inhibited
    pub blocked: bool,
}

enum JobAction {
    Blocked(JobResult),
    Manual,
    Execute(Arc<dyn JobRunner>),
}

/// A job marked as running, ready to execute.
pub struct PreparedJob {
    job: Arc<JobDefinition>,
    interactions: Vec<Interaction>,
    action: JobAction,
}

impl PreparedJob {
    /// Job about to run.
    pub fn job(&self) -> &Arc<JobDefinition> {
        &self.job
    }

    /// Run the job command, if there is one to run.
    pub async fn execute(self) -> JobRun {
        let job_id = self.job.id.clone();
        let (result, blocked) = match self.action {
            JobAction::Blocked(result) => (result, true),
            JobAction::Manual => (JobResult::with_outcome(Outcome::Undecided), false),
            JobAction::Execute(runner) => {
                info!(job_id = %job_id, plugin = %self.job.plugin, "running job");
                let mut result = or_crash(&job_id, runner.run(&self.job).await);
                if self.job.needs_verification() && result.outcome == Some(Outcome::Pass) {
                    result.outcome = Some(Outcome::Undecided);
                }
                (result, false)
            }
        };
        JobRun {
            job_id,
            interactions: self.interactions,
            result,
            blocked,
        }
    }
}

/// Drives one session at a time over a catalog.
pub struct SessionAssistant {
    catalog: Arc<Catalog>,
    jobs: Vec<Arc<JobDefinition>>,
    repository: SessionRepository,
    runner: Option<Arc<dyn JobRunner>>,
    config: LauncherConfig,
    manager: Option<SessionManager>,
    test_plan: Option<TestPlan>,
}

impl SessionAssistant {
    /// Create an assistant. Without [`with_runner`](Self::with_runner) jobs run
    /// through a [`ShellRunner`] configured from the launcher.
    pub fn new(catalog: Arc<Catalog>, repository: SessionRepository) -> Self {
        let jobs = catalog.shared_jobs();
        Self {
            catalog,
            jobs,
            repository,
            runner: None,
            config: LauncherConfig::default(),
            manager: None,
            test_plan: None,
        }
    }

    /// Use a custom job runner.
    pub fn with_runner(mut self, runner: Arc<dyn JobRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Launcher configuration used until a session is started. Sessions
    /// started with [`start_session`](Self::start_session) bring their own.
    pub fn with_config(mut self, config: LauncherConfig) -> Self {
        self.config = config;
        self
    }

    /// Launcher configuration of the current session.
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Job catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Current session id, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.manager.as_ref().map(SessionManager::id)
    }

    /// Selected test plan.
    pub fn test_plan(&self) -> Option<&TestPlan> {
        self.test_plan.as_ref()
    }

    /// State of the current session.
    pub fn state(&self) -> Result<&SessionState> {
        Ok(self.manager()?.state())
    }

    fn manager(&self) -> Result<&SessionManager> {
        self.manager.as_ref().ok_or(SessionError::NoSession)
    }

    fn manager_mut(&mut self) -> Result<&mut SessionManager> {
        self.manager.as_mut().ok_or(SessionError::NoSession)
    }

    fn runner(&self) -> Arc<dyn JobRunner> {
        match &self.runner {
            Some(runner) => runner.clone(),
            None => Arc::new(
                ShellRunner::new()
                    .with_timeout(self.config.job_timeout())
                    .with_normal_user(self.config.normal_user.clone()),
            ),
        }
    }

    fn checkpoint(&self) -> Result<()> {
        self.manager()?.checkpoint()
    }

    /// Start a new session. Returns the test plans the launcher offers,
    /// sorted by name.
    pub fn start_session(&mut self, config: LauncherConfig) -> Result<Vec<TestPlan>> {
        config.validate()?;
        let mut manager = SessionManager::create(
            &self.repository,
            &config.session_prefix,
            chrono::Utc::now(),
            self.jobs.clone(),
        )?;
        manager.set_default_attempts(config.max_attempts);
        *manager.state_mut().metadata_mut() =
            SessionMetadata::new(Some(config.session_title.clone()));
        manager.checkpoint()?;
        info!(session_id = %manager.id(), title = %config.session_title, "session started");

        self.manager = Some(manager);
        self.test_plan = None;
        self.config = config;

        let mut plans = Vec::new();
        for plan in &self.catalog.test_plans {
            if self.config.test_plan_allowed(&plan.id)? {
                plans.push(plan.clone());
            }
        }
        plans.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(plans)
    }

    /// Select a test plan and queue its bootstrap jobs.
    pub fn select_test_plan(&mut self, id: &TestPlanId) -> Result<Vec<DependencyError>> {
        let plan = self
            .catalog
            .test_plan(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownTestPlan(id.clone()))?;
        let overrides = Overrides::from_test_plan(&plan)?;
        let bootstrap: Vec<JobId> =
            select_jobs(&self.jobs, &[bootstrap_qualifier(&plan, false)?])
                .iter()
                .map(|job| job.id.clone())
                .collect();

        let state = self.manager_mut()?.state_mut();
        state.metadata_mut().test_plan_id = Some(id.clone());
        state.metadata_mut().set_flag(FLAG_BOOTSTRAPPING);
        state.apply_overrides(&overrides);
        let problems = state.update_desired_job_list(bootstrap);
        info!(test_plan = %id, bootstrap = state.run_list().len(), "test plan selected");

        self.test_plan = Some(plan);
        self.checkpoint()?;
        Ok(problems)
    }

    /// Bootstrap jobs still to run.
    pub fn get_bootstrap_todo_list(&self) -> Result<Vec<JobId>> {
        Ok(self.manager()?.state().todo_list())
    }

    /// Run one bootstrap job and record its result right away.
    pub async fn run_bootstrapping_job(&mut self, id: &JobId) -> Result<JobResult> {
        let job = self
            .state()?
            .job(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownJob(id.clone()))?;
        let result = or_crash(id, self.runner().run(&job).await);
        debug!(job_id = %id, outcome = ?result.outcome, "bootstrap job finished");
        self.manager_mut()?
            .state_mut()
            .update_job_result(id, result.clone())?;
        self.checkpoint()?;
        Ok(result)
    }

    /// Build the main selection from the test plan. Returns the run list.
    pub fn finish_bootstrap(&mut self) -> Result<Vec<JobId>> {
        let plan = self.test_plan.as_ref().ok_or(SessionError::NoTestPlan)?;
        let mut qualifiers = vec![qualifier(plan)?];
        qualifiers.extend(self.config.exclude_qualifiers()?);
        let desired = ids(&select_jobs(&self.jobs, &qualifiers));

        let mut mandatory_qualifiers = vec![mandatory_qualifier(plan)?];
        mandatory_qualifiers.extend(self.config.exclude_qualifiers()?);
        let mandatory = ids(&select_jobs(&self.jobs, &mandatory_qualifiers));

        let state = self.manager_mut()?.state_mut();
        state.update_mandatory_job_list(mandatory);
        for problem in state.update_desired_job_list(desired) {
            warn!(error = %problem, "job dropped from selection");
        }
        state.metadata_mut().clear_flag(FLAG_BOOTSTRAPPING);
        let run_list = state.run_list().to_vec();
        info!(jobs = run_list.len(), "bootstrap finished");

        self.checkpoint()?;
        Ok(run_list)
    }

    /// Replace the selection with an operator-edited list. Deselected jobs
    /// are remembered as rejected.
    pub fn save_todo_list(&mut self, jobs: Vec<JobId>) -> Result<Vec<DependencyError>> {
        let has_plan = self.test_plan.is_some();
        let state = self.manager_mut()?.state_mut();
        let rejected: Vec<JobId> = state
            .desired_job_list()
            .iter()
            .filter(|id| !jobs.contains(*id) && !state.mandatory_job_list().contains(*id))
            .cloned()
            .collect();
        {
            let meta = state.metadata_mut();
            meta.rejected_jobs = rejected;
            meta.custom_joblist = true;
            if !has_plan {
                meta.set_flag(FLAG_TESTPLANLESS);
            }
        }
        let problems = state.update_desired_job_list(jobs);
        self.checkpoint()?;
        Ok(problems)
    }

    /// Jobs in the run list without a result.
    pub fn todo_list(&self) -> Result<Vec<JobId>> {
        Ok(self.state()?.todo_list())
    }

    /// Run one job. The result is not recorded until
    /// [`finish_job`](Self::finish_job).
    ///
    /// A job that cannot start is not run; it gets a `skip` or
    /// `not-supported` result explaining why.
    pub async fn run_job(&mut self, id: &JobId) -> Result<JobRun> {
        let prepared = self.begin_job(id)?;
        Ok(prepared.execute().await)
    }

    /// First half of [`run_job`](Self::run_job): mark the job as running and
    /// checkpoint. The returned job runs without borrowing the assistant.
    pub fn begin_job(&mut self, id: &JobId) -> Result<PreparedJob> {
        let state = self.state()?;
        let job_state = state
            .job_state(id)
            .ok_or_else(|| SessionError::UnknownJob(id.clone()))?;
        let job = job_state.job().clone();
        let mut interactions = describe(&job);

        let action = if !job_state.can_start() {
            let description = job_state.get_readiness_description();
            info!(job_id = %id, reason = %description, "job not started");
            interactions.push(Interaction::new(InteractionKind::Skip, description.clone()));
            JobAction::Blocked(
                JobResult::with_outcome(state.blocked_outcome(id)).with_comments(description),
            )
        } else if job.plugin == JobPlugin::Manual {
            JobAction::Manual
        } else {
            JobAction::Execute(self.runner())
        };

        self.manager_mut()?.state_mut().metadata_mut().running_job = Some(id.clone());
        self.checkpoint()?;
        Ok(PreparedJob {
            job,
            interactions,
            action,
        })
    }

    /// Record the result of the running job.
    pub fn finish_job(&mut self, result: JobResult) -> Result<()> {
        let manager = self.manager_mut()?;
        let id = manager
            .state()
            .metadata()
            .running_job
            .clone()
            .ok_or(SessionError::NoRunningJob)?;
        manager.state_mut().update_job_result(&id, result)?;
        manager.state_mut().metadata_mut().running_job = None;
        self.checkpoint()
    }

    /// Give the job interrupted by a crash or reboot its result: `pass` for
    /// `noreturn` jobs, `crash` otherwise. Returns the job and its outcome.
    pub fn conclude_interrupted_job(&mut self) -> Result<Option<(JobId, Outcome)>> {
        let state = self.state()?;
        let Some(id) = state.metadata().running_job.clone() else {
            return Ok(None);
        };
        let outcome = match state.job(&id) {
            Some(job) if job.has_flag(FLAG_NORETURN) => Outcome::Pass,
            _ => Outcome::Crash,
        };
        warn!(job_id = %id, %outcome, "job was interrupted");
        self.finish_job(
            JobResult::with_outcome(outcome).with_comments("session was interrupted while running"),
        )?;
        Ok(Some((id, outcome)))
    }

    /// Mark the session complete. Calling it twice is harmless.
    pub fn finalize_session(&mut self) -> Result<()> {
        let manager = self.manager_mut()?;
        if manager.state_mut().metadata_mut().clear_flag(FLAG_INCOMPLETE) {
            info!(session_id = %manager.id(), "session finalized");
            manager.checkpoint()?;
        }
        Ok(())
    }

    /// Drop the current session without finalizing it. Stored state stays on
    /// disk and can be resumed later.
    pub fn close_session(&mut self) {
        if let Some(manager) = self.manager.take() {
            info!(session_id = %manager.id(), "session closed");
        }
        self.test_plan = None;
    }

    /// Done and total job counts.
    pub fn get_session_progress(&self) -> Result<Progress> {
        Ok(self.state()?.progress())
    }

    /// Jobs worth running again.
    pub fn get_rerun_candidates(&self, kind: RerunKind) -> Result<Vec<JobId>> {
        let state = self.state()?;
        let auto_retry = self.config.auto_retry;
        Ok(state
            .run_list()
            .iter()
            .filter_map(|id| state.job_state(id))
            .filter(|s| match (kind, s.outcome()) {
                (_, None) => false,
                (RerunKind::Manual, Some(outcome)) => outcome.is_rerunnable(),
                (RerunKind::Auto, Some(outcome)) => {
                    auto_retry
                        && matches!(outcome, Outcome::Fail | Outcome::Crash)
                        && s.job().auto_retry
                        && !s.job().is_manual()
                        && s.attempts() > 0
                }
            })
            .map(|s| s.job().id.clone())
            .collect())
    }

    /// Make `candidates` runnable again; operator reruns get one more attempt
    /// when they ran out.
    pub fn prepare_rerun_candidates(&mut self, candidates: &[JobId]) -> Result<Vec<JobId>> {
        let state = self.manager_mut()?.state_mut();
        for id in candidates {
            let job_state = state
                .job_state_mut(id)
                .ok_or_else(|| SessionError::UnknownJob(id.clone()))?;
            if job_state.attempts() == 0 {
                job_state.set_attempts(1);
            }
        }
        debug!(count = candidates.len(), "prepared rerun candidates");
        self.checkpoint()?;
        Ok(candidates.to_vec())
    }

    /// Resume a stored session. Returns the job that was running when it
    /// stopped, if any.
    pub fn resume_session(&mut self, id: &SessionId) -> Result<Option<JobId>> {
        let storage = self.repository.open(id)?;
        let manager = SessionManager::load(storage, self.jobs.clone(), self.config.max_attempts)?;

        let test_plan = match &manager.state().metadata().test_plan_id {
            Some(plan_id) => Some(
                self.catalog
                    .test_plan(plan_id)
                    .cloned()
                    .ok_or_else(|| SessionError::UnknownTestPlan(plan_id.clone()))?,
            ),
            None => None,
        };
        let running = manager.state().metadata().running_job.clone();
        self.manager = Some(manager);
        if let Some(plan) = &test_plan {
            let overrides = Overrides::from_test_plan(plan)?;
            self.manager_mut()?.state_mut().apply_overrides(&overrides);
        }
        self.test_plan = test_plan;
        info!(session_id = %id, interrupted = ?running, "session resumed");
        Ok(running)
    }

    /// Stored sessions that are not finalized, youngest first.
    pub fn get_resumable_sessions(&self) -> Result<Vec<(SessionId, SessionMetadata)>> {
        let mut resumable = Vec::new();
        for storage in self.repository.list()? {
            match SessionManager::peek_metadata(&storage) {
                Ok(Some(meta)) if meta.is_incomplete() => {
                    resumable.push((storage.id().clone(), meta));
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(session_id = %storage.id(), error = %e, "skipping unreadable session");
                }
            }
        }
        Ok(resumable)
    }
}

/// A runner that reports nothing would leave the job in the todo list, so
/// its run is recorded as a crash.
fn or_crash(id: &JobId, result: JobResult) -> JobResult {
    if !result.is_hollow() {
        return result;
    }
    warn!(job_id = %id, "runner returned no result");
    JobResult::with_outcome(Outcome::Crash).with_comments("job runner returned no result")
}

fn ids(jobs: &[Arc<JobDefinition>]) -> Vec<JobId> {
    jobs.iter().map(|job| job.id.clone()).collect()
}

fn describe(job: &JobDefinition) -> Vec<Interaction> {
    let mut interactions = Vec::new();
    let purpose = job.purpose.as_deref().unwrap_or(&job.summary);
    if !purpose.is_empty() {
        interactions.push(Interaction::new(InteractionKind::Purpose, purpose));
    }
    if let Some(steps) = &job.steps {
        interactions.push(Interaction::new(InteractionKind::Steps, steps.as_str()));
    }
    if let Some(verification) = &job.verification {
        interactions.push(Interaction::new(
            InteractionKind::Verification,
            verification.as_str(),
        ));
    }
    if let Some(user) = &job.user {
        interactions.push(Interaction::new(
            InteractionKind::SudoInput,
            format!("job runs as {}", user),
        ));
    }
    interactions
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use benchplan_storage::StorageConfig;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Returns canned results and remembers what ran.
    #[derive(Default)]
    struct ScriptedRunner {
        results: HashMap<String, JobResult>,
        ran: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn with(mut self, id: &str, result: JobResult) -> Self {
            self.results.insert(id.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl JobRunner for ScriptedRunner {
        async fn run(&self, job: &JobDefinition) -> JobResult {
            self.ran.lock().unwrap().push(job.id.to_string());
            self.results
                .get(job.id.as_str())
                .cloned()
                .unwrap_or_else(|| JobResult::with_outcome(Outcome::Pass))
        }
    }

    fn catalog() -> Catalog {
        let mut resource = JobDefinition::new("ns::device", Some("lsdev")).with_plugin(JobPlugin::Resource);
        resource.summary = "devices".into();
        let mut manual = JobDefinition::new("ns::look", None).with_plugin(JobPlugin::Manual);
        manual.purpose = Some("Check the LED".into());
        manual.steps = Some("Look at it".into());
        let mut plan = TestPlan::new("ns::full", "Full")
            .with_include(".*")
            .with_exclude("skipme")
            .with_bootstrap_include("device")
            .with_category_override("audio", "sound");
        plan.namespace = Some("ns".into());
        Catalog::new(
            vec![
                resource,
                JobDefinition::new("ns::audio", Some("aplay")).with_requires("device.category == 'AUDIO'"),
                JobDefinition::new("ns::cpu", Some("true")),
                JobDefinition::new("ns::after-cpu", Some("true")).with_depends("ns::cpu"),
                manual,
                JobDefinition::new("ns::skipme", Some("true")),
            ],
            vec![plan, TestPlan::new("ns::alpha", "Alpha")],
        )
    }

    fn assistant(runner: ScriptedRunner) -> (TempDir, SessionAssistant) {
        let dir = TempDir::new().unwrap();
        let repo = SessionRepository::new(&StorageConfig {
            base_dir: dir.path().to_path_buf(),
        });
        let assistant =
            SessionAssistant::new(Arc::new(catalog()), repo).with_runner(Arc::new(runner));
        (dir, assistant)
    }

    fn device_output(category: &str) -> JobResult {
        let mut result = JobResult::with_outcome(Outcome::Pass);
        result.stdout = format!("category: {}\n", category);
        result
    }

    async fn bootstrapped(assistant: &mut SessionAssistant) -> Vec<JobId> {
        assistant.start_session(LauncherConfig::default()).unwrap();
        assistant.select_test_plan(&TestPlanId::new("ns::full")).unwrap();
        for id in assistant.get_bootstrap_todo_list().unwrap() {
            assistant.run_bootstrapping_job(&id).await.unwrap();
        }
        assistant.finish_bootstrap().unwrap()
    }

    #[tokio::test]
    async fn test_start_session_lists_plans_by_name() {
        let (_dir, mut assistant) = assistant(ScriptedRunner::default());
        let plans = assistant.start_session(LauncherConfig::default()).unwrap();
        let names: Vec<_> = plans.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Full"]);

        let filtered = assistant
            .start_session(LauncherConfig {
                test_plan_filter: vec!["ns::f*".into()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_then_run_list() {
        let runner = ScriptedRunner::default().with("ns::device", device_output("AUDIO"));
        let (_dir, mut assistant) = assistant(runner);
        let run_list = bootstrapped(&mut assistant).await;
        let run_list: Vec<&str> = run_list.iter().map(JobId::as_str).collect();
        assert_eq!(
            run_list,
            vec!["ns::device", "ns::audio", "ns::cpu", "ns::after-cpu", "ns::look"]
        );
        let state = assistant.state().unwrap();
        assert!(!state.metadata().has_flag(FLAG_BOOTSTRAPPING));
        assert_eq!(
            state
                .job_state(&JobId::new("ns::audio"))
                .unwrap()
                .effective_category_id(),
            Some("sound")
        );
        assert_eq!(assistant.todo_list().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_blocked_job_is_not_run() {
        let runner = ScriptedRunner::default().with("ns::device", device_output("VIDEO"));
        let (_dir, mut assistant) = assistant(runner);
        bootstrapped(&mut assistant).await;

        let run = assistant.run_job(&JobId::new("ns::audio")).await.unwrap();
        assert!(run.blocked);
        assert_eq!(run.result.outcome, Some(Outcome::NotSupported));
        assert!(run
            .interactions
            .iter()
            .any(|i| i.kind == InteractionKind::Skip));
        assistant.finish_job(run.result).unwrap();
        assert_eq!(
            assistant
                .state()
                .unwrap()
                .job_state(&JobId::new("ns::audio"))
                .unwrap()
                .outcome(),
            Some(Outcome::NotSupported)
        );
    }

    #[tokio::test]
    async fn test_manual_job_is_undecided() {
        let (_dir, mut assistant) = assistant(ScriptedRunner::default());
        bootstrapped(&mut assistant).await;
        let run = assistant.run_job(&JobId::new("ns::look")).await.unwrap();
        assert_eq!(run.result.outcome, Some(Outcome::Undecided));
        let kinds: Vec<_> = run.interactions.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![InteractionKind::Purpose, InteractionKind::Steps]);
    }

    #[tokio::test]
    async fn test_finish_job_requires_running_job() {
        let (_dir, mut assistant) = assistant(ScriptedRunner::default());
        assert!(matches!(
            assistant.finish_job(JobResult::with_outcome(Outcome::Pass)),
            Err(SessionError::NoSession)
        ));
        bootstrapped(&mut assistant).await;
        assert!(matches!(
            assistant.finish_job(JobResult::with_outcome(Outcome::Pass)),
            Err(SessionError::NoRunningJob)
        ));
    }

    #[tokio::test]
    async fn test_rerun_candidates() {
        let runner = ScriptedRunner::default()
            .with("ns::device", device_output("AUDIO"))
            .with("ns::cpu", JobResult::with_outcome(Outcome::Fail));
        let (_dir, mut assistant) = assistant(runner);
        assistant
            .start_session(LauncherConfig {
                auto_retry: true,
                ..Default::default()
            })
            .unwrap();
        assistant.select_test_plan(&TestPlanId::new("ns::full")).unwrap();
        for id in assistant.get_bootstrap_todo_list().unwrap() {
            assistant.run_bootstrapping_job(&id).await.unwrap();
        }
        assistant.finish_bootstrap().unwrap();

        let cpu = JobId::new("ns::cpu");
        let run = assistant.run_job(&cpu).await.unwrap();
        assistant.finish_job(run.result).unwrap();
        assert_eq!(assistant.get_rerun_candidates(RerunKind::Auto).unwrap(), vec![cpu.clone()]);
        assert_eq!(assistant.get_rerun_candidates(RerunKind::Manual).unwrap(), vec![cpu.clone()]);

        assistant
            .manager_mut()
            .unwrap()
            .state_mut()
            .job_state_mut(&cpu)
            .unwrap()
            .set_attempts(0);
        assert!(assistant.get_rerun_candidates(RerunKind::Auto).unwrap().is_empty());
        assistant.prepare_rerun_candidates(&[cpu.clone()]).unwrap();
        assert_eq!(assistant.state().unwrap().job_state(&cpu).unwrap().attempts(), 1);
    }

    #[tokio::test]
    async fn test_resume_and_interrupted_job() {
        let (_dir, mut assistant) = assistant(ScriptedRunner::default());
        bootstrapped(&mut assistant).await;
        let cpu = JobId::new("ns::cpu");
        // simulate a crash right after the job was started
        assistant.run_job(&cpu).await.unwrap();
        let id = assistant.session_id().unwrap().clone();

        let resumable = assistant.get_resumable_sessions().unwrap();
        assert_eq!(resumable.len(), 1);
        assert_eq!(resumable[0].0, id);

        let interrupted = assistant.resume_session(&id).unwrap();
        assert_eq!(interrupted, Some(cpu.clone()));
        assert_eq!(
            assistant.conclude_interrupted_job().unwrap(),
            Some((cpu.clone(), Outcome::Crash))
        );
        assert_eq!(assistant.test_plan().map(|p| p.name.as_str()), Some("Full"));

        assistant.finalize_session().unwrap();
        assistant.finalize_session().unwrap();
        assert!(assistant.get_resumable_sessions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_todo_list_records_rejected() {
        let (_dir, mut assistant) = assistant(ScriptedRunner::default());
        bootstrapped(&mut assistant).await;
        assistant
            .save_todo_list(vec![JobId::new("ns::cpu")])
            .unwrap();
        let meta = assistant.state().unwrap().metadata();
        assert!(meta.custom_joblist);
        assert!(meta.rejected_jobs.contains(&JobId::new("ns::audio")));
        assert!(!meta.rejected_jobs.contains(&JobId::new("ns::cpu")));
        assert_eq!(
            assistant.state().unwrap().run_list(),
            &[JobId::new("ns::cpu")]
        );
    }

    #[tokio::test]
    async fn test_empty_runner_result_is_a_crash() {
        let runner = ScriptedRunner::default()
            .with("ns::device", device_output("AUDIO"))
            .with("ns::cpu", JobResult::default());
        let (_dir, mut assistant) = assistant(runner);
        bootstrapped(&mut assistant).await;

        let cpu = JobId::new("ns::cpu");
        let run = assistant.run_job(&cpu).await.unwrap();
        assert_eq!(run.result.outcome, Some(Outcome::Crash));
        assistant.finish_job(run.result).unwrap();
        assert!(!assistant.todo_list().unwrap().contains(&cpu));
    }

    #[tokio::test]
    async fn test_close_session_keeps_it_resumable() {
        let (_dir, mut assistant) = assistant(ScriptedRunner::default());
        bootstrapped(&mut assistant).await;
        let id = assistant.session_id().unwrap().clone();
        assistant.close_session();
        assert!(assistant.session_id().is_none());
        assert!(matches!(assistant.state(), Err(SessionError::NoSession)));
        assert_eq!(assistant.get_resumable_sessions().unwrap()[0].0, id);
    }
}
