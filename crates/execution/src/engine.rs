//! The local execution engine: runs a session to completion in-process.

use std::collections::BTreeMap;

use benchplan_core::{Interaction, JobDefinition, JobId, JobResult, Outcome};
use tracing::{debug, error, info};

use crate::assistant::{JobRun, RerunKind, SessionAssistant};

/// Configuration for the execution engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Max cycles before stopping (None = until the todo list is empty)
    pub max_cycles: Option<usize>,
}

/// Decides the outcome of jobs that need a human verdict.
pub trait Verifier: Send + Sync {
    /// Outcome for `job` given what was shown and what its command did.
    fn verify(&self, job: &JobDefinition, interactions: &[Interaction], result: &JobResult) -> Outcome;
}

/// Verifier for unattended runs: every undecided job is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

impl Verifier for Unattended {
    fn verify(&self, _job: &JobDefinition, _interactions: &[Interaction], _result: &JobResult) -> Outcome {
        Outcome::Skip
    }
}

/// The main execution engine.
///
/// Runs the loop:
/// ```text
/// Pick next job → Run → Verify → Record → Checkpoint
/// ```
/// and, once the todo list is empty, the automatic retries.
pub struct ExecutionEngine {
    assistant: SessionAssistant,
    verifier: Box<dyn Verifier>,
    config: EngineConfig,
    cycles_run: usize,
}

impl ExecutionEngine {
    /// Create an engine over an assistant with a session in progress.
    pub fn new(assistant: SessionAssistant) -> Self {
        Self {
            assistant,
            verifier: Box::new(Unattended),
            config: EngineConfig::default(),
            cycles_run: 0,
        }
    }

    /// Set the verifier for manual jobs.
    pub fn with_verifier(mut self, verifier: Box<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one execution cycle.
    pub async fn run_cycle(&mut self) -> anyhow::Result<CycleResult> {
        let Some(job_id) = self.assistant.todo_list()?.into_iter().next() else {
            info!("No jobs left to run");
            return Ok(CycleResult::NoJobs);
        };
        self.run_one(&job_id).await
    }

    async fn run_one(&mut self, job_id: &JobId) -> anyhow::Result<CycleResult> {
        info!("Starting execution cycle {}", self.cycles_run + 1);
        let run = self.assistant.run_job(job_id).await?;
        let JobRun {
            job_id,
            interactions,
            mut result,
            blocked,
        } = run;

        if result.outcome == Some(Outcome::Undecided) {
            let job = self
                .assistant
                .state()?
                .job(&job_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("job {} vanished from the session", job_id))?;
            result.outcome = Some(self.verifier.verify(&job, &interactions, &result));
        }
        let outcome = result.outcome.unwrap_or(Outcome::Undecided);
        self.assistant.finish_job(result)?;
        self.cycles_run += 1;

        if blocked {
            debug!(job_id = %job_id, %outcome, "job was blocked");
            Ok(CycleResult::Blocked { job_id, outcome })
        } else {
            Ok(CycleResult::Success { job_id, outcome })
        }
    }

    /// Run the engine until the todo list is empty, retry eligible failures,
    /// then finalize the session.
    pub async fn run(&mut self) -> anyhow::Result<BTreeMap<Outcome, usize>> {
        if let Some((job_id, outcome)) = self.assistant.conclude_interrupted_job()? {
            info!(job_id = %job_id, %outcome, "recorded interrupted job");
        }

        if !self.run_until_done().await? {
            return Ok(self.assistant.state()?.get_outcome_stats());
        }

        loop {
            let candidates = self.assistant.get_rerun_candidates(RerunKind::Auto)?;
            if candidates.is_empty() {
                break;
            }
            let delay = self.assistant.config().delay_before_retry();
            info!(count = candidates.len(), ?delay, "retrying failed jobs");
            tokio::time::sleep(delay).await;
            for job_id in self.assistant.prepare_rerun_candidates(&candidates)? {
                if self.reached_max_cycles() {
                    return Ok(self.assistant.state()?.get_outcome_stats());
                }
                match self.run_one(&job_id).await {
                    Ok(result) => debug!(?result, "retry finished"),
                    Err(e) => {
                        error!("Cycle error: {}", e);
                        return Err(e);
                    }
                }
            }
        }

        self.assistant.finalize_session()?;
        Ok(self.assistant.state()?.get_outcome_stats())
    }

    /// Returns false when stopped by `max_cycles`.
    async fn run_until_done(&mut self) -> anyhow::Result<bool> {
        loop {
            if self.reached_max_cycles() {
                return Ok(false);
            }

            match self.run_cycle().await? {
                CycleResult::NoJobs => return Ok(true),
                CycleResult::Blocked { .. } => continue,
                CycleResult::Success { .. } => {}
            }
        }
    }

    fn reached_max_cycles(&self) -> bool {
        match self.config.max_cycles {
            Some(max) if self.cycles_run >= max => {
                info!("Reached max cycles ({})", max);
                true
            }
            _ => false,
        }
    }

    /// Get cycles run so far.
    pub fn cycles(&self) -> usize {
        self.cycles_run
    }

    /// Get a reference to the assistant.
    pub fn assistant(&self) -> &SessionAssistant {
        &self.assistant
    }

    /// Get a mutable reference to the assistant.
    pub fn assistant_mut(&mut self) -> &mut SessionAssistant {
        &mut self.assistant
    }

    /// Give the assistant back.
    pub fn into_assistant(self) -> SessionAssistant {
        self.assistant
    }
}

/// Result of a single execution cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleResult {
    /// Ran a job
    Success {
        /// Job that ran
        job_id: JobId,
        /// Recorded outcome
        outcome: Outcome,
    },
    /// Job could not start and got a result without running
    Blocked {
        /// Job that was blocked
        job_id: JobId,
        /// Recorded outcome
        outcome: Outcome,
    },
    /// No jobs left
    NoJobs,
}
