//! Per-job runtime state.

use std::sync::Arc;

use benchplan_core::{JobDefinition, JobResult, Outcome};
use benchplan_resource::ResourceProgram;
use benchplan_selection::Overrides;

use crate::inhibitor::{InhibitorCause, JobReadinessInhibitor};

/// Default number of runs a job gets.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Runtime state of one job in a session.
///
/// The inhibitor list is the readiness state: a job can start when it is
/// empty. Results are only ever appended.
#[derive(Debug, Clone)]
pub struct JobState {
    job: Arc<JobDefinition>,
    program: Option<Arc<ResourceProgram>>,
    inhibitors: Vec<JobReadinessInhibitor>,
    result_history: Vec<JobResult>,
    effective_category_id: Option<String>,
    effective_certification_status: String,
    attempts: u32,
}

impl JobState {
    /// Fresh state: undesired, never run.
    pub fn new(job: Arc<JobDefinition>, program: Option<Arc<ResourceProgram>>) -> Self {
        let effective_category_id = job.category_id.clone();
        let effective_certification_status = job.certification_status.clone();
        Self {
            job,
            program,
            inhibitors: vec![JobReadinessInhibitor::undesired()],
            result_history: Vec::new(),
            effective_category_id,
            effective_certification_status,
            attempts: DEFAULT_ATTEMPTS,
        }
    }

    /// Job definition.
    pub fn job(&self) -> &Arc<JobDefinition> {
        &self.job
    }

    /// Compiled requirement program, if the job has one.
    pub fn program(&self) -> Option<&Arc<ResourceProgram>> {
        self.program.as_ref()
    }

    /// Current inhibitors.
    pub fn readiness_inhibitors(&self) -> &[JobReadinessInhibitor] {
        &self.inhibitors
    }

    /// Replace the inhibitors.
    pub fn set_readiness_inhibitors(&mut self, inhibitors: Vec<JobReadinessInhibitor>) {
        self.inhibitors = inhibitors;
    }

    /// Whether the job is runnable now.
    pub fn can_start(&self) -> bool {
        self.inhibitors.is_empty() && self.attempts > 0
    }

    /// Whether `cause` is among the inhibitors.
    pub fn is_inhibited_by(&self, cause: InhibitorCause) -> bool {
        self.inhibitors.iter().any(|i| i.cause() == cause)
    }

    /// All recorded results, oldest first.
    pub fn result_history(&self) -> &[JobResult] {
        &self.result_history
    }

    /// Latest result, or a hollow one if the job never ran.
    pub fn result(&self) -> JobResult {
        self.result_history.last().cloned().unwrap_or_default()
    }

    /// Outcome of the latest result.
    pub fn outcome(&self) -> Option<Outcome> {
        self.result_history.last().and_then(|r| r.outcome)
    }

    /// Whether a real result was recorded.
    pub fn has_run(&self) -> bool {
        !self.result_history.is_empty()
    }

    /// Append a result. Hollow results are dropped; returns whether the
    /// history changed.
    pub fn record_result(&mut self, result: JobResult) -> bool {
        if result.is_hollow() {
            return false;
        }
        self.result_history.push(result);
        true
    }

    /// Restore a saved history verbatim.
    pub(crate) fn set_result_history(&mut self, history: Vec<JobResult>) {
        self.result_history = history;
    }

    /// Category after test plan overrides.
    pub fn effective_category_id(&self) -> Option<&str> {
        self.effective_category_id.as_deref()
    }

    /// Certification status after test plan overrides.
    pub fn effective_certification_status(&self) -> &str {
        &self.effective_certification_status
    }

    /// Recompute the effective fields from `overrides`.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        self.effective_category_id = overrides.effective_category(&self.job);
        self.effective_certification_status =
            overrides.effective_certification_status(&self.job);
    }

    /// Remaining runs.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Set remaining runs.
    pub fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }

    /// Human readable summary of why the job can or cannot start.
    pub fn get_readiness_description(&self) -> String {
        if self.inhibitors.is_empty() {
            if self.attempts == 0 {
                return "job cannot be started: no attempts left".to_string();
            }
            return "job can be started".to_string();
        }
        let reasons: Vec<String> = self.inhibitors.iter().map(|i| i.to_string()).collect();
        format!("job cannot be started: {}", reasons.join(", "))
    }
}
