//! Versioned checkpoint format of a session.

use std::collections::BTreeMap;
use std::sync::Arc;

use benchplan_core::{JobDefinition, JobId, JobResult, ResourceRecord};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::metadata::SessionMetadata;
use crate::state::SessionState;

/// Version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Saved part of a job state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Result history, oldest first
    pub results: Vec<JobResult>,
    /// Remaining runs
    pub attempts: u32,
}

/// Everything needed to rebuild a [`SessionState`] from the same catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Format version
    pub version: u32,
    /// Session metadata
    pub metadata: SessionMetadata,
    /// Mandatory jobs
    #[serde(default)]
    pub mandatory_job_list: Vec<JobId>,
    /// Desired jobs
    #[serde(default)]
    pub desired_job_list: Vec<JobId>,
    /// Jobs with results or non-default attempts
    #[serde(default)]
    pub jobs: BTreeMap<JobId, JobSnapshot>,
    /// Resource records
    #[serde(default)]
    pub resources: BTreeMap<JobId, Vec<ResourceRecord>>,
}

impl SessionSnapshot {
    /// Capture the persistent part of `state`.
    pub fn capture(state: &SessionState, default_attempts: u32) -> Self {
        let jobs = state
            .job_state_map()
            .iter()
            .filter(|(_, s)| s.has_run() || s.attempts() != default_attempts)
            .map(|(id, s)| {
                (
                    id.clone(),
                    JobSnapshot {
                        results: s.result_history().to_vec(),
                        attempts: s.attempts(),
                    },
                )
            })
            .collect();
        let resources = state
            .resource_map()
            .iter()
            .map(|(id, records)| (id.clone(), records.clone()))
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            metadata: state.metadata().clone(),
            mandatory_job_list: state.mandatory_job_list().to_vec(),
            desired_job_list: state.desired_job_list().to_vec(),
            jobs,
            resources,
        }
    }

    /// Encode as JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode from JSON, rejecting other format versions.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let snapshot: Self = serde_json::from_slice(data)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SessionError::IncompatibleSnapshot {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Rebuild a session state over `job_list`. The solver and the readiness
    /// computation run again, so the catalog may differ in ways that do not
    /// touch saved jobs.
    pub fn restore(self, job_list: Vec<Arc<JobDefinition>>, default_attempts: u32) -> Result<SessionState> {
        let mut state = SessionState::new(job_list);
        state.reset_attempts(default_attempts);
        *state.metadata_mut() = self.metadata;
        state.update_mandatory_job_list(self.mandatory_job_list);
        let problems = state.update_desired_job_list(self.desired_job_list);
        for problem in &problems {
            tracing::warn!(error = %problem, "restored job list is not fully solvable");
        }
        for (id, job) in self.jobs {
            state.restore_job(&id, job.results, job.attempts)?;
        }
        state.restore_resource_map(self.resources.into_iter().collect());
        state.update_readiness();
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inhibitor::InhibitorCause;
    use crate::job_state::DEFAULT_ATTEMPTS;
    use benchplan_core::{JobPlugin, Outcome};

    fn jobs() -> Vec<Arc<JobDefinition>> {
        vec![
            Arc::new(JobDefinition::new("ns::a", Some("true")).with_requires("dev.kind == 'x'")),
            Arc::new(JobDefinition::new("ns::dev", Some("lsdev")).with_plugin(JobPlugin::Resource)),
            Arc::new(JobDefinition::new("ns::b", Some("true"))),
        ]
    }

    #[test]
    fn test_capture_and_restore() {
        let mut state = SessionState::new(jobs());
        state.metadata_mut().title = Some("bench".into());
        state.update_mandatory_job_list(vec![JobId::new("ns::b")]);
        state.update_desired_job_list(vec![JobId::new("ns::a")]);
        let mut result = JobResult::with_outcome(Outcome::Pass);
        result.stdout = "kind: x\n".into();
        state.update_job_result(&JobId::new("ns::dev"), result).unwrap();

        let bytes = SessionSnapshot::capture(&state, DEFAULT_ATTEMPTS).to_bytes().unwrap();
        let restored = SessionSnapshot::from_bytes(&bytes)
            .unwrap()
            .restore(jobs(), DEFAULT_ATTEMPTS)
            .unwrap();

        assert_eq!(restored.metadata().title.as_deref(), Some("bench"));
        assert_eq!(restored.run_list(), state.run_list());
        assert_eq!(restored.desired_job_list(), state.desired_job_list());
        assert_eq!(restored.resource_map(), state.resource_map());
        let dev = restored.job_state(&JobId::new("ns::dev")).unwrap();
        assert_eq!(dev.outcome(), Some(Outcome::Pass));
        assert_eq!(dev.attempts(), DEFAULT_ATTEMPTS - 1);
        let a = restored.job_state(&JobId::new("ns::a")).unwrap();
        assert!(a.can_start());
        assert!(!a.is_inhibited_by(InhibitorCause::PendingResource));
    }

    #[test]
    fn test_rejects_other_versions() {
        let data = br#"{"version": 99, "metadata": {}}"#;
        assert!(matches!(
            SessionSnapshot::from_bytes(data),
            Err(SessionError::IncompatibleSnapshot { found: 99, .. })
        ));
    }

    #[test]
    fn test_restore_with_unknown_job_fails() {
        let data = br#"{"version": 1, "metadata": {}, "jobs": {"ns::gone": {"results": [], "attempts": 1}}}"#;
        let snapshot = SessionSnapshot::from_bytes(data).unwrap();
        assert!(matches!(
            snapshot.restore(jobs(), DEFAULT_ATTEMPTS),
            Err(SessionError::UnknownJob(_))
        ));
    }
}
