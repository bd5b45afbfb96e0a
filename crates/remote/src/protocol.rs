//! Types exchanged between the controller and the target.

use std::fmt;

use benchplan_core::{Interaction, JobId, JobResult, TestPlan, TestPlanId};
use serde::{Deserialize, Serialize};

/// Protocol version; controller and target must agree exactly.
pub const REMOTE_API_VERSION: u32 = 12;

/// Coarse phase of the target session, used to pick the controller's next
/// action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlSessionState {
    /// No session
    Idle,
    /// Session created, waiting for a test plan
    Started,
    /// Bootstrap jobs are running
    Bootstrapping,
    /// Bootstrap done, waiting for the job selection
    Bootstrapped,
    /// Jobs selected, waiting for the next `run_job`
    TestsSelected,
    /// A job command is running
    Running,
    /// A job waits for an operator verdict
    Interacting,
    /// Nothing left to run
    Finalizing,
}

impl fmt::Display for ControlSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlSessionState::Idle => "idle",
            ControlSessionState::Started => "started",
            ControlSessionState::Bootstrapping => "bootstrapping",
            ControlSessionState::Bootstrapped => "bootstrapped",
            ControlSessionState::TestsSelected => "testsselected",
            ControlSessionState::Running => "running",
            ControlSessionState::Interacting => "interacting",
            ControlSessionState::Finalizing => "finalizing",
        };
        f.write_str(s)
    }
}

/// Test plan as offered to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlanSummary {
    /// Identifier
    pub id: TestPlanId,
    /// Display name
    pub name: String,
}

impl From<&TestPlan> for TestPlanSummary {
    fn from(plan: &TestPlan) -> Self {
        Self {
            id: plan.id.clone(),
            name: plan.name.clone(),
        }
    }
}

/// Data accompanying a state query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatePayload {
    /// Nothing to add
    None,
    /// Test plans to choose from (`started`)
    TestPlans {
        /// Offered plans, sorted by name
        plans: Vec<TestPlanSummary>,
    },
    /// Jobs still to run (`bootstrapped`, `testsselected`)
    JobList {
        /// Job ids in execution order
        jobs: Vec<JobId>,
    },
    /// The job in flight (`running`)
    RunningJob {
        /// Running job
        job_id: JobId,
    },
    /// A job waiting for a verdict (`interacting`)
    Interaction {
        /// Job to judge
        job_id: JobId,
        /// Events to show
        interactions: Vec<Interaction>,
        /// What the command produced
        result: JobResult,
    },
}

impl StatePayload {
    /// Jobs listed in a `bootstrapped` or `testsselected` payload.
    pub fn jobs(&self) -> Option<&[JobId]> {
        match self {
            StatePayload::JobList { jobs } => Some(jobs),
            _ => None,
        }
    }

    /// The job waiting for a verdict, with what to show about it.
    pub fn interaction(&self) -> Option<(&JobId, &[Interaction], &JobResult)> {
        match self {
            StatePayload::Interaction {
                job_id,
                interactions,
                result,
            } => Some((job_id, interactions, result)),
            _ => None,
        }
    }
}

/// Answer to `monitor_job`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Still running
    Running,
    /// Done; `finish_job(None)` records this result
    Finished {
        /// Result of the command
        result: JobResult,
    },
    /// Done but the operator has to decide the outcome
    NeedsVerdict {
        /// Events to show
        interactions: Vec<Interaction>,
        /// What the command produced
        result: JobResult,
    },
}

/// Progress report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    /// Jobs with a result
    pub done: usize,
    /// Jobs in the run list
    pub total: usize,
    /// Job in flight
    pub current_job: Option<JobId>,
}
