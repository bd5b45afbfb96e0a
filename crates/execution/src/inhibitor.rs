//! Readiness inhibitors: recorded reasons a job cannot run yet.

use std::fmt;

use benchplan_core::JobId;
use serde::{Deserialize, Serialize};

/// Why a job is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InhibitorCause {
    /// Not part of the desired job list
    Undesired,
    /// A dependency has not run yet
    PendingDep,
    /// A hard dependency ran and did not pass
    FailedDep,
    /// A resource job has not produced records yet
    PendingResource,
    /// Resource records exist but the requirement is not met
    FailedResource,
}

impl InhibitorCause {
    fn needs_related_job(self) -> bool {
        self != InhibitorCause::Undesired
    }

    fn needs_related_expression(self) -> bool {
        matches!(
            self,
            InhibitorCause::PendingResource | InhibitorCause::FailedResource
        )
    }
}

impl fmt::Display for InhibitorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InhibitorCause::Undesired => "UNDESIRED",
            InhibitorCause::PendingDep => "PENDING_DEP",
            InhibitorCause::FailedDep => "FAILED_DEP",
            InhibitorCause::PendingResource => "PENDING_RESOURCE",
            InhibitorCause::FailedResource => "FAILED_RESOURCE",
        };
        f.write_str(s)
    }
}

/// Inhibitor constructed with missing context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InhibitorError {
    /// Every cause but `Undesired` names a related job
    #[error("{0} requires a related job")]
    MissingRelatedJob(InhibitorCause),

    /// Resource causes name the failing expression
    #[error("{0} requires a related expression")]
    MissingRelatedExpression(InhibitorCause),
}

/// One reason a job is not runnable now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReadinessInhibitor {
    cause: InhibitorCause,
    related_job: Option<JobId>,
    related_expression: Option<String>,
}

impl JobReadinessInhibitor {
    /// Checked constructor.
    pub fn new(
        cause: InhibitorCause,
        related_job: Option<JobId>,
        related_expression: Option<String>,
    ) -> Result<Self, InhibitorError> {
        if cause.needs_related_job() && related_job.is_none() {
            return Err(InhibitorError::MissingRelatedJob(cause));
        }
        if cause.needs_related_expression() && related_expression.is_none() {
            return Err(InhibitorError::MissingRelatedExpression(cause));
        }
        Ok(Self {
            cause,
            related_job,
            related_expression,
        })
    }

    /// The job is not desired.
    pub fn undesired() -> Self {
        Self {
            cause: InhibitorCause::Undesired,
            related_job: None,
            related_expression: None,
        }
    }

    /// `dep` has not run yet.
    pub fn pending_dep(dep: JobId) -> Self {
        Self {
            cause: InhibitorCause::PendingDep,
            related_job: Some(dep),
            related_expression: None,
        }
    }

    /// `dep` ran and did not pass.
    pub fn failed_dep(dep: JobId) -> Self {
        Self {
            cause: InhibitorCause::FailedDep,
            related_job: Some(dep),
            related_expression: None,
        }
    }

    /// `resource` has no records yet.
    pub fn pending_resource(resource: JobId, expression: impl Into<String>) -> Self {
        Self {
            cause: InhibitorCause::PendingResource,
            related_job: Some(resource),
            related_expression: Some(expression.into()),
        }
    }

    /// `expression` is false for every record of `resource`.
    pub fn failed_resource(resource: JobId, expression: impl Into<String>) -> Self {
        Self {
            cause: InhibitorCause::FailedResource,
            related_job: Some(resource),
            related_expression: Some(expression.into()),
        }
    }

    /// Cause.
    pub fn cause(&self) -> InhibitorCause {
        self.cause
    }

    /// Related job, absent only for `Undesired`.
    pub fn related_job(&self) -> Option<&JobId> {
        self.related_job.as_ref()
    }

    /// Related expression text for resource causes.
    pub fn related_expression(&self) -> Option<&str> {
        self.related_expression.as_deref()
    }
}

impl fmt::Display for JobReadinessInhibitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let job = self.related_job.as_ref().map(JobId::as_str).unwrap_or("?");
        let expr = self.related_expression.as_deref().unwrap_or("?");
        match self.cause {
            InhibitorCause::Undesired => f.write_str("undesired"),
            InhibitorCause::PendingDep => write!(f, "required dependency {:?} did not run yet", job),
            InhibitorCause::FailedDep => write!(f, "required dependency {:?} has failed", job),
            InhibitorCause::PendingResource => write!(
                f,
                "resource job {:?} did not run yet, cannot evaluate {:?}",
                job, expr
            ),
            InhibitorCause::FailedResource => {
                write!(f, "resource requirement {:?} not met by {:?}", expr, job)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_constructor() {
        assert!(JobReadinessInhibitor::new(InhibitorCause::Undesired, None, None).is_ok());
        assert_eq!(
            JobReadinessInhibitor::new(InhibitorCause::PendingDep, None, None),
            Err(InhibitorError::MissingRelatedJob(InhibitorCause::PendingDep))
        );
        assert_eq!(
            JobReadinessInhibitor::new(InhibitorCause::FailedResource, Some(JobId::new("r")), None),
            Err(InhibitorError::MissingRelatedExpression(InhibitorCause::FailedResource))
        );
    }

    #[test]
    fn test_display() {
        let i = JobReadinessInhibitor::failed_dep(JobId::new("ns::a"));
        assert_eq!(i.to_string(), "required dependency \"ns::a\" has failed");
        assert_eq!(JobReadinessInhibitor::undesired().to_string(), "undesired");
    }
}
