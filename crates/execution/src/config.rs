//! Launcher configuration.

use std::path::Path;
use std::time::Duration;

use benchplan_core::TestPlanId;
use benchplan_selection::{Matcher, Origin, Qualifier, SimpleQualifier};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::job_state::DEFAULT_ATTEMPTS;

/// How a session is launched. Every field has a default so a launcher file
/// only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Session title
    pub session_title: String,
    /// Prefix of session directory names
    pub session_prefix: String,
    /// Globs over test plan ids offered to the operator; empty offers all
    pub test_plan_filter: Vec<String>,
    /// Test plan to select without asking
    pub test_plan: Option<TestPlanId>,
    /// Skip the job selection screen
    pub test_selection_forced: bool,
    /// Job id patterns that are never run
    pub exclude: Vec<String>,
    /// Rerun failed jobs automatically
    pub auto_retry: bool,
    /// Runs each job gets, first one included
    pub max_attempts: u32,
    /// Pause before an automatic rerun
    pub delay_before_retry_secs: u64,
    /// Kill jobs running longer than this
    pub job_timeout_secs: Option<u64>,
    /// Account to run non-root jobs as
    pub normal_user: Option<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            session_title: "session title".to_string(),
            session_prefix: "benchplan-".to_string(),
            test_plan_filter: Vec::new(),
            test_plan: None,
            test_selection_forced: false,
            exclude: Vec::new(),
            auto_retry: false,
            max_attempts: DEFAULT_ATTEMPTS,
            delay_before_retry_secs: 1,
            job_timeout_secs: None,
            normal_user: None,
        }
    }
}

impl LauncherConfig {
    /// Read a JSON launcher file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| SessionError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that make no sense.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SessionError::Config("max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Whether the test plan filter admits `id`.
    pub fn test_plan_allowed(&self, id: &TestPlanId) -> Result<bool> {
        if self.test_plan_filter.is_empty() {
            return Ok(true);
        }
        let origin = Origin::new("launcher/test_plan_filter");
        for (idx, glob) in self.test_plan_filter.iter().enumerate() {
            if Matcher::glob(glob, Some(&origin.at_line(idx + 1)))?.is_match(id.as_str()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Exclusion qualifiers built from `exclude`.
    pub fn exclude_qualifiers(&self) -> Result<Vec<Qualifier>> {
        let origin = Origin::new("launcher/exclude");
        self.exclude
            .iter()
            .enumerate()
            .map(|(idx, pattern)| {
                let at = origin.at_line(idx + 1);
                let matcher = Matcher::anchored(pattern, Some(&at))?;
                Ok(SimpleQualifier::new(matcher, false).with_origin(at).into())
            })
            .collect()
    }

    /// Pause before an automatic rerun.
    pub fn delay_before_retry(&self) -> Duration {
        Duration::from_secs(self.delay_before_retry_secs)
    }

    /// Per-job timeout.
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}
