//! Session metadata persisted with every checkpoint.

use std::collections::BTreeSet;

use benchplan_core::{JobId, TestPlanId};
use serde::{Deserialize, Serialize};

/// Session is not finished yet
pub const FLAG_INCOMPLETE: &str = "incomplete";
/// Bootstrap jobs are being run
pub const FLAG_BOOTSTRAPPING: &str = "bootstrapping";
/// Results were handed over
pub const FLAG_SUBMITTED: &str = "submitted";
/// Jobs were picked without a test plan
pub const FLAG_TESTPLANLESS: &str = "testplanless";

/// Descriptive data about a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Human readable title
    #[serde(default)]
    pub title: Option<String>,

    /// Status flags
    #[serde(default)]
    pub flags: BTreeSet<String>,

    /// Job that was running when the checkpoint was taken
    #[serde(default)]
    pub running_job: Option<JobId>,

    /// Opaque data owned by the application driving the session
    #[serde(default)]
    pub app_blob: Option<serde_json::Value>,

    /// Whether the operator edited the job list
    #[serde(default)]
    pub custom_joblist: bool,

    /// Jobs the operator deselected
    #[serde(default)]
    pub rejected_jobs: Vec<JobId>,

    /// Selected test plan
    #[serde(default)]
    pub test_plan_id: Option<TestPlanId>,
}

impl SessionMetadata {
    /// Metadata of a new session.
    pub fn new(title: Option<String>) -> Self {
        let mut meta = Self {
            title,
            ..Default::default()
        };
        meta.set_flag(FLAG_INCOMPLETE);
        meta
    }

    /// Whether `flag` is set.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Set `flag`.
    pub fn set_flag(&mut self, flag: &str) {
        self.flags.insert(flag.to_string());
    }

    /// Clear `flag`; returns whether it was set.
    pub fn clear_flag(&mut self, flag: &str) -> bool {
        self.flags.remove(flag)
    }

    /// Whether the session can be resumed.
    pub fn is_incomplete(&self) -> bool {
        self.has_flag(FLAG_INCOMPLETE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_incomplete() {
        let mut meta = SessionMetadata::new(Some("bench".into()));
        assert!(meta.is_incomplete());
        assert!(meta.clear_flag(FLAG_INCOMPLETE));
        assert!(!meta.clear_flag(FLAG_INCOMPLETE));
        assert!(!meta.is_incomplete());
    }

    #[test]
    fn test_defaults_when_missing() {
        let meta: SessionMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(meta, SessionMetadata::default());
    }
}
