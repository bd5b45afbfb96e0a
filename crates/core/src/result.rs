//! Job results.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of running a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Test passed
    Pass,
    /// Test failed
    Fail,
    /// Operator or system skipped the job
    Skip,
    /// Job could not run on this machine
    NotSupported,
    /// Command died or timed out
    Crash,
    /// Operator has not decided yet
    Undecided,
}

impl Outcome {
    /// Whether the outcome counts as success for dependency purposes.
    pub fn is_pass(self) -> bool {
        self == Outcome::Pass
    }

    /// Outcomes that a manual rerun may pick up.
    pub fn is_rerunnable(self) -> bool {
        matches!(
            self,
            Outcome::Fail | Outcome::Crash | Outcome::Skip | Outcome::NotSupported
        )
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Skip => "skip",
            Outcome::NotSupported => "not-supported",
            Outcome::Crash => "crash",
            Outcome::Undecided => "undecided",
        };
        f.write_str(s)
    }
}

/// The result of an attempted job.
///
/// A result without an outcome and without any output is *hollow*: it
/// stands for "never ran" and is never appended to a job's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Outcome, `None` when the job did not run
    pub outcome: Option<Outcome>,

    /// Operator or system comments
    #[serde(default)]
    pub comments: Option<String>,

    /// Process return code
    #[serde(default)]
    pub return_code: Option<i32>,

    /// Captured standard output
    #[serde(default)]
    pub stdout: String,

    /// Captured standard error
    #[serde(default)]
    pub stderr: String,

    /// Wall-clock duration
    #[serde(default)]
    pub execution_duration: Option<Duration>,
}

impl JobResult {
    /// A result with only an outcome.
    pub fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome: Some(outcome),
            ..Default::default()
        }
    }

    /// Attach comments.
    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    /// Whether this result carries no information at all.
    pub fn is_hollow(&self) -> bool {
        self.outcome.is_none()
            && self.comments.is_none()
            && self.return_code.is_none()
            && self.stdout.is_empty()
            && self.stderr.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hollow() {
        assert!(JobResult::default().is_hollow());
        assert!(!JobResult::with_outcome(Outcome::Fail).is_hollow());
        let commented = JobResult {
            comments: Some("operator note".into()),
            ..Default::default()
        };
        assert!(!commented.is_hollow());
    }

    #[test]
    fn test_outcome_serde_names() {
        let s = serde_json::to_string(&Outcome::NotSupported).unwrap();
        assert_eq!(s, "\"not-supported\"");
        assert_eq!(Outcome::NotSupported.to_string(), "not-supported");
    }
}
