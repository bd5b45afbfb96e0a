//! Job runners: turn a job definition into a result.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use benchplan_core::{JobDefinition, JobResult, Outcome};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs the command of one job.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run `job` to completion and describe what happened.
    async fn run(&self, job: &JobDefinition) -> JobResult;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    timeout: Option<Duration>,
    normal_user: Option<String>,
}

impl ShellRunner {
    /// Create a runner with no timeout that runs jobs as the current user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run jobs without an explicit `user` as this account.
    pub fn with_normal_user(mut self, user: Option<String>) -> Self {
        self.normal_user = user;
        self
    }

    fn command(&self, job: &JobDefinition, script: &str) -> Command {
        let user = job.user.as_ref().or(self.normal_user.as_ref());
        let mut cmd = match user {
            Some(user) => {
                let mut cmd = Command::new("sudo");
                cmd.args(["-n", "-u", user.as_str(), "sh", "-c", script]);
                cmd
            }
            None => {
                let mut cmd = Command::new("sh");
                cmd.args(["-c", script]);
                cmd
            }
        };
        cmd.env("BENCHPLAN_JOB_ID", job.id.as_str())
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl JobRunner for ShellRunner {
    async fn run(&self, job: &JobDefinition) -> JobResult {
        let Some(script) = job.command.as_deref() else {
            return JobResult::with_outcome(Outcome::NotSupported)
                .with_comments("job has no command");
        };

        let start = Instant::now();
        debug!(job_id = %job.id, command = script, "running job command");
        let mut cmd = self.command(job, script);
        let output = cmd.output();
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, output).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(job_id = %job.id, timeout = ?limit, "job timed out, killed");
                    let mut result = JobResult::with_outcome(Outcome::Crash)
                        .with_comments(format!("killed after {}s", limit.as_secs()));
                    result.execution_duration = Some(start.elapsed());
                    return result;
                }
            },
            None => output.await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "cannot spawn job command");
                return JobResult::with_outcome(Outcome::Fail)
                    .with_comments(format!("cannot spawn command: {}", e));
            }
        };

        let return_code = output.status.code();
        let outcome = match return_code {
            Some(0) => Outcome::Pass,
            Some(_) => Outcome::Fail,
            None => Outcome::Crash,
        };
        debug!(job_id = %job.id, ?return_code, %outcome, "job command finished");
        JobResult {
            outcome: Some(outcome),
            comments: None,
            return_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            execution_duration: Some(start.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exit_status_maps_to_outcome() {
        let runner = ShellRunner::new();
        let pass = runner.run(&JobDefinition::new("ns::t", Some("echo hello"))).await;
        assert_eq!(pass.outcome, Some(Outcome::Pass));
        assert_eq!(pass.return_code, Some(0));
        assert_eq!(pass.stdout, "hello\n");

        let fail = runner.run(&JobDefinition::new("ns::f", Some("echo oops >&2; exit 3"))).await;
        assert_eq!(fail.outcome, Some(Outcome::Fail));
        assert_eq!(fail.return_code, Some(3));
        assert_eq!(fail.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_job_id_in_environment() {
        let result = ShellRunner::new()
            .run(&JobDefinition::new("ns::env", Some("printf %s \"$BENCHPLAN_JOB_ID\"")))
            .await;
        assert_eq!(result.stdout, "ns::env");
    }

    #[tokio::test]
    async fn test_timeout_is_a_crash() {
        let runner = ShellRunner::new().with_timeout(Some(Duration::from_millis(100)));
        let result = runner.run(&JobDefinition::new("ns::slow", Some("sleep 5"))).await;
        assert_eq!(result.outcome, Some(Outcome::Crash));
    }

    #[tokio::test]
    async fn test_signal_is_a_crash() {
        let result = ShellRunner::new()
            .run(&JobDefinition::new("ns::sig", Some("kill -9 $$")))
            .await;
        assert_eq!(result.outcome, Some(Outcome::Crash));
        assert_eq!(result.return_code, None);
    }

    #[tokio::test]
    async fn test_no_command() {
        let result = ShellRunner::new().run(&JobDefinition::new("ns::none", None)).await;
        assert_eq!(result.outcome, Some(Outcome::NotSupported));
    }
}
