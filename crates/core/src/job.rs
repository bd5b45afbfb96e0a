//! Job model - the unit of work in a test plan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use crate::id::JobId;

/// A job definition as supplied by the catalog loader.
///
/// Job definitions are shared read-only for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Fully qualified identifier
    pub id: JobId,

    /// Human readable summary
    #[serde(default)]
    pub summary: String,

    /// Kind of job
    #[serde(default)]
    pub plugin: JobPlugin,

    /// Hard dependencies (must run and pass first)
    #[serde(default)]
    pub depends: Vec<JobId>,

    /// Ordering-only dependencies (must run first, outcome ignored)
    #[serde(default)]
    pub after: Vec<JobId>,

    /// Resource requirement program, one expression per line
    #[serde(default)]
    pub requires: Option<String>,

    /// `from <ns> import <id> [as <alias>]` lines used by `requires`
    #[serde(default)]
    pub imports: Option<String>,

    /// Shell command to run
    #[serde(default)]
    pub command: Option<String>,

    /// Purpose text shown to the operator for manual jobs
    #[serde(default)]
    pub purpose: Option<String>,

    /// Steps text shown to the operator for manual jobs
    #[serde(default)]
    pub steps: Option<String>,

    /// Verification question for manual jobs
    #[serde(default)]
    pub verification: Option<String>,

    /// Category this job belongs to
    #[serde(default)]
    pub category_id: Option<String>,

    /// Certification status (`unspecified`, `blocker`, `non-blocker`)
    #[serde(default = "default_certification_status")]
    pub certification_status: String,

    /// Free-form flags (`fail-on-resource`, `noreturn`, ...)
    #[serde(default)]
    pub flags: BTreeSet<String>,

    /// Whether the job may be automatically retried
    #[serde(default = "default_auto_retry")]
    pub auto_retry: bool,

    /// Estimated duration in seconds
    #[serde(default)]
    pub estimated_duration: Option<f64>,

    /// Run the command as this user
    #[serde(default)]
    pub user: Option<String>,
}

fn default_certification_status() -> String {
    "unspecified".to_string()
}

fn default_auto_retry() -> bool {
    true
}

impl JobDefinition {
    /// Create a minimal shell job.
    pub fn new(id: impl Into<JobId>, command: Option<&str>) -> Self {
        Self {
            id: id.into(),
            summary: String::new(),
            plugin: JobPlugin::Shell,
            depends: Vec::new(),
            after: Vec::new(),
            requires: None,
            imports: None,
            command: command.map(str::to_string),
            purpose: None,
            steps: None,
            verification: None,
            category_id: None,
            certification_status: default_certification_status(),
            flags: BTreeSet::new(),
            auto_retry: true,
            estimated_duration: None,
            user: None,
        }
    }

    /// Set the plugin.
    pub fn with_plugin(mut self, plugin: JobPlugin) -> Self {
        self.plugin = plugin;
        self
    }

    /// Add a hard dependency.
    pub fn with_depends(mut self, dep: impl Into<JobId>) -> Self {
        self.depends.push(dep.into());
        self
    }

    /// Add an ordering-only dependency.
    pub fn with_after(mut self, dep: impl Into<JobId>) -> Self {
        self.after.push(dep.into());
        self
    }

    /// Set the requirement program.
    pub fn with_requires(mut self, program: impl Into<String>) -> Self {
        self.requires = Some(program.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category_id = Some(category.into());
        self
    }

    /// Namespace used to qualify partial resource identifiers.
    pub fn namespace(&self) -> Option<&str> {
        self.id.namespace()
    }

    /// Whether this job produces resource records.
    pub fn is_resource(&self) -> bool {
        self.plugin == JobPlugin::Resource
    }

    /// Whether this job needs the operator.
    pub fn is_manual(&self) -> bool {
        matches!(
            self.plugin,
            JobPlugin::Manual | JobPlugin::UserInteract | JobPlugin::UserInteractVerify
        )
    }

    /// Whether the operator verifies the outcome.
    pub fn needs_verification(&self) -> bool {
        matches!(self.plugin, JobPlugin::Manual | JobPlugin::UserInteractVerify)
    }

    /// Check a flag.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

/// Job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobPlugin {
    /// Automated shell test
    #[default]
    Shell,
    /// Emits resource records on stdout
    Resource,
    /// Collects an attachment
    Attachment,
    /// Fully manual, the operator decides the outcome
    Manual,
    /// Operator interacts, command decides
    UserInteract,
    /// Operator interacts and verifies
    UserInteractVerify,
}

impl std::fmt::Display for JobPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobPlugin::Shell => "shell",
            JobPlugin::Resource => "resource",
            JobPlugin::Attachment => "attachment",
            JobPlugin::Manual => "manual",
            JobPlugin::UserInteract => "user-interact",
            JobPlugin::UserInteractVerify => "user-interact-verify",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let job: JobDefinition = serde_json::from_str(r#"{"id": "ns::cpu"}"#).unwrap();
        assert_eq!(job.plugin, JobPlugin::Shell);
        assert_eq!(job.certification_status, "unspecified");
        assert!(job.auto_retry);
        assert_eq!(job.namespace(), Some("ns"));
    }

    #[test]
    fn test_plugin_kebab_case() {
        let job: JobDefinition =
            serde_json::from_str(r#"{"id": "a", "plugin": "user-interact-verify"}"#).unwrap();
        assert!(job.is_manual());
        assert!(job.needs_verification());
        assert_eq!(job.plugin.to_string(), "user-interact-verify");
    }
}
