//! Test plan to qualifier conversion and field overrides.

use benchplan_core::{JobDefinition, TestPlan};

use crate::error::Result;
use crate::pattern_list::parse_pattern_list;
use crate::qualifier::{Matcher, Origin, Qualifier};

fn field_list(
    plan: &TestPlan,
    field: &str,
    text: Option<&String>,
    inclusive: bool,
) -> Result<Option<Qualifier>> {
    text.map(|t| {
        parse_pattern_list(
            &format!("{}/{}", plan.id, field),
            t,
            plan.namespace.as_deref(),
            inclusive,
        )
    })
    .transpose()
}

/// Qualifier for the main selection: `include`, minus `exclude`, minus the
/// bootstrap jobs.
pub fn qualifier(plan: &TestPlan) -> Result<Qualifier> {
    let mut parts = Vec::new();
    parts.extend(field_list(plan, "include", plan.include.as_ref(), true)?);
    parts.extend(field_list(plan, "exclude", plan.exclude.as_ref(), false)?);
    parts.push(bootstrap_qualifier(plan, true)?);
    Ok(Qualifier::Composite(parts))
}

/// Qualifier for jobs that always run.
pub fn mandatory_qualifier(plan: &TestPlan) -> Result<Qualifier> {
    Ok(Qualifier::Composite(
        field_list(plan, "mandatory_include", plan.mandatory_include.as_ref(), true)?
            .into_iter()
            .collect(),
    ))
}

/// Qualifier for bootstrap jobs; `excluding` flips it into an exclusion.
pub fn bootstrap_qualifier(plan: &TestPlan, excluding: bool) -> Result<Qualifier> {
    Ok(Qualifier::Composite(
        field_list(plan, "bootstrap_include", plan.bootstrap_include.as_ref(), !excluding)?
            .into_iter()
            .collect(),
    ))
}

/// Compiled `pattern -> value` overrides, applied in order.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    category: Vec<(Matcher, String)>,
    certification_status: Vec<(Matcher, String)>,
}

impl Overrides {
    /// Compile the override tables of `plan`.
    pub fn from_test_plan(plan: &TestPlan) -> Result<Self> {
        let compile = |field: &str, table: &[(String, String)]| -> Result<Vec<(Matcher, String)>> {
            let base = Origin::new(format!("{}/{}", plan.id, field));
            table
                .iter()
                .enumerate()
                .map(|(idx, (pattern, value))| -> Result<(Matcher, String)> {
                    let pattern = qualify(plan.namespace.as_deref(), pattern);
                    let matcher = Matcher::anchored(&pattern, Some(&base.at_line(idx + 1)))?;
                    Ok((matcher, value.clone()))
                })
                .collect()
        };
        Ok(Self {
            category: compile("category_overrides", &plan.category_overrides)?,
            certification_status: compile(
                "certification_status_overrides",
                &plan.certification_status_overrides,
            )?,
        })
    }

    /// Category after overrides; the last matching pattern wins.
    pub fn effective_category(&self, job: &JobDefinition) -> Option<String> {
        last_match(&self.category, job).or_else(|| job.category_id.clone())
    }

    /// Certification status after overrides; the last matching pattern wins.
    pub fn effective_certification_status(&self, job: &JobDefinition) -> String {
        last_match(&self.certification_status, job)
            .unwrap_or_else(|| job.certification_status.clone())
    }
}

fn last_match(table: &[(Matcher, String)], job: &JobDefinition) -> Option<String> {
    table
        .iter()
        .rev()
        .find(|(matcher, _)| matcher.is_match(job.id.as_str()))
        .map(|(_, value)| value.clone())
}

fn qualify(namespace: Option<&str>, pattern: &str) -> String {
    match namespace {
        Some(ns) if !pattern.contains(benchplan_core::NAMESPACE_SEPARATOR) => {
            format!("{}{}{}", regex::escape(ns), benchplan_core::NAMESPACE_SEPARATOR, pattern)
        }
        _ => pattern.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::select_jobs;
    use std::sync::Arc;

    fn catalog() -> Vec<Arc<JobDefinition>> {
        ["ns::info", "ns::cpu", "ns::disk", "ns::audio"]
            .iter()
            .map(|id| Arc::new(JobDefinition::new(*id, None)))
            .collect()
    }

    fn ids(jobs: &[Arc<JobDefinition>]) -> Vec<&str> {
        jobs.iter().map(|j| j.id.as_str()).collect()
    }

    fn plan() -> TestPlan {
        let mut tp = TestPlan::new("ns::tp", "Plan")
            .with_include(".*")
            .with_exclude("audio")
            .with_bootstrap_include("info")
            .with_mandatory_include("disk");
        tp.namespace = Some("ns".to_string());
        tp
    }

    #[test]
    fn test_main_selection_skips_bootstrap_and_excluded() {
        let selected = select_jobs(&catalog(), &[qualifier(&plan()).unwrap()]);
        assert_eq!(ids(&selected), vec!["ns::cpu", "ns::disk"]);
    }

    #[test]
    fn test_bootstrap_and_mandatory() {
        let bootstrap = select_jobs(&catalog(), &[bootstrap_qualifier(&plan(), false).unwrap()]);
        assert_eq!(ids(&bootstrap), vec!["ns::info"]);
        let mandatory = select_jobs(&catalog(), &[mandatory_qualifier(&plan()).unwrap()]);
        assert_eq!(ids(&mandatory), vec!["ns::disk"]);
    }

    #[test]
    fn test_overrides_last_match_wins() {
        let tp = plan()
            .with_category_override(".*", "generic")
            .with_category_override("cpu", "processor")
            .with_certification_override("disk", "blocker");
        let overrides = Overrides::from_test_plan(&tp).unwrap();
        let cpu = JobDefinition::new("ns::cpu", None).with_category("misc");
        let disk = JobDefinition::new("ns::disk", None);
        assert_eq!(overrides.effective_category(&cpu).as_deref(), Some("processor"));
        assert_eq!(overrides.effective_category(&disk).as_deref(), Some("generic"));
        assert_eq!(overrides.effective_certification_status(&disk), "blocker");
        assert_eq!(overrides.effective_certification_status(&cpu), "unspecified");
    }

    #[test]
    fn test_no_overrides_keeps_job_values() {
        let overrides = Overrides::default();
        let cpu = JobDefinition::new("ns::cpu", None).with_category("misc");
        assert_eq!(overrides.effective_category(&cpu).as_deref(), Some("misc"));
    }
}
