//! Job catalog as handed over by the loader.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use crate::{JobDefinition, JobId, TestPlan, TestPlanId};

/// Errors loading a catalog file.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Two jobs share an id
    #[error("duplicate job id: {0}")]
    DuplicateJob(JobId),
}

/// All jobs and test plans known to a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Job definitions in catalog order
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,

    /// Test plans
    #[serde(default)]
    pub test_plans: Vec<TestPlan>,
}

impl Catalog {
    /// Create a catalog.
    pub fn new(jobs: Vec<JobDefinition>, test_plans: Vec<TestPlan>) -> Self {
        Self { jobs, test_plans }
    }

    /// Parse a JSON catalog and reject duplicate job ids.
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(text)?;
        let mut seen = std::collections::HashSet::new();
        for job in &catalog.jobs {
            if !seen.insert(&job.id) {
                return Err(CatalogError::DuplicateJob(job.id.clone()));
            }
        }
        Ok(catalog)
    }

    /// Load a JSON catalog from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Jobs wrapped for shared read-only use.
    pub fn shared_jobs(&self) -> Vec<Arc<JobDefinition>> {
        self.jobs.iter().cloned().map(Arc::new).collect()
    }

    /// Find a test plan.
    pub fn test_plan(&self, id: &TestPlanId) -> Option<&TestPlan> {
        self.test_plans.iter().find(|tp| &tp.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let text = r#"{
            "jobs": [{"id": "ns::a"}, {"id": "ns::b", "depends": ["ns::a"]}],
            "test_plans": [{"id": "tp", "name": "Plan", "include": "ns::.*"}]
        }"#;
        let catalog = Catalog::from_json(text).unwrap();
        assert_eq!(catalog.jobs.len(), 2);
        assert_eq!(catalog.jobs[1].depends, vec![JobId::new("ns::a")]);
        assert!(catalog.test_plan(&TestPlanId::new("tp")).is_some());
    }

    #[test]
    fn test_duplicate_rejected() {
        let text = r#"{"jobs": [{"id": "a"}, {"id": "a"}]}"#;
        assert!(matches!(
            Catalog::from_json(text),
            Err(CatalogError::DuplicateJob(_))
        ));
    }
}
