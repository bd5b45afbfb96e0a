//! Test plan model.

use serde::{Deserialize, Serialize};
use crate::id::TestPlanId;

/// A named selection of jobs.
///
/// Pattern fields hold one pattern per line; `#` starts a comment. Patterns
/// are matched against fully qualified job ids with an implicit `^...$`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    /// Identifier
    pub id: TestPlanId,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Namespace used to qualify partial patterns
    #[serde(default)]
    pub namespace: Option<String>,

    /// Jobs to include
    #[serde(default)]
    pub include: Option<String>,

    /// Jobs to exclude
    #[serde(default)]
    pub exclude: Option<String>,

    /// Jobs always run first, regardless of operator selection
    #[serde(default)]
    pub mandatory_include: Option<String>,

    /// Jobs run during bootstrap (resource discovery)
    #[serde(default)]
    pub bootstrap_include: Option<String>,

    /// `pattern -> category id`, applied in order
    #[serde(default)]
    pub category_overrides: Vec<(String, String)>,

    /// `pattern -> certification status`, applied in order
    #[serde(default)]
    pub certification_status_overrides: Vec<(String, String)>,
}

impl TestPlan {
    /// Create an empty test plan.
    pub fn new(id: impl Into<TestPlanId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            namespace: None,
            include: None,
            exclude: None,
            mandatory_include: None,
            bootstrap_include: None,
            category_overrides: Vec::new(),
            certification_status_overrides: Vec::new(),
        }
    }

    /// Set the include patterns.
    pub fn with_include(mut self, patterns: impl Into<String>) -> Self {
        self.include = Some(patterns.into());
        self
    }

    /// Set the exclude patterns.
    pub fn with_exclude(mut self, patterns: impl Into<String>) -> Self {
        self.exclude = Some(patterns.into());
        self
    }

    /// Set the mandatory include patterns.
    pub fn with_mandatory_include(mut self, patterns: impl Into<String>) -> Self {
        self.mandatory_include = Some(patterns.into());
        self
    }

    /// Set the bootstrap include patterns.
    pub fn with_bootstrap_include(mut self, patterns: impl Into<String>) -> Self {
        self.bootstrap_include = Some(patterns.into());
        self
    }

    /// Add a category override.
    pub fn with_category_override(
        mut self,
        pattern: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        self.category_overrides.push((pattern.into(), category.into()));
        self
    }

    /// Add a certification status override.
    pub fn with_certification_override(
        mut self,
        pattern: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        self.certification_status_overrides
            .push((pattern.into(), status.into()));
        self
    }
}
