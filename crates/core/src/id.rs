//! Identifiers for benchplan entities.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Separator between a namespace and a partial identifier.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Fully qualified identifier of a job (`namespace::partial-id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Qualify a partial identifier with a namespace.
    ///
    /// Identifiers that already carry a namespace are left alone.
    pub fn qualified(namespace: Option<&str>, partial: &str) -> Self {
        match namespace {
            Some(ns) if !partial.contains(NAMESPACE_SEPARATOR) && !ns.is_empty() => {
                Self(format!("{}{}{}", ns, NAMESPACE_SEPARATOR, partial))
            }
            _ => Self(partial.to_string()),
        }
    }

    /// The namespace part, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once(NAMESPACE_SEPARATOR).map(|(ns, _)| ns)
    }

    /// The partial identifier (without namespace).
    pub fn partial(&self) -> &str {
        self.0
            .split_once(NAMESPACE_SEPARATOR)
            .map(|(_, partial)| partial)
            .unwrap_or(&self.0)
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a test plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestPlanId(String);

impl TestPlanId {
    /// Create from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TestPlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TestPlanId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a stored session (name of its directory, minus suffix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a timestamped identifier: `<prefix><YYYY-mm-ddTHH.MM.SS>`.
    pub fn timestamped(prefix: &str, now: crate::Time) -> Self {
        Self(format!("{}{}", slugify(prefix), now.format("%Y-%m-%dT%H.%M.%S")))
    }

    /// Same identifier with a uniqueness counter appended.
    pub fn with_counter(&self, n: u32) -> Self {
        Self(format!("{}_({})", self.0, n))
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// Replace everything but ASCII alphanumerics, `-` and `_` with `_`.
pub fn slugify(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_adds_namespace_once() {
        assert_eq!(JobId::qualified(Some("com.example"), "cpu").as_str(), "com.example::cpu");
        assert_eq!(JobId::qualified(Some("com.example"), "other::cpu").as_str(), "other::cpu");
        assert_eq!(JobId::qualified(None, "cpu").as_str(), "cpu");
    }

    #[test]
    fn test_namespace_and_partial() {
        let id = JobId::new("com.example::disk/read");
        assert_eq!(id.namespace(), Some("com.example"));
        assert_eq!(id.partial(), "disk/read");
        assert_eq!(JobId::new("bare").partial(), "bare");
    }

    #[test]
    fn test_session_id_slug() {
        let now = chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let id = SessionId::timestamped("my bench/", now);
        assert_eq!(id.as_str(), "my_bench_2024-01-02T03.04.05");
        assert_eq!(id.with_counter(2).as_str(), "my_bench_2024-01-02T03.04.05_(2)");
    }
}
