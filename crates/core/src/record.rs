//! Resource records - machine facts emitted by resource jobs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use crate::id::JobId;

/// Resource records keyed by the resource job that produced them.
pub type ResourceMap = HashMap<JobId, Vec<ResourceRecord>>;

/// An immutable flat mapping of attribute name to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRecord {
    attrs: BTreeMap<String, String>,
}

impl ResourceRecord {
    /// Build a record from key/value pairs.
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            attrs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Whether the record has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResourceRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Error from [`parse_rfc822`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct RecordSyntaxError {
    /// 1-based line number
    pub line: usize,
    /// What went wrong
    pub message: String,
}

/// Parse RFC822-style records.
///
/// Records are separated by blank lines. Each entry is `key: value`; a line
/// starting with whitespace continues the previous value.
pub fn parse_rfc822(text: &str) -> Result<Vec<ResourceRecord>, RecordSyntaxError> {
    let mut records = Vec::new();
    let mut current: BTreeMap<String, String> = BTreeMap::new();
    let mut last_key: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                records.push(ResourceRecord {
                    attrs: std::mem::take(&mut current),
                });
            }
            last_key = None;
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            let key = last_key.as_ref().ok_or_else(|| RecordSyntaxError {
                line: idx + 1,
                message: "continuation line without a key".to_string(),
            })?;
            if let Some(value) = current.get_mut(key) {
                let extra = line.trim();
                // A lone "." stands for an empty line inside the value.
                let extra = if extra == "." { "" } else { extra };
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(extra);
            }
            continue;
        }

        let (key, value) = line.split_once(':').ok_or_else(|| RecordSyntaxError {
            line: idx + 1,
            message: format!("expected `key: value`, got {:?}", line),
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(RecordSyntaxError {
                line: idx + 1,
                message: "empty key".to_string(),
            });
        }
        current.insert(key.to_string(), value.trim().to_string());
        last_key = Some(key.to_string());
    }

    if !current.is_empty() {
        records.push(ResourceRecord { attrs: current });
    }
    Ok(records)
}
