//! Selection errors.

use crate::qualifier::Origin;

/// Result alias for qualifier construction.
pub type Result<T> = std::result::Result<T, SelectionError>;

/// Errors building qualifiers.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// A pattern is not a valid regular expression
    #[error("{}invalid pattern {pattern:?}: {source}", origin_prefix(.origin))]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Where it came from
        origin: Option<Origin>,
        /// Regex compiler error
        #[source]
        source: regex::Error,
    },
}

fn origin_prefix(origin: &Option<Origin>) -> String {
    origin
        .as_ref()
        .map(|o| format!("{}: ", o))
        .unwrap_or_default()
}
