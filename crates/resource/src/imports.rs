//! `imports` statements: `from <namespace> import <partial-id> [as <alias>]`.

use benchplan_core::{JobId, NAMESPACE_SEPARATOR};

use crate::error::ImportError;

/// One imported resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Fully qualified resource job id
    pub job_id: JobId,
    /// Name used inside expressions
    pub alias: String,
}

/// Parse an `imports` block, one statement per non-blank line.
pub fn parse_imports(text: &str) -> Result<Vec<Import>, ImportError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<Import, ImportError> {
    let fail = |reason: &str| ImportError {
        statement: line.to_string(),
        reason: reason.to_string(),
    };
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 4 && parts.len() != 6 {
        return Err(fail("expected exactly four or six tokens"));
    }
    if parts[0] != "from" {
        return Err(fail("expected 'from' keyword"));
    }
    let namespace = parts[1];
    if namespace.contains(NAMESPACE_SEPARATOR) {
        return Err(fail("expected a namespace, not a fully qualified job identifier"));
    }
    if parts[2] != "import" {
        return Err(fail("expected 'import' keyword"));
    }
    let partial = parts[3];
    if partial.contains(NAMESPACE_SEPARATOR) {
        return Err(fail("expected a partial job identifier, not a fully qualified one"));
    }
    let alias = if parts.len() == 6 {
        if parts[4] != "as" {
            return Err(fail("expected 'as' keyword"));
        }
        parts[5]
    } else {
        partial
    };
    Ok(Import {
        job_id: JobId::qualified(Some(namespace), partial),
        alias: alias.to_string(),
    })
}
