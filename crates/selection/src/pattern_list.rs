//! Named pattern lists: one job pattern per line.

use benchplan_core::NAMESPACE_SEPARATOR;

use crate::error::Result;
use crate::qualifier::{Matcher, Origin, Qualifier, SimpleQualifier};

/// Parse a pattern list into a [`Qualifier::NamedList`].
///
/// Blank lines and `#` comments are skipped. Each remaining line becomes one
/// leaf: an exact id match when the line has no regex syntax, an anchored
/// regex otherwise. Patterns without a namespace are qualified with
/// `namespace` when one is given.
pub fn parse_pattern_list(
    name: &str,
    text: &str,
    namespace: Option<&str>,
    inclusive: bool,
) -> Result<Qualifier> {
    let base = Origin::new(name);
    let mut qualifiers = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        let origin = base.at_line(idx + 1);
        let matcher = match namespace {
            Some(ns) if !line.contains(NAMESPACE_SEPARATOR) => {
                if regex::escape(line) == line {
                    Matcher::Exact(format!("{}{}{}", ns, NAMESPACE_SEPARATOR, line))
                } else {
                    let qualified = format!("{}{}{}", regex::escape(ns), NAMESPACE_SEPARATOR, line);
                    Matcher::anchored(&qualified, Some(&origin))?
                }
            }
            _ => Matcher::literal_or_pattern(line, Some(&origin))?,
        };
        qualifiers.push(Qualifier::Simple(
            SimpleQualifier::new(matcher, inclusive).with_origin(origin),
        ));
    }

    tracing::debug!(list = name, patterns = qualifiers.len(), "parsed pattern list");
    Ok(Qualifier::NamedList {
        name: name.to_string(),
        qualifiers,
    })
}
