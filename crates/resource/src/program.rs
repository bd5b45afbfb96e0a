//! Requirement programs: AND-ed resource expressions, one per line.

use std::collections::BTreeSet;

use benchplan_core::{JobId, ResourceMap};

use crate::error::{EvaluationError, ProgramError};
use crate::expression::ResourceExpression;
use crate::imports::{parse_imports, Import};

/// An ordered list of expressions that must all hold.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceProgram {
    expressions: Vec<ResourceExpression>,
    required_resources: BTreeSet<JobId>,
}

impl ResourceProgram {
    /// Compile every non-blank line of `text`.
    pub fn from_text(
        text: &str,
        namespace: Option<&str>,
        imports: &[Import],
    ) -> Result<Self, ProgramError> {
        let mut expressions = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let expr = ResourceExpression::compile(line, namespace, imports).map_err(|source| {
                ProgramError::Expression {
                    line: idx + 1,
                    source,
                }
            })?;
            expressions.push(expr);
        }
        let required_resources = expressions
            .iter()
            .map(|e| e.resource_id().clone())
            .collect();
        Ok(Self {
            expressions,
            required_resources,
        })
    }

    /// Compile with an unparsed `imports` block.
    pub fn from_text_with_imports(
        text: &str,
        namespace: Option<&str>,
        imports: Option<&str>,
    ) -> Result<Self, ProgramError> {
        let imports = match imports {
            Some(block) => parse_imports(block)?,
            None => Vec::new(),
        };
        Self::from_text(text, namespace, &imports)
    }

    /// Expressions in source order.
    pub fn expressions(&self) -> &[ResourceExpression] {
        &self.expressions
    }

    /// Union of resource ids over all expressions.
    pub fn required_resources(&self) -> &BTreeSet<JobId> {
        &self.required_resources
    }

    /// Fail on the first expression that does not hold.
    pub fn evaluate_or_raise(&self, resource_map: &ResourceMap) -> Result<(), EvaluationError> {
        self.expressions
            .iter()
            .try_for_each(|expr| expr.check(resource_map))
    }

    /// Every failing expression, in source order.
    pub fn failures(&self, resource_map: &ResourceMap) -> Vec<EvaluationError> {
        self.expressions
            .iter()
            .filter_map(|expr| expr.check(resource_map).err())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchplan_core::ResourceRecord;

    fn program() -> ResourceProgram {
        ResourceProgram::from_text(
            "package.name == 'fwts'\n\n  device.category == 'AUDIO'\n",
            Some("ns"),
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_required_resources_union() {
        let p = program();
        assert_eq!(p.expressions().len(), 2);
        let ids: Vec<&str> = p.required_resources().iter().map(JobId::as_str).collect();
        assert_eq!(ids, vec!["ns::device", "ns::package"]);
    }

    #[test]
    fn test_missing_resource_is_cannot_evaluate() {
        let p = program();
        let mut map = ResourceMap::new();
        map.insert(
            JobId::new("ns::package"),
            vec![ResourceRecord::new([("name", "bash")])],
        );
        // first expression is false, second has no records at all
        let failures = p.failures(&map);
        assert!(matches!(failures[0], EvaluationError::PredicateFailed { .. }));
        assert!(matches!(failures[1], EvaluationError::CannotEvaluate { .. }));
        assert_eq!(failures[1].resource_id().as_str(), "ns::device");
    }

    #[test]
    fn test_evaluate_or_raise_all_must_hold() {
        let p = program();
        let mut map = ResourceMap::new();
        map.insert(JobId::new("ns::package"), vec![ResourceRecord::new([("name", "fwts")])]);
        map.insert(JobId::new("ns::device"), vec![ResourceRecord::new([("category", "AUDIO")])]);
        assert!(p.evaluate_or_raise(&map).is_ok());

        map.insert(JobId::new("ns::device"), vec![ResourceRecord::new([("category", "USB")])]);
        let err = p.evaluate_or_raise(&map).unwrap_err();
        assert_eq!(err.expression(), "device.category == 'AUDIO'");
    }

    #[test]
    fn test_error_reports_line() {
        let err = ResourceProgram::from_text("a.x == 1\nfoo()", None, &[]).unwrap_err();
        assert!(matches!(err, ProgramError::Expression { line: 2, .. }));
    }

    #[test]
    fn test_bad_imports_block() {
        assert!(matches!(
            ResourceProgram::from_text_with_imports("a.x == 1", None, Some("import a")),
            Err(ProgramError::Imports(_))
        ));
    }
}
