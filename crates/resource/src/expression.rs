//! A single compiled resource expression.

use benchplan_core::{JobId, ResourceMap, ResourceRecord};

use crate::ast::{Expr, Stmt};
use crate::error::{EvaluationError, ExpressionError, Result};
use crate::eval::evaluate;
use crate::imports::Import;
use crate::parser::parse_statement;
use crate::validate::validate;

/// A validated predicate over records of exactly one resource.
#[derive(Debug, Clone)]
pub struct ResourceExpression {
    text: String,
    expr: Expr,
    resource_alias: String,
    resource_id: JobId,
    implicit_namespace: Option<String>,
}

impl ResourceExpression {
    /// Parse, validate and resolve `text`.
    ///
    /// The referenced identifier is looked up in `imports` first and
    /// otherwise qualified with `namespace`.
    pub fn compile(text: &str, namespace: Option<&str>, imports: &[Import]) -> Result<Self> {
        let stmt = parse_statement(text)?;
        let mut names = validate(&stmt)?;
        let expr = match stmt {
            Stmt::Expr(expr) => expr,
            // validate() only accepts bare expressions
            _ => return Err(ExpressionError::DisallowedConstruct("statement".into())),
        };
        let resource_alias = match names.len() {
            0 => return Err(ExpressionError::NoResourceReferenced),
            1 => names.remove(0),
            _ => return Err(ExpressionError::MultipleResourcesReferenced(names)),
        };
        let resource_id = imports
            .iter()
            .find(|imp| imp.alias == resource_alias)
            .map(|imp| imp.job_id.clone())
            .unwrap_or_else(|| JobId::qualified(namespace, &resource_alias));

        Ok(Self {
            text: text.to_string(),
            expr,
            resource_alias,
            resource_id,
            implicit_namespace: namespace.map(str::to_string),
        })
    }

    /// Source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Identifier used inside the expression.
    pub fn resource_alias(&self) -> &str {
        &self.resource_alias
    }

    /// Fully qualified id of the resource job.
    pub fn resource_id(&self) -> &JobId {
        &self.resource_id
    }

    /// Namespace used for partial identifiers.
    pub fn implicit_namespace(&self) -> Option<&str> {
        self.implicit_namespace.as_deref()
    }

    /// True if at least one record satisfies the predicate.
    ///
    /// A record that makes evaluation fail (missing attribute, bad
    /// conversion, ...) counts as non-matching.
    pub fn evaluate(&self, records: &[ResourceRecord]) -> bool {
        records.iter().any(|record| {
            match evaluate(&self.expr, &self.resource_alias, record) {
                Ok(value) => value.truthy(),
                Err(e) => {
                    tracing::debug!(
                        expression = %self.text,
                        resource_id = %self.resource_id,
                        error = %e,
                        "record did not evaluate"
                    );
                    false
                }
            }
        })
    }

    /// Check against a resource map, distinguishing a missing resource from
    /// a false predicate.
    pub fn check(&self, resource_map: &ResourceMap) -> std::result::Result<(), EvaluationError> {
        let records = resource_map
            .get(&self.resource_id)
            .ok_or_else(|| EvaluationError::CannotEvaluate {
                resource_id: self.resource_id.clone(),
                expression: self.text.clone(),
            })?;
        if self.evaluate(records) {
            Ok(())
        } else {
            Err(EvaluationError::PredicateFailed {
                resource_id: self.resource_id.clone(),
                expression: self.text.clone(),
            })
        }
    }
}

impl PartialEq for ResourceExpression {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl std::fmt::Display for ResourceExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
