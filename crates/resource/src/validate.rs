//! Allow-list validation of parsed expressions.
//!
//! Every node kind must be explicitly accepted here; anything else fails
//! closed with [`ExpressionError::DisallowedConstruct`].

use crate::ast::{Expr, Stmt};
use crate::error::{ExpressionError, Result};

/// Functions an expression may call.
pub const ALLOWED_CALLS: &[&str] = &["len", "bool", "int", "float"];

/// Validate a statement and return the top-level names it references, in
/// order of first appearance.
pub fn validate(stmt: &Stmt) -> Result<Vec<String>> {
    let expr = match stmt {
        Stmt::Expr(expr) => expr,
        Stmt::Assign { .. } => return Err(disallowed("assignment")),
        Stmt::Import(_) => return Err(disallowed("import")),
        Stmt::Raise(_) => return Err(disallowed("raise")),
    };
    let mut names = Vec::new();
    visit(expr, &mut names)?;
    Ok(names)
}

fn disallowed(what: impl Into<String>) -> ExpressionError {
    ExpressionError::DisallowedConstruct(what.into())
}

fn visit(expr: &Expr, names: &mut Vec<String>) -> Result<()> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::Name(name) => {
            if !names.iter().any(|n| n == name) {
                names.push(name.clone());
            }
            Ok(())
        }
        Expr::Attribute { value, .. } => visit(value, names),
        Expr::Call { func, args } => {
            match func.as_ref() {
                Expr::Name(name) if ALLOWED_CALLS.contains(&name.as_str()) => {}
                Expr::Name(name) => return Err(disallowed(format!("call to {}()", name))),
                _ => return Err(disallowed("call of a computed value")),
            }
            args.iter().try_for_each(|arg| visit(arg, names))
        }
        Expr::Unary { operand, .. } => visit(operand, names),
        Expr::Binary { left, right, .. } => {
            visit(left, names)?;
            visit(right, names)
        }
        Expr::BoolOp { values, .. } => values.iter().try_for_each(|v| visit(v, names)),
        Expr::Compare { left, comparisons } => {
            visit(left, names)?;
            comparisons.iter().try_for_each(|(_, right)| visit(right, names))
        }
        Expr::List(items) | Expr::Tuple(items) => items.iter().try_for_each(|i| visit(i, names)),
        Expr::Subscript { .. } => Err(disallowed("subscript")),
        Expr::Slice { .. } => Err(disallowed("slice")),
        Expr::Lambda { .. } => Err(disallowed("lambda")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_statement;

    fn check(text: &str) -> Result<Vec<String>> {
        validate(&parse_statement(text)?)
    }

    fn is_disallowed(text: &str) -> bool {
        matches!(check(text), Err(ExpressionError::DisallowedConstruct(_)))
    }

    #[test]
    fn test_names_seen_once_in_order() {
        assert_eq!(
            check("package.name == 'fwts' and package.version == '1.2'").unwrap(),
            vec!["package".to_string()]
        );
        assert_eq!(
            check("a.x == 1 or b.y == 2").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_assignments_disallowed() {
        assert!(is_disallowed("package = 'fwts'"));
        assert!(is_disallowed("package.name = 'fwts'"));
        assert!(is_disallowed("package[:] = 'fwts'"));
        assert!(is_disallowed("package[0] = 'fwts'"));
    }

    #[test]
    fn test_statements_disallowed() {
        assert!(is_disallowed("raise foo"));
        assert!(is_disallowed("import foo"));
        assert!(is_disallowed("from os import path"));
    }

    #[test]
    fn test_calls() {
        assert!(is_disallowed("foo()"));
        assert!(is_disallowed("len(a)()"));
        assert!(is_disallowed("a.name.upper()"));
        assert_eq!(check("len(a.name) > 2").unwrap(), vec!["a".to_string()]);
        assert_eq!(check("int(a.size) > 10").unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_other_constructs_disallowed() {
        assert!(is_disallowed("a.list[0] == 1"));
        assert!(is_disallowed("lambda x: x"));
    }
}
