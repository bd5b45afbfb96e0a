//! Sandboxed requirement expressions for benchplan.
//!
//! Requirement programs gate jobs on facts reported by resource jobs. Each
//! line is parsed into a small syntax tree, checked against an allow-list of
//! node kinds, and evaluated by an interpreter that binds exactly one
//! resource identifier to one record at a time.

#![warn(missing_docs)]

pub mod ast;
mod error;
mod eval;
mod expression;
mod imports;
mod lexer;
mod parser;
mod program;
mod validate;

pub use error::{EvaluationError, ExpressionError, ImportError, ProgramError, Result, RuntimeError};
pub use expression::ResourceExpression;
pub use imports::{parse_imports, Import};
pub use parser::parse_statement;
pub use program::ResourceProgram;
pub use validate::{validate, ALLOWED_CALLS};
