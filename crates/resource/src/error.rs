//! Error types for resource expressions.

use benchplan_core::JobId;

/// Result alias for compile-time operations.
pub type Result<T> = std::result::Result<T, ExpressionError>;

/// Definition-time errors in a single expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    /// The text does not parse
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset into the expression text
        offset: usize,
        /// What the parser expected
        message: String,
    },

    /// The text parses but uses something outside the allow-list
    #[error("disallowed construct: {0}")]
    DisallowedConstruct(String),

    /// No resource identifier is used
    #[error("expression did not reference any resources")]
    NoResourceReferenced,

    /// More than one resource identifier is used
    #[error("expression referenced multiple resources: {}", .0.join(", "))]
    MultipleResourcesReferenced(Vec<String>),
}

/// Errors building a whole requirement program.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgramError {
    /// One line failed to compile
    #[error("line {line}: {source}")]
    Expression {
        /// 1-based line number
        line: usize,
        /// Underlying error
        #[source]
        source: ExpressionError,
    },

    /// The imports text is malformed
    #[error(transparent)]
    Imports(#[from] ImportError),
}

/// Malformed `imports` statement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unable to parse imports statement {statement:?}: {reason}")]
pub struct ImportError {
    /// Offending line
    pub statement: String,
    /// What was expected
    pub reason: String,
}

/// Evaluation-time failures of a requirement program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// The resource job has not produced records yet
    #[error("cannot evaluate {expression:?}: resource {resource_id} is not available")]
    CannotEvaluate {
        /// Resource the expression needs
        resource_id: JobId,
        /// Expression text
        expression: String,
    },

    /// Records exist but none satisfies the predicate
    #[error("requirement {expression:?} not met by resource {resource_id}")]
    PredicateFailed {
        /// Resource the expression was checked against
        resource_id: JobId,
        /// Expression text
        expression: String,
    },
}

impl EvaluationError {
    /// The resource involved.
    pub fn resource_id(&self) -> &JobId {
        match self {
            EvaluationError::CannotEvaluate { resource_id, .. }
            | EvaluationError::PredicateFailed { resource_id, .. } => resource_id,
        }
    }

    /// The expression text involved.
    pub fn expression(&self) -> &str {
        match self {
            EvaluationError::CannotEvaluate { expression, .. }
            | EvaluationError::PredicateFailed { expression, .. } => expression,
        }
    }
}

/// Failure while evaluating against one record. Never leaves this crate's
/// evaluation loop except through tests and logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// Record has no such attribute
    #[error("record has no attribute {0:?}")]
    MissingAttribute(String),

    /// Name other than the bound resource
    #[error("name {0:?} is not defined")]
    UnboundName(String),

    /// Operands of the wrong type
    #[error("unsupported operand types: {0}")]
    TypeMismatch(String),

    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,

    /// `int()`/`float()` on a non-numeric string
    #[error("invalid literal for {func}(): {value:?}")]
    InvalidConversion {
        /// Conversion function
        func: &'static str,
        /// Offending input
        value: String,
    },

    /// Integer overflow
    #[error("integer overflow")]
    Overflow,

    /// Node that validation should have rejected
    #[error("construct cannot be evaluated: {0}")]
    Unsupported(&'static str),
}
