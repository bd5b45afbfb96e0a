//! Syntax tree for requirement expressions.
//!
//! The parser accepts a wider language than the evaluator supports so that
//! unsupported constructs are reported as disallowed rather than as syntax
//! errors.

/// One parsed line.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A bare expression
    Expr(Expr),
    /// `target = value`
    Assign {
        /// Left-hand side
        target: Expr,
        /// Right-hand side
        value: Expr,
    },
    /// `import ...` or `from ... import ...`
    Import(String),
    /// `raise [expr]`
    Raise(Option<Expr>),
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant
    Literal(Literal),
    /// Bare identifier
    Name(String),
    /// `value.attr`
    Attribute {
        /// Object
        value: Box<Expr>,
        /// Attribute name
        attr: String,
    },
    /// `value[index]`
    Subscript {
        /// Object
        value: Box<Expr>,
        /// Index or slice
        index: Box<Expr>,
    },
    /// `lower:upper` inside a subscript
    Slice {
        /// Lower bound
        lower: Option<Box<Expr>>,
        /// Upper bound
        upper: Option<Box<Expr>>,
    },
    /// `func(args...)`
    Call {
        /// Callee
        func: Box<Expr>,
        /// Positional arguments
        args: Vec<Expr>,
    },
    /// Unary operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Arithmetic operator
    Binary {
        /// Left operand
        left: Box<Expr>,
        /// Operator
        op: BinOp,
        /// Right operand
        right: Box<Expr>,
    },
    /// `a and b and ...` / `a or b or ...`
    BoolOp {
        /// Operator
        op: BoolOp,
        /// Operands, at least two
        values: Vec<Expr>,
    },
    /// Possibly chained comparison
    Compare {
        /// Leftmost operand
        left: Box<Expr>,
        /// `(operator, right operand)` pairs
        comparisons: Vec<(CmpOp, Expr)>,
    },
    /// `[a, b]`
    List(Vec<Expr>),
    /// `(a, b)`
    Tuple(Vec<Expr>),
    /// `lambda params: body`
    Lambda {
        /// Parameter names
        params: Vec<String>,
        /// Body
        body: Box<Expr>,
    },
}

/// Constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// String
    Str(String),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// `True` / `False`
    Bool(bool),
    /// `None`
    None,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `not`
    Not,
    /// `-`
    Neg,
    /// `+`
    Pos,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

/// Boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `is`
    Is,
    /// `is not`
    IsNot,
}
