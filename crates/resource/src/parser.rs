//! Recursive descent parser producing [`Stmt`].

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, Literal, Stmt, UnaryOp};
use crate::error::{ExpressionError, Result};
use crate::lexer::{tokenize, Op, Tok, Token};

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "lambda", "import", "from", "raise", "as", "if", "else",
    "for", "while", "def", "class", "return", "del", "pass", "global", "yield", "with",
];

/// Parse one line of a requirement program.
pub fn parse_statement(text: &str) -> Result<Stmt> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let stmt = parser.statement()?;
    parser.expect_eof()?;
    Ok(stmt)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        // tokenize() always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn peek_at(&self, n: usize) -> &Tok {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].tok
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(ExpressionError::Syntax {
            offset: self.offset(),
            message: message.into(),
        })
    }

    fn at_op(&self, op: Op) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == kw)
    }

    fn eat_op(&mut self, op: Op) -> bool {
        if self.at_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: Op) -> Result<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            self.error(format!("expected {:?}, found {:?}", op, self.peek()))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        match self.peek() {
            Tok::Eof => Ok(()),
            other => self.error(format!("unexpected {:?}", other)),
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        if self.at_keyword("import") || self.at_keyword("from") {
            let mut parts = Vec::new();
            while !matches!(self.peek(), Tok::Eof) {
                parts.push(format!("{:?}", self.advance()));
            }
            return Ok(Stmt::Import(parts.join(" ")));
        }
        if self.eat_keyword("raise") {
            if matches!(self.peek(), Tok::Eof) {
                return Ok(Stmt::Raise(None));
            }
            return Ok(Stmt::Raise(Some(self.expression()?)));
        }
        if matches!(self.peek(), Tok::Eof) {
            return self.error("empty expression");
        }
        let expr = self.expression()?;
        if self.eat_op(Op::Assign) {
            let value = self.expression()?;
            return Ok(Stmt::Assign {
                target: expr,
                value,
            });
        }
        Ok(Stmt::Expr(expr))
    }

    fn expression(&mut self) -> Result<Expr> {
        if self.eat_keyword("lambda") {
            let mut params = Vec::new();
            while let Tok::Name(name) = self.peek().clone() {
                self.advance();
                params.push(name);
                if !self.eat_op(Op::Comma) {
                    break;
                }
            }
            self.expect_op(Op::Colon)?;
            let body = self.expression()?;
            return Ok(Expr::Lambda {
                params,
                body: Box::new(body),
            });
        }
        self.or_test()
    }

    fn or_test(&mut self) -> Result<Expr> {
        let first = self.and_test()?;
        let mut values = vec![first];
        while self.eat_keyword("or") {
            values.push(self.and_test()?);
        }
        Ok(collapse(BoolOp::Or, values))
    }

    fn and_test(&mut self) -> Result<Expr> {
        let first = self.not_test()?;
        let mut values = vec![first];
        while self.eat_keyword("and") {
            values.push(self.not_test()?);
        }
        Ok(collapse(BoolOp::And, values))
    }

    fn not_test(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            let operand = self.not_test()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.arith()?;
        let mut comparisons = Vec::new();
        while let Some(op) = self.comparison_op() {
            comparisons.push((op, self.arith()?));
        }
        if comparisons.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                comparisons,
            })
        }
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek().clone() {
            Tok::Op(Op::EqEq) => CmpOp::Eq,
            Tok::Op(Op::NotEq) => CmpOp::NotEq,
            Tok::Op(Op::Lt) => CmpOp::Lt,
            Tok::Op(Op::Le) => CmpOp::Le,
            Tok::Op(Op::Gt) => CmpOp::Gt,
            Tok::Op(Op::Ge) => CmpOp::Ge,
            Tok::Name(ref n) if n == "in" => CmpOp::In,
            Tok::Name(ref n) if n == "not" => {
                if matches!(self.peek_at(1), Tok::Name(m) if m == "in") {
                    self.advance();
                    CmpOp::NotIn
                } else {
                    return None;
                }
            }
            Tok::Name(ref n) if n == "is" => {
                if matches!(self.peek_at(1), Tok::Name(m) if m == "not") {
                    self.advance();
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn arith(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        loop {
            let op = if self.eat_op(Op::Plus) {
                BinOp::Add
            } else if self.eat_op(Op::Minus) {
                BinOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.term()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = if self.eat_op(Op::Star) {
                BinOp::Mul
            } else if self.eat_op(Op::Slash) {
                BinOp::Div
            } else if self.eat_op(Op::Percent) {
                BinOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.factor()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn factor(&mut self) -> Result<Expr> {
        let op = if self.eat_op(Op::Minus) {
            UnaryOp::Neg
        } else if self.eat_op(Op::Plus) {
            UnaryOp::Pos
        } else {
            return self.primary();
        };
        let operand = self.factor()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op(Op::Dot) {
                match self.advance() {
                    Tok::Name(attr) => {
                        expr = Expr::Attribute {
                            value: Box::new(expr),
                            attr,
                        }
                    }
                    other => return self.error(format!("expected attribute name, found {:?}", other)),
                }
            } else if self.eat_op(Op::LParen) {
                let args = self.sequence(Op::RParen)?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.eat_op(Op::LBracket) {
                let index = self.subscript()?;
                self.expect_op(Op::RBracket)?;
                expr = Expr::Subscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn subscript(&mut self) -> Result<Expr> {
        let lower = if self.at_op(Op::Colon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        if !self.eat_op(Op::Colon) {
            return match lower {
                Some(index) => Ok(*index),
                None => self.error("empty subscript"),
            };
        }
        let upper = if self.at_op(Op::RBracket) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        Ok(Expr::Slice { lower, upper })
    }

    /// Comma separated expressions up to `close`, which is consumed.
    fn sequence(&mut self, close: Op) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.at_op(close) {
            items.push(self.expression()?);
            if !self.eat_op(Op::Comma) {
                break;
            }
        }
        self.expect_op(close)?;
        Ok(items)
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Tok::Int(v) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(v)))
            }
            Tok::Float(v) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(v)))
            }
            Tok::Str(s) => {
                self.advance();
                // adjacent literals concatenate
                let mut s = s;
                while let Tok::Str(more) = self.peek().clone() {
                    self.advance();
                    s.push_str(&more);
                }
                Ok(Expr::Literal(Literal::Str(s)))
            }
            Tok::Name(name) => {
                let literal = match name.as_str() {
                    "True" => Some(Literal::Bool(true)),
                    "False" => Some(Literal::Bool(false)),
                    "None" => Some(Literal::None),
                    kw if KEYWORDS.contains(&kw) => {
                        return self.error(format!("unexpected keyword {:?}", kw));
                    }
                    _ => None,
                };
                self.advance();
                Ok(match literal {
                    Some(lit) => Expr::Literal(lit),
                    None => Expr::Name(name),
                })
            }
            Tok::Op(Op::LParen) => {
                self.advance();
                if self.eat_op(Op::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.expression()?;
                if self.eat_op(Op::RParen) {
                    return Ok(first);
                }
                self.expect_op(Op::Comma)?;
                let mut items = vec![first];
                items.extend(self.sequence(Op::RParen)?);
                Ok(Expr::Tuple(items))
            }
            Tok::Op(Op::LBracket) => {
                self.advance();
                Ok(Expr::List(self.sequence(Op::RBracket)?))
            }
            other => self.error(format!("unexpected {:?}", other)),
        }
    }
}

fn collapse(op: BoolOp, mut values: Vec<Expr>) -> Expr {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Expr::BoolOp { op, values }
    }
}
