//! Interpreter for validated expressions.
//!
//! One free identifier is bound to a single [`ResourceRecord`]; record
//! attributes evaluate to strings. Value semantics follow the usual
//! dynamic-language rules: numbers compare across int/float, `and`/`or`
//! yield an operand, truthiness decides the final verdict.

use benchplan_core::ResourceRecord;
use std::cmp::Ordering;

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, Literal, UnaryOp};
use crate::error::RuntimeError;

type EvalResult<'a> = Result<Value<'a>, RuntimeError>;

/// Runtime values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<Value<'a>>),
    Tuple(Vec<Value<'a>>),
    Record(&'a ResourceRecord),
}

impl Value<'_> {
    /// Truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Bool(b) => *b,
            Value::None => false,
            Value::List(v) | Value::Tuple(v) => !v.is_empty(),
            Value::Record(_) => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "str",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::None => "NoneType",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Record(_) => "record",
        }
    }
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn as_num(value: &Value<'_>) -> Option<Num> {
    match value {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        _ => None,
    }
}

fn mismatch(op: &str, left: &Value<'_>, right: &Value<'_>) -> RuntimeError {
    RuntimeError::TypeMismatch(format!(
        "'{}' between {} and {}",
        op,
        left.type_name(),
        right.type_name()
    ))
}

/// Evaluate `expr` with `alias` bound to `record`.
pub fn evaluate<'a>(expr: &Expr, alias: &str, record: &'a ResourceRecord) -> EvalResult<'a> {
    match expr {
        Expr::Literal(lit) => Ok(match lit {
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::None => Value::None,
        }),
        Expr::Name(name) if name == alias => Ok(Value::Record(record)),
        Expr::Name(name) => Err(RuntimeError::UnboundName(name.clone())),
        Expr::Attribute { value, attr } => match evaluate(value, alias, record)? {
            Value::Record(r) => r
                .get(attr)
                .map(|v| Value::Str(v.to_string()))
                .ok_or_else(|| RuntimeError::MissingAttribute(attr.clone())),
            other => Err(RuntimeError::TypeMismatch(format!(
                "{} has no attribute {:?}",
                other.type_name(),
                attr
            ))),
        },
        Expr::Call { func, args } => {
            let name = match func.as_ref() {
                Expr::Name(name) => name.as_str(),
                _ => return Err(RuntimeError::Unsupported("computed call")),
            };
            let args = args
                .iter()
                .map(|a| evaluate(a, alias, record))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, args)
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, alias, record)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                UnaryOp::Neg => match as_num(&value) {
                    Some(Num::Int(i)) => i.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow),
                    Some(Num::Float(f)) => Ok(Value::Float(-f)),
                    None => Err(RuntimeError::TypeMismatch(format!(
                        "bad operand type for unary -: {}",
                        value.type_name()
                    ))),
                },
                UnaryOp::Pos => match as_num(&value) {
                    Some(Num::Int(i)) => Ok(Value::Int(i)),
                    Some(Num::Float(f)) => Ok(Value::Float(f)),
                    None => Err(RuntimeError::TypeMismatch(format!(
                        "bad operand type for unary +: {}",
                        value.type_name()
                    ))),
                },
            }
        }
        Expr::Binary { left, op, right } => {
            let l = evaluate(left, alias, record)?;
            let r = evaluate(right, alias, record)?;
            binary(*op, l, r)
        }
        Expr::BoolOp { op, values } => {
            let mut last = Value::Bool(*op == BoolOp::And);
            for v in values {
                last = evaluate(v, alias, record)?;
                let stop = match op {
                    BoolOp::And => !last.truthy(),
                    BoolOp::Or => last.truthy(),
                };
                if stop {
                    break;
                }
            }
            Ok(last)
        }
        Expr::Compare { left, comparisons } => {
            let mut current = evaluate(left, alias, record)?;
            for (op, right) in comparisons {
                let next = evaluate(right, alias, record)?;
                if !compare(*op, &current, &next)? {
                    return Ok(Value::Bool(false));
                }
                current = next;
            }
            Ok(Value::Bool(true))
        }
        Expr::List(items) => Ok(Value::List(
            items
                .iter()
                .map(|i| evaluate(i, alias, record))
                .collect::<Result<_, _>>()?,
        )),
        Expr::Tuple(items) => Ok(Value::Tuple(
            items
                .iter()
                .map(|i| evaluate(i, alias, record))
                .collect::<Result<_, _>>()?,
        )),
        Expr::Subscript { .. } => Err(RuntimeError::Unsupported("subscript")),
        Expr::Slice { .. } => Err(RuntimeError::Unsupported("slice")),
        Expr::Lambda { .. } => Err(RuntimeError::Unsupported("lambda")),
    }
}

fn call<'a>(name: &str, mut args: Vec<Value<'a>>) -> EvalResult<'a> {
    if args.len() != 1 {
        return Err(RuntimeError::TypeMismatch(format!(
            "{}() takes exactly one argument ({} given)",
            name,
            args.len()
        )));
    }
    let arg = args.remove(0);
    match name {
        "len" => match &arg {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(v) | Value::Tuple(v) => Ok(Value::Int(v.len() as i64)),
            other => Err(RuntimeError::TypeMismatch(format!(
                "object of type {} has no len()",
                other.type_name()
            ))),
        },
        "bool" => Ok(Value::Bool(arg.truthy())),
        "int" => match &arg {
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| RuntimeError::InvalidConversion {
                    func: "int",
                    value: s.clone(),
                }),
            // i64::MIN is exact as f64, i64::MAX rounds up to 2^63
            Value::Float(f) if (i64::MIN as f64..i64::MAX as f64).contains(&f.trunc()) => {
                Ok(Value::Int(f.trunc() as i64))
            }
            Value::Float(f) if f.is_finite() => Err(RuntimeError::Overflow),
            other => match as_num(other) {
                Some(Num::Int(i)) => Ok(Value::Int(i)),
                _ => Err(RuntimeError::InvalidConversion {
                    func: "int",
                    value: format!("{:?}", other),
                }),
            },
        },
        "float" => match &arg {
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| RuntimeError::InvalidConversion {
                    func: "float",
                    value: s.clone(),
                }),
            other => as_num(other)
                .map(|n| Value::Float(n.as_f64()))
                .ok_or_else(|| RuntimeError::InvalidConversion {
                    func: "float",
                    value: format!("{:?}", other),
                }),
        },
        _ => Err(RuntimeError::Unsupported("call")),
    }
}

fn binary<'a>(op: BinOp, l: Value<'a>, r: Value<'a>) -> EvalResult<'a> {
    let symbol = match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
    };

    match (&l, &r, op) {
        (Value::Str(a), Value::Str(b), BinOp::Add) => return Ok(Value::Str(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b), BinOp::Add) => {
            return Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => {}
    }

    let (a, b) = match (as_num(&l), as_num(&r)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(mismatch(symbol, &l, &r)),
    };

    match (a, b, op) {
        (_, _, BinOp::Div) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(Value::Float(a.as_f64() / divisor))
        }
        (Num::Int(x), Num::Int(y), BinOp::Mod) => {
            if y == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            // result takes the sign of the divisor
            let m = x.checked_rem(y).ok_or(RuntimeError::Overflow)?;
            Ok(Value::Int(if m != 0 && (m < 0) != (y < 0) { m + y } else { m }))
        }
        (_, _, BinOp::Mod) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            if y == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            let m = x % y;
            Ok(Value::Float(if m != 0.0 && (m < 0.0) != (y < 0.0) { m + y } else { m }))
        }
        (Num::Int(x), Num::Int(y), _) => {
            let v = match op {
                BinOp::Add => x.checked_add(y),
                BinOp::Sub => x.checked_sub(y),
                _ => x.checked_mul(y),
            };
            v.map(Value::Int).ok_or(RuntimeError::Overflow)
        }
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Ok(Value::Float(match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                _ => x * y,
            }))
        }
    }
}

fn equals(l: &Value<'_>, r: &Value<'_>) -> bool {
    if let (Some(a), Some(b)) = (as_num(l), as_num(r)) {
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        };
    }
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::None, Value::None) => true,
        (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
        }
        (Value::Record(a), Value::Record(b)) => std::ptr::eq(*a, *b),
        _ => false,
    }
}

fn ordering(l: &Value<'_>, r: &Value<'_>, symbol: &str) -> Result<Option<Ordering>, RuntimeError> {
    if let (Some(a), Some(b)) = (as_num(l), as_num(r)) {
        return Ok(match (a, b) {
            (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
            _ => a.as_f64().partial_cmp(&b.as_f64()),
        });
    }
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
            for (x, y) in a.iter().zip(b) {
                if !equals(x, y) {
                    return ordering(x, y, symbol);
                }
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        _ => Err(mismatch(symbol, l, r)),
    }
}

fn contains(container: &Value<'_>, item: &Value<'_>) -> Result<bool, RuntimeError> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(RuntimeError::TypeMismatch(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) | Value::Tuple(items) => Ok(items.iter().any(|i| equals(i, item))),
        Value::Record(record) => match item {
            Value::Str(key) => Ok(record.get(key).is_some()),
            _ => Ok(false),
        },
        other => Err(RuntimeError::TypeMismatch(format!(
            "argument of type {} is not iterable",
            other.type_name()
        ))),
    }
}

fn compare(op: CmpOp, l: &Value<'_>, r: &Value<'_>) -> Result<bool, RuntimeError> {
    let ord = |symbol: &str| ordering(l, r, symbol);
    Ok(match op {
        CmpOp::Eq => equals(l, r),
        CmpOp::NotEq => !equals(l, r),
        CmpOp::Lt => ord("<")? == Some(Ordering::Less),
        CmpOp::Le => matches!(ord("<=")?, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => ord(">")? == Some(Ordering::Greater),
        CmpOp::Ge => matches!(ord(">=")?, Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::In => contains(r, l)?,
        CmpOp::NotIn => !contains(r, l)?,
        CmpOp::Is => identical(l, r),
        CmpOp::IsNot => !identical(l, r),
    })
}

fn identical(l: &Value<'_>, r: &Value<'_>) -> bool {
    match (l, r) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Record(a), Value::Record(b)) => std::ptr::eq(*a, *b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Stmt;
    use crate::parser::parse_statement;

    fn eval(text: &str, record: &ResourceRecord) -> Result<bool, RuntimeError> {
        let Stmt::Expr(expr) = parse_statement(text).unwrap() else {
            panic!("not an expression");
        };
        evaluate(&expr, "r", record).map(|v| v.truthy())
    }

    fn record() -> ResourceRecord {
        ResourceRecord::new([("name", "eth0"), ("size", "2048"), ("speed", "1.5")])
    }

    #[test]
    fn test_string_comparison() {
        let r = record();
        assert!(eval("r.name == 'eth0'", &r).unwrap());
        assert!(!eval("r.name != 'eth0'", &r).unwrap());
        assert!(eval("'eth' in r.name", &r).unwrap());
        assert!(eval("r.name in ['eth0', 'eth1']", &r).unwrap());
        assert!(eval("r.name not in ('wlan0',)", &r).unwrap());
    }

    #[test]
    fn test_numeric_conversion() {
        let r = record();
        assert!(eval("int(r.size) >= 1024", &r).unwrap());
        assert!(eval("float(r.speed) > 1", &r).unwrap());
        assert!(eval("int(r.size) / 2 == 1024", &r).unwrap());
        assert!(eval("int(r.size) % 1000 == 48", &r).unwrap());
        assert!(eval("len(r.name) == 4", &r).unwrap());
        assert!(eval("-7 % 3 == 2", &r).unwrap());
    }

    #[test]
    fn test_chained_comparison() {
        let r = record();
        assert!(eval("1000 < int(r.size) < 4096", &r).unwrap());
        assert!(!eval("1000 < int(r.size) < 2000", &r).unwrap());
    }

    #[test]
    fn test_bool_ops_short_circuit() {
        let r = record();
        // right side would fail on the missing attribute
        assert!(eval("r.name == 'eth0' or r.missing == 'x'", &r).unwrap());
        assert!(!eval("r.name == 'wlan0' and r.missing == 'x'", &r).unwrap());
        assert!(eval("not r.name == 'wlan0'", &r).unwrap());
    }

    #[test]
    fn test_errors() {
        let r = record();
        assert_eq!(
            eval("r.missing == 'x'", &r),
            Err(RuntimeError::MissingAttribute("missing".into()))
        );
        assert!(matches!(
            eval("int(r.name) > 1", &r),
            Err(RuntimeError::InvalidConversion { func: "int", .. })
        ));
        assert!(matches!(eval("r.name < 1", &r), Err(RuntimeError::TypeMismatch(_))));
        assert_eq!(eval("int(r.size) / 0 == 1", &r), Err(RuntimeError::DivisionByZero));
        assert_eq!(eval("other.name == 'x'", &r), Err(RuntimeError::UnboundName("other".into())));
    }

    #[test]
    fn test_int_of_huge_float_overflows() {
        let r = ResourceRecord::new([("big", "1e30"), ("small", "-1e19"), ("ok", "-9.2e18")]);
        assert_eq!(eval("int(float(r.big)) > 0", &r), Err(RuntimeError::Overflow));
        assert_eq!(eval("int(float(r.small)) < 0", &r), Err(RuntimeError::Overflow));
        assert!(eval("int(float(r.ok)) < 0", &r).unwrap());
    }

    #[test]
    fn test_is_none() {
        let r = record();
        assert!(eval("r.name is not None", &r).unwrap());
    }
}
