//! Tokenizer for requirement expressions.

use crate::error::{ExpressionError, Result};

/// Punctuation and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
}

/// Token kinds. Keywords are lexed as names and recognised by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(Op),
    Eof,
}

/// A token with its byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub offset: usize,
}

fn syntax(offset: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        offset,
        message: message.into(),
    }
}

/// Split `text` into tokens, always ending with [`Tok::Eof`].
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Token {
                tok: Tok::Name(text[start..i].to_string()),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let mut is_float = false;
            if i < bytes.len() && bytes[i] == b'.' {
                is_float = true;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                is_float = true;
                i += 1;
                if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                    i += 1;
                }
                let digits = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if digits == i {
                    return Err(syntax(start, "malformed exponent"));
                }
            }
            let literal = &text[start..i];
            let tok = if is_float {
                Tok::Float(
                    literal
                        .parse()
                        .map_err(|_| syntax(start, format!("bad number {:?}", literal)))?,
                )
            } else {
                Tok::Int(
                    literal
                        .parse()
                        .map_err(|_| syntax(start, format!("integer too large {:?}", literal)))?,
                )
            };
            tokens.push(Token { tok, offset: start });
            continue;
        }

        if c == b'\'' || c == b'"' {
            let (value, end) = lex_string(text, start)?;
            tokens.push(Token {
                tok: Tok::Str(value),
                offset: start,
            });
            i = end;
            continue;
        }

        let next = bytes.get(i + 1).copied();
        let (op, width) = match (c, next) {
            (b'=', Some(b'=')) => (Op::EqEq, 2),
            (b'!', Some(b'=')) => (Op::NotEq, 2),
            (b'<', Some(b'=')) => (Op::Le, 2),
            (b'>', Some(b'=')) => (Op::Ge, 2),
            (b'=', _) => (Op::Assign, 1),
            (b'<', _) => (Op::Lt, 1),
            (b'>', _) => (Op::Gt, 1),
            (b'(', _) => (Op::LParen, 1),
            (b')', _) => (Op::RParen, 1),
            (b'[', _) => (Op::LBracket, 1),
            (b']', _) => (Op::RBracket, 1),
            (b',', _) => (Op::Comma, 1),
            (b'.', _) => (Op::Dot, 1),
            (b':', _) => (Op::Colon, 1),
            (b'+', _) => (Op::Plus, 1),
            (b'-', _) => (Op::Minus, 1),
            (b'*', _) => (Op::Star, 1),
            (b'/', _) => (Op::Slash, 1),
            (b'%', _) => (Op::Percent, 1),
            _ => {
                let ch = text[start..].chars().next().unwrap_or('?');
                return Err(syntax(start, format!("unexpected character {:?}", ch)));
            }
        };
        tokens.push(Token {
            tok: Tok::Op(op),
            offset: start,
        });
        i += width;
    }

    tokens.push(Token {
        tok: Tok::Eof,
        offset: text.len(),
    });
    Ok(tokens)
}

/// Lex a quoted string starting at `start`; returns the value and the end offset.
fn lex_string(text: &str, start: usize) -> Result<(String, usize)> {
    let mut chars = text[start..].char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(syntax(start, "unterminated string")),
    };
    let mut value = String::new();

    while let Some((idx, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((value, start + idx + c.len_utf8())),
            '\\' => {
                let (_, esc) = chars
                    .next()
                    .ok_or_else(|| syntax(start + idx, "unterminated escape"))?;
                match esc {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' | '\'' | '"' => value.push(esc),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            '\n' => return Err(syntax(start + idx, "newline in string literal")),
            c => value.push(c),
        }
    }
    Err(syntax(start, "unterminated string"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Tok> {
        tokenize(text).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            kinds("package.name == 'fwts'"),
            vec![
                Tok::Name("package".into()),
                Tok::Op(Op::Dot),
                Tok::Name("name".into()),
                Tok::Op(Op::EqEq),
                Tok::Str("fwts".into()),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(
            kinds("1 2.5 3e2"),
            vec![Tok::Int(1), Tok::Float(2.5), Tok::Float(300.0), Tok::Eof]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\"b""#), vec![Tok::Str("a\"b".into()), Tok::Eof]);
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("x.y == 'abc"),
            Err(ExpressionError::Syntax { .. })
        ));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(matches!(
            tokenize("x.y @ 1"),
            Err(ExpressionError::Syntax { offset: 4, .. })
        ));
    }
}
