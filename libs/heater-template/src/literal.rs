//! Portable literal values for template variables
//!
//! Option values are written in Python-literal syntax (the host config value
//! syntax) and must survive a round trip through compact JSON:
//!
//! | Text | Literal |
//! |------|---------|
//! | `42`, `-7`, `0x1f`, `1_000` | `Int` |
//! | `2.5`, `.5`, `1e-3` | `Float` |
//! | `'abc'`, `"abc"`, `r'\d'` | `Str` |
//! | `True` / `true`, `False` / `false` | `Bool` |
//! | `None` / `null` | `Null` |
//! | `[1, 2]`, `(1, 2)` | `List` |
//! | `{'k': 1}` | `Map` |
//!
//! Parsed but rejected as not portable: set literals, byte strings, complex
//! numbers, non-string map keys, non-finite floats and integers outside `i64`.

use minijinja::value::ValueKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

const MAX_NESTING_DEPTH: usize = 32;

/// A portable literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Map(BTreeMap<String, Literal>),
}

/// Literal parse failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LiteralError {
    #[error("{message} at position {position}")]
    Syntax { position: usize, message: String },

    #[error("value is not portable: {0}")]
    NotPortable(String),
}

impl Literal {
    /// Parse a literal from host config value syntax
    pub fn parse(text: &str) -> Result<Self, LiteralError> {
        Parser::new(text).parse_document()
    }

    /// Short type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::List(_) => "list",
            Literal::Map(_) => "map",
        }
    }

    /// Convert into a template value
    pub fn to_template_value(&self) -> minijinja::Value {
        minijinja::Value::from_serialize(self)
    }

    /// Convert a template value back into a literal
    ///
    /// Fails for undefined values, callables and other opaque objects, and
    /// for numbers with no exact literal form (non-finite floats, integers
    /// outside `i64`).
    pub fn from_template_value(value: &minijinja::Value) -> Result<Self, LiteralError> {
        Self::convert_template_value(value, 0)
    }

    fn convert_template_value(value: &minijinja::Value, depth: usize) -> Result<Self, LiteralError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(LiteralError::NotPortable("value is nested too deeply".to_string()));
        }
        match value.kind() {
            ValueKind::None => Ok(Literal::Null),
            ValueKind::Bool => Ok(Literal::Bool(value.is_true())),
            ValueKind::String => value
                .as_str()
                .map(|s| Literal::Str(s.to_string()))
                .ok_or_else(|| not_portable("string value has no text")),
            ValueKind::Number => Self::convert_number(value),
            ValueKind::Seq | ValueKind::Iterable => {
                let items = value
                    .try_iter()
                    .map_err(|e| LiteralError::NotPortable(e.to_string()))?;
                items
                    .map(|item| Self::convert_template_value(&item, depth + 1))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Literal::List)
            },
            ValueKind::Map => {
                let keys = value
                    .try_iter()
                    .map_err(|e| LiteralError::NotPortable(e.to_string()))?;
                let mut map = BTreeMap::new();
                for key in keys {
                    let Some(name) = key.as_str() else {
                        return Err(not_portable(format!("map key {} is not a string", key)));
                    };
                    let item = value
                        .get_item(&key)
                        .map_err(|e| LiteralError::NotPortable(e.to_string()))?;
                    map.insert(name.to_string(), Self::convert_template_value(&item, depth + 1)?);
                }
                Ok(Literal::Map(map))
            },
            other => Err(LiteralError::NotPortable(format!(
                "{:?} value has no literal form",
                other
            ))),
        }
    }

    /// Integers stay integers; anything without an exact `i64`/finite `f64`
    /// form is rejected rather than rounded or nulled.
    fn convert_number(value: &minijinja::Value) -> Result<Self, LiteralError> {
        let number = match serde_json::to_value(value) {
            Ok(serde_json::Value::Number(number)) => number,
            Ok(serde_json::Value::Null) => {
                return Err(not_portable(format!("float {} is not finite", value)));
            },
            Ok(other) => {
                return Err(not_portable(format!("unexpected number form {}", other)));
            },
            Err(_) => {
                return Err(not_portable(format!("integer {} is out of range", value)));
            },
        };
        if let Some(int) = number.as_i64() {
            return Ok(Literal::Int(int));
        }
        if number.is_u64() {
            return Err(not_portable(format!("integer {} is out of range", number)));
        }
        match number.as_f64() {
            Some(float) if float.is_finite() => Ok(Literal::Float(float)),
            _ => Err(not_portable(format!("float {} is not finite", value))),
        }
    }
}

/// Compact JSON form
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

type ParseResult<T> = Result<T, LiteralError>;

fn not_portable(msg: impl Into<String>) -> LiteralError {
    LiteralError::NotPortable(msg.into())
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, depth: 0 }
    }

    fn syntax(&self, message: impl Into<String>) -> LiteralError {
        LiteralError::Syntax {
            position: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> ParseResult<()> {
        if self.eat(expected) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(found) => self.syntax(format!("expected '{}', found '{}'", expected, found)),
            None => self.syntax(format!("expected '{}'", expected)),
        })
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn parse_document(mut self) -> ParseResult<Literal> {
        self.skip_ws();
        if self.peek().is_none() {
            return Err(self.syntax("empty literal"));
        }
        let value = self.parse_value()?;
        self.skip_ws();
        match self.peek() {
            Some(c) => Err(self.syntax(format!("unexpected '{}'", c))),
            None => Ok(value),
        }
    }

    fn parse_value(&mut self) -> ParseResult<Literal> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.syntax("unexpected end of input")),
            Some('[') => self.nested(Self::parse_list),
            Some('(') => self.nested(Self::parse_tuple),
            Some('{') => self.nested(Self::parse_map),
            Some('\'' | '"') => self.parse_strings(),
            Some('b' | 'B') if matches!(self.peek_at(1), Some('\'' | '"')) => {
                Err(not_portable("byte strings are not portable"))
            },
            Some('r' | 'R' | 'u' | 'U') if matches!(self.peek_at(1), Some('\'' | '"')) => {
                self.parse_strings()
            },
            Some(c) if c.is_ascii_digit() || matches!(c, '+' | '-' | '.') => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_name(),
            Some(c) => Err(self.syntax(format!("unexpected '{}'", c))),
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> ParseResult<Literal>) -> ParseResult<Literal> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.syntax("nesting too deep"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Comma separated values up to `close`; the flag reports a seen comma
    fn parse_sequence(&mut self, close: char) -> ParseResult<(Vec<Literal>, bool)> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Ok((items, saw_comma));
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            if self.eat(',') {
                saw_comma = true;
                continue;
            }
            if self.eat(close) {
                return Ok((items, saw_comma));
            }
            return Err(match self.peek() {
                Some(c) => self.syntax(format!("expected ',' or '{}', found '{}'", close, c)),
                None => self.syntax(format!("expected '{}'", close)),
            });
        }
    }

    fn parse_list(&mut self) -> ParseResult<Literal> {
        self.expect('[')?;
        let (items, _) = self.parse_sequence(']')?;
        Ok(Literal::List(items))
    }

    fn parse_tuple(&mut self) -> ParseResult<Literal> {
        self.expect('(')?;
        let (mut items, saw_comma) = self.parse_sequence(')')?;
        // `(x)` is a parenthesized value, `(x,)` a one-element tuple
        if items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Literal::List(items))
    }

    fn parse_map(&mut self) -> ParseResult<Literal> {
        self.expect('{')?;
        let mut map = BTreeMap::new();
        self.skip_ws();
        if self.eat('}') {
            return Ok(Literal::Map(map));
        }

        let mut first = true;
        loop {
            let key = self.parse_value()?;
            self.skip_ws();
            if first && matches!(self.peek(), Some(',' | '}')) {
                return Err(not_portable("set literals are not portable"));
            }
            first = false;
            self.expect(':')?;

            let key = match key {
                Literal::Str(key) => key,
                other => {
                    return Err(not_portable(format!(
                        "map keys must be strings, found {}",
                        other.type_name()
                    )))
                },
            };
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_ws();
            if self.eat(',') {
                self.skip_ws();
                if self.eat('}') {
                    break;
                }
                continue;
            }
            if self.eat('}') {
                break;
            }
            return Err(match self.peek() {
                Some(c) => self.syntax(format!("expected ',' or '}}', found '{}'", c)),
                None => self.syntax("expected '}'"),
            });
        }
        Ok(Literal::Map(map))
    }

    /// One or more adjacent string literals, concatenated
    fn parse_strings(&mut self) -> ParseResult<Literal> {
        let mut out = String::new();
        loop {
            self.parse_string(&mut out)?;
            self.skip_ws();
            let next_is_string = match self.peek() {
                Some('\'' | '"') => true,
                Some('r' | 'R' | 'u' | 'U') => matches!(self.peek_at(1), Some('\'' | '"')),
                _ => false,
            };
            if !next_is_string {
                return Ok(Literal::Str(out));
            }
        }
    }

    fn parse_string(&mut self, out: &mut String) -> ParseResult<()> {
        let raw = match self.peek() {
            Some('r' | 'R') => {
                self.bump();
                true
            },
            Some('u' | 'U') => {
                self.bump();
                false
            },
            _ => false,
        };
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.syntax("expected string")),
        };

        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.syntax("unterminated string")),
                Some(c) if c == quote => return Ok(()),
                Some('\\') if raw => {
                    out.push('\\');
                    match self.bump() {
                        Some(c) => out.push(c),
                        None => return Err(self.syntax("unterminated string")),
                    }
                },
                Some('\\') => self.parse_escape(out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> ParseResult<()> {
        let c = self
            .bump()
            .ok_or_else(|| self.syntax("unterminated string"))?;
        match c {
            '\n' => {},
            '\\' | '\'' | '"' => out.push(c),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'x' => out.push(self.parse_hex_escape(2)?),
            'u' => out.push(self.parse_hex_escape(4)?),
            'U' => out.push(self.parse_hex_escape(8)?),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        },
                        None => break,
                    }
                }
                out.push(
                    char::from_u32(code).ok_or_else(|| self.syntax("invalid octal escape"))?,
                );
            },
            // Unknown escapes keep the backslash
            other => {
                out.push('\\');
                out.push(other);
            },
        }
        Ok(())
    }

    fn parse_hex_escape(&mut self, digits: usize) -> ParseResult<char> {
        let mut code: u32 = 0;
        for _ in 0..digits {
            let d = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.syntax(format!("truncated escape, expected {} hex digits", digits)))?;
            self.bump();
            code = code * 16 + d;
        }
        char::from_u32(code).ok_or_else(|| self.syntax("escape is not a valid character"))
    }

    fn parse_number(&mut self) -> ParseResult<Literal> {
        let negative = match self.peek() {
            Some('-') => {
                self.bump();
                true
            },
            Some('+') => {
                self.bump();
                false
            },
            _ => false,
        };
        self.skip_ws();
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')) {
            self.bump();
            let radix = match self.bump() {
                Some('x' | 'X') => 16,
                Some('o' | 'O') => 8,
                _ => 2,
            };
            let digits: String = self
                .take_while(|c| c.is_ascii_alphanumeric() || c == '_')
                .chars()
                .filter(|c| *c != '_')
                .collect();
            let magnitude = i128::from_str_radix(&digits, radix).map_err(|_| LiteralError::Syntax {
                position: start,
                message: format!("invalid integer literal '{}'", &self.src[start..self.pos]),
            })?;
            return finish_int(negative, magnitude);
        }

        let is_digit = |c: char| c.is_ascii_digit() || c == '_';
        let mut is_float = false;
        self.take_while(is_digit);
        if self.eat('.') {
            is_float = true;
            self.take_while(is_digit);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if self.take_while(is_digit).is_empty() {
                return Err(self.syntax("invalid exponent"));
            }
        }
        let text: String = self.src[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();

        if matches!(self.peek(), Some('j' | 'J')) {
            return Err(not_portable("complex numbers are not portable"));
        }
        if matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            return Err(self.syntax("invalid number"));
        }
        let invalid = || LiteralError::Syntax {
            position: start,
            message: format!("invalid number '{}'", &self.src[start..self.pos]),
        };
        if text.is_empty() || text == "." {
            return Err(invalid());
        }

        if is_float {
            let magnitude: f64 = text.parse().map_err(|_| invalid())?;
            if !magnitude.is_finite() {
                return Err(not_portable(format!("float '{}' is not finite", text)));
            }
            return Ok(Literal::Float(if negative { -magnitude } else { magnitude }));
        }

        if text.len() > 1 && text.starts_with('0') && text.chars().any(|c| c != '0') {
            return Err(LiteralError::Syntax {
                position: start,
                message: "leading zeros in decimal integer literals are not permitted".to_string(),
            });
        }
        let magnitude: i128 = text
            .parse()
            .map_err(|_| not_portable(format!("integer {} does not fit in 64 bits", text)))?;
        finish_int(negative, magnitude)
    }

    fn parse_name(&mut self) -> ParseResult<Literal> {
        let start = self.pos;
        let name = self.take_while(|c| c.is_alphanumeric() || c == '_');
        match name {
            "True" | "true" => Ok(Literal::Bool(true)),
            "False" | "false" => Ok(Literal::Bool(false)),
            "None" | "null" => Ok(Literal::Null),
            _ => Err(LiteralError::Syntax {
                position: start,
                message: format!("unknown name '{}'", name),
            }),
        }
    }
}

fn finish_int(negative: bool, magnitude: i128) -> ParseResult<Literal> {
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value)
        .map(Literal::Int)
        .map_err(|_| not_portable(format!("integer {} does not fit in 64 bits", value)))
}
