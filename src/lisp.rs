//! Lisp values as exchanged with Emacs.
//!
//! Values print in a form the Emacs reader accepts (`Display`), and
//! [`read`] parses the subset of Emacs Lisp syntax Emacs sends back:
//! integers, floats, strings, symbols, quoted forms and proper lists.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    T,
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    Quoted(Box<Value>),
    List(Vec<Value>),
}

impl Value {
    pub fn symbol(name: impl Into<String>) -> Self {
        Value::Symbol(name.into())
    }

    pub fn quote(value: Value) -> Self {
        Value::Quoted(Box::new(value))
    }

    /// A list result as Emacs evaluates it: `'(a b)`, or `nil` when empty.
    pub fn quoted_list(items: Vec<Value>) -> Self {
        if items.is_empty() {
            Value::Nil
        } else {
            Value::quote(Value::List(items))
        }
    }

    pub fn is_nil(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a list, looking through a quote. `nil` is the empty list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::Nil => Some(&[]),
            Value::List(items) => Some(items),
            Value::Quoted(inner) => inner.as_list(),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        if b { Value::T } else { Value::Nil }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::quoted_list(items.into_iter().map(Value::Str).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::T => f.write_str("t"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write_float(f, *n),
            Value::Str(s) => write_string(f, s),
            Value::Symbol(s) => write_symbol(f, s),
            Value::Quoted(inner) => write!(f, "'{inner}"),
            Value::List(items) if items.is_empty() => f.write_str("nil"),
            Value::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        f.write_str("0.0e+NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "1.0e+INF" } else { "-1.0e+INF" })
    } else {
        // Debug keeps the fraction on whole numbers (`2.0`), so Emacs reads a float.
        write!(f, "{n:?}")
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            // one response per line
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            _ => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

fn write_symbol(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    for c in s.chars() {
        if is_delimiter(c) || matches!(c, '\\' | '`' | ',' | '#' | '[' | ']') {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | '\'' | ';')
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unexpected ')' at offset {0}")]
    UnexpectedClose(usize),

    #[error("trailing input at offset {0}")]
    TrailingInput(usize),

    #[error("unsupported escape '\\{0}' in string")]
    BadEscape(char),
}

/// Parses exactly one form from `text`.
pub fn read(text: &str) -> Result<Value, ReadError> {
    let mut reader = Reader {
        chars: text.char_indices().peekable(),
    };
    let value = reader.form()?;
    reader.skip_blank();
    match reader.chars.peek() {
        Some(&(offset, _)) => Err(ReadError::TrailingInput(offset)),
        None => Ok(value),
    }
}

struct Reader<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Reader<'_> {
    fn skip_blank(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else if c == ';' {
                for (_, c) in self.chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn form(&mut self) -> Result<Value, ReadError> {
        self.skip_blank();
        let Some(&(offset, c)) = self.chars.peek() else {
            return Err(ReadError::UnexpectedEof);
        };
        match c {
            '(' => {
                self.chars.next();
                self.list()
            }
            ')' => Err(ReadError::UnexpectedClose(offset)),
            '\'' => {
                self.chars.next();
                Ok(Value::quote(self.form()?))
            }
            '"' => {
                self.chars.next();
                self.string()
            }
            _ => Ok(self.atom()),
        }
    }

    fn list(&mut self) -> Result<Value, ReadError> {
        let mut items = Vec::new();
        loop {
            self.skip_blank();
            match self.chars.peek() {
                None => return Err(ReadError::UnexpectedEof),
                Some(&(_, ')')) => {
                    self.chars.next();
                    return Ok(if items.is_empty() {
                        Value::Nil
                    } else {
                        Value::List(items)
                    });
                }
                Some(_) => items.push(self.form()?),
            }
        }
    }

    fn string(&mut self) -> Result<Value, ReadError> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '"' => return Ok(Value::Str(out)),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, 'e')) => out.push('\u{1b}'),
                    Some((_, '"')) => out.push('"'),
                    Some((_, '\\')) => out.push('\\'),
                    Some((_, '\n')) | Some((_, ' ')) => {}
                    Some((_, other)) => return Err(ReadError::BadEscape(other)),
                    None => return Err(ReadError::UnexpectedEof),
                },
                _ => out.push(c),
            }
        }
        Err(ReadError::UnexpectedEof)
    }

    fn atom(&mut self) -> Value {
        let mut token = String::new();
        let mut escaped = false;
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\\' {
                self.chars.next();
                if let Some((_, next)) = self.chars.next() {
                    token.push(next);
                    escaped = true;
                }
                continue;
            }
            if is_delimiter(c) {
                break;
            }
            token.push(c);
            self.chars.next();
        }

        if escaped {
            return Value::Symbol(token);
        }
        match token.as_str() {
            "nil" => Value::Nil,
            "t" => Value::T,
            _ => parse_number(&token).unwrap_or(Value::Symbol(token)),
        }
    }
}

fn parse_number(token: &str) -> Option<Value> {
    let digits = token.trim_start_matches(['+', '-']);
    if !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let int_token = token.strip_suffix('.').unwrap_or(token);
    if let Ok(n) = int_token.strip_prefix('+').unwrap_or(int_token).parse::<i64>() {
        return Some(Value::Int(n));
    }
    if token.chars().any(|c| c.is_ascii_digit()) {
        return token.parse::<f64>().ok().map(Value::Float);
    }
    None
}
