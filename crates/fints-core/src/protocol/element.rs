//! Primitive data element kinds and decoded values.
//!
//! Every kind is one variant of [`Primitive`]; encode and decode are a single
//! exhaustive match each. Empty wire text never reaches these functions: the
//! group composer maps it to an absent value first.

use std::fmt;

use bytes::Bytes;
use chrono::{NaiveDate, NaiveTime};

use crate::error::{FintsError, Result, Violation};
use crate::protocol::syntax;

const DATE_FORMAT: &str = "%Y%m%d";
const TIME_FORMAT: &str = "%H%M%S";

/// Scalar element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Free text, line breaks allowed.
    Text { max_len: Option<usize> },
    /// Text without line breaks.
    AlphaNumeric { max_len: Option<usize> },
    /// Length-framed raw bytes.
    Binary { max_len: Option<usize> },
    /// Non-negative integer.
    Numeric { max_len: Option<usize> },
    /// Non-negative integer, zero padded to `width`.
    Digits { width: usize },
    /// Non-negative decimal with a comma separator.
    Float { max_len: Option<usize> },
    /// `YYYYMMDD`.
    Date,
    /// `HHMMSS`.
    Time,
    /// `J` / `N`.
    Boolean,
}

impl Primitive {
    pub const IDENTIFICATION: Primitive = Primitive::AlphaNumeric { max_len: Some(30) };
    pub const CURRENCY: Primitive = Primitive::AlphaNumeric { max_len: Some(3) };
    pub const COUNTRY: Primitive = Primitive::Digits { width: 3 };
    pub const AMOUNT: Primitive = Primitive::Float { max_len: Some(15) };

    /// Render `value` to wire bytes (already escaped or framed).
    pub fn encode(&self, value: &Value, name: &str) -> Result<Vec<u8>> {
        let fail = |v: Violation| FintsError::encode(name, v);
        match *self {
            Primitive::Text { max_len } => {
                let s = value.as_str().ok_or_else(|| fail(wrong("text")))?;
                check_len(s.chars().count(), max_len).map_err(fail)?;
                syntax::escape(s).map_err(fail)
            }
            Primitive::AlphaNumeric { max_len } => {
                let s = value.as_str().ok_or_else(|| fail(wrong("alphanumeric")))?;
                if s.contains(&['\r', '\n'][..]) {
                    return Err(fail(Violation::LineBreak));
                }
                check_len(s.chars().count(), max_len).map_err(fail)?;
                syntax::escape(s).map_err(fail)
            }
            Primitive::Binary { max_len } => {
                let b = value.as_bytes().ok_or_else(|| fail(wrong("binary")))?;
                check_len(b.len(), max_len).map_err(fail)?;
                let mut out = format!("@{}@", b.len()).into_bytes();
                out.extend_from_slice(b);
                Ok(out)
            }
            Primitive::Numeric { max_len } => {
                let n = number(value).map_err(fail)?;
                let s = n.to_string();
                check_len(s.len(), max_len).map_err(fail)?;
                Ok(s.into_bytes())
            }
            Primitive::Digits { width } => {
                let n = number(value).map_err(fail)?;
                let s = n.to_string();
                check_len(s.len(), Some(width)).map_err(fail)?;
                Ok(format!("{n:0>width$}").into_bytes())
            }
            Primitive::Float { max_len } => {
                let f = match value {
                    Value::Float(f) => *f,
                    Value::Number(n) => *n as f64,
                    _ => return Err(fail(wrong("float"))),
                };
                if !f.is_finite() {
                    return Err(fail(Violation::Malformed("not a finite number".into())));
                }
                if f < 0.0 {
                    return Err(fail(Violation::Negative));
                }
                let plain = f.to_string();
                check_len(plain.len(), max_len).map_err(fail)?;
                let mut s = plain.replace('.', ",");
                if !s.contains(',') {
                    s.push(',');
                }
                Ok(s.into_bytes())
            }
            Primitive::Date => match value {
                Value::Date(d) => Ok(d.format(DATE_FORMAT).to_string().into_bytes()),
                _ => Err(fail(wrong("date"))),
            },
            Primitive::Time => match value {
                Value::Time(t) => Ok(t.format(TIME_FORMAT).to_string().into_bytes()),
                _ => Err(fail(wrong("time"))),
            },
            Primitive::Boolean => match value {
                Value::Bool(true) => Ok(b"J".to_vec()),
                Value::Bool(false) => Ok(b"N".to_vec()),
                _ => Err(fail(wrong("boolean"))),
            },
        }
    }

    /// Parse non-empty wire bytes into a value.
    pub fn decode(&self, raw: &[u8], name: &str) -> Result<Value> {
        let fail = |v: Violation| FintsError::decode(name, v);
        match *self {
            Primitive::Text { .. } | Primitive::AlphaNumeric { .. } => {
                Ok(Value::Text(syntax::unescape(raw)))
            }
            Primitive::Binary { .. } => {
                let (start, len) = syntax::binary_header(raw, 0)
                    .filter(|_| raw.first() == Some(&syntax::BINARY_MARKER))
                    .ok_or_else(|| fail(Violation::Malformed("missing @len@ header".into())))?;
                let payload = start
                    .checked_add(len)
                    .and_then(|end| raw.get(start..end))
                    .ok_or_else(|| {
                        fail(Violation::Malformed(format!("frame announces {len} bytes")))
                    })?;
                Ok(Value::Binary(Bytes::copy_from_slice(payload)))
            }
            Primitive::Numeric { .. } | Primitive::Digits { .. } => {
                let s = ascii(raw).map_err(fail)?;
                s.parse::<u64>()
                    .map(Value::Number)
                    .map_err(|_| fail(Violation::Malformed(format!("'{s}' is not a number"))))
            }
            Primitive::Float { .. } => {
                let s = ascii(raw).map_err(fail)?.replace(',', ".");
                let s = s.strip_suffix('.').unwrap_or(&s);
                s.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| fail(Violation::Malformed(format!("'{s}' is not a decimal"))))
            }
            Primitive::Date => {
                let s = ascii(raw).map_err(fail)?;
                NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .map(Value::Date)
                    .map_err(|e| fail(Violation::Malformed(format!("date '{s}': {e}"))))
            }
            Primitive::Time => {
                let s = ascii(raw).map_err(fail)?;
                NaiveTime::parse_from_str(s, TIME_FORMAT)
                    .map(Value::Time)
                    .map_err(|e| fail(Violation::Malformed(format!("time '{s}': {e}"))))
            }
            Primitive::Boolean => match raw {
                b"J" => Ok(Value::Bool(true)),
                b"N" => Ok(Value::Bool(false)),
                other => Err(fail(Violation::Malformed(format!(
                    "'{}' is neither J nor N",
                    syntax::from_latin1(other)
                )))),
            },
        }
    }
}

fn wrong(expected: &'static str) -> Violation {
    Violation::WrongKind { expected }
}

fn check_len(len: usize, max: Option<usize>) -> std::result::Result<(), Violation> {
    match max {
        Some(max) if len > max => Err(Violation::TooLong { len, max }),
        _ => Ok(()),
    }
}

fn number(value: &Value) -> std::result::Result<u64, Violation> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(wrong("number")),
    }
}

fn ascii(raw: &[u8]) -> std::result::Result<&str, Violation> {
    std::str::from_utf8(raw)
        .ok()
        .filter(|s| s.is_ascii())
        .ok_or_else(|| Violation::Malformed("expected ASCII digits".into()))
}

/// A decoded element value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Binary(Bytes),
    Number(u64),
    Float(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    Bool(bool),
    /// Members of a fixed tuple group.
    Group(Fields),
    /// Repetitions of one element.
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Fields> {
        match self {
            Value::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Repetitions; a single value reads as a one-element list.
    pub fn as_list(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Group(g) => write!(f, "{g:?}"),
            Value::List(items) => write!(f, "{} items", items.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(u64::from(n))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Number(u64::from(n))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Binary(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<Fields> for Value {
    fn from(g: Fields) -> Self {
        Value::Group(g)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Ordered name/value record of one segment body or group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(&'static str, Value)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder form of [`Fields::set`].
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace `name`.
    pub fn set(&mut self, name: &'static str, value: impl Into<Value>) {
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.0.iter().position(|(n, _)| *n == name)?;
        Some(self.0.remove(idx).1)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn number(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn bytes(&self, name: &str) -> Option<&Bytes> {
        self.get(name).and_then(Value::as_bytes)
    }

    pub fn group(&self, name: &str) -> Option<&Fields> {
        self.get(name).and_then(Value::as_group)
    }

    /// Repetitions of `name`; empty when absent.
    pub fn list(&self, name: &str) -> &[Value] {
        self.get(name).map(Value::as_list).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.0.iter().map(|(n, v)| (*n, v))
    }
}
