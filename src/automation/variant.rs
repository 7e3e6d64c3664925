//! Values crossing the native automation boundary.

use crate::automation::native::Dispatch;
use crate::error::{CrebassError, Result};
use std::fmt;
use std::sync::Arc;

/// A value read from or written to a native automation member.
#[derive(Clone)]
pub enum Variant {
    Empty,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(Arc<dyn Dispatch>),
}

impl Variant {
    pub fn is_object(&self) -> bool {
        matches!(self, Variant::Object(_))
    }

    /// Empty and null both mean "nothing there".
    pub fn is_nothing(&self) -> bool {
        matches!(self, Variant::Empty | Variant::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            Variant::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i),
            Variant::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Variant::Bool(b) => Some(i64::from(*b)),
            Variant::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Float(f) => Some(*f),
            Variant::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "Empty"),
            Variant::Null => write!(f, "Null"),
            Variant::Bool(b) => write!(f, "Bool({})", b),
            Variant::Int(i) => write!(f, "Int({})", i),
            Variant::Float(x) => write!(f, "Float({})", x),
            Variant::Str(s) => write!(f, "Str({:?})", s),
            Variant::Object(_) => write!(f, "Object"),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "undefined"),
            Variant::Null => write!(f, "null"),
            Variant::Bool(b) => write!(f, "{}", b),
            Variant::Int(i) => write!(f, "{}", i),
            Variant::Float(x) => write!(f, "{}", x),
            Variant::Str(s) => write!(f, "{}", s),
            Variant::Object(_) => write!(f, "[object]"),
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Variant::Empty, Variant::Empty) | (Variant::Null, Variant::Null) => true,
            (Variant::Bool(a), Variant::Bool(b)) => a == b,
            (Variant::Int(a), Variant::Int(b)) => a == b,
            (Variant::Float(a), Variant::Float(b)) => a == b,
            (Variant::Str(a), Variant::Str(b)) => a == b,
            (Variant::Object(a), Variant::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int(i64::from(v))
    }
}

impl From<u64> for Variant {
    fn from(v: u64) -> Self {
        Variant::Int(v as i64)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Float(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Str(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::Str(v)
    }
}

impl<T: Into<Variant>> From<Option<T>> for Variant {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Variant::Empty)
    }
}

/// Conversion from a scalar read off a native member.
pub trait FromVariant: Sized {
    fn from_variant(member: &str, value: Variant) -> Result<Self>;
}

fn mismatch(member: &str, expected: &str, value: &Variant) -> CrebassError {
    CrebassError::dispatch(member, format!("expected {}, got {:?}", expected, value))
}

impl FromVariant for bool {
    fn from_variant(member: &str, value: Variant) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| mismatch(member, "bool", &value))
    }
}

impl FromVariant for i64 {
    fn from_variant(member: &str, value: Variant) -> Result<Self> {
        value
            .as_i64()
            .ok_or_else(|| mismatch(member, "integer", &value))
    }
}

impl FromVariant for f64 {
    fn from_variant(member: &str, value: Variant) -> Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| mismatch(member, "number", &value))
    }
}

impl FromVariant for String {
    fn from_variant(member: &str, value: Variant) -> Result<Self> {
        match value {
            Variant::Str(s) => Ok(s),
            Variant::Empty | Variant::Null => Ok(String::new()),
            other => Ok(other.to_string()),
        }
    }
}

impl FromVariant for Variant {
    fn from_variant(_member: &str, value: Variant) -> Result<Self> {
        Ok(value)
    }
}
