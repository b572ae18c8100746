//! Dynamic cell values

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single cell value as seen by sorting, filtering and editing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Total order used by the grid and the stores.
    ///
    /// `Null` sorts lowest. Text compares case-insensitively first and falls
    /// back to the raw bytes so distinct strings never tie. Values of
    /// different kinds order by kind.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => compare_text(a, b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    /// Case-insensitive substring match on the rendered value
    pub fn contains_text(&self, needle: &str) -> bool {
        if self.is_null() {
            return false;
        }
        self.to_string()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Timestamp(_) => 3,
            Value::Text(_) => 4,
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
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

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sorts_lowest() {
        assert_eq!(Value::Null.compare(&Value::from("a")), Ordering::Less);
        assert_eq!(Value::Int(-5).compare(&Value::Null), Ordering::Greater);
    }

    #[test]
    fn test_text_ignores_case_first() {
        assert_eq!(Value::from("apple").compare(&Value::from("Banana")), Ordering::Less);
        assert_ne!(Value::from("abc").compare(&Value::from("ABC")), Ordering::Equal);
    }

    #[test]
    fn test_numbers_compare_numerically() {
        assert_eq!(Value::Int(9).compare(&Value::Int(10)), Ordering::Less);
    }

    #[test]
    fn test_contains_text() {
        assert!(Value::from("McAllister").contains_text("all"));
        assert!(!Value::Null.contains_text(""));
    }
}
