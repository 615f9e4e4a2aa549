use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int64,
    Float64,
    Utf8,
    Null,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "BOOLEAN",
            DataType::Int64 => "BIGINT",
            DataType::Float64 => "DOUBLE",
            DataType::Utf8 => "VARCHAR",
            DataType::Null => "NULL",
        };
        f.write_str(name)
    }
}

/// A single value produced by expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Parse a numeric literal, preferring integers.
    pub fn parse_number(text: &str) -> Option<ScalarValue> {
        let text = text.trim();
        if let Ok(v) = text.parse::<i64>() {
            return Some(ScalarValue::Int64(v));
        }
        text.parse::<f64>().ok().map(ScalarValue::Float64)
    }

    /// Compare two non-null values of the same family.
    pub fn partial_cmp_same(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Int64(a), ScalarValue::Int64(b)) => Some(a.cmp(b)),
            (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => Some(a.cmp(b)),
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => Some(a.cmp(b)),
            (ScalarValue::Float64(a), ScalarValue::Float64(b)) => a.partial_cmp(b),
            (ScalarValue::Int64(a), ScalarValue::Float64(b)) => (*a as f64).partial_cmp(b),
            (ScalarValue::Float64(a), ScalarValue::Int64(b)) => a.partial_cmp(&(*b as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Boolean(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Utf8(v) => f.write_str(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(ScalarValue::parse_number("42"), Some(ScalarValue::Int64(42)));
        assert_eq!(
            ScalarValue::parse_number(" 1.5 "),
            Some(ScalarValue::Float64(1.5))
        );
        assert_eq!(ScalarValue::parse_number("abc"), None);
    }

    #[test]
    fn test_mixed_numeric_ordering() {
        let a = ScalarValue::Int64(2);
        let b = ScalarValue::Float64(2.5);
        assert_eq!(a.partial_cmp_same(&b), Some(Ordering::Less));
        assert_eq!(
            ScalarValue::Utf8("a".into()).partial_cmp_same(&ScalarValue::Int64(1)),
            None
        );
    }
}
