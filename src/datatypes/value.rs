//! Runtime values

use std::fmt;

/// A single cell value.
///
/// Integers of every width share the widest representation; the column's
/// `DataType` bounds the domain.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Returns the variant name for diagnostics
    pub fn variant_name(&self) -> &'static str {
        match self {
            DataValue::Null => "Null",
            DataValue::Int(_) => "Int",
            DataValue::UInt(_) => "UInt",
            DataValue::Float(_) => "Float",
            DataValue::Boolean(_) => "Boolean",
            DataValue::String(_) => "String",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to a JSON scalar
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            DataValue::Null => Value::Null,
            DataValue::Int(v) => Value::from(*v),
            DataValue::UInt(v) => Value::from(*v),
            DataValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            DataValue::Boolean(b) => Value::Bool(*b),
            DataValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "NULL"),
            DataValue::Int(v) => write!(f, "{}", v),
            DataValue::UInt(v) => write!(f, "{}", v),
            DataValue::Float(v) => write!(f, "{}", v),
            DataValue::Boolean(b) => write!(f, "{}", b),
            DataValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Int(v)
    }
}

impl From<i32> for DataValue {
    fn from(v: i32) -> Self {
        DataValue::Int(v as i64)
    }
}

impl From<u64> for DataValue {
    fn from(v: u64) -> Self {
        DataValue::UInt(v)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Float(v)
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Boolean(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::String(v.to_string())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::String(v)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(DataValue::Null)
    }
}
