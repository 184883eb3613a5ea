//! Data type tags and per-type comparators

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::DataValue;
use crate::errors::{ExecError, ExecResult};

/// Comparison capability of a data type.
///
/// Resolved once per column so the sort loop never re-dispatches on the type tag.
pub type CompareFn = fn(&DataValue, &DataValue) -> ExecResult<Ordering>;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float64,
    Boolean,
    String,
}

impl DataType {
    /// Returns the type name used in schemas and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int8 => "Int8",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::UInt8 => "UInt8",
            DataType::UInt16 => "UInt16",
            DataType::UInt32 => "UInt32",
            DataType::UInt64 => "UInt64",
            DataType::Float64 => "Float64",
            DataType::Boolean => "Boolean",
            DataType::String => "String",
        }
    }

    /// Parses a type name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "int8" => DataType::Int8,
            "int16" => DataType::Int16,
            "int32" => DataType::Int32,
            "int64" => DataType::Int64,
            "uint8" => DataType::UInt8,
            "uint16" => DataType::UInt16,
            "uint32" => DataType::UInt32,
            "uint64" => DataType::UInt64,
            "float64" => DataType::Float64,
            "boolean" | "bool" => DataType::Boolean,
            "string" => DataType::String,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(
            self,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
        )
    }

    /// Returns true if `value` belongs to this type's value domain.
    ///
    /// Null belongs to every domain. Integers must fit the declared width.
    pub fn accepts(&self, value: &DataValue) -> bool {
        match (self, value) {
            (_, DataValue::Null) => true,
            (DataType::Int8, DataValue::Int(v)) => i8::try_from(*v).is_ok(),
            (DataType::Int16, DataValue::Int(v)) => i16::try_from(*v).is_ok(),
            (DataType::Int32, DataValue::Int(v)) => i32::try_from(*v).is_ok(),
            (DataType::Int64, DataValue::Int(_)) => true,
            (DataType::UInt8, DataValue::UInt(v)) => u8::try_from(*v).is_ok(),
            (DataType::UInt16, DataValue::UInt(v)) => u16::try_from(*v).is_ok(),
            (DataType::UInt32, DataValue::UInt(v)) => u32::try_from(*v).is_ok(),
            (DataType::UInt64, DataValue::UInt(_)) => true,
            (DataType::Float64, DataValue::Float(_)) => true,
            (DataType::Boolean, DataValue::Boolean(_)) => true,
            (DataType::String, DataValue::String(_)) => true,
            _ => false,
        }
    }

    /// Returns the total-order comparator for this type.
    ///
    /// Null sorts before every non-null value. A value outside the type's
    /// domain makes the comparison fail.
    pub fn comparator(&self) -> CompareFn {
        if self.is_signed_integer() {
            compare_signed
        } else if self.is_unsigned_integer() {
            compare_unsigned
        } else {
            match self {
                DataType::Float64 => compare_float,
                DataType::Boolean => compare_boolean,
                _ => compare_string,
            }
        }
    }

    /// Converts a JSON scalar into a value of this type
    pub fn value_from_json(&self, json: &serde_json::Value) -> ExecResult<DataValue> {
        use serde_json::Value;

        let value = match (self, json) {
            (_, Value::Null) => DataValue::Null,
            (ty, Value::Number(n)) if ty.is_signed_integer() => n
                .as_i64()
                .map(DataValue::Int)
                .ok_or_else(|| mismatch(ty, json))?,
            (ty, Value::Number(n)) if ty.is_unsigned_integer() => n
                .as_u64()
                .map(DataValue::UInt)
                .ok_or_else(|| mismatch(ty, json))?,
            (DataType::Float64, Value::Number(n)) => n
                .as_f64()
                .map(DataValue::Float)
                .ok_or_else(|| mismatch(self, json))?,
            (DataType::Boolean, Value::Bool(b)) => DataValue::Boolean(*b),
            (DataType::String, Value::String(s)) => DataValue::String(s.clone()),
            (ty, _) => return Err(mismatch(ty, json)),
        };

        if !self.accepts(&value) {
            return Err(mismatch(self, json));
        }
        Ok(value)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn mismatch(ty: &DataType, json: &serde_json::Value) -> ExecError {
    ExecError::schema_mismatch(format!("value {} is not a valid {}", json, ty))
}

fn incomparable(a: &DataValue, b: &DataValue) -> ExecError {
    ExecError::execution(format!(
        "cannot compare {} value with {} value",
        a.variant_name(),
        b.variant_name()
    ))
}

/// Orders nulls first; returns None when both sides are non-null
fn compare_nulls(a: &DataValue, b: &DataValue) -> Option<Ordering> {
    match (a.is_null(), b.is_null()) {
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Less),
        (false, true) => Some(Ordering::Greater),
        (false, false) => None,
    }
}

fn compare_signed(a: &DataValue, b: &DataValue) -> ExecResult<Ordering> {
    if let Some(ordering) = compare_nulls(a, b) {
        return Ok(ordering);
    }
    match (a, b) {
        (DataValue::Int(x), DataValue::Int(y)) => Ok(x.cmp(y)),
        _ => Err(incomparable(a, b)),
    }
}

fn compare_unsigned(a: &DataValue, b: &DataValue) -> ExecResult<Ordering> {
    if let Some(ordering) = compare_nulls(a, b) {
        return Ok(ordering);
    }
    match (a, b) {
        (DataValue::UInt(x), DataValue::UInt(y)) => Ok(x.cmp(y)),
        _ => Err(incomparable(a, b)),
    }
}

fn compare_float(a: &DataValue, b: &DataValue) -> ExecResult<Ordering> {
    if let Some(ordering) = compare_nulls(a, b) {
        return Ok(ordering);
    }
    match (a, b) {
        (DataValue::Float(x), DataValue::Float(y)) => Ok(x.total_cmp(y)),
        _ => Err(incomparable(a, b)),
    }
}

fn compare_boolean(a: &DataValue, b: &DataValue) -> ExecResult<Ordering> {
    if let Some(ordering) = compare_nulls(a, b) {
        return Ok(ordering);
    }
    match (a, b) {
        (DataValue::Boolean(x), DataValue::Boolean(y)) => Ok(x.cmp(y)),
        _ => Err(incomparable(a, b)),
    }
}

fn compare_string(a: &DataValue, b: &DataValue) -> ExecResult<Ordering> {
    if let Some(ordering) = compare_nulls(a, b) {
        return Ok(ordering);
    }
    match (a, b) {
        (DataValue::String(x), DataValue::String(y)) => Ok(x.cmp(y)),
        _ => Err(incomparable(a, b)),
    }
}
