//! Raw cell values and their SQL-insertable form

use std::fmt;

use serde::Serialize;

/// A value as decoded from a catalog row
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    Text(String),
    /// Anything the decoder does not represent natively (vectors, bits, complex, descriptors)
    Other,
}

/// A value ready to be bound to an insert statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(v) => write!(f, "{v:?}"),
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

/// Coerce one raw value into its SQL form
///
/// Total over [`RawValue`]: NaN and unrepresentable values become `Null`,
/// booleans become `0`/`1`, byte strings are decoded as UTF-8 with invalid
/// sequences replaced.
pub fn sanitize(value: RawValue) -> SqlValue {
    match value {
        RawValue::Float(f) if f.is_nan() => SqlValue::Null,
        RawValue::Float(f) => SqlValue::Float(f),
        RawValue::Integer(i) => SqlValue::Int(i),
        RawValue::Boolean(b) => SqlValue::Int(i64::from(b)),
        RawValue::Bytes(bytes) => SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
        RawValue::Text(s) => SqlValue::Text(s),
        RawValue::Other => SqlValue::Null,
    }
}

pub fn sanitize_row(row: Vec<RawValue>) -> Vec<SqlValue> {
    row.into_iter().map(sanitize).collect()
}

/// Render a row for log output
pub fn display_row(row: &[SqlValue]) -> String {
    let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
    format!("[{}]", cells.join(", "))
}
