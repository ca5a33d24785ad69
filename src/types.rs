//! Core type definitions
//!
//! Includes the dynamic SQL [`Value`], conversions between Rust field types and
//! values, column types for DDL and the declarative relation/fetch/generation flags.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OrmError, Result};

// ============================================================================
// Values
// ============================================================================

/// A dynamically typed SQL value held by a table field or a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value as an inline SQL literal
    ///
    /// Strings (and uuid/timestamp text) are single-quoted with embedded quotes
    /// doubled; numbers are bare.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => quote_text(s),
            Value::Uuid(u) => quote_text(&u.to_string()),
            Value::Timestamp(ts) => quote_text(&ts.to_rfc3339()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_literal())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    String => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// Field <-> Value conversions
// ============================================================================

/// A Rust type that can back a mapped column
pub trait SqlValue: Sized {
    /// Column type used when generating DDL
    fn column_type() -> ColumnType;

    /// Whether the column accepts NULL
    fn nullable() -> bool {
        false
    }

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(OrmError::value_conversion(format!(
        "expected {}, got {} value {}",
        expected,
        value.kind(),
        value
    )))
}

impl SqlValue for i64 {
    fn column_type() -> ColumnType {
        ColumnType::BigInt
    }

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            // Allow string-to-integer coercion (drivers that hand back text)
            Value::Text(ref s) => s.parse::<i64>().or_else(|_| mismatch("integer", &value)),
            other => mismatch("integer", &other),
        }
    }
}

impl SqlValue for i32 {
    fn column_type() -> ColumnType {
        ColumnType::Integer
    }

    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide)
            .map_err(|_| OrmError::value_conversion(format!("{} does not fit in i32", wide)))
    }
}

impl SqlValue for f64 {
    fn column_type() -> ColumnType {
        ColumnType::Double
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => mismatch("float", &other),
        }
    }
}

impl SqlValue for bool {
    fn column_type() -> ColumnType {
        ColumnType::Boolean
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => mismatch("boolean", &other),
        }
    }
}

impl SqlValue for String {
    fn column_type() -> ColumnType {
        ColumnType::String
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => mismatch("text", &other),
        }
    }
}

impl SqlValue for Uuid {
    fn column_type() -> ColumnType {
        ColumnType::Uuid
    }

    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(u) => Ok(u),
            Value::Text(ref s) => Uuid::parse_str(s).or_else(|_| mismatch("uuid", &value)),
            other => mismatch("uuid", &other),
        }
    }
}

impl SqlValue for DateTime<Utc> {
    fn column_type() -> ColumnType {
        ColumnType::Timestamp
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::Text(ref s) => DateTime::parse_from_rfc3339(s)
                .map(|ts| ts.with_timezone(&Utc))
                .or_else(|_| mismatch("timestamp", &value)),
            other => mismatch("timestamp", &other),
        }
    }
}

impl<T: SqlValue> SqlValue for Option<T> {
    fn column_type() -> ColumnType {
        T::column_type()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Value {
        self.as_ref().map(T::to_value).unwrap_or(Value::Null)
    }

    fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

// ============================================================================
// Column types (for DDL)
// ============================================================================

/// Column type of a mapped field, used for DDL generation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Variable length text (maps to VARCHAR(255))
    String,
    /// 32-bit integer (maps to INTEGER)
    Integer,
    /// 64-bit integer (maps to BIGINT)
    BigInt,
    /// Double precision float
    Double,
    /// Boolean field (maps to BOOLEAN)
    Boolean,
    /// Timestamp, always stored in UTC (maps to TIMESTAMP WITH TIME ZONE)
    Timestamp,
    /// UUID (maps to UUID)
    Uuid,
}

impl ColumnType {
    /// Convert column type to its SQL type string
    pub fn to_sql_type(&self) -> &'static str {
        match self {
            ColumnType::String => "VARCHAR(255)",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP WITH TIME ZONE",
            ColumnType::Uuid => "UUID",
        }
    }
}

// ============================================================================
// Declarative flags
// ============================================================================

/// When associated rows are loaded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FetchMode {
    /// Loaded within the same query through a JOIN
    Eager,
    /// Deferred to a later, external loading mechanism
    #[default]
    Lazy,
}

/// Kind of association a field declares
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToMany,
    ManyToOne,
    OneToOne,
    ManyToMany,
}

/// How the identity value is produced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationType {
    /// The application assigns the identifier
    #[default]
    Assigned,
    /// The storage assigns the identifier on insert (auto-increment / identity column)
    Identity,
    /// A random v4 UUID is assigned before insert when the identifier is empty
    Uuid,
}
