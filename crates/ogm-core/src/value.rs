//! Dynamic property values and the closed set of store property kinds.
//!
//! [`Value`] is what the external mapper hands the core: a dynamically typed
//! scalar or array. [`PropertyKind`] is the store-side type a value is written
//! as, decided by the mapper before serialization. The serializer branches on
//! `PropertyKind` only; it never inspects where a value came from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use uuid::Uuid;

use crate::error::CoreError;

/// A dynamically typed property or parameter value.
///
/// Records never nest: there is no map variant, and arrays hold scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    String(String),
    Uuid(Uuid),
    Enum(EnumValue),
    /// Wall-clock datetime without zone.
    DateTime(PrimitiveDateTime),
    /// Instant; written in UTC.
    Timestamp(OffsetDateTime),
    Point(Point),
    Array(Vec<Value>),
}

/// A domain enum constant, already reduced to the facts the core needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub type_name: String,
    pub name: String,
    pub ordinal: u32,
    /// Value of the enum's designated identity field, if it declares one.
    pub field: Option<Box<Value>>,
}

/// Planar geo point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Store scalar property types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    String,
    Text,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    DateTime,
    Timestamp,
    Point,
}

/// A store property type: a scalar kind or an array of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Scalar(ScalarKind),
    Array(ScalarKind),
}

/// One entry of a record's property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub value: Value,
    /// Declared store kind. `None` means derive it from the value.
    pub kind: Option<PropertyKind>,
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Uuid(_) => "uuid",
            Value::Enum(_) => "enum",
            Value::DateTime(_) => "datetime",
            Value::Timestamp(_) => "timestamp",
            Value::Point(_) => "point",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether a substituted value of this type must be wrapped in quotes by
    /// the anti-injection placeholder dialect.
    pub fn needs_quoting(&self) -> bool {
        matches!(
            self,
            Value::String(_)
                | Value::Char(_)
                | Value::Uuid(_)
                | Value::Enum(_)
                | Value::DateTime(_)
                | Value::Timestamp(_)
                | Value::Point(_)
        )
    }

    /// Converts a JSON document value. Objects and arrays inside arrays are
    /// rejected because record properties never nest.
    pub fn from_json(json: &serde_json::Value) -> Result<Value, CoreError> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::Array(_) => Err(CoreError::InvalidValue {
                            reason: "nested arrays are not valid property values".into(),
                        }),
                        item => Value::from_json(item),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            serde_json::Value::Object(_) => {
                return Err(CoreError::InvalidValue {
                    reason: "nested objects are not valid property values".into(),
                })
            }
        })
    }

    /// Converts to a JSON value, the representation used by the `json`
    /// placeholder modifier.
    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::UInt(u) => serde_json::Value::from(*u),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Char(c) => serde_json::Value::String(c.to_string()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Uuid(u) => serde_json::Value::String(u.to_string()),
            Value::Enum(e) => serde_json::Value::String(e.name.clone()),
            Value::DateTime(dt) => serde_json::Value::String(format_datetime(dt)?),
            Value::Timestamp(ts) => serde_json::Value::String(format_timestamp(ts)?),
            Value::Point(p) => serde_json::json!({ "x": p.x, "y": p.y }),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<EnumValue> for Value {
    fn from(e: EnumValue) -> Self {
        Value::Enum(e)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>, ordinal: u32) -> Self {
        EnumValue {
            type_name: type_name.into(),
            name: name.into(),
            ordinal,
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<Value>) -> Self {
        self.field = Some(Box::new(field.into()));
        self
    }

    /// The value an enum is stored as: its identity field if declared,
    /// otherwise its name.
    pub fn stored_value(&self) -> Value {
        match &self.field {
            Some(field) => (**field).clone(),
            None => Value::String(self.name.clone()),
        }
    }
}

impl Property {
    pub fn new(value: Value) -> Self {
        Property { value, kind: None }
    }

    pub fn typed(value: Value, kind: PropertyKind) -> Self {
        Property {
            value,
            kind: Some(kind),
        }
    }

    /// Declared kind, or the kind derived from the value.
    pub fn effective_kind(&self) -> Option<PropertyKind> {
        self.kind.or_else(|| PropertyKind::infer(&self.value))
    }
}

impl PropertyKind {
    /// Derives a store kind from a value. `None` for nulls and for arrays
    /// without a non-null element.
    pub fn infer(value: &Value) -> Option<PropertyKind> {
        match value {
            Value::Null => None,
            Value::Array(items) => {
                let mut kinds = items
                    .iter()
                    .filter(|item| !matches!(item, Value::Null))
                    .map(ScalarKind::infer);
                let first = kinds.next()??;
                kinds
                    .try_fold(first, |acc, kind| match kind? {
                        kind if kind == acc => Some(acc),
                        kind if kind.is_numeric() && acc.is_numeric() => {
                            let widened = matches!(kind, ScalarKind::Float | ScalarKind::Double)
                                || matches!(acc, ScalarKind::Float | ScalarKind::Double);
                            widened.then_some(ScalarKind::Double)
                        }
                        _ => None,
                    })
                    .map(PropertyKind::Array)
            }
            scalar => ScalarKind::infer(scalar).map(PropertyKind::Scalar),
        }
    }

    pub fn scalar(self) -> ScalarKind {
        match self {
            PropertyKind::Scalar(kind) | PropertyKind::Array(kind) => kind,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, PropertyKind::Array(_))
    }
}

impl ScalarKind {
    fn infer(value: &Value) -> Option<ScalarKind> {
        match value {
            Value::Null | Value::Array(_) => None,
            Value::Bool(_) => Some(ScalarKind::Int32),
            Value::Int(_) => Some(ScalarKind::Int64),
            Value::UInt(_) => Some(ScalarKind::UInt64),
            Value::Float(_) => Some(ScalarKind::Double),
            Value::Char(_) | Value::String(_) | Value::Uuid(_) => Some(ScalarKind::String),
            Value::Enum(e) => match &e.field {
                Some(field) => ScalarKind::infer(field),
                None => Some(ScalarKind::String),
            },
            Value::DateTime(_) => Some(ScalarKind::DateTime),
            Value::Timestamp(_) => Some(ScalarKind::Timestamp),
            Value::Point(_) => Some(ScalarKind::Point),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Text => "text",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::UInt32 => "uint32",
            ScalarKind::UInt64 => "uint64",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Point => "point",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ScalarKind::Int32
                | ScalarKind::Int64
                | ScalarKind::UInt32
                | ScalarKind::UInt64
                | ScalarKind::Float
                | ScalarKind::Double
        )
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Scalar(kind) => f.write_str(kind.name()),
            PropertyKind::Array(kind) => write!(f, "{}[]", kind.name()),
        }
    }
}

impl FromStr for ScalarKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "string" => ScalarKind::String,
            "text" => ScalarKind::Text,
            "int32" => ScalarKind::Int32,
            "int64" => ScalarKind::Int64,
            "uint32" => ScalarKind::UInt32,
            "uint64" => ScalarKind::UInt64,
            "float" => ScalarKind::Float,
            "double" => ScalarKind::Double,
            "datetime" => ScalarKind::DateTime,
            "timestamp" => ScalarKind::Timestamp,
            "point" => ScalarKind::Point,
            other => {
                return Err(CoreError::InvalidValue {
                    reason: format!("unknown property kind '{other}'"),
                })
            }
        })
    }
}

impl FromStr for PropertyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().strip_suffix("[]") {
            Some(element) => Ok(PropertyKind::Array(element.parse()?)),
            None => Ok(PropertyKind::Scalar(s.trim().parse()?)),
        }
    }
}

/// Formats a datetime the way the store expects: `YYYY-MM-DD hh:mm:ss.ffffff`.
pub fn format_datetime(dt: &PrimitiveDateTime) -> Result<String, CoreError> {
    dt.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]"
    ))
    .map_err(|e| CoreError::InvalidValue {
        reason: format!("datetime formatting failed: {e}"),
    })
}

/// Formats an instant in UTC as `YYYY-MM-DD hh:mm:ss`.
pub fn format_timestamp(ts: &OffsetDateTime) -> Result<String, CoreError> {
    ts.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .map_err(|e| CoreError::InvalidValue {
            reason: format!("timestamp formatting failed: {e}"),
        })
}
