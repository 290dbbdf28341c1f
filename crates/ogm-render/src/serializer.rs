//! Value Serializer: typed values to statement literal text.
//!
//! The store kind of a value is decided before it reaches this module, either
//! declared on the property or derived with [`PropertyKind::infer`]. The
//! serializer branches on that kind only.

use ogm_core::value::{format_datetime, format_timestamp, Point, Property, PropertyKind, ScalarKind, Value};
use ogm_core::{PlanConfig, PlanningError};
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Escapes backslashes and double quotes so the text can sit inside a
/// double-quoted literal.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

/// Escapes and double-quotes `text`.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", escape(text))
}

/// Literal for one property, using its declared kind when present.
pub fn property_literal(property: &Property, config: &PlanConfig) -> Result<String, PlanningError> {
    to_literal(&property.value, property.kind, config)
}

/// Renders `value` as a literal of store kind `kind`.
///
/// With `kind == None` the kind is derived from the value. Enums are written
/// as their stored value (identity field or name). Values that cannot be
/// represented as the requested kind fail with
/// [`PlanningError::TypeMismatch`].
pub fn to_literal(
    value: &Value,
    kind: Option<PropertyKind>,
    config: &PlanConfig,
) -> Result<String, PlanningError> {
    match value {
        Value::Null => return Ok(config.null_literal.clone()),
        Value::Enum(e) => return to_literal(&e.stored_value(), kind, config),
        _ => {}
    }

    let Some(kind) = kind.or_else(|| PropertyKind::infer(value)) else {
        // Arrays whose elements disagree on a kind render element by element.
        return match value {
            Value::Array(items) => array_literal(items, None, config),
            other => Err(PlanningError::TypeMismatch {
                expected: PropertyKind::Scalar(ScalarKind::String),
                found: other.type_name(),
            }),
        };
    };

    match (kind, value) {
        (PropertyKind::Array(scalar), Value::Array(items)) => {
            array_literal(items, Some(PropertyKind::Scalar(scalar)), config)
        }
        (PropertyKind::Scalar(scalar), value) if !matches!(value, Value::Array(_)) => {
            scalar_literal(scalar, value)
        }
        (expected, found) => Err(PlanningError::TypeMismatch {
            expected,
            found: found.type_name(),
        }),
    }
}

fn array_literal(
    items: &[Value],
    element: Option<PropertyKind>,
    config: &PlanConfig,
) -> Result<String, PlanningError> {
    let parts = items
        .iter()
        .map(|item| to_literal(item, element, config))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("[{}]", parts.join(",")))
}

fn scalar_literal(kind: ScalarKind, value: &Value) -> Result<String, PlanningError> {
    let mismatch = || PlanningError::TypeMismatch {
        expected: PropertyKind::Scalar(kind),
        found: value.type_name(),
    };

    match kind {
        ScalarKind::String | ScalarKind::Text => {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Char(c) => c.to_string(),
                Value::Uuid(u) => u.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Int(i) => i.to_string(),
                Value::UInt(u) => u.to_string(),
                Value::Float(f) => f.to_string(),
                Value::DateTime(dt) => format_datetime(dt)?,
                Value::Timestamp(ts) => format_timestamp(ts)?,
                Value::Point(p) => point_text(p),
                _ => return Err(mismatch()),
            };
            Ok(quote(&text))
        }
        ScalarKind::Int32 | ScalarKind::Int64 | ScalarKind::UInt32 | ScalarKind::UInt64 => {
            let n = integer(value).ok_or_else(mismatch)?;
            let (min, max) = match kind {
                ScalarKind::Int32 => (i32::MIN as i128, i32::MAX as i128),
                ScalarKind::Int64 => (i64::MIN as i128, i64::MAX as i128),
                ScalarKind::UInt32 => (0, u32::MAX as i128),
                _ => (0, u64::MAX as i128),
            };
            if n < min || n > max {
                return Err(mismatch());
            }
            Ok(n.to_string())
        }
        ScalarKind::Float | ScalarKind::Double => {
            let f = match value {
                Value::Float(f) => *f,
                Value::Int(i) => *i as f64,
                Value::UInt(u) => *u as f64,
                Value::Bool(b) => u8::from(*b) as f64,
                Value::String(s) => s.trim().parse::<f64>().map_err(|_| mismatch())?,
                _ => return Err(mismatch()),
            };
            if !f.is_finite() {
                return Err(mismatch());
            }
            Ok(f.to_string())
        }
        ScalarKind::DateTime => match value {
            Value::DateTime(dt) => Ok(quote(&format_datetime(dt)?)),
            Value::Timestamp(ts) => Ok(quote(&format_datetime(&to_utc_primitive(ts))?)),
            _ => Err(mismatch()),
        },
        ScalarKind::Timestamp => match value {
            Value::Timestamp(ts) => Ok(quote(&format_timestamp(ts)?)),
            Value::DateTime(dt) => Ok(quote(&format_timestamp(&dt.assume_utc())?)),
            _ => Err(mismatch()),
        },
        ScalarKind::Point => match value {
            Value::Point(p) => Ok(quote(&point_text(p))),
            _ => Err(mismatch()),
        },
    }
}

fn integer(value: &Value) -> Option<i128> {
    match value {
        Value::Int(i) => Some(*i as i128),
        Value::UInt(u) => Some(*u as i128),
        Value::Bool(b) => Some(i128::from(*b)),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i128),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_utc_primitive(ts: &OffsetDateTime) -> PrimitiveDateTime {
    let utc = ts.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

fn point_text(p: &Point) -> String {
    format!("POINT( {} {} )", p.x, p.y)
}

/// Unquoted text form of a value, used by placeholder substitution.
///
/// Strings are escaped but not quoted; the anti-injection dialect adds the
/// quotes itself.
pub fn bare_text(value: &Value, config: &PlanConfig) -> Result<String, PlanningError> {
    Ok(match value {
        Value::Null => config.null_literal.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Char(c) => escape(&c.to_string()),
        Value::String(s) => escape(s),
        Value::Uuid(u) => u.to_string(),
        Value::Enum(e) => bare_text(&e.stored_value(), config)?,
        Value::DateTime(dt) => format_datetime(dt)?,
        Value::Timestamp(ts) => format_timestamp(ts)?,
        Value::Point(p) => point_text(p),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| bare_text(item, config))
                .collect::<Result<Vec<_>, _>>()?;
            format!("[{}]", parts.join(","))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogm_core::EnumValue;
    use proptest::prelude::*;
    use time::macros::datetime;

    fn lit(value: impl Into<Value>, kind: &str) -> Result<String, PlanningError> {
        to_literal(&value.into(), Some(kind.parse().unwrap()), &PlanConfig::default())
    }

    /// Reads back one double-quoted literal the way the store grammar does.
    fn unquote(literal: &str) -> Option<String> {
        let inner = literal.strip_prefix('"')?.strip_suffix('"')?;
        let mut out = String::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.push(chars.next()?),
                '"' => return None,
                c => out.push(c),
            }
        }
        Some(out)
    }

    #[test]
    fn strings_are_escaped_and_quoted() {
        assert_eq!(lit("Alice", "string").unwrap(), "\"Alice\"");
        assert_eq!(
            lit(r#"say "hi" \o/"#, "text").unwrap(),
            r#""say \"hi\" \\o/""#
        );
    }

    #[test]
    fn numbers_are_unquoted() {
        assert_eq!(lit(42i64, "int32").unwrap(), "42");
        assert_eq!(lit(true, "int64").unwrap(), "1");
        assert_eq!(lit(false, "uint32").unwrap(), "0");
        assert_eq!(lit("17", "uint64").unwrap(), "17");
        assert_eq!(lit(2.5f64, "double").unwrap(), "2.5");
        assert_eq!(lit(3i64, "float").unwrap(), "3");
    }

    #[test]
    fn out_of_range_integer_is_a_type_mismatch() {
        let err = lit(-1i64, "uint32").unwrap_err();
        assert!(matches!(
            err,
            PlanningError::TypeMismatch {
                expected: PropertyKind::Scalar(ScalarKind::UInt32),
                found: "int"
            }
        ));
        assert!(lit(i64::MAX, "int32").is_err());
        assert!(lit("abc", "int64").is_err());
        assert!(lit(1.5f64, "int64").is_err());
    }

    #[test]
    fn datetime_and_timestamp_patterns() {
        let dt = Value::DateTime(datetime!(2024-01-02 03:04:05.000006));
        let config = PlanConfig::default();
        assert_eq!(
            to_literal(&dt, None, &config).unwrap(),
            "\"2024-01-02 03:04:05.000006\""
        );

        let ts = Value::Timestamp(datetime!(2024-01-02 03:04:05 -01:00));
        assert_eq!(
            to_literal(&ts, None, &config).unwrap(),
            "\"2024-01-02 04:04:05\""
        );
        assert_eq!(
            to_literal(&ts, Some("datetime".parse().unwrap()), &config).unwrap(),
            "\"2024-01-02 04:04:05.000000\""
        );
    }

    #[test]
    fn point_literal() {
        let p = Value::Point(Point { x: 1.5, y: -2.0 });
        assert_eq!(
            to_literal(&p, None, &PlanConfig::default()).unwrap(),
            "\"POINT( 1.5 -2 )\""
        );
    }

    #[test]
    fn arrays_recurse_per_element() {
        let tags = Value::from(vec!["a", "b\"c"]);
        assert_eq!(
            to_literal(&tags, None, &PlanConfig::default()).unwrap(),
            r#"["a","b\"c"]"#
        );
        assert_eq!(lit(vec![1i64, 2, 3], "int32[]").unwrap(), "[1,2,3]");
        assert_eq!(
            to_literal(&Value::Array(vec![]), None, &PlanConfig::default()).unwrap(),
            "[]"
        );
        assert!(lit(vec![1i64], "int32").is_err());
        assert!(lit(1i64, "int32[]").is_err());
    }

    #[test]
    fn untyped_arrays_widen_or_render_per_element() {
        let config = PlanConfig::default();
        let numbers = Value::Array(vec![Value::Int(1), Value::Float(2.5)]);
        assert_eq!(to_literal(&numbers, None, &config).unwrap(), "[1,2.5]");

        let mixed = Value::Array(vec![Value::from("a"), Value::Int(1)]);
        assert_eq!(to_literal(&mixed, None, &config).unwrap(), r#"["a",1]"#);
    }

    #[test]
    fn null_uses_configured_literal() {
        let mut config = PlanConfig::default();
        assert_eq!(to_literal(&Value::Null, None, &config).unwrap(), "null");
        config.null_literal = "NULL".into();
        assert_eq!(
            to_literal(&Value::Null, Some("int64".parse().unwrap()), &config).unwrap(),
            "NULL"
        );
        let mixed = Value::Array(vec![Value::Int(1), Value::Null]);
        assert_eq!(to_literal(&mixed, None, &config).unwrap(), "[1,NULL]");
    }

    #[test]
    fn enums_write_stored_value() {
        let config = PlanConfig::default();
        let plain = Value::Enum(EnumValue::new("Status", "ACTIVE", 0));
        assert_eq!(to_literal(&plain, None, &config).unwrap(), "\"ACTIVE\"");

        let coded = Value::Enum(EnumValue::new("Status", "ACTIVE", 0).with_field(10i64));
        assert_eq!(to_literal(&coded, None, &config).unwrap(), "10");
    }

    #[test]
    fn bare_text_escapes_without_quotes() {
        let config = PlanConfig::default();
        assert_eq!(bare_text(&Value::from("a\"b"), &config).unwrap(), "a\\\"b");
        assert_eq!(bare_text(&Value::Int(5), &config).unwrap(), "5");
        assert_eq!(bare_text(&Value::Bool(true), &config).unwrap(), "true");
        assert_eq!(bare_text(&Value::Null, &config).unwrap(), "null");
    }

    proptest! {
        #[test]
        fn quoted_strings_read_back_unchanged(s in any::<String>()) {
            let literal = lit(s.clone(), "string").unwrap();
            prop_assert_eq!(unquote(&literal), Some(s));
        }
    }
}
