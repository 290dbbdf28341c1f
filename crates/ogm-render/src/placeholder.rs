//! Placeholder Resolver: the two-dialect template interpreter.
//!
//! - `${name[:modifier]}` substitutes the formatted value as-is.
//! - `#{name[:modifier]}` additionally wraps values of a quoting type
//!   (strings, chars, enums, datetimes, UUIDs, points) in double quotes.
//!
//! [`resolve`] runs the `${}` pass over the template, then the `#{}` pass over
//! the result. Each pass scans its input once and never re-reads text it
//! substituted itself. A placeholder without a closing `}` is left as literal
//! text.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use ogm_core::{PlanConfig, PlanningError, Value};

use crate::serializer::bare_text;

/// Placeholder syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `${...}`: direct substitution.
    Plain,
    /// `#{...}`: quote-wrapped substitution.
    Quoted,
}

impl Dialect {
    pub fn prefix(self) -> &'static str {
        match self {
            Dialect::Plain => "${",
            Dialect::Quoted => "#{",
        }
    }
}

/// Per-placeholder format modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Enum to its identity field, or its name when it has none.
    Field,
    /// Enum to its name.
    Name,
    /// Enum to its ordinal.
    Ordinal,
    /// Any value to its JSON text.
    Json,
    /// Boolean to `"true"`/`"false"`.
    String,
    /// Boolean to `1`/`0`. Written `int`, `int32`, `uint64`, `double`, ...
    Numeric,
}

impl FromStr for Modifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "field" => Modifier::Field,
            "name" => Modifier::Name,
            "ordinal" => Modifier::Ordinal,
            "json" => Modifier::Json,
            "string" => Modifier::String,
            "int" | "int32" | "int64" | "uint" | "uint32" | "uint64" | "float" | "double" => {
                Modifier::Numeric
            }
            _ => return Err(()),
        })
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modifier::Field => "field",
            Modifier::Name => "name",
            Modifier::Ordinal => "ordinal",
            Modifier::Json => "json",
            Modifier::String => "string",
            Modifier::Numeric => "numeric",
        };
        f.write_str(name)
    }
}

/// Resolves both dialects: `${}` first, then `#{}`.
pub fn resolve(
    template: &str,
    params: &IndexMap<String, Value>,
    config: &PlanConfig,
) -> Result<String, PlanningError> {
    let plain = substitute(template, Dialect::Plain, params, config)?;
    substitute(&plain, Dialect::Quoted, params, config)
}

/// Resolves the placeholders of one dialect.
pub fn substitute(
    template: &str,
    dialect: Dialect,
    params: &IndexMap<String, Value>,
    config: &PlanConfig,
) -> Result<String, PlanningError> {
    let prefix = dialect.prefix();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(prefix) {
        let body_start = start + prefix.len();
        let Some(len) = rest[body_start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let body = &rest[body_start..body_start + len];
        out.push_str(&render_placeholder(body, dialect, params, config)?);
        rest = &rest[body_start + len + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn render_placeholder(
    body: &str,
    dialect: Dialect,
    params: &IndexMap<String, Value>,
    config: &PlanConfig,
) -> Result<String, PlanningError> {
    let invalid = |reason: String| PlanningError::InvalidPlaceholder {
        placeholder: format!("{}{}}}", dialect.prefix(), body),
        reason,
    };

    let (name, modifier) = match body.split_once(':') {
        Some((name, modifier)) => (name.trim(), Some(modifier.trim())),
        None => (body.trim(), None),
    };
    if name.is_empty() {
        return Err(invalid("no parameter name".to_string()));
    }
    let modifier = match modifier {
        Some(m) => Some(
            m.parse::<Modifier>()
                .map_err(|_| invalid(format!("unknown modifier '{m}'")))?,
        ),
        None => None,
    };

    let value = params
        .get(name)
        .ok_or_else(|| PlanningError::UnboundParameter(name.to_string()))?;

    tracing::trace!(parameter = name, ?dialect, ?modifier, "resolving placeholder");

    match value {
        Value::Array(items) if items.iter().any(|item| matches!(item, Value::Array(_))) => {
            Err(invalid("nested arrays cannot be substituted".to_string()))
        }
        Value::Array(items) if modifier != Some(Modifier::Json) => {
            let parts = items
                .iter()
                .map(|item| render_value(&apply_modifier(item, modifier)?, dialect, config))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", parts.join(",")))
        }
        value => render_value(&apply_modifier(value, modifier)?, dialect, config),
    }
}

/// Applies a modifier. Values the modifier does not apply to pass through
/// unchanged.
pub fn apply_modifier(value: &Value, modifier: Option<Modifier>) -> Result<Value, PlanningError> {
    let Some(modifier) = modifier else {
        return Ok(value.clone());
    };
    Ok(match (modifier, value) {
        (_, Value::Null) => Value::Null,
        (Modifier::Field, Value::Enum(e)) => e.stored_value(),
        (Modifier::Name, Value::Enum(e)) => Value::String(e.name.clone()),
        (Modifier::Ordinal, Value::Enum(e)) => Value::Int(i64::from(e.ordinal)),
        (Modifier::Json, value) => Value::String(serde_json::to_string(&value.to_json()?)?),
        (Modifier::String, Value::Bool(b)) => Value::String(b.to_string()),
        (Modifier::Numeric, Value::Bool(b)) => Value::Int(i64::from(*b)),
        (_, value) => value.clone(),
    })
}

fn render_value(value: &Value, dialect: Dialect, config: &PlanConfig) -> Result<String, PlanningError> {
    let text = bare_text(value, config)?;
    if dialect == Dialect::Quoted && value.needs_quoting() {
        Ok(format!("\"{text}\""))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogm_core::EnumValue;

    fn params(entries: &[(&str, Value)]) -> IndexMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn render(template: &str, entries: &[(&str, Value)]) -> Result<String, PlanningError> {
        resolve(template, &params(entries), &PlanConfig::default())
    }

    fn status() -> Value {
        Value::Enum(EnumValue::new("Status", "ACTIVE", 2).with_field(10i64))
    }

    #[test]
    fn dialects_differ_only_in_quoting() {
        assert_eq!(render("${a}", &[("a", "x".into())]).unwrap(), "x");
        assert_eq!(render("#{a}", &[("a", "x".into())]).unwrap(), "\"x\"");
        assert_eq!(render("#{a}", &[("a", 5i64.into())]).unwrap(), "5");
        assert_eq!(render("#{a}", &[("a", true.into())]).unwrap(), "true");
    }

    #[test]
    fn quoted_dialect_escapes_injected_quotes() {
        let out = render(
            "find().nodes({ name == #{n} })",
            &[("n", r#"x" || true || ""#.into())],
        )
        .unwrap();
        assert_eq!(out, r#"find().nodes({ name == "x\" || true || \"" })"#);
    }

    #[test]
    fn enum_modifiers() {
        let p = [("s", status())];
        assert_eq!(render("#{s}", &p).unwrap(), "\"10\"");
        assert_eq!(render("#{s:field}", &p).unwrap(), "10");
        assert_eq!(render("#{s:name}", &p).unwrap(), "\"ACTIVE\"");
        assert_eq!(render("#{s:ordinal}", &p).unwrap(), "2");
        assert_eq!(render("${s:NAME}", &p).unwrap(), "ACTIVE");
    }

    #[test]
    fn field_modifier_falls_back_to_name() {
        let plain = Value::Enum(EnumValue::new("Color", "RED", 0));
        assert_eq!(render("#{c:field}", &[("c", plain)]).unwrap(), "\"RED\"");
    }

    #[test]
    fn boolean_coercions() {
        let p = [("b", Value::Bool(true))];
        assert_eq!(render("#{b:string}", &p).unwrap(), "\"true\"");
        assert_eq!(render("#{b:int32}", &p).unwrap(), "1");
        assert_eq!(render("#{b:Double}", &p).unwrap(), "1");
        assert_eq!(render("#{b:uint}", &[("b", false.into())]).unwrap(), "0");
    }

    #[test]
    fn json_modifier() {
        let p = [("v", Value::from(vec![1i64, 2]))];
        assert_eq!(render("${v:json}", &p).unwrap(), "[1,2]");
        assert_eq!(render("#{v:json}", &p).unwrap(), "\"[1,2]\"");
    }

    #[test]
    fn arrays_apply_modifier_and_quoting_per_element() {
        let p = [(
            "ids",
            Value::Array(vec!["a".into(), Value::Int(3), status()]),
        )];
        assert_eq!(render("#{ids}", &p).unwrap(), r#"["a",3,"10"]"#);
        assert_eq!(render("#{ids:name}", &p).unwrap(), r#"["a",3,"ACTIVE"]"#);
        assert_eq!(render("${ids}", &p).unwrap(), "[a,3,10]");
        assert_eq!(render("#{e}", &[("e", Value::Array(vec![]))]).unwrap(), "[]");
    }

    #[test]
    fn nested_arrays_are_rejected_in_both_dialects() {
        let nested = Value::Array(vec![Value::Array(vec![Value::from(
            "x }) delete().nodes({ @Person",
        )])]);
        for template in ["find().nodes({ name in #{n} })", "${n}", "#{n:json}"] {
            match render(template, &[("n", nested.clone())]) {
                Err(PlanningError::InvalidPlaceholder { placeholder, .. }) => {
                    assert!(placeholder.contains('n'))
                }
                other => panic!("expected InvalidPlaceholder for {template}, got {:?}", other),
            }
        }
    }

    #[test]
    fn null_parameter_renders_null_literal() {
        assert_eq!(render("#{n}", &[("n", Value::Null)]).unwrap(), "null");
    }

    #[test]
    fn unbound_parameter_is_reported_by_name() {
        match render("#{missing}", &[]) {
            Err(PlanningError::UnboundParameter(name)) => assert_eq!(name, "missing"),
            other => panic!("expected UnboundParameter, got {:?}", other),
        }
    }

    #[test]
    fn invalid_placeholders() {
        let p = [("a", Value::Int(1))];
        assert!(matches!(
            render("${a:upper}", &p),
            Err(PlanningError::InvalidPlaceholder { .. })
        ));
        assert!(matches!(
            render("#{ }", &p),
            Err(PlanningError::InvalidPlaceholder { .. })
        ));
    }

    #[test]
    fn unterminated_placeholder_is_literal_text() {
        assert_eq!(render("a ${x", &[]).unwrap(), "a ${x");
        assert_eq!(render("#{a} and #{b", &[("a", 1i64.into())]).unwrap(), "1 and #{b");
    }

    #[test]
    fn plain_pass_runs_first() {
        let p = [("label", Value::from("Person")), ("name", Value::from("Bo"))];
        assert_eq!(
            render("find().nodes({ @${label} && name == #{name} })", &p).unwrap(),
            "find().nodes({ @Person && name == \"Bo\" })"
        );
    }

    #[test]
    fn a_pass_does_not_rescan_its_output() {
        let p = [("a", Value::from("${a}"))];
        assert_eq!(
            substitute("${a}", Dialect::Plain, &params(&p), &PlanConfig::default()).unwrap(),
            "${a}"
        );
    }
}
