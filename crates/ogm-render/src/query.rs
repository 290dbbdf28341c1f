//! Query Builder: a template plus parameters, sort and paging.
//!
//! [`Query::render`] is a pure function of the builder state: placeholders
//! are resolved (`${}` then `#{}`), then `ORDER BY`, `SKIP` and `LIMIT` are
//! appended in that order.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use ogm_core::{PlanConfig, PlanningError, RecordKind, Value};
use serde::{Deserialize, Serialize};

use crate::placeholder::resolve;

/// Name of the parameter the canned by-id templates bind.
pub const ID_PARAM: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn keyword(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Order {
            property: property.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Order {
            property: property.into(),
            direction: Direction::Desc,
        }
    }
}

/// Parses `property` or `property:asc|desc`.
impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (property, direction) = match s.split_once(':') {
            Some((p, d)) => (p.trim(), Some(d.trim())),
            None => (s.trim(), None),
        };
        if property.is_empty() {
            return Err(format!("empty sort property in '{s}'"));
        }
        let direction = match direction.map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Direction::Asc,
            Some("desc") => Direction::Desc,
            Some(other) => return Err(format!("unknown sort direction '{other}'")),
        };
        Ok(Order {
            property: property.to_string(),
            direction,
        })
    }
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl Page {
    pub fn offset(self) -> u64 {
        self.number.saturating_mul(self.size)
    }
}

/// A statement template with its bound state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    template: String,
    params: IndexMap<String, Value>,
    sort: Vec<Order>,
    sort_prefix: Option<String>,
    skip: Option<u64>,
    limit: Option<u64>,
}

impl Query {
    pub fn new(template: impl Into<String>) -> Self {
        Query {
            template: template.into(),
            ..Default::default()
        }
    }

    /// `find().<collection>({ @S && @S.<id_name> == #{id} })`, bound to `id`.
    pub fn find_by_id(
        kind: RecordKind,
        schema: &str,
        id_name: &str,
        id: impl Into<Value>,
    ) -> Self {
        let collection = kind.collection();
        Query::new(format!(
            "find().{collection}({{ @{schema} && @{schema}.{id_name} == #{{{ID_PARAM}}} }}) as {collection} return {collection}{{*}}"
        ))
        .param(ID_PARAM, id)
    }

    /// Every record of one schema.
    pub fn find_all(kind: RecordKind, schema: &str) -> Self {
        let collection = kind.collection();
        Query::new(format!(
            "find().{collection}({{ @{schema} }}) as {collection} return {collection}{{*}}"
        ))
    }

    /// `delete().<collection>({ @S && @S.<id_name> == #{id} })`, bound to `id`.
    pub fn delete_by_id(
        kind: RecordKind,
        schema: &str,
        id_name: &str,
        id: impl Into<Value>,
    ) -> Self {
        Query::new(format!(
            "delete().{}({{ @{schema} && @{schema}.{id_name} == #{{{ID_PARAM}}} }})",
            kind.collection()
        ))
        .param(ID_PARAM, id)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Appends a sort key; earlier keys take precedence.
    pub fn sort(mut self, order: Order) -> Self {
        self.sort.push(order);
        self
    }

    /// Qualifier written before every sort property (`n` gives `n.age`).
    pub fn sort_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.sort_prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn page(self, page: Page) -> Self {
        self.skip(page.offset()).limit(page.size)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn parameters(&self) -> &IndexMap<String, Value> {
        &self.params
    }

    /// Produces the final statement text.
    pub fn render(&self, config: &PlanConfig) -> Result<String, PlanningError> {
        let mut out = resolve(&self.template, &self.params, config)?;

        if !self.sort.is_empty() {
            let keys: Vec<String> = self
                .sort
                .iter()
                .map(|order| match &self.sort_prefix {
                    Some(prefix) => {
                        format!("{prefix}.{} {}", order.property, order.direction.keyword())
                    }
                    None => format!("{} {}", order.property, order.direction.keyword()),
                })
                .collect();
            out.push_str(" ORDER BY ");
            out.push_str(&keys.join(", "));
        }
        if let Some(skip) = self.skip {
            out.push_str(&format!(" SKIP {skip}"));
        }
        if let Some(limit) = self.limit {
            out.push_str(&format!(" LIMIT {limit}"));
        }

        tracing::debug!(template = %self.template, statement = %out, "rendered query");
        Ok(out)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(query: &Query) -> String {
        query.render(&PlanConfig::default()).unwrap()
    }

    #[test]
    fn template_only() {
        assert_eq!(
            render(&Query::new("find().nodes() as n return n{*}")),
            "find().nodes() as n return n{*}"
        );
    }

    #[test]
    fn sort_skip_limit_are_appended_in_order() {
        let query = Query::new("find().nodes({ @Person }) as n return n{*}")
            .sort(Order::asc("name"))
            .sort(Order::desc("age"))
            .sort_prefix("n")
            .skip(20)
            .limit(10);
        assert_eq!(
            render(&query),
            "find().nodes({ @Person }) as n return n{*} ORDER BY n.name ASC, n.age DESC SKIP 20 LIMIT 10"
        );
    }

    #[test]
    fn skip_and_limit_are_independent() {
        assert_eq!(render(&Query::new("q").limit(5)), "q LIMIT 5");
        assert_eq!(render(&Query::new("q").skip(5)), "q SKIP 5");
        assert_eq!(render(&Query::new("q").sort(Order::asc("x"))), "q ORDER BY x ASC");
    }

    #[test]
    fn page_sets_offset_and_size() {
        let query = Query::new("q").page(Page { number: 3, size: 25 });
        assert_eq!(render(&query), "q SKIP 75 LIMIT 25");
    }

    #[test]
    fn params_are_resolved_before_clauses() {
        let query = Query::new("find().nodes({ @${schema} && age > #{age} && name == #{name} })")
            .params([("schema", Value::from("Person")), ("age", Value::Int(30))])
            .param("name", "O\"Brien")
            .limit(1);
        assert_eq!(
            render(&query),
            r#"find().nodes({ @Person && age > 30 && name == "O\"Brien" }) LIMIT 1"#
        );
    }

    #[test]
    fn render_is_repeatable() {
        let query = Query::new("#{a}").param("a", "x").sort(Order::asc("k"));
        assert_eq!(render(&query), render(&query));
    }

    #[test]
    fn unbound_parameter_fails() {
        let err = Query::new("#{nope}")
            .render(&PlanConfig::default())
            .unwrap_err();
        assert!(matches!(err, PlanningError::UnboundParameter(ref n) if n == "nope"));
    }

    #[test]
    fn canned_templates() {
        let find = Query::find_by_id(RecordKind::Node, "Person", "ssn", "123");
        assert_eq!(
            render(&find),
            r#"find().nodes({ @Person && @Person.ssn == "123" }) as nodes return nodes{*}"#
        );

        let all = Query::find_all(RecordKind::Edge, "knows");
        assert_eq!(render(&all), "find().edges({ @knows }) as edges return edges{*}");

        let delete = Query::delete_by_id(RecordKind::Edge, "knows", "since", 2020i64);
        assert_eq!(render(&delete), "delete().edges({ @knows && @knows.since == 2020 })");
    }

    #[test]
    fn order_parsing() {
        assert_eq!("name".parse::<Order>().unwrap(), Order::asc("name"));
        assert_eq!("age:DESC".parse::<Order>().unwrap(), Order::desc("age"));
        assert!("age:sideways".parse::<Order>().is_err());
        assert!(":asc".parse::<Order>().is_err());
    }
}
