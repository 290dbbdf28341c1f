//! Statement model for mutation programs.
//!
//! Each [`Statement`] renders one fragment of the store's query language.
//! Literal values are already serialized when a statement is built, so
//! rendering is infallible.

use std::fmt;

use ogm_core::record::{FROM_UUID_PROPERTY, TO_UUID_PROPERTY, UUID_PROPERTY};
use ogm_core::RecordKind;
use serde::{Deserialize, Serialize};

/// One `name: literal` pair of a setter clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setter {
    pub name: String,
    pub literal: String,
}

impl Setter {
    pub fn new(name: impl Into<String>, literal: impl Into<String>) -> Self {
        Setter {
            name: name.into(),
            literal: literal.into(),
        }
    }

    /// `_from_uuid: <alias>._uuid` / `_to_uuid: <alias>._uuid`.
    pub fn endpoint_refs(from_alias: &str, to_alias: &str) -> [Setter; 2] {
        [
            Setter::new(FROM_UUID_PROPERTY, format!("{from_alias}.{UUID_PROPERTY}")),
            Setter::new(TO_UUID_PROPERTY, format!("{to_alias}.{UUID_PROPERTY}")),
        ]
    }
}

/// A single mutation or lookup fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Statement {
    /// `insert().into(@S).nodes({ ... }) as rN`
    Insert {
        kind: RecordKind,
        schema: String,
        setters: Vec<Setter>,
        alias: String,
    },
    /// `find().nodes({ @S && @S.id == v }) as rN`
    Lookup {
        kind: RecordKind,
        schema: String,
        id_name: String,
        id_literal: String,
        alias: String,
    },
    /// `update().nodes({ @S && id == v }).set({ ... }) as rN return rN{*}`
    Update {
        kind: RecordKind,
        schema: String,
        id_name: String,
        id_literal: String,
        setters: Vec<Setter>,
        alias: String,
    },
    /// Inserts an edge between two stored nodes unless one with the same
    /// schema already connects them.
    InsertIfAbsent {
        schema: String,
        from_uuid: u64,
        to_uuid: u64,
        setters: Vec<Setter>,
        alias: String,
    },
    /// `delete().nodes({ @S && @S.id == v })`
    Delete {
        kind: RecordKind,
        schema: String,
        id_name: String,
        id_literal: String,
    },
}

impl Statement {
    /// Alias the fragment binds, if any.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Statement::Insert { alias, .. }
            | Statement::Lookup { alias, .. }
            | Statement::Update { alias, .. }
            | Statement::InsertIfAbsent { alias, .. } => Some(alias),
            Statement::Delete { .. } => None,
        }
    }
}

struct Setters<'a>(&'a [Setter]);

impl fmt::Display for Setters<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{ ")?;
        for (i, setter) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", setter.name, setter.literal)?;
        }
        f.write_str(" }")
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Insert {
                kind,
                schema,
                setters,
                alias,
            } => write!(
                f,
                "insert().into(@{schema}).{}({}) as {alias}",
                kind.collection(),
                Setters(setters)
            ),
            Statement::Lookup {
                kind,
                schema,
                id_name,
                id_literal,
                alias,
            } => write!(
                f,
                "find().{}({{ @{schema} && @{schema}.{id_name} == {id_literal} }}) as {alias}",
                kind.collection()
            ),
            Statement::Update {
                kind,
                schema,
                id_name,
                id_literal,
                setters,
                alias,
            } => write!(
                f,
                "update().{}({{ @{schema} && {id_name} == {id_literal} }}).set({}) as {alias} return {alias}{{*}}",
                kind.collection(),
                Setters(setters)
            ),
            Statement::InsertIfAbsent {
                schema,
                from_uuid,
                to_uuid,
                setters,
                alias,
            } => {
                let mut all = setters.clone();
                all.extend(Setter::endpoint_refs("from", "to"));
                write!(
                    f,
                    "find().nodes({from_uuid}) as from find().nodes({to_uuid}) as to \
                     with from, to optional n(from).re({{ @{schema} }}).n(to) as paths \
                     with count(paths) as count where count == 0 \
                     insert().into(@{schema}).edges({}) as {alias} return {alias}{{*}}",
                    Setters(&all)
                )
            }
            Statement::Delete {
                kind,
                schema,
                id_name,
                id_literal,
            } => write!(
                f,
                "delete().{}({{ @{schema} && @{schema}.{id_name} == {id_literal} }})",
                kind.collection()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_node() {
        let stmt = Statement::Insert {
            kind: RecordKind::Node,
            schema: "Person".into(),
            setters: vec![Setter::new("name", "\"Alice\""), Setter::new("age", "30")],
            alias: "r1".into(),
        };
        assert_eq!(
            stmt.to_string(),
            r#"insert().into(@Person).nodes({ name: "Alice", age: 30 }) as r1"#
        );
        assert_eq!(stmt.alias(), Some("r1"));
    }

    #[test]
    fn insert_without_properties() {
        let stmt = Statement::Insert {
            kind: RecordKind::Node,
            schema: "Tag".into(),
            setters: vec![],
            alias: "r2".into(),
        };
        assert_eq!(stmt.to_string(), "insert().into(@Tag).nodes({}) as r2");
    }

    #[test]
    fn lookup_and_update() {
        let lookup = Statement::Lookup {
            kind: RecordKind::Node,
            schema: "Person".into(),
            id_name: "ssn".into(),
            id_literal: "\"123\"".into(),
            alias: "r2".into(),
        };
        assert_eq!(
            lookup.to_string(),
            r#"find().nodes({ @Person && @Person.ssn == "123" }) as r2"#
        );

        let edge_lookup = Statement::Lookup {
            kind: RecordKind::Edge,
            schema: "knows".into(),
            id_name: "key".into(),
            id_literal: "7".into(),
            alias: "r1".into(),
        };
        assert_eq!(
            edge_lookup.to_string(),
            "find().edges({ @knows && @knows.key == 7 }) as r1"
        );

        let update = Statement::Update {
            kind: RecordKind::Edge,
            schema: "knows".into(),
            id_name: "key".into(),
            id_literal: "7".into(),
            setters: vec![Setter::new("since", "2020")],
            alias: "r1".into(),
        };
        assert_eq!(
            update.to_string(),
            "update().edges({ @knows && key == 7 }).set({ since: 2020 }) as r1 return r1{*}"
        );
    }

    #[test]
    fn insert_if_absent() {
        let stmt = Statement::InsertIfAbsent {
            schema: "follows".into(),
            from_uuid: 11,
            to_uuid: 22,
            setters: vec![Setter::new("weight", "1")],
            alias: "r1".into(),
        };
        assert_eq!(
            stmt.to_string(),
            "find().nodes(11) as from find().nodes(22) as to with from, to \
             optional n(from).re({ @follows }).n(to) as paths with count(paths) as count \
             where count == 0 insert().into(@follows).edges({ weight: 1, \
             _from_uuid: from._uuid, _to_uuid: to._uuid }) as r1 return r1{*}"
        );
    }

    #[test]
    fn delete_has_no_alias() {
        let stmt = Statement::Delete {
            kind: RecordKind::Node,
            schema: "Person".into(),
            id_name: "ssn".into(),
            id_literal: "\"1\"".into(),
        };
        assert_eq!(stmt.to_string(), r#"delete().nodes({ @Person && @Person.ssn == "1" })"#);
        assert_eq!(stmt.alias(), None);
    }
}
