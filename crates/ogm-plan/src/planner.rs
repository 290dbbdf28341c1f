//! Mutation Planner: linearizes a rooted [`SchemaGraph`] into one statement
//! program.
//!
//! Planning runs in two phases:
//!
//! 1. **Collect.** A depth-first, cascade-gated walk from the root gathers the
//!    records to insert, in visit order. Nodes visit their incoming edges,
//!    then their outgoing edges; edges visit `from`, then `to`. A record is
//!    collected at most once, and a record whose cascade policy does not
//!    permit persist is never entered.
//! 2. **Emit.** The collected records are walked in order. Before an edge is
//!    inserted, both endpoints are bound to an alias (inserted if New, looked
//!    up by identifier otherwise). Aliases are handed out sequentially on
//!    first binding; a record keeps its first alias for the whole program.
//!
//! Fragments are chained with `with <aliases so far>` so every alias stays in
//! scope, and the program ends with a `return` of the root followed by every
//! other alias.
//!
//! A root that is not New is planned as a single update (or, for an edge of
//! unknown state, an insert-if-absent) without cascading.

use std::collections::HashSet;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use ogm_core::{
    EdgeId, IdentifierPart, NodeId, PersistenceState, PlanConfig, PlanningError, RecordId,
    RecordKind, RecordMeta, SchemaGraph,
};
use ogm_render::serializer::{property_literal, to_literal};
use serde::Serialize;

use crate::statement::{Setter, Statement};

/// A planned statement program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationPlan {
    statements: Vec<Statement>,
    /// Bound aliases in assignment order.
    aliases: Vec<(RecordId, String)>,
    primary_alias: Option<String>,
    program: String,
}

impl MutationPlan {
    /// Fragments in emission order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// The complete statement text.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Alias of the root record. `None` only when the root itself was
    /// excluded by its cascade policy and no edge referenced it.
    pub fn primary_alias(&self) -> Option<&str> {
        self.primary_alias.as_deref()
    }

    pub fn alias_of(&self, record: RecordId) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(id, _)| *id == record)
            .map(|(_, alias)| alias.as_str())
    }

    /// `(record, alias)` pairs in assignment order.
    pub fn aliases(&self) -> &[(RecordId, String)] {
        &self.aliases
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl fmt::Display for MutationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)
    }
}

/// Plans the mutation program that saves `root` and everything it cascades
/// to.
pub fn plan(
    graph: &SchemaGraph,
    root: RecordId,
    config: &PlanConfig,
) -> Result<MutationPlan, PlanningError> {
    let meta = graph.meta(root)?;
    if !meta.state.is_new() {
        return plan_single(graph, root, meta, config);
    }

    let order = collect(graph, root)?;
    let mut emitter = Emitter::new(graph, config);
    for &record in &order {
        match record {
            RecordId::Node(node) => {
                emitter.bind_node(node)?;
            }
            RecordId::Edge(edge) => emitter.emit_edge(edge)?,
        }
    }

    let plan = emitter.finish(root);
    tracing::debug!(
        %root,
        collected = order.len(),
        statements = plan.statements.len(),
        aliases = plan.aliases.len(),
        "planned mutation program"
    );
    Ok(plan)
}

/// Plans `delete().<collection>({ @S && @S.id == v })` for one record.
pub fn plan_delete(
    graph: &SchemaGraph,
    record: RecordId,
    config: &PlanConfig,
) -> Result<Statement, PlanningError> {
    let meta = graph.meta(record)?;
    let schema = schema_of(record, meta)?;
    let (id_name, id_literal) = identifier_of(record, meta, config)?;
    Ok(Statement::Delete {
        kind: kind_of(record),
        schema: schema.to_string(),
        id_name,
        id_literal,
    })
}

// ---------------------------------------------------------------------------
// Collect
// ---------------------------------------------------------------------------

/// Records to insert, in depth-first visit order.
fn collect(graph: &SchemaGraph, root: RecordId) -> Result<IndexSet<RecordId>, PlanningError> {
    let mut collected: IndexSet<RecordId> = IndexSet::new();
    let mut stack = vec![root];
    let mut first = true;

    while let Some(record) = stack.pop() {
        if collected.contains(&record) {
            continue;
        }
        let meta = graph.meta(record)?;
        let is_root = std::mem::take(&mut first);

        if let RecordId::Edge(_) = record {
            // Stored edges are never re-inserted through a cascade.
            if !meta.state.is_new() {
                continue;
            }
        }
        if !meta.cascade.permits_persist() {
            if !is_root {
                continue;
            }
        } else {
            collected.insert(record);
        }
        if !meta.state.is_new() {
            continue;
        }

        // Pushed in reverse so they pop in traversal order.
        let mut neighbors: Vec<RecordId> = match record {
            RecordId::Node(node) => graph
                .incoming_edges(node)?
                .into_iter()
                .chain(graph.outgoing_edges(node)?)
                .map(RecordId::Edge)
                .collect(),
            RecordId::Edge(edge) => [graph.edge_from(edge)?, graph.edge_to(edge)?]
                .into_iter()
                .flatten()
                .map(RecordId::Node)
                .collect(),
        };
        neighbors.retain(|n| !collected.contains(n) && *n != root);
        stack.extend(neighbors.into_iter().rev());
    }

    Ok(collected)
}

// ---------------------------------------------------------------------------
// Emit
// ---------------------------------------------------------------------------

struct Emitter<'g> {
    graph: &'g SchemaGraph,
    config: &'g PlanConfig,
    aliases: IndexMap<RecordId, String>,
    statements: Vec<Statement>,
    /// Alias list captured after each statement, for the `with` chain.
    scopes: Vec<String>,
    emitted_pairs: HashSet<(NodeId, NodeId)>,
}

impl<'g> Emitter<'g> {
    fn new(graph: &'g SchemaGraph, config: &'g PlanConfig) -> Self {
        Emitter {
            graph,
            config,
            aliases: IndexMap::new(),
            statements: Vec::new(),
            scopes: Vec::new(),
            emitted_pairs: HashSet::new(),
        }
    }

    fn next_alias(&self) -> String {
        self.config.alias(self.aliases.len() + 1)
    }

    fn push(&mut self, record: RecordId, alias: String, statement: Statement) {
        self.aliases.insert(record, alias);
        self.statements.push(statement);
        let scope: Vec<&str> = self.aliases.values().map(String::as_str).collect();
        self.scopes.push(scope.join(", "));
    }

    /// Alias of `node`, emitting its insert or lookup on first use.
    fn bind_node(&mut self, node: NodeId) -> Result<String, PlanningError> {
        let record = RecordId::Node(node);
        if let Some(alias) = self.aliases.get(&record) {
            return Ok(alias.clone());
        }

        let meta = &self.graph.node(node)?.meta;
        let schema = schema_of(record, meta)?.to_string();
        let alias = self.next_alias();
        let statement = if meta.state.is_new() {
            Statement::Insert {
                kind: RecordKind::Node,
                schema,
                setters: insert_setters(meta, self.config)?,
                alias: alias.clone(),
            }
        } else {
            let (id_name, id_literal) = identifier_of(record, meta, self.config)?;
            Statement::Lookup {
                kind: RecordKind::Node,
                schema,
                id_name,
                id_literal,
                alias: alias.clone(),
            }
        };

        self.push(record, alias.clone(), statement);
        Ok(alias)
    }

    fn emit_edge(&mut self, edge: EdgeId) -> Result<(), PlanningError> {
        let record = RecordId::Edge(edge);
        let (from, to) = endpoints(self.graph, edge)?;
        if !self.emitted_pairs.insert((from, to)) {
            tracing::debug!(%edge, %from, %to, "skipping edge between an already linked pair");
            return Ok(());
        }

        let from_alias = self.bind_node(from)?;
        let to_alias = self.bind_node(to)?;

        let meta = &self.graph.edge(edge)?.meta;
        let schema = schema_of(record, meta)?.to_string();
        let mut setters = insert_setters(meta, self.config)?;
        setters.extend(Setter::endpoint_refs(&from_alias, &to_alias));

        let alias = self.next_alias();
        self.push(
            record,
            alias.clone(),
            Statement::Insert {
                kind: RecordKind::Edge,
                schema,
                setters,
                alias,
            },
        );
        Ok(())
    }

    fn finish(self, root: RecordId) -> MutationPlan {
        let primary_alias = self.aliases.get(&root).cloned();

        let mut program = String::new();
        let last = self.statements.len().saturating_sub(1);
        for (i, (statement, scope)) in self.statements.iter().zip(&self.scopes).enumerate() {
            program.push_str(&statement.to_string());
            if i < last {
                program.push_str(" with ");
                program.push_str(scope);
                program.push(' ');
            }
        }

        if !self.statements.is_empty() {
            let returned: Vec<String> = primary_alias
                .iter()
                .chain(self.aliases.values().filter(|a| Some(*a) != primary_alias.as_ref()))
                .map(|alias| format!("{alias}{{*}}"))
                .collect();
            program.push_str(" return ");
            program.push_str(&returned.join(", "));
        }

        MutationPlan {
            statements: self.statements,
            aliases: self.aliases.into_iter().collect(),
            primary_alias,
            program,
        }
    }
}

// ---------------------------------------------------------------------------
// Non-new roots
// ---------------------------------------------------------------------------

fn plan_single(
    graph: &SchemaGraph,
    root: RecordId,
    meta: &RecordMeta,
    config: &PlanConfig,
) -> Result<MutationPlan, PlanningError> {
    let schema = schema_of(root, meta)?.to_string();
    let alias = config.alias(1);

    let statement = match (root, meta.state) {
        (RecordId::Edge(edge), PersistenceState::Unknown) => {
            let (from, to) = endpoints(graph, edge)?;
            Statement::InsertIfAbsent {
                schema,
                from_uuid: surrogate_of(graph, from)?,
                to_uuid: surrogate_of(graph, to)?,
                setters: insert_setters(meta, config)?,
                alias: alias.clone(),
            }
        }
        _ => {
            let (id_name, id_literal) = identifier_of(root, meta, config)?;
            let mut setters = Vec::with_capacity(meta.properties.len());
            for (name, prop) in meta.writable_properties() {
                if name != id_name {
                    setters.push(Setter::new(name, property_literal(prop, config)?));
                }
            }
            if setters.is_empty() {
                // Nothing to write besides the identifier.
                Statement::Lookup {
                    kind: kind_of(root),
                    schema,
                    id_name,
                    id_literal,
                    alias: alias.clone(),
                }
            } else {
                Statement::Update {
                    kind: kind_of(root),
                    schema,
                    id_name,
                    id_literal,
                    setters,
                    alias: alias.clone(),
                }
            }
        }
    };

    tracing::debug!(%root, state = ?meta.state, "planned single-record statement");

    let program = match &statement {
        Statement::Lookup { alias, .. } => format!("{statement} return {alias}{{*}}"),
        _ => statement.to_string(),
    };
    Ok(MutationPlan {
        program,
        statements: vec![statement],
        aliases: vec![(root, alias.clone())],
        primary_alias: Some(alias),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn kind_of(record: RecordId) -> RecordKind {
    match record {
        RecordId::Node(_) => RecordKind::Node,
        RecordId::Edge(_) => RecordKind::Edge,
    }
}

fn schema_of(record: RecordId, meta: &RecordMeta) -> Result<&str, PlanningError> {
    meta.schema_name
        .as_deref()
        .ok_or(PlanningError::MissingSchemaName { record })
}

/// `(id_name, id literal)` of a record addressed by identifier.
fn identifier_of(
    record: RecordId,
    meta: &RecordMeta,
    config: &PlanConfig,
) -> Result<(String, String), PlanningError> {
    let schema = schema_of(record, meta)?;
    let missing = |part| PlanningError::MissingIdentifier {
        record,
        schema: schema.to_string(),
        missing: part,
    };
    let id_name = meta.id_name.as_ref().ok_or_else(|| missing(IdentifierPart::IdName))?;
    let id_value = meta.id_value.as_ref().ok_or_else(|| missing(IdentifierPart::IdValue))?;
    Ok((id_name.clone(), to_literal(id_value, None, config)?))
}

/// Identifier setter first (when an id value is declared), then the
/// record's writable properties.
fn insert_setters(meta: &RecordMeta, config: &PlanConfig) -> Result<Vec<Setter>, PlanningError> {
    let mut setters = Vec::with_capacity(meta.properties.len() + 1);
    let id = match (&meta.id_name, &meta.id_value) {
        (Some(name), Some(value)) => {
            setters.push(Setter::new(name, to_literal(value, None, config)?));
            Some(name.as_str())
        }
        _ => None,
    };
    for (name, prop) in meta.writable_properties() {
        if Some(name) == id {
            continue;
        }
        setters.push(Setter::new(name, property_literal(prop, config)?));
    }
    Ok(setters)
}

fn endpoints(graph: &SchemaGraph, edge: EdgeId) -> Result<(NodeId, NodeId), PlanningError> {
    let from = graph
        .edge_from(edge)?
        .ok_or(PlanningError::MissingEndpoint { edge, end: "from" })?;
    let to = graph
        .edge_to(edge)?
        .ok_or(PlanningError::MissingEndpoint { edge, end: "to" })?;
    Ok((from, to))
}

fn surrogate_of(graph: &SchemaGraph, node: NodeId) -> Result<u64, PlanningError> {
    let meta = &graph.node(node)?.meta;
    meta.system_uuid
        .ok_or_else(|| PlanningError::MissingIdentifier {
            record: RecordId::Node(node),
            schema: meta.schema_name.clone().unwrap_or_default(),
            missing: IdentifierPart::SystemUuid,
        })
}
