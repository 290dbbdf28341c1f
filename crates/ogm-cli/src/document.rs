//! JSON graph documents and parameter files.
//!
//! A graph document describes the records a mapper would emit for one save
//! call. Records are named by `key`; edges reference their endpoints by key.
//!
//! ```json
//! {
//!   "root": "alice",
//!   "nodes": [
//!     { "key": "alice", "schema": "Person", "properties": { "name": "Alice" } },
//!     { "key": "bob", "schema": "Person", "id_name": "ssn", "id_value": "123",
//!       "state": "Existing" }
//!   ],
//!   "edges": [
//!     { "key": "k", "schema": "knows", "from": "alice", "to": "bob",
//!       "to_cascade": ["PERSIST"] }
//!   ]
//! }
//! ```

use std::collections::HashSet;

use indexmap::IndexMap;
use ogm_core::{
    Candidate, CascadePolicy, CoreError, EnumValue, NodeId, PersistenceState, PlanConfig,
    PlanningError, PropertyKind, RecordId, SchemaGraph, Value,
};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while reading a document or a parameter file.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown record key '{0}'")]
    UnknownKey(String),

    #[error("duplicate record key '{0}'")]
    DuplicateKey(String),

    #[error("record '{0}' is not a node")]
    NotANode(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Planning(#[from] PlanningError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDocument {
    pub root: String,
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub edges: Vec<EdgeDoc>,
}

/// Metadata shared by node and edge entries.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordDoc {
    pub schema: Option<String>,
    pub id_name: Option<String>,
    pub id_value: Option<serde_json::Value>,
    pub state: PersistenceState,
    pub cascade: Option<CascadePolicy>,
    pub system_uuid: Option<u64>,
    pub properties: IndexMap<String, serde_json::Value>,
    /// Declared store kinds by property name (`"int32"`, `"string[]"`, ...).
    pub kinds: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct NodeDoc {
    pub key: String,
    #[serde(flatten)]
    pub record: RecordDoc,
}

#[derive(Debug, Deserialize)]
pub struct EdgeDoc {
    pub key: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Cascade the relationship declares for its source node.
    pub from_cascade: Option<CascadePolicy>,
    /// Cascade the relationship declares for its target node.
    pub to_cascade: Option<CascadePolicy>,
    #[serde(flatten)]
    pub record: RecordDoc,
}

/// A document materialized into a schema graph.
#[derive(Debug)]
pub struct LoadedGraph {
    pub graph: SchemaGraph,
    pub keys: IndexMap<String, RecordId>,
    pub root: RecordId,
}

impl LoadedGraph {
    pub fn record(&self, key: &str) -> Result<RecordId, DocumentError> {
        self.keys
            .get(key)
            .copied()
            .ok_or_else(|| DocumentError::UnknownKey(key.to_string()))
    }
}

pub fn parse_graph(json: &str) -> Result<GraphDocument, DocumentError> {
    Ok(serde_json::from_str(json)?)
}

struct Loader<'c> {
    graph: SchemaGraph,
    keys: IndexMap<String, RecordId>,
    /// Records whose cascade has been set explicitly or by a relationship.
    cascaded: HashSet<RecordId>,
    config: &'c PlanConfig,
}

impl Loader<'_> {
    fn claim_key(&self, key: &str) -> Result<(), DocumentError> {
        if self.keys.contains_key(key) {
            return Err(DocumentError::DuplicateKey(key.to_string()));
        }
        Ok(())
    }

    fn node(&self, key: &str) -> Result<NodeId, DocumentError> {
        match self.keys.get(key) {
            Some(RecordId::Node(node)) => Ok(*node),
            Some(RecordId::Edge(_)) => Err(DocumentError::NotANode(key.to_string())),
            None => Err(DocumentError::UnknownKey(key.to_string())),
        }
    }

    /// The first policy a record receives replaces the default; later ones
    /// are merged.
    fn cascade(&mut self, record: RecordId, policy: CascadePolicy) -> Result<(), DocumentError> {
        if self.cascaded.insert(record) {
            self.graph.set_cascade(record, policy)?;
        } else {
            self.graph
                .merge_cascade(record, policy, self.config.strict_cascade)?;
        }
        Ok(())
    }

    fn apply(&mut self, record: RecordId, doc: &RecordDoc, id_value: Option<Value>) -> Result<(), DocumentError> {
        let meta = self.graph.meta_mut(record)?;
        meta.schema_name = doc.schema.clone();
        meta.id_name = doc.id_name.clone();
        meta.id_value = id_value;
        meta.state = doc.state;
        meta.system_uuid = doc.system_uuid;
        for (name, json) in &doc.properties {
            let value = Value::from_json(json)?;
            match doc.kinds.get(name) {
                Some(kind) => {
                    meta.set_typed_property(name.clone(), value, kind.parse::<PropertyKind>()?);
                }
                None => {
                    meta.set_property(name.clone(), value);
                }
            }
        }
        if let Some(policy) = doc.cascade {
            self.cascade(record, policy)?;
        }
        Ok(())
    }

    fn add_node(&mut self, node: &NodeDoc) -> Result<(), DocumentError> {
        self.claim_key(&node.key)?;
        let id_value = node.record.id_value.as_ref().map(Value::from_json).transpose()?;

        // The same sub-object listed twice maps onto one record.
        if let (Some(schema), Some(value)) = (&node.record.schema, &id_value) {
            if let Some(existing) = self.graph.find(schema, Candidate::Id(value)) {
                tracing::debug!(key = %node.key, record = %existing, "node already registered");
                self.keys.insert(node.key.clone(), existing);
                if let Some(policy) = node.record.cascade {
                    self.cascade(existing, policy)?;
                }
                return Ok(());
            }
        }

        let id = RecordId::Node(self.graph.create_node());
        self.apply(id, &node.record, id_value)?;
        self.keys.insert(node.key.clone(), id);
        Ok(())
    }

    fn add_edge(&mut self, edge: &EdgeDoc) -> Result<(), DocumentError> {
        self.claim_key(&edge.key)?;
        let id_value = edge.record.id_value.as_ref().map(Value::from_json).transpose()?;
        let id = self.graph.create_edge();
        self.apply(id.into(), &edge.record, id_value)?;

        match &edge.from {
            Some(key) => {
                let node = self.node(key)?;
                self.graph.attach_from(id, node)?;
                if let Some(policy) = edge.from_cascade {
                    self.cascade(node.into(), policy)?;
                }
            }
            None => {
                self.graph.edge_from_or_insert(id)?;
            }
        }
        match &edge.to {
            Some(key) => {
                let node = self.node(key)?;
                self.graph.attach_to(id, node)?;
                if let Some(policy) = edge.to_cascade {
                    self.cascade(node.into(), policy)?;
                }
            }
            None => {
                self.graph.edge_to_or_insert(id)?;
            }
        }

        self.keys.insert(edge.key.clone(), id.into());
        Ok(())
    }
}

/// Builds the schema graph a document describes.
pub fn load_graph(doc: &GraphDocument, config: &PlanConfig) -> Result<LoadedGraph, DocumentError> {
    let mut loader = Loader {
        graph: SchemaGraph::new(),
        keys: IndexMap::new(),
        cascaded: HashSet::new(),
        config,
    };
    for node in &doc.nodes {
        loader.add_node(node)?;
    }
    for edge in &doc.edges {
        loader.add_edge(edge)?;
    }

    let root = loader
        .keys
        .get(&doc.root)
        .copied()
        .ok_or_else(|| DocumentError::UnknownKey(doc.root.clone()))?;

    tracing::debug!(
        records = loader.graph.record_count(),
        keys = loader.keys.len(),
        "loaded graph document"
    );

    Ok(LoadedGraph {
        graph: loader.graph,
        keys: loader.keys,
        root,
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnumDoc {
    #[serde(rename = "enum", default)]
    type_name: String,
    name: String,
    ordinal: u32,
    field: Option<serde_json::Value>,
}

/// Parses a parameter file: a JSON object of name to value. An object with
/// `name` and `ordinal` members is read as an enum constant.
pub fn parse_params(json: &str) -> Result<IndexMap<String, Value>, DocumentError> {
    let raw: IndexMap<String, serde_json::Value> = serde_json::from_str(json)?;
    raw.into_iter()
        .map(|(name, json)| Ok((name, param_value(json)?)))
        .collect()
}

fn param_value(json: serde_json::Value) -> Result<Value, DocumentError> {
    let is_enum = json
        .as_object()
        .is_some_and(|map| map.contains_key("name") && map.contains_key("ordinal"));
    if !is_enum {
        return Ok(Value::from_json(&json)?);
    }

    let doc: EnumDoc = serde_json::from_value(json)?;
    let mut value = EnumValue::new(doc.type_name, doc.name, doc.ordinal);
    if let Some(field) = doc.field {
        value = value.with_field(Value::from_json(&field)?);
    }
    Ok(Value::Enum(value))
}
