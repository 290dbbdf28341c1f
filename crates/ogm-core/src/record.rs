//! Record types stored in the schema graph arena.
//!
//! A record is either a node or an edge destined for a mutation statement.
//! Both kinds share [`RecordMeta`]: schema name, business identifier,
//! property bag, persistence state and cascade policy. Adjacency is not stored
//! on the records themselves; it lives in the arena as [`Link`]s so that the
//! ownership structure stays acyclic even when the logical graph has cycles.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::SourceHandle;
use crate::value::{Property, PropertyKind, Value};

/// Property names reserved by the store. Setter clauses never write them.
pub const SYSTEM_PROPERTIES: [&str; 6] = ["_id", "_uuid", "_from", "_to", "_from_uuid", "_to_uuid"];

/// Surrogate id property of every stored record.
pub const UUID_PROPERTY: &str = "_uuid";
/// Edge property holding the surrogate id of the source node.
pub const FROM_UUID_PROPERTY: &str = "_from_uuid";
/// Edge property holding the surrogate id of the target node.
pub const TO_UUID_PROPERTY: &str = "_to_uuid";

pub fn is_system_property(name: &str) -> bool {
    SYSTEM_PROPERTIES.contains(&name)
}

/// Whether a record is known to be absent from the store, known to be
/// present, or unknown (insert-if-absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PersistenceState {
    #[default]
    New,
    Existing,
    Unknown,
}

impl PersistenceState {
    pub fn is_new(self) -> bool {
        self == PersistenceState::New
    }
}

/// One cascade flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CascadeType {
    Persist,
    Update,
    Remove,
    All,
}

impl CascadeType {
    const fn bit(self) -> u8 {
        match self {
            CascadeType::Persist => 0b0001,
            CascadeType::Update => 0b0010,
            CascadeType::Remove => 0b0100,
            CascadeType::All => 0b1000,
        }
    }

    const ORDER: [CascadeType; 4] = [
        CascadeType::Persist,
        CascadeType::Update,
        CascadeType::Remove,
        CascadeType::All,
    ];
}

/// Set of cascade flags attached to a record.
///
/// `All` dominates: a policy containing `All` permits every operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<CascadeType>", from = "Vec<CascadeType>")]
pub struct CascadePolicy(u8);

impl CascadePolicy {
    pub const NONE: CascadePolicy = CascadePolicy(0);
    pub const PERSIST: CascadePolicy = CascadePolicy(CascadeType::Persist.bit());
    pub const UPDATE: CascadePolicy = CascadePolicy(CascadeType::Update.bit());
    pub const REMOVE: CascadePolicy = CascadePolicy(CascadeType::Remove.bit());
    pub const ALL: CascadePolicy = CascadePolicy(CascadeType::All.bit());

    pub fn of(types: &[CascadeType]) -> Self {
        CascadePolicy(types.iter().fold(0, |bits, t| bits | t.bit()))
    }

    /// Whether the flag itself is present.
    pub fn contains(self, t: CascadeType) -> bool {
        self.0 & t.bit() != 0
    }

    /// Whether the policy permits `t`, directly or through `All`.
    pub fn permits(self, t: CascadeType) -> bool {
        self.contains(t) || self.contains(CascadeType::All)
    }

    pub fn permits_persist(self) -> bool {
        self.permits(CascadeType::Persist)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: CascadePolicy) -> CascadePolicy {
        CascadePolicy(self.0 | other.0)
    }

    pub fn types(self) -> Vec<CascadeType> {
        CascadeType::ORDER
            .into_iter()
            .filter(|t| self.contains(*t))
            .collect()
    }
}

impl From<Vec<CascadeType>> for CascadePolicy {
    fn from(types: Vec<CascadeType>) -> Self {
        CascadePolicy::of(&types)
    }
}

impl From<CascadePolicy> for Vec<CascadeType> {
    fn from(policy: CascadePolicy) -> Self {
        policy.types()
    }
}

impl fmt::Debug for CascadePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.types()).finish()
    }
}

impl fmt::Display for CascadePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .types()
            .into_iter()
            .map(|t| match t {
                CascadeType::Persist => "PERSIST",
                CascadeType::Update => "UPDATE",
                CascadeType::Remove => "REMOVE",
                CascadeType::All => "ALL",
            })
            .collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Node or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Node,
    Edge,
}

impl RecordKind {
    /// Collection keyword used by the statement language.
    pub fn collection(self) -> &'static str {
        match self {
            RecordKind::Node => "nodes",
            RecordKind::Edge => "edges",
        }
    }
}

/// Data shared by node and edge records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub schema_name: Option<String>,
    pub id_name: Option<String>,
    pub id_value: Option<Value>,
    pub properties: IndexMap<String, Property>,
    pub state: PersistenceState,
    pub cascade: CascadePolicy,
    /// Handle of the domain object this record was built from.
    pub source: Option<SourceHandle>,
    /// Store-assigned surrogate id, known once the record has been written.
    pub system_uuid: Option<u64>,
}

impl Default for RecordMeta {
    fn default() -> Self {
        RecordMeta {
            schema_name: None,
            id_name: None,
            id_value: None,
            properties: IndexMap::new(),
            state: PersistenceState::New,
            cascade: CascadePolicy::ALL,
            source: None,
            system_uuid: None,
        }
    }
}

impl RecordMeta {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).map(|p| &p.value)
    }

    /// Writes a property whose store kind is derived from the value.
    /// Returns the previous value, if any.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties
            .insert(name.into(), Property::new(value.into()))
            .map(|p| p.value)
    }

    pub fn set_typed_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        kind: PropertyKind,
    ) -> Option<Value> {
        self.properties
            .insert(name.into(), Property::typed(value.into(), kind))
            .map(|p| p.value)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.shift_remove(name).map(|p| p.value)
    }

    /// Properties a setter clause may write, in insertion order.
    pub fn writable_properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.properties
            .iter()
            .filter(|(name, _)| !is_system_property(name))
            .map(|(name, prop)| (name.as_str(), prop))
    }
}

/// A node record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    pub meta: RecordMeta,
    /// Synthesized as a stand-in endpoint; the caller never supplied it.
    pub placeholder: bool,
}

/// An edge record. Its endpoints are [`Link`]s in the arena.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub meta: RecordMeta,
}

/// Arena entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Node(NodeRecord),
    Edge(EdgeRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Node(_) => RecordKind::Node,
            Record::Edge(_) => RecordKind::Edge,
        }
    }

    pub fn meta(&self) -> &RecordMeta {
        match self {
            Record::Node(node) => &node.meta,
            Record::Edge(edge) => &edge.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut RecordMeta {
        match self {
            Record::Node(node) => &mut node.meta,
            Record::Edge(edge) => &mut edge.meta,
        }
    }
}

/// Which end of an edge record a link attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    From,
    To,
}

/// Arena link from an edge record to one of its endpoint node records.
///
/// `seq` orders links by attach time so traversal order does not depend on
/// petgraph's internal adjacency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub end: Endpoint,
    pub seq: u64,
}
