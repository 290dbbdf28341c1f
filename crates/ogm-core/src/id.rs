//! Stable identity newtypes for schema graph records.
//!
//! Node records and edge records live in one arena, so both ID types wrap the
//! same petgraph `NodeIndex<u32>` space. They are still distinct newtypes so
//! that a `NodeId` cannot be passed where an `EdgeId` is expected.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Identity of a node record within one [`SchemaGraph`](crate::graph::SchemaGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identity of an edge record within one [`SchemaGraph`](crate::graph::SchemaGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Identity of either kind of record.
///
/// This is the dedup key used during planning: two records are the same
/// record only if their `RecordId`s are equal, regardless of property values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordId {
    Node(NodeId),
    Edge(EdgeId),
}

/// Opaque handle to the external domain object a record was built from.
///
/// The mapper picks the value (an address, a sequence number, ...); the core
/// only ever compares handles for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceHandle(pub u64);

impl RecordId {
    /// Raw arena slot shared by both record kinds.
    pub fn index(self) -> NodeIndex<u32> {
        match self {
            RecordId::Node(id) => id.into(),
            RecordId::Edge(id) => id.into(),
        }
    }

    pub fn as_node(self) -> Option<NodeId> {
        match self {
            RecordId::Node(id) => Some(id),
            RecordId::Edge(_) => None,
        }
    }

    pub fn as_edge(self) -> Option<EdgeId> {
        match self {
            RecordId::Edge(id) => Some(id),
            RecordId::Node(_) => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge#{}", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Node(id) => id.fmt(f),
            RecordId::Edge(id) => id.fmt(f),
        }
    }
}

impl From<NodeId> for RecordId {
    fn from(id: NodeId) -> Self {
        RecordId::Node(id)
    }
}

impl From<EdgeId> for RecordId {
    fn from(id: EdgeId) -> Self {
        RecordId::Edge(id)
    }
}

// Bridge between the typed IDs and petgraph's NodeIndex<u32>.

impl From<NodeId> for NodeIndex<u32> {
    fn from(id: NodeId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

impl From<EdgeId> for NodeIndex<u32> {
    fn from(id: EdgeId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

impl From<NodeIndex<u32>> for NodeId {
    fn from(idx: NodeIndex<u32>) -> Self {
        NodeId(idx.index() as u32)
    }
}

impl From<NodeIndex<u32>> for EdgeId {
    fn from(idx: NodeIndex<u32>) -> Self {
        EdgeId(idx.index() as u32)
    }
}
