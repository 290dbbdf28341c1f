//! SchemaGraph: the arena holding one pending write.
//!
//! A [`SchemaGraph`] scopes one save/update call. Every record created while
//! mapping one object graph lives in the same arena, so identity lookups and
//! planner dedup see all of them.
//!
//! # Storage
//!
//! Node records and edge records are both vertices of a single petgraph
//! `StableGraph`. Adjacency is stored as [`Link`] arcs pointing from an edge
//! record to its endpoint node records:
//!
//! ```text
//!   (Person) <--From-- [knows] --To--> (Person)
//! ```
//!
//! A node's outgoing edges are the edge records holding a `From` link to it,
//! its incoming edges those holding a `To` link. Because each logical
//! relationship is exactly one link, declaring the same relationship from
//! both sides (A's outgoing edge, B's back-reference to that edge) never
//! produces a second edge record.

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, PlanningError};
use crate::id::{EdgeId, NodeId, RecordId, SourceHandle};
use crate::record::{
    CascadePolicy, EdgeRecord, Endpoint, Link, NodeRecord, PersistenceState, Record, RecordMeta,
};
use crate::value::Value;

/// What [`SchemaGraph::find`] matches records against.
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    /// Match on `(schema_name, id_value)`.
    Id(&'a Value),
    /// Match on the stored external-object handle.
    Source(SourceHandle),
}

/// Translation of record IDs after an arena merge.
#[derive(Debug, Clone)]
pub enum IdRemap {
    /// IDs of the surviving arena are unchanged.
    Identity,
    /// IDs of the absorbed arena, old slot to new slot.
    Table(HashMap<NodeIndex<u32>, NodeIndex<u32>>),
}

impl IdRemap {
    pub fn record(&self, id: RecordId) -> Option<RecordId> {
        match id {
            RecordId::Node(n) => self.node(n).map(RecordId::Node),
            RecordId::Edge(e) => self.edge(e).map(RecordId::Edge),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<NodeId> {
        match self {
            IdRemap::Identity => Some(id),
            IdRemap::Table(table) => table.get(&id.into()).copied().map(NodeId::from),
        }
    }

    pub fn edge(&self, id: EdgeId) -> Option<EdgeId> {
        match self {
            IdRemap::Identity => Some(id),
            IdRemap::Table(table) => table.get(&id.into()).copied().map(EdgeId::from),
        }
    }
}

/// Result of [`SchemaGraph::merge`].
#[derive(Debug, Clone)]
pub struct MergedGraph {
    pub graph: SchemaGraph,
    /// Where the first argument's records ended up.
    pub left: IdRemap,
    /// Where the second argument's records ended up.
    pub right: IdRemap,
}

/// The shared registry of records for one planning unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaGraph {
    arena: StableGraph<Record, Link, Directed, u32>,
    /// Next link sequence number.
    next_seq: u64,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    /// Allocates a node record with default metadata (New, cascade ALL).
    pub fn create_node(&mut self) -> NodeId {
        NodeId::from(self.arena.add_node(Record::Node(NodeRecord::default())))
    }

    /// Allocates an edge record. Its endpoints are synthesized on demand by
    /// [`edge_from_or_insert`](Self::edge_from_or_insert) /
    /// [`edge_to_or_insert`](Self::edge_to_or_insert) unless the caller
    /// attaches real nodes first.
    pub fn create_edge(&mut self) -> EdgeId {
        EdgeId::from(self.arena.add_node(Record::Edge(EdgeRecord::default())))
    }

    /// Allocates an edge whose target is `node`.
    pub fn new_incoming_edge(&mut self, node: NodeId) -> Result<EdgeId, CoreError> {
        self.node(node)?;
        let edge = self.create_edge();
        self.attach_to(edge, node)?;
        Ok(edge)
    }

    /// Allocates an edge whose source is `node`.
    pub fn new_outgoing_edge(&mut self, node: NodeId) -> Result<EdgeId, CoreError> {
        self.node(node)?;
        let edge = self.create_edge();
        self.attach_from(edge, node)?;
        Ok(edge)
    }

    // -----------------------------------------------------------------------
    // Record access
    // -----------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Result<&NodeRecord, CoreError> {
        match self.arena.node_weight(id.into()) {
            Some(Record::Node(node)) => Ok(node),
            _ => Err(CoreError::NodeNotFound { id }),
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord, CoreError> {
        match self.arena.node_weight_mut(id.into()) {
            Some(Record::Node(node)) => Ok(node),
            _ => Err(CoreError::NodeNotFound { id }),
        }
    }

    pub fn edge(&self, id: EdgeId) -> Result<&EdgeRecord, CoreError> {
        match self.arena.node_weight(id.into()) {
            Some(Record::Edge(edge)) => Ok(edge),
            _ => Err(CoreError::EdgeNotFound { id }),
        }
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Result<&mut EdgeRecord, CoreError> {
        match self.arena.node_weight_mut(id.into()) {
            Some(Record::Edge(edge)) => Ok(edge),
            _ => Err(CoreError::EdgeNotFound { id }),
        }
    }

    pub fn meta(&self, id: RecordId) -> Result<&RecordMeta, CoreError> {
        match id {
            RecordId::Node(n) => self.node(n).map(|r| &r.meta),
            RecordId::Edge(e) => self.edge(e).map(|r| &r.meta),
        }
    }

    pub fn meta_mut(&mut self, id: RecordId) -> Result<&mut RecordMeta, CoreError> {
        match id {
            RecordId::Node(n) => self.node_mut(n).map(|r| &mut r.meta),
            RecordId::Edge(e) => self.edge_mut(e).map(|r| &mut r.meta),
        }
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.meta(id).is_ok()
    }

    /// All record IDs in arena order.
    pub fn records(&self) -> Vec<RecordId> {
        self.arena
            .node_indices()
            .map(|idx| self.record_id(idx))
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.arena.node_count()
    }

    pub fn node_count(&self) -> usize {
        self.arena
            .node_weights()
            .filter(|r| matches!(r, Record::Node(_)))
            .count()
    }

    pub fn edge_count(&self) -> usize {
        self.arena
            .node_weights()
            .filter(|r| matches!(r, Record::Edge(_)))
            .count()
    }

    fn record_id(&self, idx: NodeIndex<u32>) -> RecordId {
        match &self.arena[idx] {
            Record::Node(_) => RecordId::Node(NodeId::from(idx)),
            Record::Edge(_) => RecordId::Edge(EdgeId::from(idx)),
        }
    }

    // -----------------------------------------------------------------------
    // Metadata mutation
    // -----------------------------------------------------------------------

    pub fn set_schema_name(
        &mut self,
        id: impl Into<RecordId>,
        name: impl Into<String>,
    ) -> Result<(), CoreError> {
        self.meta_mut(id.into())?.schema_name = Some(name.into());
        Ok(())
    }

    /// Declares the business identifier used to address an existing record.
    pub fn set_identifier(
        &mut self,
        id: impl Into<RecordId>,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), CoreError> {
        let meta = self.meta_mut(id.into())?;
        meta.id_name = Some(name.into());
        meta.id_value = Some(value.into());
        Ok(())
    }

    pub fn set_property(
        &mut self,
        id: impl Into<RecordId>,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, CoreError> {
        Ok(self.meta_mut(id.into())?.set_property(name, value))
    }

    pub fn set_persistence_state(
        &mut self,
        id: impl Into<RecordId>,
        state: PersistenceState,
    ) -> Result<(), CoreError> {
        self.meta_mut(id.into())?.state = state;
        Ok(())
    }

    pub fn set_source(
        &mut self,
        id: impl Into<RecordId>,
        source: SourceHandle,
    ) -> Result<(), CoreError> {
        self.meta_mut(id.into())?.source = Some(source);
        Ok(())
    }

    pub fn set_system_uuid(&mut self, id: impl Into<RecordId>, uuid: u64) -> Result<(), CoreError> {
        self.meta_mut(id.into())?.system_uuid = Some(uuid);
        Ok(())
    }

    /// Overwrites a record's cascade policy.
    pub fn set_cascade(
        &mut self,
        id: impl Into<RecordId>,
        policy: CascadePolicy,
    ) -> Result<(), CoreError> {
        self.meta_mut(id.into())?.cascade = policy;
        Ok(())
    }

    /// Applies a cascade policy to a record that may already carry one from
    /// another reference path.
    ///
    /// Equal policies are a no-op. Differing policies are unioned (`ALL`
    /// dominates) and logged, or rejected with
    /// [`PlanningError::AmbiguousCascade`] when `strict` is set. Returns the
    /// policy in effect afterwards.
    pub fn merge_cascade(
        &mut self,
        id: impl Into<RecordId>,
        requested: CascadePolicy,
        strict: bool,
    ) -> Result<CascadePolicy, PlanningError> {
        let id = id.into();
        let meta = self.meta_mut(id)?;
        let existing = meta.cascade;
        if existing == requested {
            return Ok(existing);
        }
        if strict {
            return Err(PlanningError::AmbiguousCascade {
                record: id,
                existing,
                requested,
            });
        }

        let widened = existing.union(requested);
        tracing::warn!(
            record = %id,
            %existing,
            %requested,
            %widened,
            "record reached with conflicting cascade policies; using the most permissive"
        );
        meta.cascade = widened;
        Ok(widened)
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Makes `node` the source of `edge`.
    ///
    /// If `edge` already starts at `node` the existing link is reused and
    /// nothing changes. A previous source is unlinked; a synthesized
    /// placeholder left without links is dropped from the graph and its ID
    /// becomes invalid.
    pub fn attach_from(&mut self, edge: EdgeId, node: NodeId) -> Result<(), CoreError> {
        self.attach(edge, node, Endpoint::From)
    }

    /// Makes `node` the target of `edge`. Same rules as
    /// [`attach_from`](Self::attach_from).
    pub fn attach_to(&mut self, edge: EdgeId, node: NodeId) -> Result<(), CoreError> {
        self.attach(edge, node, Endpoint::To)
    }

    /// Node-side spelling of [`attach_to`](Self::attach_to): `node` declares
    /// `edge` as one of its incoming edges.
    pub fn attach_incoming_edge(&mut self, node: NodeId, edge: EdgeId) -> Result<(), CoreError> {
        self.attach(edge, node, Endpoint::To)
    }

    /// Node-side spelling of [`attach_from`](Self::attach_from).
    pub fn attach_outgoing_edge(&mut self, node: NodeId, edge: EdgeId) -> Result<(), CoreError> {
        self.attach(edge, node, Endpoint::From)
    }

    fn attach(&mut self, edge: EdgeId, node: NodeId, end: Endpoint) -> Result<(), CoreError> {
        self.edge(edge)?;
        self.node(node)?;

        if let Some((link, current)) = self.link(edge, end) {
            if current == node {
                tracing::trace!(%edge, %node, ?end, "link already present");
                return Ok(());
            }
            self.arena.remove_edge(link);
            self.drop_orphan_placeholder(current);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.arena
            .add_edge(edge.into(), node.into(), Link { end, seq });

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    fn link(&self, edge: EdgeId, end: Endpoint) -> Option<(EdgeIndex<u32>, NodeId)> {
        self.arena
            .edges_directed(edge.into(), Direction::Outgoing)
            .find(|link| link.weight().end == end)
            .map(|link| (link.id(), NodeId::from(link.target())))
    }

    fn drop_orphan_placeholder(&mut self, node: NodeId) {
        let idx: NodeIndex<u32> = node.into();
        let orphan = matches!(self.arena.node_weight(idx), Some(Record::Node(n)) if n.placeholder)
            && self
                .arena
                .edges_directed(idx, Direction::Incoming)
                .next()
                .is_none();
        if orphan {
            self.arena.remove_node(idx);
        }
    }

    /// Source of `edge`, if one has been attached or synthesized.
    pub fn edge_from(&self, edge: EdgeId) -> Result<Option<NodeId>, CoreError> {
        self.edge(edge)?;
        Ok(self.link(edge, Endpoint::From).map(|(_, node)| node))
    }

    /// Target of `edge`, if one has been attached or synthesized.
    pub fn edge_to(&self, edge: EdgeId) -> Result<Option<NodeId>, CoreError> {
        self.edge(edge)?;
        Ok(self.link(edge, Endpoint::To).map(|(_, node)| node))
    }

    /// Source of `edge`, synthesizing a placeholder node if none is attached.
    ///
    /// A placeholder later replaced through [`SchemaGraph::attach_from`] is removed
    /// from the arena, and its slot may be handed to the next record added, so
    /// a `NodeId` returned here must not be held across such an attach.
    pub fn edge_from_or_insert(&mut self, edge: EdgeId) -> Result<NodeId, CoreError> {
        self.endpoint_or_insert(edge, Endpoint::From)
    }

    /// Target of `edge`, synthesizing a placeholder node if none is attached.
    pub fn edge_to_or_insert(&mut self, edge: EdgeId) -> Result<NodeId, CoreError> {
        self.endpoint_or_insert(edge, Endpoint::To)
    }

    fn endpoint_or_insert(&mut self, edge: EdgeId, end: Endpoint) -> Result<NodeId, CoreError> {
        self.edge(edge)?;
        if let Some((_, node)) = self.link(edge, end) {
            return Ok(node);
        }
        let placeholder = NodeId::from(self.arena.add_node(Record::Node(NodeRecord {
            meta: RecordMeta::default(),
            placeholder: true,
        })));
        self.attach(edge, placeholder, end)?;
        Ok(placeholder)
    }

    /// Edges whose target is `node`, in attach order.
    pub fn incoming_edges(&self, node: NodeId) -> Result<Vec<EdgeId>, CoreError> {
        self.edges_at(node, Endpoint::To)
    }

    /// Edges whose source is `node`, in attach order.
    pub fn outgoing_edges(&self, node: NodeId) -> Result<Vec<EdgeId>, CoreError> {
        self.edges_at(node, Endpoint::From)
    }

    fn edges_at(&self, node: NodeId, end: Endpoint) -> Result<Vec<EdgeId>, CoreError> {
        self.node(node)?;
        let mut links: Vec<(u64, EdgeId)> = self
            .arena
            .edges_directed(node.into(), Direction::Incoming)
            .filter(|link| link.weight().end == end)
            .map(|link| (link.weight().seq, EdgeId::from(link.source())))
            .collect();
        links.sort_unstable_by_key(|(seq, _)| *seq);
        Ok(links.into_iter().map(|(_, edge)| edge).collect())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Finds a registered record for a sub-object that may already have been
    /// mapped, so a diamond reference yields one record instead of two.
    ///
    /// Records are scanned in arena order; the first match wins.
    pub fn find(&self, schema_name: &str, candidate: Candidate<'_>) -> Option<RecordId> {
        self.arena
            .node_indices()
            .find(|&idx| {
                let meta = self.arena[idx].meta();
                meta.schema_name.as_deref() == Some(schema_name)
                    && match candidate {
                        Candidate::Id(value) => meta.id_value.as_ref() == Some(value),
                        Candidate::Source(handle) => meta.source == Some(handle),
                    }
            })
            .map(|idx| self.record_id(idx))
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Combines two registries. The smaller one is absorbed into the larger;
    /// no record or link is dropped. Ties keep `a` as the survivor.
    pub fn merge(a: SchemaGraph, b: SchemaGraph) -> MergedGraph {
        if a.record_count() >= b.record_count() {
            let mut graph = a;
            let right = graph.absorb(&b);
            MergedGraph {
                graph,
                left: IdRemap::Identity,
                right,
            }
        } else {
            let mut graph = b;
            let left = graph.absorb(&a);
            MergedGraph {
                graph,
                left,
                right: IdRemap::Identity,
            }
        }
    }

    /// Copies every record and link of `other` into `self`.
    pub fn absorb(&mut self, other: &SchemaGraph) -> IdRemap {
        let mut table = HashMap::with_capacity(other.arena.node_count());
        for idx in other.arena.node_indices() {
            let new_idx = self.arena.add_node(other.arena[idx].clone());
            table.insert(idx, new_idx);
        }

        let mut links: Vec<_> = other
            .arena
            .edge_references()
            .map(|link| (link.source(), link.target(), *link.weight()))
            .collect();
        links.sort_unstable_by_key(|(_, _, link)| link.seq);

        for (source, target, link) in links {
            let seq = self.next_seq + link.seq;
            self.arena
                .add_edge(table[&source], table[&target], Link { end: link.end, seq });
        }
        self.next_seq += other.next_seq;

        #[cfg(debug_assertions)]
        self.assert_consistency();

        IdRemap::Table(table)
    }

    // -----------------------------------------------------------------------
    // Debug consistency assertion
    // -----------------------------------------------------------------------

    /// Verifies that every link runs from an edge record to a node record and
    /// that no edge has two links for the same endpoint.
    ///
    /// Only called in debug builds (via `cfg(debug_assertions)`).
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        for link in self.arena.edge_references() {
            assert!(
                matches!(self.arena[link.source()], Record::Edge(_)),
                "link {:?} does not start at an edge record",
                link.id()
            );
            assert!(
                matches!(self.arena[link.target()], Record::Node(_)),
                "link {:?} does not end at a node record",
                link.id()
            );
        }
        for idx in self.arena.node_indices() {
            if let Record::Edge(_) = self.arena[idx] {
                for end in [Endpoint::From, Endpoint::To] {
                    let count = self
                        .arena
                        .edges_directed(idx, Direction::Outgoing)
                        .filter(|link| link.weight().end == end)
                        .count();
                    assert!(count <= 1, "edge {:?} has {} {:?} links", idx, count, end);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CascadeType;

    fn person(graph: &mut SchemaGraph, name: &str) -> NodeId {
        let node = graph.create_node();
        graph.set_schema_name(node, "Person").unwrap();
        graph.set_property(node, "name", name).unwrap();
        node
    }

    #[test]
    fn create_records_and_link() {
        let mut graph = SchemaGraph::new();
        let alice = person(&mut graph, "Alice");
        let bob = person(&mut graph, "Bob");
        let knows = graph.create_edge();

        graph.attach_from(knows, alice).unwrap();
        graph.attach_to(knows, bob).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_from(knows).unwrap(), Some(alice));
        assert_eq!(graph.edge_to(knows).unwrap(), Some(bob));
        assert_eq!(graph.outgoing_edges(alice).unwrap(), vec![knows]);
        assert_eq!(graph.incoming_edges(bob).unwrap(), vec![knows]);
        assert!(graph.incoming_edges(alice).unwrap().is_empty());
    }

    #[test]
    fn back_reference_reuses_existing_link() {
        let mut graph = SchemaGraph::new();
        let a = person(&mut graph, "A");
        let b = person(&mut graph, "B");
        let edge = graph.new_outgoing_edge(a).unwrap();
        graph.attach_to(edge, b).unwrap();

        // B declares the same edge as its incoming relationship; A declares
        // it again as outgoing.
        graph.attach_incoming_edge(b, edge).unwrap();
        graph.attach_outgoing_edge(a, edge).unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.incoming_edges(b).unwrap(), vec![edge]);
        assert_eq!(graph.outgoing_edges(a).unwrap(), vec![edge]);
    }

    #[test]
    fn self_loop_is_one_edge_both_ways() {
        let mut graph = SchemaGraph::new();
        let a = person(&mut graph, "A");
        let edge = graph.new_outgoing_edge(a).unwrap();
        graph.attach_to(edge, a).unwrap();

        assert_eq!(graph.incoming_edges(a).unwrap(), vec![edge]);
        assert_eq!(graph.outgoing_edges(a).unwrap(), vec![edge]);
    }

    #[test]
    fn replacing_placeholder_drops_it() {
        let mut graph = SchemaGraph::new();
        let edge = graph.create_edge();
        let placeholder = graph.edge_from_or_insert(edge).unwrap();
        assert!(graph.node(placeholder).unwrap().placeholder);
        assert_eq!(graph.record_count(), 2);

        let real = person(&mut graph, "Real");
        graph.attach_from(edge, real).unwrap();

        assert_eq!(graph.edge_from(edge).unwrap(), Some(real));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn replacing_real_node_keeps_it() {
        let mut graph = SchemaGraph::new();
        let a = person(&mut graph, "A");
        let b = person(&mut graph, "B");
        let edge = graph.new_outgoing_edge(a).unwrap();
        graph.attach_from(edge, b).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert!(graph.outgoing_edges(a).unwrap().is_empty());
        assert_eq!(graph.outgoing_edges(b).unwrap(), vec![edge]);
    }

    #[test]
    fn endpoint_or_insert_is_idempotent() {
        let mut graph = SchemaGraph::new();
        let edge = graph.create_edge();
        let first = graph.edge_to_or_insert(edge).unwrap();
        let second = graph.edge_to_or_insert(edge).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn edges_keep_attach_order() {
        let mut graph = SchemaGraph::new();
        let hub = person(&mut graph, "Hub");
        let e1 = graph.new_outgoing_edge(hub).unwrap();
        let e2 = graph.new_outgoing_edge(hub).unwrap();
        let e3 = graph.new_outgoing_edge(hub).unwrap();

        assert_eq!(graph.outgoing_edges(hub).unwrap(), vec![e1, e2, e3]);
    }

    #[test]
    fn wrong_kind_id_is_not_found() {
        let mut graph = SchemaGraph::new();
        let node = graph.create_node();
        let bogus_edge = EdgeId(node.0);

        match graph.attach_from(bogus_edge, node) {
            Err(CoreError::EdgeNotFound { id }) => assert_eq!(id, bogus_edge),
            other => panic!("expected EdgeNotFound, got {:?}", other),
        }
    }

    #[test]
    fn find_by_id_value_and_by_source() {
        let mut graph = SchemaGraph::new();
        let alice = person(&mut graph, "Alice");
        graph.set_identifier(alice, "ssn", "123").unwrap();
        let bob = person(&mut graph, "Bob");
        graph.set_source(bob, SourceHandle(0xb0b)).unwrap();

        let ssn = Value::from("123");
        assert_eq!(
            graph.find("Person", Candidate::Id(&ssn)),
            Some(RecordId::Node(alice))
        );
        assert_eq!(graph.find("Company", Candidate::Id(&ssn)), None);
        assert_eq!(
            graph.find("Person", Candidate::Source(SourceHandle(0xb0b))),
            Some(RecordId::Node(bob))
        );
        assert_eq!(graph.find("Person", Candidate::Source(SourceHandle(1))), None);
        assert_eq!(
            graph.find("Company", Candidate::Source(SourceHandle(0xb0b))),
            None
        );
    }

    #[test]
    fn merge_cascade_widens_or_rejects() {
        let mut graph = SchemaGraph::new();
        let node = graph.create_node();
        graph.set_cascade(node, CascadePolicy::PERSIST).unwrap();

        let same = graph.merge_cascade(node, CascadePolicy::PERSIST, true).unwrap();
        assert_eq!(same, CascadePolicy::PERSIST);

        let err = graph
            .merge_cascade(node, CascadePolicy::REMOVE, true)
            .unwrap_err();
        assert!(matches!(err, PlanningError::AmbiguousCascade { .. }));

        let widened = graph
            .merge_cascade(node, CascadePolicy::ALL, false)
            .unwrap();
        assert!(widened.contains(CascadeType::All));
        assert!(widened.contains(CascadeType::Persist));
        assert_eq!(graph.meta(node.into()).unwrap().cascade, widened);
    }

    #[test]
    fn merge_absorbs_smaller_graph() {
        let mut big = SchemaGraph::new();
        let a = person(&mut big, "A");
        let b = person(&mut big, "B");
        let ab = big.new_outgoing_edge(a).unwrap();
        big.attach_to(ab, b).unwrap();

        let mut small = SchemaGraph::new();
        let c = person(&mut small, "C");

        let merged = SchemaGraph::merge(small, big);
        let graph = merged.graph;
        assert_eq!(graph.record_count(), 4);

        // big survived: its ids are unchanged.
        assert_eq!(merged.right.node(a), Some(a));
        assert_eq!(graph.edge_to(ab).unwrap(), Some(b));

        let c_new = merged.left.node(c).unwrap();
        assert_eq!(
            graph.node(c_new).unwrap().meta.property("name"),
            Some(&Value::from("C"))
        );
    }

    #[test]
    fn merge_preserves_links_of_absorbed_graph() {
        let big = {
            let mut g = SchemaGraph::new();
            for i in 0..3 {
                person(&mut g, &format!("P{i}"));
            }
            g
        };
        let mut small = SchemaGraph::new();
        let x = person(&mut small, "X");
        let e1 = small.new_outgoing_edge(x).unwrap();
        let e2 = small.new_outgoing_edge(x).unwrap();

        let merged = SchemaGraph::merge(big, small);
        let x_new = merged.right.node(x).unwrap();
        let edges = merged.graph.outgoing_edges(x_new).unwrap();
        assert_eq!(
            edges,
            vec![
                merged.right.edge(e1).unwrap(),
                merged.right.edge(e2).unwrap()
            ]
        );
    }

    #[test]
    fn serde_roundtrip_keeps_links() {
        let mut graph = SchemaGraph::new();
        let a = person(&mut graph, "A");
        let b = person(&mut graph, "B");
        let e = graph.new_outgoing_edge(a).unwrap();
        graph.attach_to(e, b).unwrap();

        let json = serde_json::to_string(&graph).unwrap();
        let back: SchemaGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.record_count(), 3);
        assert_eq!(back.edge_from(e).unwrap(), Some(a));
        assert_eq!(back.edge_to(e).unwrap(), Some(b));
    }

    proptest::proptest! {
        #[test]
        fn last_attach_wins(ops in proptest::collection::vec((0usize..3, 0usize..4, proptest::bool::ANY), 0..40)) {
            let mut graph = SchemaGraph::new();
            let nodes: Vec<NodeId> = (0..4).map(|_| graph.create_node()).collect();
            let edges: Vec<EdgeId> = (0..3).map(|_| graph.create_edge()).collect();
            let mut expected: Vec<(Option<NodeId>, Option<NodeId>)> = vec![(None, None); 3];

            for (e, n, to) in ops {
                if to {
                    graph.attach_to(edges[e], nodes[n]).unwrap();
                    expected[e].1 = Some(nodes[n]);
                } else {
                    graph.attach_from(edges[e], nodes[n]).unwrap();
                    expected[e].0 = Some(nodes[n]);
                }
            }

            for (i, &edge) in edges.iter().enumerate() {
                proptest::prop_assert_eq!(graph.edge_from(edge).unwrap(), expected[i].0);
                proptest::prop_assert_eq!(graph.edge_to(edge).unwrap(), expected[i].1);
            }
            for &node in &nodes {
                for edge in graph.incoming_edges(node).unwrap() {
                    proptest::prop_assert_eq!(graph.edge_to(edge).unwrap(), Some(node));
                }
                for edge in graph.outgoing_edges(node).unwrap() {
                    proptest::prop_assert_eq!(graph.edge_from(edge).unwrap(), Some(node));
                }
            }
            proptest::prop_assert_eq!(graph.node_count(), 4);
        }
    }
}
