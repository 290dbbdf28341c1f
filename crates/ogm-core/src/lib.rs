//! Core data model of the graph mutation planner.
//!
//! A pending write is a [`SchemaGraph`]: node and edge records with property
//! bags, persistence state and cascade policy, linked in an arena so that
//! cyclic object graphs stay acyclic at the ownership level.
//!
//! # Modules
//!
//! - [`id`]: record identities
//! - [`value`]: dynamic values and store property kinds
//! - [`record`]: record metadata, cascade policy, persistence state
//! - [`graph`]: the arena and its link operations
//! - [`config`]: planner and serializer options
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod graph;
pub mod id;
pub mod record;
pub mod value;

pub use config::PlanConfig;
pub use error::{CoreError, IdentifierPart, PlanningError};
pub use graph::{Candidate, IdRemap, MergedGraph, SchemaGraph};
pub use id::{EdgeId, NodeId, RecordId, SourceHandle};
pub use record::{
    CascadePolicy, CascadeType, EdgeRecord, NodeRecord, PersistenceState, Record, RecordKind,
    RecordMeta,
};
pub use value::{EnumValue, Point, Property, PropertyKind, ScalarKind, Value};
