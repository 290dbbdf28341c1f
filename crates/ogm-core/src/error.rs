//! Error types shared across the ogm crates.
//!
//! Uses `thiserror` for structured, matchable variants. [`CoreError`] covers
//! schema graph arena failures; [`PlanningError`] covers everything detected
//! while planning or rendering a statement. Every variant is raised before a
//! statement leaves the core, so callers never see a partial statement.

use std::fmt;

use thiserror::Error;

use crate::id::{EdgeId, NodeId, RecordId};
use crate::record::CascadePolicy;
use crate::value::PropertyKind;

/// Errors produced by the schema graph arena.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node ID does not resolve to a node record in this graph.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// An edge ID does not resolve to an edge record in this graph.
    #[error("edge not found: {id}")]
    EdgeNotFound { id: EdgeId },

    /// A value could not be represented or converted.
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
}

/// The part of a record's identifier that was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierPart {
    IdName,
    IdValue,
    /// Store-assigned surrogate id, required by insert-if-absent.
    SystemUuid,
}

impl fmt::Display for IdentifierPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierPart::IdName => f.write_str("id name"),
            IdentifierPart::IdValue => f.write_str("id value"),
            IdentifierPart::SystemUuid => f.write_str("surrogate uuid"),
        }
    }
}

/// Errors produced while planning a mutation program or rendering a template.
///
/// None of these are retryable: they are caller configuration bugs.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// A record that must be written or addressed has no schema name.
    #[error("record {record} has no schema name")]
    MissingSchemaName { record: RecordId },

    /// An existing or unknown record cannot be addressed by identifier.
    #[error("record {record} ({schema}) is missing its {missing}")]
    MissingIdentifier {
        record: RecordId,
        schema: String,
        missing: IdentifierPart,
    },

    /// An edge reached by the planner has no node attached at one end.
    #[error("edge {edge} has no '{end}' node")]
    MissingEndpoint { edge: EdgeId, end: &'static str },

    /// A template references a parameter absent from the parameter map.
    #[error("parameter '{0}' is not bound")]
    UnboundParameter(String),

    /// One record was given two different cascade policies (strict mode only).
    #[error("record {record} has conflicting cascade policies {existing} and {requested}")]
    AmbiguousCascade {
        record: RecordId,
        existing: CascadePolicy,
        requested: CascadePolicy,
    },

    /// A placeholder is empty or carries an unknown modifier.
    #[error("invalid placeholder '{placeholder}': {reason}")]
    InvalidPlaceholder { placeholder: String, reason: String },

    /// A value cannot be written as its declared property kind.
    #[error("cannot write {found} value as {expected}")]
    TypeMismatch {
        expected: PropertyKind,
        found: &'static str,
    },

    /// The `json` modifier failed to serialize a value.
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] CoreError),
}
