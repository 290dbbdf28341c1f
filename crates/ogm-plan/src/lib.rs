//! Mutation planning for schema graphs.
//!
//! [`plan`] turns a rooted [`SchemaGraph`](ogm_core::SchemaGraph) into one
//! statement program that inserts the root and everything it cascades to,
//! binding each record to a result alias so later fragments can reference
//! it. [`plan_delete`] builds the delete-by-id statement for one record.

pub mod planner;
pub mod statement;

pub use planner::{plan, plan_delete, MutationPlan};
pub use statement::{Setter, Statement};
