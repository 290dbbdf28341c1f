//! Planning and rendering options.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Options shared by the planner and the value serializer.
///
/// Every field has a default, so a partial JSON document (or `{}`) is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Prefix of the sequential result aliases (`r1`, `r2`, ...).
    pub alias_prefix: String,
    /// Literal written for null values.
    pub null_literal: String,
    /// Reject conflicting cascade policies instead of widening them.
    pub strict_cascade: bool,
}

impl Default for PlanConfig {
    fn default() -> Self {
        PlanConfig {
            alias_prefix: "r".to_string(),
            null_literal: "null".to_string(),
            strict_cascade: false,
        }
    }
}

impl PlanConfig {
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json).map_err(|e| CoreError::InvalidValue {
            reason: format!("invalid plan config: {e}"),
        })
    }

    /// Alias for the `n`-th bound record, 1-based.
    pub fn alias(&self, n: usize) -> String {
        format!("{}{}", self.alias_prefix, n)
    }
}
