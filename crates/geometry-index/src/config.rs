//! Index configuration

use crate::{DEFAULT_MAX_NODE_ENTRIES, Predicate};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a geometry index
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IndexConfig {
    /// Name under which the host catalog knows this index
    /// Default: "geometry"
    pub name: String,
    /// Predicate used by queries that do not name one
    /// Default: within
    pub default_operator: Predicate,
    /// Maximum entries per R-tree node (clamped to at least 4)
    /// Default: 16
    pub max_node_entries: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: "geometry".to_string(),
            default_operator: Predicate::Within,
            max_node_entries: DEFAULT_MAX_NODE_ENTRIES,
        }
    }
}

impl IndexConfig {
    /// Set the index name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the default predicate
    pub fn with_default_operator(mut self, operator: Predicate) -> Self {
        self.default_operator = operator;
        self
    }

    /// Set the R-tree node fan-out
    pub fn with_max_node_entries(mut self, max_node_entries: usize) -> Self {
        self.max_node_entries = max_node_entries;
        self
    }
}
