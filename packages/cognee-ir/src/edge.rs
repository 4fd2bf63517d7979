//! Explicit and implicit edges between DataPoints (spec 3 "Edge").

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An edge between two DataPoints. Explicit edges come back from extraction
/// tasks as `(source_id, target_id, relation_name, properties)`; implicit edges
/// are derived by `Closure` from nested DataPoint-typed fields, where
/// `relation_name` is the field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation_name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Edge {
    pub fn new(source_id: Uuid, target_id: Uuid, relation_name: impl Into<String>) -> Self {
        Self {
            source_id,
            target_id,
            relation_name: relation_name.into(),
            properties: Map::new(),
        }
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Identity used by invariant 2: at most one edge per (source, target, relation).
    pub fn identity(&self) -> (Uuid, Uuid, &str) {
        (self.source_id, self.target_id, &self.relation_name)
    }
}
