//! Fields shared by every concrete DataPoint subclass (spec 3, 4.1).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids;

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Identity, versioning, ownership and provenance fields common to every DataPoint.
///
/// Concrete subclasses embed this as their first field and delegate the common
/// accessors to it; see `Node`'s match-based dispatch in `node.rs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPointBase {
    pub id: Uuid,
    pub version: u32,
    pub created_at: i64,
    pub updated_at: i64,
    pub belongs_to_set: Option<Uuid>,
    pub source_pipeline: Option<String>,
    pub source_task: Option<String>,
}

impl DataPointBase {
    /// A DataPoint with no natural deterministic key gets a random v4 id.
    pub fn new_random() -> Self {
        Self::with_id(ids::random_id())
    }

    /// A DataPoint derived deterministically from content (e.g. a document chunk)
    /// gets a `uuid5` id so re-ingesting identical input reproduces the same id.
    pub fn new_deterministic(canonical_key: &str) -> Self {
        Self::with_id(ids::stable_id(canonical_key))
    }

    fn with_id(id: Uuid) -> Self {
        let now = now_millis();
        Self {
            id,
            version: 1,
            created_at: now,
            updated_at: now,
            belongs_to_set: None,
            source_pipeline: None,
            source_task: None,
        }
    }

    pub fn with_node_set(mut self, set_id: Uuid) -> Self {
        self.belongs_to_set = Some(set_id);
        self
    }

    /// Provenance monotonicity (spec invariant 4): only stamps when unset.
    pub fn stamp_provenance(&mut self, pipeline: &str, task: &str) {
        if self.source_pipeline.is_none() {
            self.source_pipeline = Some(pipeline.to_string());
        }
        if self.source_task.is_none() {
            self.source_task = Some(task.to_string());
        }
    }

    /// Bump version/updated_at when `add_data_points` decides a node changed.
    pub fn bump_version(&mut self) {
        self.version += 1;
        self.updated_at = now_millis();
    }
}
