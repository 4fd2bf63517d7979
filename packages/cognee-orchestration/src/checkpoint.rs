//! Resumable-stage checkpoints (spec 4.5 "Failure semantics": a batch
//! failure rolls back that batch only; the operation as a whole is
//! resumable). A checkpoint is keyed by `(run_id, task_name)`; its
//! `cache_data` is the bincode-serialized task output.

use std::collections::HashSet;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub run_id: Uuid,
    pub task_name: String,
    pub cache_key: String,
    pub cache_data: Vec<u8>,
}

impl Checkpoint {
    pub fn new(run_id: Uuid, task_name: impl Into<String>, cache_key: String, cache_data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            task_name: task_name.into(),
            cache_key,
            cache_data,
        }
    }
}

/// In-process checkpoint store, keyed by `cache_key` (spec 4.5's resumable
/// cache key, `run_id:task_name` for the default pipeline). A production
/// deployment persists these rows in the same relational catalog as
/// `PipelineRun` records; this reference implementation keeps the interface
/// that adapter would satisfy. `DashMap` rather than a `Mutex`-guarded list
/// since checkpoints from concurrently-running tasks are written
/// independently and never contend on the same key.
pub struct CheckpointManager {
    checkpoints: DashMap<String, Checkpoint>,
}

impl CheckpointManager {
    pub fn new_in_memory() -> Self {
        Self {
            checkpoints: DashMap::new(),
        }
    }

    pub async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        self.checkpoints.insert(checkpoint.cache_key.clone(), checkpoint);
        Ok(())
    }

    pub async fn load_checkpoint(&self, cache_key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.checkpoints.get(cache_key).map(|cp| cp.cache_data.clone()))
    }

    pub async fn completed_tasks(&self, run_id: Uuid) -> Result<HashSet<String>> {
        Ok(self
            .checkpoints
            .iter()
            .filter(|entry| entry.value().run_id == run_id)
            .map(|entry| entry.value().task_name.clone())
            .collect())
    }

    pub async fn delete_run_checkpoints(&self, run_id: Uuid) -> Result<()> {
        self.checkpoints.retain(|_, cp| cp.run_id != run_id);
        Ok(())
    }
}

impl Default for CheckpointManager {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_load_checkpoint_round_trips() {
        let mgr = CheckpointManager::new_in_memory();
        let run_id = Uuid::new_v4();

        let cp = Checkpoint::new(run_id, "chunk_naive", "chunks:doc1".to_string(), vec![1, 2, 3, 4]);
        mgr.save_checkpoint(cp).await.unwrap();

        let loaded = mgr.load_checkpoint("chunks:doc1").await.unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn save_checkpoint_replaces_existing_for_same_task() {
        let mgr = CheckpointManager::new_in_memory();
        let run_id = Uuid::new_v4();

        mgr.save_checkpoint(Checkpoint::new(run_id, "chunk_naive", "k".to_string(), vec![1]))
            .await
            .unwrap();
        mgr.save_checkpoint(Checkpoint::new(run_id, "chunk_naive", "k".to_string(), vec![2]))
            .await
            .unwrap();

        assert_eq!(mgr.load_checkpoint("k").await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn completed_tasks_tracks_per_run() {
        let mgr = CheckpointManager::new_in_memory();
        let run_id = Uuid::new_v4();

        mgr.save_checkpoint(Checkpoint::new(run_id, "chunk_naive", "a".to_string(), vec![1]))
            .await
            .unwrap();
        mgr.save_checkpoint(Checkpoint::new(run_id, "extract_graph_from_data", "b".to_string(), vec![2]))
            .await
            .unwrap();

        let completed = mgr.completed_tasks(run_id).await.unwrap();
        assert_eq!(completed.len(), 2);
        assert!(completed.contains("chunk_naive"));
    }

    #[tokio::test]
    async fn delete_run_checkpoints_clears_only_that_run() {
        let mgr = CheckpointManager::new_in_memory();
        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();

        mgr.save_checkpoint(Checkpoint::new(run_a, "t", "a".to_string(), vec![1]))
            .await
            .unwrap();
        mgr.save_checkpoint(Checkpoint::new(run_b, "t", "b".to_string(), vec![2]))
            .await
            .unwrap();

        mgr.delete_run_checkpoints(run_a).await.unwrap();

        assert!(mgr.completed_tasks(run_a).await.unwrap().is_empty());
        assert_eq!(mgr.completed_tasks(run_b).await.unwrap().len(), 1);
    }
}
