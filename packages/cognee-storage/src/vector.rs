//! Collection-scoped nearest-neighbor vector index (spec 4.2, C2).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
    Euclidean,
    Dot,
}

#[derive(Debug, Clone)]
pub struct VectorItem {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub score: f32,
    pub payload: Map<String, Value>,
}

/// Optional payload predicate passed to `search` (spec 4.2: "filter?").
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub key: String,
    pub value: Value,
}

/// Nearest-neighbor contract (spec 4.2). The index never embeds text itself;
/// vectors arrive precomputed from the caller's embedder.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn create_collection(&self, name: &str, dim: usize, distance: Distance) -> Result<()>;
    async fn has_collection(&self, name: &str) -> Result<bool>;
    async fn upsert(&self, collection: &str, items: Vec<VectorItem>) -> Result<()>;
    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>>;
    async fn search_batch(
        &self,
        collection: &str,
        query_vectors: &[Vec<f32>],
        k: usize,
    ) -> Result<Vec<Vec<SearchHit>>>;
    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<()>;
    async fn prune(&self) -> Result<()>;
}

struct Collection {
    dim: usize,
    distance: Distance,
    items: HashMap<Uuid, VectorItem>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Collection>,
}

/// Reference vector index backed by a brute-force scan. Correct for every
/// contract method; not meant to scale, it exists to let C5/C8 be exercised
/// without a real embedding backend.
pub struct InMemoryVectorIndex {
    state: Arc<RwLock<State>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
    match distance {
        Distance::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                0.0
            } else {
                dot / (norm_a * norm_b)
            }
        }
        Distance::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        Distance::Euclidean => {
            let sq: f32 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
            -sq.sqrt()
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn create_collection(&self, name: &str, dim: usize, distance: Distance) -> Result<()> {
        let mut state = self.state.write().await;
        state.collections.entry(name.to_string()).or_insert_with(|| Collection {
            dim,
            distance,
            items: HashMap::new(),
        });
        Ok(())
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.state.read().await.collections.contains_key(name))
    }

    async fn upsert(&self, collection: &str, items: Vec<VectorItem>) -> Result<()> {
        let mut state = self.state.write().await;
        let coll = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| StorageError::collection_not_found(collection))?;
        for item in items {
            coll.items.insert(item.id, item);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>> {
        let state = self.state.read().await;
        let coll = match state.collections.get(collection) {
            Some(c) => c,
            // spec 4.2: CollectionNotFound is converted to an empty result
            // only in search paths.
            None => return Ok(Vec::new()),
        };
        let mut hits: Vec<SearchHit> = coll
            .items
            .values()
            .filter(|item| match filter {
                Some(f) => item.payload.get(&f.key) == Some(&f.value),
                None => true,
            })
            .map(|item| SearchHit {
                id: item.id,
                score: score(coll.distance, query_vector, &item.vector),
                payload: item.payload.clone(),
            })
            .collect();
        // Monotonically sorted by score desc; ties broken by id for determinism.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn search_batch(
        &self,
        collection: &str,
        query_vectors: &[Vec<f32>],
        k: usize,
    ) -> Result<Vec<Vec<SearchHit>>> {
        let mut results = Vec::with_capacity(query_vectors.len());
        for q in query_vectors {
            results.push(self.search(collection, q, k, None).await?);
        }
        Ok(results)
    }

    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(coll) = state.collections.get_mut(collection) {
            for id in ids {
                coll.items.remove(id);
            }
        }
        Ok(())
    }

    async fn prune(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = State::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Uuid, vector: Vec<f32>) -> VectorItem {
        VectorItem {
            id,
            vector,
            payload: Map::new(),
        }
    }

    #[tokio::test]
    async fn create_collection_is_idempotent() {
        let index = InMemoryVectorIndex::new();
        index.create_collection("Entity_name", 3, Distance::Cosine).await.unwrap();
        index.create_collection("Entity_name", 3, Distance::Cosine).await.unwrap();
        assert!(index.has_collection("Entity_name").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_without_collection_errors() {
        let index = InMemoryVectorIndex::new();
        let err = index
            .upsert("missing", vec![item(Uuid::new_v4(), vec![1.0])])
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::CollectionNotFound);
    }

    #[tokio::test]
    async fn search_on_missing_collection_returns_empty() {
        let index = InMemoryVectorIndex::new();
        let hits = index.search("missing", &[1.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_sorts_by_score_descending() {
        let index = InMemoryVectorIndex::new();
        index.create_collection("c", 2, Distance::Cosine).await.unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        index
            .upsert("c", vec![item(a, vec![1.0, 0.0]), item(b, vec![0.0, 1.0])])
            .await
            .unwrap();

        let hits = index.search("c", &[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].id, a);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_id() {
        let index = InMemoryVectorIndex::new();
        index.create_collection("c", 2, Distance::Cosine).await.unwrap();
        let id = Uuid::new_v4();
        index.upsert("c", vec![item(id, vec![1.0, 0.0])]).await.unwrap();
        index.upsert("c", vec![item(id, vec![0.0, 1.0])]).await.unwrap();

        let hits = index.search("c", &[0.0, 1.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let index = InMemoryVectorIndex::new();
        index.create_collection("c", 2, Distance::Cosine).await.unwrap();
        let id = Uuid::new_v4();
        index.upsert("c", vec![item(id, vec![1.0, 0.0])]).await.unwrap();
        index.delete("c", &[id]).await.unwrap();
        index.delete("c", &[id]).await.unwrap();

        let hits = index.search("c", &[1.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }
}
