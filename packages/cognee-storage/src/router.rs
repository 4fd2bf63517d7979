//! Store router (spec 4.4, C4): resolves `(owner_id, dataset_id)` to a cached
//! `{graph, vector, namespace}` handle triple.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::catalog::{DatasetDatabase, RelationalCatalog};
use crate::error::Result;
use crate::graph::GraphStore;
use crate::vector::VectorIndex;

/// The handle triple every C5/C7/C8 call is routed through (spec 4.4 step 3).
/// The router is the sole place that knows about provider enumeration; no
/// other component should construct a `GraphStore`/`VectorIndex` directly.
#[derive(Clone)]
pub struct StoreHandles {
    pub graph: Arc<dyn GraphStore>,
    pub vector: Arc<dyn VectorIndex>,
    pub namespace: String,
}

/// Constructs a `GraphStore` for a given provider name + connection url.
/// Only one provider ("memory") ships in this crate; a production build
/// registers additional factories (Neo4j, Kuzu, ...) without the router's
/// call sites changing.
pub trait GraphFactory: Send + Sync {
    fn build(&self, provider: &str, connection_info: &serde_json::Value) -> Arc<dyn GraphStore>;
}

pub trait VectorFactory: Send + Sync {
    fn build(&self, provider: &str, connection_info: &serde_json::Value) -> Arc<dyn VectorIndex>;
}

/// Default factory: every provider name resolves to a fresh in-memory store.
/// `StoreRouter::new_in_memory` wires this up for tests and for the
/// reference runtime configuration.
pub struct InMemoryGraphFactory;

impl GraphFactory for InMemoryGraphFactory {
    fn build(&self, _provider: &str, _connection_info: &serde_json::Value) -> Arc<dyn GraphStore> {
        Arc::new(crate::graph::InMemoryGraphStore::new())
    }
}

pub struct InMemoryVectorFactory;

impl VectorFactory for InMemoryVectorFactory {
    fn build(&self, _provider: &str, _connection_info: &serde_json::Value) -> Arc<dyn VectorIndex> {
        Arc::new(crate::vector::InMemoryVectorIndex::new())
    }
}

/// Resolves `(owner_id, dataset_id)` pairs to `StoreHandles`, provisioning a
/// `DatasetDatabase` row on first use and caching handles keyed by
/// `(provider, url, namespace)` so repeated calls for the same dataset reuse
/// one store instance (spec 4.4 steps 1-2).
pub struct StoreRouter {
    catalog: Arc<dyn RelationalCatalog>,
    graph_factory: Arc<dyn GraphFactory>,
    vector_factory: Arc<dyn VectorFactory>,
    /// Cache key: `(provider, url_or_name, namespace)`.
    handle_cache: DashMap<(String, String, String), StoreHandles>,
}

impl StoreRouter {
    pub fn new(
        catalog: Arc<dyn RelationalCatalog>,
        graph_factory: Arc<dyn GraphFactory>,
        vector_factory: Arc<dyn VectorFactory>,
    ) -> Self {
        Self {
            catalog,
            graph_factory,
            vector_factory,
            handle_cache: DashMap::new(),
        }
    }

    pub fn new_in_memory(catalog: Arc<dyn RelationalCatalog>) -> Self {
        Self::new(catalog, Arc::new(InMemoryGraphFactory), Arc::new(InMemoryVectorFactory))
    }

    /// Resolve the handle triple for `(owner_id, dataset_id)`, provisioning
    /// a `DatasetDatabase` row with configured defaults on first use.
    pub async fn route(&self, owner_id: Uuid, dataset_id: Uuid) -> Result<StoreHandles> {
        let db = match self.catalog.get_dataset_database(dataset_id).await? {
            Some(db) => db,
            None => {
                let db = DatasetDatabase::default_for(owner_id, dataset_id);
                self.catalog.upsert_dataset_database(db.clone()).await?;
                db
            }
        };

        let namespace = format!("{}:{}", db.owner_id, dataset_id);

        let graph_key = (db.graph_provider.clone(), db.graph_db_name.clone(), namespace.clone());
        let graph = if let Some(cached) = self.handle_cache.get(&graph_key) {
            cached.graph.clone()
        } else {
            self.graph_factory.build(&db.graph_provider, &db.connection_info)
        };

        let vector_key = (db.vector_provider.clone(), db.vector_db_name.clone(), namespace.clone());
        let vector = if let Some(cached) = self.handle_cache.get(&vector_key) {
            cached.vector.clone()
        } else {
            self.vector_factory.build(&db.vector_provider, &db.connection_info)
        };

        let handles = StoreHandles {
            graph,
            vector,
            namespace,
        };
        self.handle_cache.insert(graph_key, handles.clone());
        self.handle_cache.insert(vector_key, handles.clone());
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;

    #[tokio::test]
    async fn route_provisions_dataset_database_on_first_use() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let router = StoreRouter::new_in_memory(catalog.clone());
        let owner = Uuid::new_v4();
        let dataset = Uuid::new_v4();

        let handles = router.route(owner, dataset).await.unwrap();
        assert!(handles.namespace.contains(&dataset.to_string()));
        assert!(catalog.get_dataset_database(dataset).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn route_reuses_cached_handles_for_same_dataset() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let router = StoreRouter::new_in_memory(catalog);
        let owner = Uuid::new_v4();
        let dataset = Uuid::new_v4();

        let a = router.route(owner, dataset).await.unwrap();
        let id = Uuid::new_v4();
        a.graph
            .add_nodes(vec![crate::graph::GraphNode {
                id,
                node_type: "Entity".into(),
                properties: serde_json::Map::new(),
            }])
            .await
            .unwrap();

        let b = router.route(owner, dataset).await.unwrap();
        assert!(b.graph.has_node(id).await.unwrap());
    }

    #[tokio::test]
    async fn route_isolates_distinct_datasets() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let router = StoreRouter::new_in_memory(catalog);
        let owner = Uuid::new_v4();
        let ds_a = Uuid::new_v4();
        let ds_b = Uuid::new_v4();

        let a = router.route(owner, ds_a).await.unwrap();
        let id = Uuid::new_v4();
        a.graph
            .add_nodes(vec![crate::graph::GraphNode {
                id,
                node_type: "Entity".into(),
                properties: serde_json::Map::new(),
            }])
            .await
            .unwrap();

        let b = router.route(owner, ds_b).await.unwrap();
        assert!(!b.graph.has_node(id).await.unwrap());
    }
}
