//! Labeled property graph store (spec 4.3, C3).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use cognee_ir::Edge;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// A graph node as stored: the caller's type tag plus scalar properties
/// (spec 4.1: the graph never sees nested DataPoint fields, only the
/// flattened scalar view produced by `Node::scalar_properties`).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: Uuid,
    pub node_type: String,
    pub properties: Map<String, Value>,
}

impl GraphNode {
    /// Property-hash used by `add_data_points`'s changed-vs-unchanged check
    /// (spec 4.5 step 3). Two nodes with identical type and properties hash
    /// equal regardless of insertion order. Sha256 rather than `Hash`/
    /// `DefaultHasher` so the value is stable across process restarts and
    /// Rust versions, since it may be persisted for later comparison.
    pub fn property_hash(&self) -> u64 {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.node_type.as_bytes());
        // BTreeMap iteration would be simpler but properties arrives as a
        // serde_json::Map (insertion-ordered); sort keys for a stable hash.
        let mut keys: Vec<&String> = self.properties.keys().collect();
        keys.sort();
        for k in keys {
            hasher.update(k.as_bytes());
            hasher.update(self.properties[k].to_string().as_bytes());
        }
        let digest = hasher.finalize();
        u64::from_be_bytes(digest[0..8].try_into().unwrap())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

/// Selector for `get_subgraph` (spec 4.3).
#[derive(Debug, Clone)]
pub enum SubgraphFilter {
    ByIds(Vec<Uuid>),
    ByLabel(String),
    /// Property-equality predicate: `(key, value)`.
    ByProperty(String, Value),
}

#[derive(Debug, Clone, Default)]
pub struct Subgraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
}

/// Labeled property graph contract (spec 4.3). All operations are
/// idempotent; `add_nodes`/`add_edges` merge rather than overwrite per
/// invariants 1 and 2.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn add_nodes(&self, nodes: Vec<GraphNode>) -> Result<()>;
    async fn add_edges(&self, edges: Vec<Edge>) -> Result<()>;
    async fn has_node(&self, id: Uuid) -> Result<bool>;
    async fn get_node(&self, id: Uuid) -> Result<Option<GraphNode>>;
    async fn get_nodes(&self, ids: &[Uuid]) -> Result<Vec<GraphNode>>;
    async fn get_neighbours(
        &self,
        id: Uuid,
        direction: Direction,
        relation: Option<&str>,
    ) -> Result<Vec<GraphNode>>;
    async fn get_subgraph(&self, filter: SubgraphFilter) -> Result<Subgraph>;
    async fn delete_nodes(&self, ids: &[Uuid]) -> Result<()>;
    async fn prune(&self) -> Result<()>;
}

#[derive(Default)]
struct State {
    nodes: HashMap<Uuid, GraphNode>,
    /// Edges keyed by `(source, target, relation)` per invariant 2.
    edges: HashMap<(Uuid, Uuid, String), Edge>,
    /// Adjacency, maintained alongside `edges` for O(degree) neighbour lookups.
    out_adj: HashMap<Uuid, HashSet<Uuid>>,
    in_adj: HashMap<Uuid, HashSet<Uuid>>,
}

/// Reference graph store backed by an in-process `RwLock`-guarded map.
/// Suitable as the default backend and as a model for the invariants a
/// production adapter (Neo4j, Kuzu, ...) must uphold.
pub struct InMemoryGraphStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn add_nodes(&self, nodes: Vec<GraphNode>) -> Result<()> {
        let mut state = self.state.write().await;
        for node in nodes {
            match state.nodes.get_mut(&node.id) {
                // Invariant 1: newer version wins; here "newer" is decided by
                // the caller (add_data_points already filtered to new/changed),
                // so a reinsert always merges properties last-writer-wins.
                Some(existing) => {
                    for (k, v) in node.properties {
                        existing.properties.insert(k, v);
                    }
                    existing.node_type = node.node_type;
                }
                None => {
                    state.nodes.insert(node.id, node);
                }
            }
        }
        Ok(())
    }

    async fn add_edges(&self, edges: Vec<Edge>) -> Result<()> {
        let mut state = self.state.write().await;
        for edge in edges {
            let key = (
                edge.source_id,
                edge.target_id,
                edge.relation_name.clone(),
            );
            match state.edges.get_mut(&key) {
                Some(existing) => {
                    // Invariant 2: re-insertion is a no-op unless properties
                    // differ, in which case they merge last-writer-wins.
                    for (k, v) in edge.properties {
                        existing.properties.insert(k, v);
                    }
                }
                None => {
                    state
                        .out_adj
                        .entry(edge.source_id)
                        .or_default()
                        .insert(edge.target_id);
                    state
                        .in_adj
                        .entry(edge.target_id)
                        .or_default()
                        .insert(edge.source_id);
                    state.edges.insert(key, edge);
                }
            }
        }
        Ok(())
    }

    async fn has_node(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.read().await.nodes.contains_key(&id))
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<GraphNode>> {
        Ok(self.state.read().await.nodes.get(&id).cloned())
    }

    async fn get_nodes(&self, ids: &[Uuid]) -> Result<Vec<GraphNode>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.nodes.get(id).cloned()).collect())
    }

    async fn get_neighbours(
        &self,
        id: Uuid,
        direction: Direction,
        relation: Option<&str>,
    ) -> Result<Vec<GraphNode>> {
        let state = self.state.read().await;
        let mut ids: HashSet<Uuid> = HashSet::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            if let Some(out) = state.out_adj.get(&id) {
                ids.extend(out.iter().copied());
            }
        }
        if matches!(direction, Direction::In | Direction::Both) {
            if let Some(inn) = state.in_adj.get(&id) {
                ids.extend(inn.iter().copied());
            }
        }
        if let Some(rel) = relation {
            ids.retain(|target| {
                state
                    .edges
                    .keys()
                    .any(|(s, t, r)| r == rel && ((*s == id && *t == *target) || (*t == id && *s == *target)))
            });
        }
        Ok(ids.into_iter().filter_map(|id| state.nodes.get(&id).cloned()).collect())
    }

    async fn get_subgraph(&self, filter: SubgraphFilter) -> Result<Subgraph> {
        let state = self.state.read().await;
        let nodes: Vec<GraphNode> = match &filter {
            SubgraphFilter::ByIds(ids) => {
                ids.iter().filter_map(|id| state.nodes.get(id).cloned()).collect()
            }
            SubgraphFilter::ByLabel(label) => state
                .nodes
                .values()
                .filter(|n| &n.node_type == label)
                .cloned()
                .collect(),
            SubgraphFilter::ByProperty(key, value) => state
                .nodes
                .values()
                .filter(|n| n.properties.get(key) == Some(value))
                .cloned()
                .collect(),
        };
        let node_ids: HashSet<Uuid> = nodes.iter().map(|n| n.id).collect();
        let edges: Vec<Edge> = state
            .edges
            .values()
            .filter(|e| node_ids.contains(&e.source_id) && node_ids.contains(&e.target_id))
            .cloned()
            .collect();
        Ok(Subgraph { nodes, edges })
    }

    async fn delete_nodes(&self, ids: &[Uuid]) -> Result<()> {
        let mut state = self.state.write().await;
        let victims: HashSet<Uuid> = ids.iter().copied().collect();
        for id in &victims {
            state.nodes.remove(id);
            state.out_adj.remove(id);
            state.in_adj.remove(id);
        }
        // Cascade to incident edges (spec 4.3 "delete_nodes cascades").
        state
            .edges
            .retain(|(s, t, _), _| !victims.contains(s) && !victims.contains(t));
        for adj in state.out_adj.values_mut() {
            adj.retain(|t| !victims.contains(t));
        }
        for adj in state.in_adj.values_mut() {
            adj.retain(|s| !victims.contains(s));
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

    fn node(id: Uuid, node_type: &str) -> GraphNode {
        let mut properties = Map::new();
        properties.insert("id".into(), Value::String(id.to_string()));
        GraphNode {
            id,
            node_type: node_type.into(),
            properties,
        }
    }

    #[tokio::test]
    async fn add_nodes_is_idempotent() {
        let store = InMemoryGraphStore::new();
        let id = Uuid::new_v4();
        store.add_nodes(vec![node(id, "Entity")]).await.unwrap();
        store.add_nodes(vec![node(id, "Entity")]).await.unwrap();
        assert!(store.has_node(id).await.unwrap());
        assert_eq!(store.get_nodes(&[id]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_nodes_merges_properties_last_writer_wins() {
        let store = InMemoryGraphStore::new();
        let id = Uuid::new_v4();
        let mut first = node(id, "Entity");
        first.properties.insert("name".into(), Value::String("a".into()));
        store.add_nodes(vec![first]).await.unwrap();

        let mut second = node(id, "Entity");
        second.properties.insert("name".into(), Value::String("b".into()));
        store.add_nodes(vec![second]).await.unwrap();

        let stored = store.get_node(id).await.unwrap().unwrap();
        assert_eq!(stored.properties.get("name"), Some(&Value::String("b".into())));
    }

    #[tokio::test]
    async fn add_edges_is_idempotent_per_source_target_relation() {
        let store = InMemoryGraphStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.add_edges(vec![Edge::new(a, b, "is_a")]).await.unwrap();
        store.add_edges(vec![Edge::new(a, b, "is_a")]).await.unwrap();

        let subgraph = store
            .get_subgraph(SubgraphFilter::ByIds(vec![a, b]))
            .await
            .unwrap();
        assert_eq!(subgraph.edges.len(), 1);
    }

    #[tokio::test]
    async fn get_neighbours_respects_direction() {
        let store = InMemoryGraphStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.add_nodes(vec![node(a, "Entity"), node(b, "Entity")]).await.unwrap();
        store.add_edges(vec![Edge::new(a, b, "contains")]).await.unwrap();

        let out = store.get_neighbours(a, Direction::Out, None).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, b);

        let none = store.get_neighbours(b, Direction::Out, None).await.unwrap();
        assert!(none.is_empty());

        let incoming = store.get_neighbours(b, Direction::In, None).await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].id, a);
    }

    #[tokio::test]
    async fn delete_nodes_cascades_to_incident_edges() {
        let store = InMemoryGraphStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.add_nodes(vec![node(a, "Entity"), node(b, "Entity")]).await.unwrap();
        store.add_edges(vec![Edge::new(a, b, "is_a")]).await.unwrap();

        store.delete_nodes(&[a]).await.unwrap();

        assert!(!store.has_node(a).await.unwrap());
        let subgraph = store
            .get_subgraph(SubgraphFilter::ByIds(vec![a, b]))
            .await
            .unwrap();
        assert!(subgraph.edges.is_empty());
    }

    #[tokio::test]
    async fn get_subgraph_by_label_filters_by_node_type() {
        let store = InMemoryGraphStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store
            .add_nodes(vec![node(a, "Entity"), node(b, "EntityType")])
            .await
            .unwrap();

        let subgraph = store
            .get_subgraph(SubgraphFilter::ByLabel("Entity".into()))
            .await
            .unwrap();
        assert_eq!(subgraph.nodes.len(), 1);
        assert_eq!(subgraph.nodes[0].id, a);
    }
}
