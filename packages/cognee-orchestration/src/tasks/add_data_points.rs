//! `add_data_points` (spec 4.5, C5): atomic batch materialization of a
//! heterogeneous DataPoint set plus derived edges into the graph and vector
//! stores, with dedup and index fan-out.

use std::collections::HashMap;
use std::time::Duration;

use cognee_ir::{Closure, Edge, Node};
use cognee_storage::{Distance, GraphNode, StoreHandles, VectorItem};
use uuid::Uuid;

use crate::error::{retry_transient, Result};
use crate::interfaces::EmbeddingEngine;

const NODE_BATCH_SIZE: usize = 500;
const EDGE_BATCH_SIZE: usize = 1000;
const VECTOR_BATCH_SIZE: usize = 100;

/// Each batch call is independently retried on transient transport errors
/// (spec 4.5 step 6) before the run escalates.
const MAX_BATCH_ATTEMPTS: u32 = 3;
const BATCH_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    New,
    Changed,
    Unchanged,
}

fn to_graph_node(node: &Node) -> GraphNode {
    GraphNode {
        id: node.id(),
        node_type: node.type_name().to_string(),
        properties: node.scalar_properties(),
    }
}

/// Materializes `nodes` (plus everything reachable from their nested
/// DataPoint fields) into `handles.graph` and `handles.vector`. Returns the
/// input unchanged; all effects are side effects (spec 4.5 "Output").
pub async fn add_data_points(
    nodes: &[Node],
    extra_edges: &[Edge],
    handles: &StoreHandles,
    embedder: &dyn EmbeddingEngine,
) -> Result<()> {
    if nodes.is_empty() {
        return Ok(());
    }

    // Step 1: closure over nested DataPoint fields, with implicit edges.
    let mut closure = Closure::build(nodes);
    // Explicit relationship edges from extraction don't arrive through any
    // DataPoint field, so they're appended to the closure's edge set here
    // rather than rediscovered by the walk.
    closure.edges.extend(extra_edges.iter().cloned());

    // Step 3: existence check. Bulk-probe the graph to classify disposition.
    let ids: Vec<Uuid> = closure.nodes.iter().map(|n| n.id()).collect();
    let existing = handles.graph.get_nodes(&ids).await?;
    let existing_by_id: HashMap<Uuid, GraphNode> =
        existing.into_iter().map(|n| (n.id, n)).collect();

    let mut dispositions: HashMap<Uuid, Disposition> = HashMap::new();
    let mut to_upsert: Vec<&Node> = Vec::new();

    for node in &closure.nodes {
        let candidate = to_graph_node(node);
        let disposition = match existing_by_id.get(&node.id()) {
            None => Disposition::New,
            Some(stored) => {
                // Version downgrade (spec 4.5 edge case): ignore properties
                // but still let edges through.
                let incoming_version = node.base().version;
                let stored_version = stored
                    .properties
                    .get("version")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32;
                if incoming_version < stored_version {
                    Disposition::Unchanged
                } else if candidate.property_hash() == stored.property_hash() {
                    Disposition::Unchanged
                } else {
                    Disposition::Changed
                }
            }
        };
        dispositions.insert(node.id(), disposition);
        if disposition != Disposition::Unchanged {
            to_upsert.push(node);
        }
    }

    // Step 4: graph upsert. Nodes before edges. Each batch is independently
    // retried with exponential backoff on transient transport errors.
    for batch in to_upsert.chunks(NODE_BATCH_SIZE) {
        let graph_nodes: Vec<GraphNode> = batch.iter().map(|n| to_graph_node(n)).collect();
        retry_transient(MAX_BATCH_ATTEMPTS, BATCH_RETRY_BASE_DELAY, || {
            let nodes = graph_nodes.clone();
            async { handles.graph.add_nodes(nodes).await.map_err(Into::into) }
        })
        .await?;
    }
    for batch in closure.edges.chunks(EDGE_BATCH_SIZE) {
        let edges = batch.to_vec();
        retry_transient(MAX_BATCH_ATTEMPTS, BATCH_RETRY_BASE_DELAY, || {
            let edges = edges.clone();
            async { handles.graph.add_edges(edges).await.map_err(Into::into) }
        })
        .await?;
    }

    // Step 5: vector fan-out, one embedding per non-empty index field, only
    // for new-or-changed nodes.
    let mut by_collection: HashMap<String, Vec<(&Node, String)>> = HashMap::new();
    for node in &to_upsert {
        for field in node.index_fields() {
            if let Some(text) = node.field_text(field) {
                by_collection
                    .entry(node.collection_name(field))
                    .or_default()
                    .push((node, text));
            }
        }
    }

    for (collection, entries) in by_collection {
        if !handles.vector.has_collection(&collection).await? {
            retry_transient(MAX_BATCH_ATTEMPTS, BATCH_RETRY_BASE_DELAY, || async {
                handles
                    .vector
                    .create_collection(&collection, embedder.dimensions(), Distance::Cosine)
                    .await
                    .map_err(Into::into)
            })
            .await?;
        }
        for batch in entries.chunks(VECTOR_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let vectors = embedder.embed_text(&texts).await?;
            let items: Vec<VectorItem> = batch
                .iter()
                .zip(vectors)
                .map(|((node, _), vector)| VectorItem {
                    id: node.id(),
                    vector,
                    payload: node.scalar_properties(),
                })
                .collect();
            retry_transient(MAX_BATCH_ATTEMPTS, BATCH_RETRY_BASE_DELAY, || {
                let items = items.clone();
                let collection = collection.clone();
                async move { handles.vector.upsert(&collection, items).await.map_err(Into::into) }
            })
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognee_ir::{DataPointBase, Entity, EntityType};
    use cognee_storage::{InMemoryCatalog, StoreRouter};
    use std::sync::Arc;

    use crate::interfaces::DeterministicEmbeddingEngine;

    fn entity(name: &str) -> Node {
        Node::Entity(Entity {
            base: DataPointBase::new_random(),
            name: name.to_string(),
            description: "a person".to_string(),
            is_a: Some(Box::new(Node::EntityType(EntityType {
                base: DataPointBase::new_random(),
                name: "Person".to_string(),
            }))),
        })
    }

    async fn handles() -> StoreHandles {
        let catalog = Arc::new(InMemoryCatalog::new());
        let router = StoreRouter::new_in_memory(catalog);
        router.route(Uuid::new_v4(), Uuid::new_v4()).await.unwrap()
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let handles = handles().await;
        let embedder = DeterministicEmbeddingEngine::default();
        add_data_points(&[], &[], &handles, &embedder).await.unwrap();
    }

    #[tokio::test]
    async fn materializes_node_and_nested_edge() {
        let handles = handles().await;
        let embedder = DeterministicEmbeddingEngine::default();
        let alice = entity("Alice");
        let alice_id = alice.id();

        add_data_points(&[alice], &[], &handles, &embedder).await.unwrap();

        assert!(handles.graph.has_node(alice_id).await.unwrap());
        let hit = handles
            .vector
            .search("Entity_name", &embedder.embed_text(&["Alice".into()]).await.unwrap()[0], 1, None)
            .await
            .unwrap();
        assert_eq!(hit[0].id, alice_id);
    }

    #[tokio::test]
    async fn rematerializing_identical_input_does_not_grow_the_store() {
        let handles = handles().await;
        let embedder = DeterministicEmbeddingEngine::default();
        let alice = entity("Alice");

        add_data_points(&[alice.clone()], &[], &handles, &embedder).await.unwrap();
        add_data_points(&[alice], &[], &handles, &embedder).await.unwrap();

        let subgraph = handles
            .graph
            .get_subgraph(cognee_storage::SubgraphFilter::ByLabel("Entity".into()))
            .await
            .unwrap();
        assert_eq!(subgraph.nodes.len(), 1);
    }
}
