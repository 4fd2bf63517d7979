//! Retrieval (spec 4.8, C8): embed query, vector-search relevant
//! collections, project a bounded subgraph around the hits, rerank, and
//! dispatch to a completion- or structure-returning response per search type.

use cognee_storage::{Direction, GraphNode, StoreHandles, Subgraph};
use uuid::Uuid;

use crate::error::Result;
use crate::interfaces::{EmbeddingEngine, LlmGateway};

/// The closed set of retrieval strategies (spec 4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    GraphCompletion,
    Insights,
    Code,
    TripletCompletion,
    NaturalLanguage,
}

impl SearchType {
    /// Vector collections consulted for this search type (spec 4.8 step 2).
    fn collections(&self) -> &'static [&'static str] {
        match self {
            SearchType::Code => &["SourceCodeChunk_code"],
            SearchType::GraphCompletion => &["DocumentChunk_text", "Summary_text"],
            SearchType::Insights => &["DocumentChunk_text", "Summary_text", "Entity_name"],
            SearchType::TripletCompletion => &["Entity_name", "Entity_description"],
            SearchType::NaturalLanguage => &["DocumentChunk_text", "Summary_text"],
        }
    }

    /// Neighborhood depth for the subgraph projection (spec 4.8 step 3).
    fn hop_depth(&self) -> usize {
        match self {
            SearchType::Insights => 2,
            _ => 1,
        }
    }

    /// Whether this search type calls the LLM for a completion, or returns
    /// the structured subgraph directly (spec 4.8 step 6).
    fn is_completion_style(&self) -> bool {
        !matches!(self, SearchType::Insights)
    }
}

/// Relative weighting for the hybrid re-ranker (spec 4.8 step 4). Defaults
/// favor vector relevance while still rewarding well-connected, recently
/// updated nodes.
#[derive(Debug, Clone, Copy)]
pub struct RerankWeights {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self { alpha: 0.7, beta: 0.2, gamma: 0.1 }
    }
}

/// The sum-type result shape spec 9 prescribes in place of exceptions:
/// `{ok: content} | {empty} | {error}` is represented here by `Result` for
/// the error arm and this enum for the other two.
#[derive(Debug, Clone)]
pub enum SearchResult {
    Completion(String),
    Structured(Subgraph),
    /// Entity-not-found (spec 7): no exception, a well-typed empty result.
    Empty,
}

struct RankedNode {
    node: GraphNode,
    score: f32,
}

fn freshness(updated_at: i64, now_millis: i64) -> f32 {
    let age_ms = (now_millis - updated_at).max(0) as f32;
    let age_days = age_ms / 86_400_000.0;
    1.0 / (1.0 + age_days)
}

fn assemble_context(search_type: SearchType, ranked: &[RankedNode]) -> String {
    let body: Vec<String> = ranked
        .iter()
        .map(|r| {
            r.node
                .properties
                .get("text")
                .or_else(|| r.node.properties.get("name"))
                .or_else(|| r.node.properties.get("code"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect();

    match search_type {
        SearchType::Code => format!("Relevant code:\n{}", body.join("\n---\n")),
        SearchType::TripletCompletion => format!("Known facts:\n{}", body.join("\n")),
        _ => body.join("\n\n"),
    }
}

/// Runs one retrieval query end to end. `now_millis` is supplied by the
/// caller (no wall-clock access inside the core, spec 9 "explicit context").
pub async fn search(
    query_text: &str,
    search_type: SearchType,
    handles: &StoreHandles,
    embedder: &dyn EmbeddingEngine,
    llm: &dyn LlmGateway,
    weights: RerankWeights,
    top_k: usize,
    now_millis: i64,
) -> Result<SearchResult> {
    let query_vector = embedder.embed_text(&[query_text.to_string()]).await?.remove(0);

    let mut vector_scores: std::collections::HashMap<Uuid, f32> = std::collections::HashMap::new();
    for collection in search_type.collections() {
        if !handles.vector.has_collection(collection).await? {
            continue;
        }
        let hits = handles.vector.search(collection, &query_vector, top_k, None).await?;
        for hit in hits {
            let entry = vector_scores.entry(hit.id).or_insert(0.0);
            if hit.score > *entry {
                *entry = hit.score;
            }
        }
    }

    if vector_scores.is_empty() {
        return Ok(SearchResult::Empty);
    }

    // Subgraph projection: seed nodes plus their K-hop neighborhoods in one
    // bulk walk (spec 4.8 step 3). `degree` accumulates real adjacency counts
    // observed during the walk: each `get_neighbours` call contributes one to
    // the walked node's degree and one to each neighbour's degree, so it
    // reflects actual connectivity within the projected subgraph rather than
    // vector-hit membership.
    let mut frontier: Vec<Uuid> = vector_scores.keys().copied().collect();
    let mut projected: std::collections::HashMap<Uuid, GraphNode> = std::collections::HashMap::new();
    let mut degree: std::collections::HashMap<Uuid, usize> = std::collections::HashMap::new();
    for id in &frontier {
        if let Some(node) = handles.graph.get_node(*id).await? {
            projected.insert(*id, node);
        }
    }

    for _ in 0..search_type.hop_depth() {
        let mut next_frontier = Vec::new();
        for id in &frontier {
            let neighbours = handles.graph.get_neighbours(*id, Direction::Both, None).await?;
            *degree.entry(*id).or_insert(0) += neighbours.len();
            for n in neighbours {
                *degree.entry(n.id).or_insert(0) += 1;
                if !projected.contains_key(&n.id) {
                    next_frontier.push(n.id);
                    projected.insert(n.id, n);
                }
            }
        }
        frontier = next_frontier;
        if frontier.is_empty() {
            break;
        }
    }

    if projected.is_empty() {
        return Ok(SearchResult::Empty);
    }

    let max_degree = degree.values().copied().max().unwrap_or(0).max(1) as f32;

    let mut ranked: Vec<RankedNode> = projected
        .into_values()
        .map(|node| {
            let vector_score = vector_scores.get(&node.id).copied().unwrap_or(0.0);
            let centrality = degree.get(&node.id).copied().unwrap_or(0) as f32 / max_degree;
            let updated_at = node
                .properties
                .get("updated_at")
                .and_then(|v| v.as_i64())
                .unwrap_or(now_millis);
            let score = weights.alpha * vector_score
                + weights.beta * centrality
                + weights.gamma * freshness(updated_at, now_millis);
            RankedNode { node, score }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let a_updated = a.node.properties.get("updated_at").and_then(|v| v.as_i64()).unwrap_or(0);
                let b_updated = b.node.properties.get("updated_at").and_then(|v| v.as_i64()).unwrap_or(0);
                b_updated.cmp(&a_updated)
            })
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
    ranked.truncate(top_k.max(1));

    if search_type.is_completion_style() {
        let context = assemble_context(search_type, &ranked);
        let prompt = format!(
            "Answer the question using only the context below.\n\nContext:\n{context}\n\nQuestion: {query_text}"
        );
        let answer = llm.complete(&prompt).await?;
        Ok(SearchResult::Completion(answer))
    } else {
        let node_ids: Vec<Uuid> = ranked.iter().map(|r| r.node.id).collect();
        let subgraph = handles
            .graph
            .get_subgraph(cognee_storage::SubgraphFilter::ByIds(node_ids))
            .await?;
        Ok(SearchResult::Structured(subgraph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::DeterministicEmbeddingEngine;
    use async_trait::async_trait;
    use cognee_storage::{Distance, GraphNode, InMemoryCatalog, StoreRouter, VectorItem};
    use serde_json::{Map, Value};
    use std::sync::Arc;

    struct StubGateway;

    #[async_trait]
    impl LlmGateway for StubGateway {
        async fn create_structured_output(
            &self,
            _text: &str,
            _system_prompt: &str,
            _schema: &Value,
        ) -> Result<Value> {
            unimplemented!()
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(format!("answer grounded in: {prompt}"))
        }
    }

    async fn handles() -> StoreHandles {
        let catalog = Arc::new(InMemoryCatalog::new());
        let router = StoreRouter::new_in_memory(catalog);
        router.route(Uuid::new_v4(), Uuid::new_v4()).await.unwrap()
    }

    #[tokio::test]
    async fn empty_graph_search_returns_empty_with_no_exception() {
        let handles = handles().await;
        let embedder = DeterministicEmbeddingEngine::default();
        let llm = StubGateway;

        let result = search(
            "anything",
            SearchType::GraphCompletion,
            &handles,
            &embedder,
            &llm,
            RerankWeights::default(),
            5,
            0,
        )
        .await
        .unwrap();

        assert!(matches!(result, SearchResult::Empty));
    }

    #[tokio::test]
    async fn completion_search_finds_paris_in_context() {
        let handles = handles().await;
        let embedder = DeterministicEmbeddingEngine::default();
        let llm = StubGateway;

        let text = "Alice met Bob in Paris.";
        let vector = embedder.embed_text(&[text.to_string()]).await.unwrap().remove(0);
        let id = Uuid::new_v4();

        handles
            .vector
            .create_collection("DocumentChunk_text", embedder.dimensions(), Distance::Cosine)
            .await
            .unwrap();
        handles
            .vector
            .upsert(
                "DocumentChunk_text",
                vec![VectorItem { id, vector, payload: Map::new() }],
            )
            .await
            .unwrap();

        let mut properties = Map::new();
        properties.insert("text".into(), Value::String(text.to_string()));
        properties.insert("updated_at".into(), Value::from(0i64));
        handles
            .graph
            .add_nodes(vec![GraphNode { id, node_type: "DocumentChunk".into(), properties }])
            .await
            .unwrap();

        let result = search(
            "Where did Alice meet Bob?",
            SearchType::GraphCompletion,
            &handles,
            &embedder,
            &llm,
            RerankWeights::default(),
            5,
            0,
        )
        .await
        .unwrap();

        match result {
            SearchResult::Completion(text) => assert!(text.contains("Paris")),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn insights_search_returns_structured_subgraph() {
        let handles = handles().await;
        let embedder = DeterministicEmbeddingEngine::default();
        let llm = StubGateway;

        let text = "Entity lookup";
        let vector = embedder.embed_text(&[text.to_string()]).await.unwrap().remove(0);
        let id = Uuid::new_v4();

        handles
            .vector
            .create_collection("Entity_name", embedder.dimensions(), Distance::Cosine)
            .await
            .unwrap();
        handles
            .vector
            .upsert("Entity_name", vec![VectorItem { id, vector, payload: Map::new() }])
            .await
            .unwrap();

        let mut properties = Map::new();
        properties.insert("name".into(), Value::String(text.to_string()));
        handles
            .graph
            .add_nodes(vec![GraphNode { id, node_type: "Entity".into(), properties }])
            .await
            .unwrap();

        let result = search(
            "lookup",
            SearchType::Insights,
            &handles,
            &embedder,
            &llm,
            RerankWeights::default(),
            5,
            0,
        )
        .await
        .unwrap();

        match result {
            SearchResult::Structured(subgraph) => assert_eq!(subgraph.nodes.len(), 1),
            other => panic!("expected structured result, got {other:?}"),
        }
    }
}
