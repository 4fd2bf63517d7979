//! The default `cognify_pipeline` (spec 4.7): wires the pure task bodies in
//! `tasks/` into the generic `Task`/`Pipeline` runtime from `task.rs`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{OrchestratorError, Result};
use crate::interfaces::{EmbeddingEngine, LlmGateway};
use crate::task::{Pipeline, PipelineBuilder, Task, TaskContext, TaskValue};
use cognee_storage::StoreHandles;

/// One raw document handed to `cognify` (spec 6 `add(documents, ...)`
/// populates these; the core keeps no long-term store of document text
/// beyond what a run needs).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DocumentInput {
    pub document_id: uuid::Uuid,
    pub text: String,
}

pub fn seed_from_documents(documents: &[DocumentInput]) -> TaskValue {
    TaskValue::Raw(serde_json::to_value(documents).unwrap_or(Value::Array(Vec::new())))
}

fn parse_documents(value: &TaskValue) -> Vec<DocumentInput> {
    match value {
        TaskValue::Raw(v) => serde_json::from_value(v.clone()).unwrap_or_default(),
        _ => Vec::new(),
    }
}

struct ChunkTask {
    embedder: Arc<dyn EmbeddingEngine>,
}

#[async_trait]
impl Task for ChunkTask {
    fn inputs(&self) -> &[String] {
        &[]
    }

    async fn run(&self, inputs: Vec<TaskValue>, _ctx: &TaskContext) -> Result<TaskValue> {
        let documents = inputs.into_iter().next().map(|v| parse_documents(&v)).unwrap_or_default();
        let mut chunks = Vec::new();
        for doc in documents {
            chunks.extend(crate::tasks::chunk_naive(doc.document_id, &doc.text, self.embedder.as_ref())?);
        }
        Ok(TaskValue::Nodes(chunks))
    }
}

struct ExtractTask {
    llm: Arc<dyn LlmGateway>,
    inputs: Vec<String>,
}

#[async_trait]
impl Task for ExtractTask {
    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    async fn run(&self, inputs: Vec<TaskValue>, _ctx: &TaskContext) -> Result<TaskValue> {
        let chunks = inputs.into_iter().next().map(|v| v.into_nodes()).unwrap_or_default();
        let mut all_nodes = chunks.clone();
        let mut all_edges = Vec::new();

        // Chunks are independent; extract them concurrently rather than
        // paying one LLM round trip at a time.
        let extractions = futures::future::join_all(chunks.iter().filter_map(|chunk| {
            let cognee_ir::Node::DocumentChunk(doc_chunk) = chunk else {
                return None;
            };
            if doc_chunk.text.is_empty() {
                return None;
            }
            let chunk_id = chunk.id();
            let text = doc_chunk.text.clone();
            let llm = self.llm.clone();
            Some(async move {
                crate::tasks::extract_graph_from_data(chunk_id, &text, llm.as_ref()).await
            })
        }))
        .await;

        for result in extractions {
            let (nodes, edges) = result?;
            all_nodes.extend(nodes);
            all_edges.extend(edges);
        }

        Ok(TaskValue::NodesWithEdges(all_nodes, all_edges))
    }
}

struct OntologyTask {
    inputs: Vec<String>,
}

#[async_trait]
impl Task for OntologyTask {
    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    async fn run(&self, inputs: Vec<TaskValue>, _ctx: &TaskContext) -> Result<TaskValue> {
        let (nodes, edges) = inputs
            .into_iter()
            .next()
            .map(|v| v.into_nodes_and_edges())
            .unwrap_or_default();
        let (resolved_nodes, resolved_edges) = crate::tasks::ontology_resolver(nodes, edges)?;
        Ok(TaskValue::NodesWithEdges(resolved_nodes, resolved_edges))
    }
}

struct SummarizeTask {
    llm: Arc<dyn LlmGateway>,
    inputs: Vec<String>,
}

#[async_trait]
impl Task for SummarizeTask {
    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    async fn run(&self, inputs: Vec<TaskValue>, _ctx: &TaskContext) -> Result<TaskValue> {
        let chunks = inputs.into_iter().next().map(|v| v.into_nodes()).unwrap_or_default();
        let summaries = crate::tasks::summarization(&chunks, self.llm.as_ref()).await?;
        Ok(TaskValue::Nodes(summaries))
    }
}

struct AddDataPointsTask {
    embedder: Arc<dyn EmbeddingEngine>,
    handles: StoreHandles,
    inputs: Vec<String>,
}

#[async_trait]
impl Task for AddDataPointsTask {
    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn merges_inputs(&self) -> bool {
        true
    }

    async fn run(&self, inputs: Vec<TaskValue>, _ctx: &TaskContext) -> Result<TaskValue> {
        let merged = inputs
            .into_iter()
            .reduce(TaskValue::merge)
            .ok_or_else(|| OrchestratorError::MissingDependency("add_data_points".into()))?;
        let (nodes, edges) = merged.into_nodes_and_edges();
        crate::tasks::add_data_points(&nodes, &edges, &self.handles, self.embedder.as_ref()).await?;
        Ok(TaskValue::Nodes(nodes))
    }
}

/// Builds the default `cognify_pipeline` DAG (spec 4.7):
/// `chunk -> extract -> ontology \
///                                 -> add_data_points`
/// `chunk -> summarize ----------/`
pub fn build_cognify_pipeline(
    pipeline_name: &str,
    llm: Arc<dyn LlmGateway>,
    embedder: Arc<dyn EmbeddingEngine>,
    handles: StoreHandles,
) -> Pipeline {
    PipelineBuilder::new(pipeline_name)
        .add_task("chunk", Arc::new(ChunkTask { embedder: embedder.clone() }))
        .add_task(
            "extract",
            Arc::new(ExtractTask { llm: llm.clone(), inputs: vec!["chunk".into()] }),
        )
        .add_task(
            "ontology",
            Arc::new(OntologyTask { inputs: vec!["extract".into()] }),
        )
        .add_task(
            "summarize",
            Arc::new(SummarizeTask { llm: llm.clone(), inputs: vec!["chunk".into()] }),
        )
        .add_task(
            "add_data_points",
            Arc::new(AddDataPointsTask {
                embedder,
                handles,
                inputs: vec!["ontology".into(), "summarize".into()],
            }),
        )
        .build()
}
