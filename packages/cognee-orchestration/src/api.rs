//! The core's outbound surface (spec 6 "Exposed"): `add`, `cognify`,
//! `search`, `prune`, `list_tools`. Everything else in this crate is reached
//! only through these four operations plus the MCP tool descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

use cognee_storage::{Dataset, RelationalCatalog, StoreRouter};

use crate::checkpoint::{Checkpoint, CheckpointManager};
use crate::error::{OrchestratorError, Result};
use crate::interfaces::{AuthContext, EmbeddingEngine, LlmGateway};
use crate::pipeline::{build_cognify_pipeline, seed_from_documents, DocumentInput};
use crate::retrieval::{self, RerankWeights, SearchResult, SearchType};
use crate::task::run_tasks_base;

/// Raw, not-yet-ingested text handed to `add` (spec 6 `add(documents, ...)`).
/// The core keeps it only long enough for the next `cognify` call to
/// consume it; ingestion/loading from files is an external collaborator
/// (spec 1 "Out of scope").
pub struct PendingDocumentStore {
    by_dataset: RwLock<HashMap<Uuid, Vec<DocumentInput>>>,
}

impl PendingDocumentStore {
    pub fn new() -> Self {
        Self { by_dataset: RwLock::new(HashMap::new()) }
    }

    async fn push(&self, dataset_id: Uuid, docs: Vec<DocumentInput>) {
        self.by_dataset.write().await.entry(dataset_id).or_default().extend(docs);
    }

    async fn drain(&self, dataset_id: Uuid) -> Vec<DocumentInput> {
        self.by_dataset.write().await.remove(&dataset_id).unwrap_or_default()
    }
}

impl Default for PendingDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One MCP tool descriptor (spec 6 "list_tools").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Wires the core's components together behind the four outbound operations.
/// Holds no business state of its own beyond the pending-document buffer;
/// everything durable lives in `catalog`/`router`.
pub struct CogneeCore {
    router: StoreRouter,
    catalog: Arc<dyn RelationalCatalog>,
    checkpoints: CheckpointManager,
    llm: Arc<dyn LlmGateway>,
    embedder: Arc<dyn EmbeddingEngine>,
    auth: Arc<dyn AuthContext>,
    pending: PendingDocumentStore,
}

impl CogneeCore {
    pub fn new(
        router: StoreRouter,
        catalog: Arc<dyn RelationalCatalog>,
        llm: Arc<dyn LlmGateway>,
        embedder: Arc<dyn EmbeddingEngine>,
        auth: Arc<dyn AuthContext>,
    ) -> Self {
        Self {
            router,
            catalog,
            checkpoints: CheckpointManager::new_in_memory(),
            llm,
            embedder,
            auth,
            pending: PendingDocumentStore::new(),
        }
    }

    async fn find_or_create_dataset(&self, owner_id: Uuid, dataset_name: &str) -> Result<Uuid> {
        let existing = self
            .catalog
            .list_datasets(owner_id)
            .await?
            .into_iter()
            .find(|d| d.name == dataset_name);
        if let Some(dataset) = existing {
            return Ok(dataset.id);
        }
        let dataset = Dataset {
            id: Uuid::new_v4(),
            owner_id,
            name: dataset_name.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.catalog.upsert_dataset(dataset.clone()).await?;
        Ok(dataset.id)
    }

    /// `add(documents, dataset_name, user) -> DatasetID` (spec 6).
    pub async fn add(&self, documents: Vec<String>, dataset_name: &str) -> Result<Uuid> {
        let user = self.auth.get_current_user();
        let dataset_id = self.find_or_create_dataset(user.id, dataset_name).await?;

        let inputs: Vec<DocumentInput> = documents
            .into_iter()
            .map(|text| DocumentInput { document_id: Uuid::new_v4(), text })
            .collect();
        self.pending.push(dataset_id, inputs).await;
        self.catalog.record_access(user.id, dataset_id, "write").await?;
        Ok(dataset_id)
    }

    /// `cognify(datasets, user, pipeline_name)` (spec 6): runs the default
    /// extraction DAG over every pending document for each named dataset,
    /// logging one `started`/`completed`|`errored` record per run (spec
    /// invariant 6).
    pub async fn cognify(&self, dataset_names: &[String], pipeline_name: &str) -> Result<Vec<Uuid>> {
        let user = self.auth.get_current_user();
        let mut run_ids = Vec::with_capacity(dataset_names.len());

        for dataset_name in dataset_names {
            let dataset_id = self.find_or_create_dataset(user.id, dataset_name).await?;
            let documents = self.pending.drain(dataset_id).await;
            if documents.is_empty() {
                continue;
            }

            let handles = self.router.route(user.id, dataset_id).await?;
            let run = self.catalog.start_run(pipeline_name, dataset_id).await?;
            run_ids.push(run.run_id);
            info!(
                "Starting run {} for dataset {} ({} pending documents, pipeline {})",
                run.run_id,
                dataset_id,
                documents.len(),
                pipeline_name
            );

            let pipeline = build_cognify_pipeline(
                pipeline_name,
                self.llm.clone(),
                self.embedder.clone(),
                handles,
            );
            let seed = seed_from_documents(&documents);

            match run_tasks_base(&pipeline, seed, run.run_id).await {
                Ok((frames, output)) => {
                    let cache_data =
                        bincode::serialize(&frames.iter().map(|f| f.task_name.clone()).collect::<Vec<_>>())
                            .map_err(OrchestratorError::from)?;
                    self.checkpoints
                        .save_checkpoint(Checkpoint::new(
                            run.run_id,
                            "cognify_pipeline",
                            format!("run:{}", run.run_id),
                            cache_data,
                        ))
                        .await?;
                    let _ = output;
                    self.catalog.complete_run(run.run_id).await?;
                    info!("Run {} completed - {} task frames executed", run.run_id, frames.len());
                }
                Err(e) => {
                    error!("Run {} failed: {}", run.run_id, e);
                    self.catalog.fail_run(run.run_id, &e.to_string()).await?;
                    return Err(e);
                }
            }
            self.catalog.record_access(user.id, dataset_id, "cognify").await?;
        }

        Ok(run_ids)
    }

    /// `search(query_text, query_type, datasets, top_k, user) -> result`
    /// (spec 6). Degrades to `SearchResult::Empty` rather than raising when
    /// any dataset's projection is empty (spec 7 "entity-not-found").
    pub async fn search(
        &self,
        query_text: &str,
        search_type: SearchType,
        dataset_names: &[String],
        top_k: usize,
    ) -> Result<SearchResult> {
        let user = self.auth.get_current_user();

        for dataset_name in dataset_names {
            let dataset_id = self.find_or_create_dataset(user.id, dataset_name).await?;
            let handles = self.router.route(user.id, dataset_id).await?;
            self.catalog.record_access(user.id, dataset_id, "search").await?;

            let result = retrieval::search(
                query_text,
                search_type,
                &handles,
                self.embedder.as_ref(),
                self.llm.as_ref(),
                RerankWeights::default(),
                top_k,
                chrono::Utc::now().timestamp_millis(),
            )
            .await?;

            if !matches!(result, SearchResult::Empty) {
                return Ok(result);
            }
        }

        Ok(SearchResult::Empty)
    }

    /// `prune(dataset_name?, user)` (spec 6): clears a single dataset's
    /// graph/vector state, or every dataset owned by the caller when no
    /// name is given.
    pub async fn prune(&self, dataset_name: Option<&str>) -> Result<()> {
        let user = self.auth.get_current_user();

        let targets: Vec<Dataset> = match dataset_name {
            Some(name) => {
                let dataset_id = self.find_or_create_dataset(user.id, name).await?;
                vec![Dataset { id: dataset_id, owner_id: user.id, name: name.to_string(), created_at: 0 }]
            }
            None => self.catalog.list_datasets(user.id).await?,
        };

        for dataset in targets {
            let handles = self.router.route(user.id, dataset.id).await?;
            handles.graph.prune().await?;
            handles.vector.prune().await?;
            self.catalog.delete_dataset(dataset.id).await?;
            info!("Pruned dataset {} ({})", dataset.id, dataset.name);
        }
        Ok(())
    }

    /// `list_tools()` (spec 6 MCP surface): tool descriptors only, no
    /// transport wiring (REST/MCP servers are out of scope, spec 1).
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "cognify".into(),
                description: "Ingest and build a knowledge graph from the dataset's pending documents".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "datasets": {"type": "array", "items": {"type": "string"}},
                        "pipeline_name": {"type": "string"}
                    },
                    "required": ["datasets"]
                }),
            },
            ToolDescriptor {
                name: "search".into(),
                description: "Query the knowledge graph".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query_text": {"type": "string"},
                        "query_type": {"type": "string", "enum": ["GRAPH_COMPLETION", "INSIGHTS", "CODE", "TRIPLET_COMPLETION", "NATURAL_LANGUAGE"]},
                        "datasets": {"type": "array", "items": {"type": "string"}},
                        "top_k": {"type": "integer"}
                    },
                    "required": ["query_text", "query_type"]
                }),
            },
            ToolDescriptor {
                name: "codify".into(),
                description: "Index source code into the knowledge graph".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "datasets": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["datasets"]
                }),
            },
            ToolDescriptor {
                name: "prune".into(),
                description: "Clear a dataset's graph and vector state".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "dataset_name": {"type": "string"}
                    }
                }),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{CurrentUser, DeterministicEmbeddingEngine, StaticAuthContext};
    use async_trait::async_trait;
    use cognee_storage::InMemoryCatalog;
    use serde_json::Value;

    struct StubGateway;

    #[async_trait]
    impl LlmGateway for StubGateway {
        async fn create_structured_output(
            &self,
            _text: &str,
            _system_prompt: &str,
            _schema: &Value,
        ) -> Result<Value> {
            Ok(json!({
                "entities": [{"name": "Alice", "description": "", "entity_type": "Person"}],
                "relationships": []
            }))
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("Alice was mentioned in Paris.".to_string())
        }
    }

    fn core() -> CogneeCore {
        let catalog = Arc::new(InMemoryCatalog::new());
        let router = StoreRouter::new_in_memory(catalog.clone());
        let user = CurrentUser { id: Uuid::new_v4(), tenant_id: Uuid::new_v4(), roles: vec!["owner".into()] };
        CogneeCore::new(
            router,
            catalog,
            Arc::new(StubGateway),
            Arc::new(DeterministicEmbeddingEngine::default()),
            Arc::new(StaticAuthContext::new(user)),
        )
    }

    #[tokio::test]
    async fn add_then_cognify_then_search_round_trips() {
        let core = core();
        core.add(vec!["Alice met Bob in Paris.".to_string()], "notes").await.unwrap();
        let runs = core.cognify(&["notes".to_string()], "cognify_pipeline").await.unwrap();
        assert_eq!(runs.len(), 1);

        let result = core
            .search("Where was Alice?", SearchType::GraphCompletion, &["notes".to_string()], 5)
            .await
            .unwrap();
        match result {
            SearchResult::Completion(text) => assert!(text.contains("Paris")),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_on_empty_dataset_returns_empty_without_error() {
        let core = core();
        core.add(vec![], "empty").await.unwrap();
        let result = core
            .search("anything", SearchType::GraphCompletion, &["empty".to_string()], 5)
            .await
            .unwrap();
        assert!(matches!(result, SearchResult::Empty));
    }

    #[tokio::test]
    async fn prune_removes_the_dataset() {
        let core = core();
        let dataset_id = core.add(vec!["x".to_string()], "to_prune").await.unwrap();
        core.prune(Some("to_prune")).await.unwrap();
        assert!(core.catalog.get_dataset(dataset_id).await.unwrap().is_none());
    }

    #[test]
    fn list_tools_exposes_the_mcp_surface() {
        let core = core();
        let tools = core.list_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"cognify"));
        assert!(names.contains(&"search"));
        assert!(names.contains(&"prune"));
    }
}
