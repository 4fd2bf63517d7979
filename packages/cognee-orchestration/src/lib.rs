//! Pipeline runtime, extraction DAG, and retrieval for the knowledge-memory
//! engine (spec components C5-C9 minus the store-side contracts, which live
//! in `cognee-storage`).
//!
//! - `task`       : generic Task/Pipeline DAG executor (C6)
//! - `pipeline`    : the default `cognify_pipeline` built from `tasks/`
//! - `tasks`       : chunking, extraction, ontology, summarization, add_data_points (C5, C7)
//! - `retrieval`   : subgraph projection + hybrid ranking + search dispatch (C8)
//! - `checkpoint`  : resumable per-task checkpoints
//! - `interfaces`  : LLM/embedder/file/auth collaborator traits (spec 6)
//! - `api`         : `add`/`cognify`/`search`/`prune`/`list_tools` (spec 6 "Exposed")

pub mod api;
pub mod checkpoint;
pub mod error;
pub mod interfaces;
pub mod pipeline;
pub mod retrieval;
pub mod task;
pub mod tasks;

pub use api::{CogneeCore, ToolDescriptor};
pub use checkpoint::{Checkpoint, CheckpointManager};
pub use error::{ErrorCategory, OrchestratorError, Result};
pub use interfaces::{
    AuthContext, CurrentUser, DeterministicEmbeddingEngine, EmbeddingEngine, FileStorage,
    LlmGateway, StaticAuthContext,
};
pub use pipeline::{build_cognify_pipeline, seed_from_documents, DocumentInput};
pub use retrieval::{RerankWeights, SearchResult, SearchType};
pub use task::{Pipeline, PipelineBuilder, Task, TaskContext, TaskExecutionInfo, TaskValue, run_tasks_base};

/// Installs an `EnvFilter`-driven subscriber for `cargo test -- --nocapture`
/// runs. Safe to call from multiple tests; only the first call wins.
pub fn init_test_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
