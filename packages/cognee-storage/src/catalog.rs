//! Relational run/dataset catalog (spec 4.4, C9): users, datasets, dataset
//! databases, pipeline runs, data-access tracking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, StorageError};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: i64,
}

/// Per-dataset backend configuration (spec "Entities": Dataset/DatasetDatabase).
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetDatabase {
    pub dataset_id: Uuid,
    pub owner_id: Uuid,
    pub vector_db_name: String,
    pub graph_db_name: String,
    pub vector_provider: String,
    pub graph_provider: String,
    pub connection_info: Value,
}

impl DatasetDatabase {
    /// Configured defaults used by the router on first use (spec 4.4 step 1).
    pub fn default_for(owner_id: Uuid, dataset_id: Uuid) -> Self {
        Self {
            dataset_id,
            owner_id,
            vector_db_name: format!("vector_{dataset_id}"),
            graph_db_name: format!("graph_{dataset_id}"),
            vector_provider: "memory".into(),
            graph_provider: "memory".into(),
            connection_info: Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Started,
    Completed,
    Errored,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Started => "started",
            RunStatus::Completed => "completed",
            RunStatus::Errored => "errored",
        }
    }
}

/// One record per pipeline invocation (spec "Entities": PipelineRun).
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub pipeline_id: Uuid,
    pub pipeline_name: String,
    pub dataset_id: Uuid,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub status: RunStatus,
    pub error: Option<String>,
}

/// A single access event, kept for auditing (spec 4.4 "data-access tracking").
#[derive(Debug, Clone, PartialEq)]
pub struct DataAccessTracking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub dataset_id: Uuid,
    pub action: String,
    pub accessed_at: i64,
}

/// Per-principal (user or tenant) configuration blob (spec 6 "Persisted
/// state layout": `principal_configuration`).
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalConfiguration {
    pub principal_id: Uuid,
    pub settings: Value,
}

/// A graph node projected into the relational store so callers can join or
/// filter by node id/type in SQL without going through the graph backend
/// (spec 6 "Persisted state layout": `nodes` mirror index).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMirror {
    pub id: Uuid,
    pub node_type: String,
}

/// A graph edge's relational mirror (spec 6 "Persisted state layout":
/// `edges` mirror index).
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMirror {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation_name: String,
}

/// Relational metadata store backing C9. Every write is keyed by a UUID
/// primary key, so retries from the pipeline runtime are safe to repeat.
#[async_trait]
pub trait RelationalCatalog: Send + Sync {
    async fn upsert_user(&self, user: User) -> Result<()>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    async fn upsert_dataset(&self, dataset: Dataset) -> Result<()>;
    async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>>;
    async fn list_datasets(&self, owner_id: Uuid) -> Result<Vec<Dataset>>;
    async fn delete_dataset(&self, id: Uuid) -> Result<()>;

    async fn upsert_dataset_database(&self, db: DatasetDatabase) -> Result<()>;
    async fn get_dataset_database(&self, dataset_id: Uuid) -> Result<Option<DatasetDatabase>>;

    /// Record a run's `started` state; returns the created run.
    async fn start_run(&self, pipeline_name: &str, dataset_id: Uuid) -> Result<PipelineRun>;
    async fn complete_run(&self, run_id: Uuid) -> Result<()>;
    async fn fail_run(&self, run_id: Uuid, error: &str) -> Result<()>;
    async fn get_run(&self, run_id: Uuid) -> Result<Option<PipelineRun>>;
    /// Runs left in `started` state past their invocation: invariant 6
    /// treats these as failures to recover, not as in-progress work.
    async fn dangling_runs(&self) -> Result<Vec<PipelineRun>>;

    async fn record_access(&self, user_id: Uuid, dataset_id: Uuid, action: &str) -> Result<()>;

    async fn upsert_principal_configuration(&self, config: PrincipalConfiguration) -> Result<()>;
    async fn get_principal_configuration(
        &self,
        principal_id: Uuid,
    ) -> Result<Option<PrincipalConfiguration>>;

    /// Upserts a node's relational mirror row. Idempotent: re-mirroring the
    /// same id with a new type overwrites the previous one.
    async fn mirror_node(&self, node: NodeMirror) -> Result<()>;
    /// Appends an edge's relational mirror row.
    async fn mirror_edge(&self, edge: EdgeMirror) -> Result<()>;
    async fn list_node_mirrors(&self, node_type: &str) -> Result<Vec<NodeMirror>>;
    async fn list_edge_mirrors_from(&self, source_id: Uuid) -> Result<Vec<EdgeMirror>>;
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    datasets: HashMap<Uuid, Dataset>,
    dataset_databases: HashMap<Uuid, DatasetDatabase>,
    runs: HashMap<Uuid, PipelineRun>,
    access_log: Vec<DataAccessTracking>,
    principal_configurations: HashMap<Uuid, PrincipalConfiguration>,
    node_mirrors: HashMap<Uuid, NodeMirror>,
    edge_mirrors: Vec<EdgeMirror>,
}

/// Reference catalog backed by an in-process map. The SQLite-backed
/// implementation mirrors this one's semantics against real tables.
pub struct InMemoryCatalog {
    state: Arc<RwLock<State>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelationalCatalog for InMemoryCatalog {
    async fn upsert_user(&self, user: User) -> Result<()> {
        self.state.write().await.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn upsert_dataset(&self, dataset: Dataset) -> Result<()> {
        self.state.write().await.datasets.insert(dataset.id, dataset);
        Ok(())
    }

    async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>> {
        Ok(self.state.read().await.datasets.get(&id).cloned())
    }

    async fn list_datasets(&self, owner_id: Uuid) -> Result<Vec<Dataset>> {
        Ok(self
            .state
            .read()
            .await
            .datasets
            .values()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn delete_dataset(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.datasets.remove(&id);
        state.dataset_databases.remove(&id);
        Ok(())
    }

    async fn upsert_dataset_database(&self, db: DatasetDatabase) -> Result<()> {
        self.state
            .write()
            .await
            .dataset_databases
            .insert(db.dataset_id, db);
        Ok(())
    }

    async fn get_dataset_database(&self, dataset_id: Uuid) -> Result<Option<DatasetDatabase>> {
        Ok(self
            .state
            .read()
            .await
            .dataset_databases
            .get(&dataset_id)
            .cloned())
    }

    async fn start_run(&self, pipeline_name: &str, dataset_id: Uuid) -> Result<PipelineRun> {
        let run = PipelineRun {
            run_id: cognee_ir::random_id(),
            pipeline_id: cognee_ir::stable_id(pipeline_name),
            pipeline_name: pipeline_name.to_string(),
            dataset_id,
            started_at: Utc::now().timestamp_millis(),
            completed_at: None,
            status: RunStatus::Started,
            error: None,
        };
        self.state.write().await.runs.insert(run.run_id, run.clone());
        Ok(run)
    }

    async fn complete_run(&self, run_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| StorageError::run_not_found(run_id))?;
        run.status = RunStatus::Completed;
        run.completed_at = Some(Utc::now().timestamp_millis());
        Ok(())
    }

    async fn fail_run(&self, run_id: Uuid, error: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| StorageError::run_not_found(run_id))?;
        run.status = RunStatus::Errored;
        run.completed_at = Some(Utc::now().timestamp_millis());
        run.error = Some(error.to_string());
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<PipelineRun>> {
        Ok(self.state.read().await.runs.get(&run_id).cloned())
    }

    async fn dangling_runs(&self) -> Result<Vec<PipelineRun>> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Started)
            .cloned()
            .collect())
    }

    async fn record_access(&self, user_id: Uuid, dataset_id: Uuid, action: &str) -> Result<()> {
        self.state.write().await.access_log.push(DataAccessTracking {
            id: cognee_ir::random_id(),
            user_id,
            dataset_id,
            action: action.to_string(),
            accessed_at: Utc::now().timestamp_millis(),
        });
        Ok(())
    }

    async fn upsert_principal_configuration(&self, config: PrincipalConfiguration) -> Result<()> {
        self.state
            .write()
            .await
            .principal_configurations
            .insert(config.principal_id, config);
        Ok(())
    }

    async fn get_principal_configuration(
        &self,
        principal_id: Uuid,
    ) -> Result<Option<PrincipalConfiguration>> {
        Ok(self
            .state
            .read()
            .await
            .principal_configurations
            .get(&principal_id)
            .cloned())
    }

    async fn mirror_node(&self, node: NodeMirror) -> Result<()> {
        self.state.write().await.node_mirrors.insert(node.id, node);
        Ok(())
    }

    async fn mirror_edge(&self, edge: EdgeMirror) -> Result<()> {
        self.state.write().await.edge_mirrors.push(edge);
        Ok(())
    }

    async fn list_node_mirrors(&self, node_type: &str) -> Result<Vec<NodeMirror>> {
        Ok(self
            .state
            .read()
            .await
            .node_mirrors
            .values()
            .filter(|n| n.node_type == node_type)
            .cloned()
            .collect())
    }

    async fn list_edge_mirrors_from(&self, source_id: Uuid) -> Result<Vec<EdgeMirror>> {
        Ok(self
            .state
            .read()
            .await
            .edge_mirrors
            .iter()
            .filter(|e| e.source_id == source_id)
            .cloned()
            .collect())
    }
}
