//! SQLite-backed `RelationalCatalog` (spec 4.4, C9). Blocking `rusqlite` calls
//! run on `spawn_blocking` so the async trait never stalls the runtime.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::catalog::{
    DataAccessTracking, Dataset, DatasetDatabase, EdgeMirror, NodeMirror, PipelineRun,
    PrincipalConfiguration, RelationalCatalog, RunStatus, User,
};
use crate::error::{Result, StorageError};

pub struct SqliteCatalog {
    conn: std::sync::Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: std::sync::Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: std::sync::Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS datasets (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_datasets_owner ON datasets(owner_id);

            CREATE TABLE IF NOT EXISTS dataset_databases (
                dataset_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                vector_db_name TEXT NOT NULL,
                graph_db_name TEXT NOT NULL,
                vector_provider TEXT NOT NULL,
                graph_provider TEXT NOT NULL,
                connection_info TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pipeline_runs (
                run_id TEXT PRIMARY KEY,
                pipeline_id TEXT NOT NULL,
                pipeline_name TEXT NOT NULL,
                dataset_id TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                completed_at INTEGER,
                status TEXT NOT NULL,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_runs_dataset ON pipeline_runs(dataset_id);
            CREATE INDEX IF NOT EXISTS idx_runs_status ON pipeline_runs(status);

            CREATE TABLE IF NOT EXISTS data_access_tracking (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                dataset_id TEXT NOT NULL,
                action TEXT NOT NULL,
                accessed_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS principal_configuration (
                principal_id TEXT PRIMARY KEY,
                settings TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                node_type TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(node_type);

            CREATE TABLE IF NOT EXISTS edges (
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                relation TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
            "#,
        )?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            // A poisoned mutex here means a prior blocking task panicked mid-query;
            // the connection itself isn't corrupted, so recover the guard rather
            // than propagate the poison to every future caller.
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::database(format!("blocking task panicked: {e}")))?
    }
}

fn status_to_str(status: RunStatus) -> &'static str {
    status.as_str()
}

fn status_from_str(s: &str) -> RunStatus {
    match s {
        "completed" => RunStatus::Completed,
        "errored" => RunStatus::Errored,
        _ => RunStatus::Started,
    }
}

#[async_trait]
impl RelationalCatalog for SqliteCatalog {
    async fn upsert_user(&self, user: User) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO users (id, email) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET email = excluded.email",
                params![user.id.to_string(), user.email],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, email FROM users WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    let id: String = row.get(0)?;
                    let email: String = row.get(1)?;
                    Ok((id, email))
                },
            )
            .optional()?
            .map(|(id, email)| -> Result<User> {
                Ok(User {
                    id: id.parse().map_err(|_| StorageError::serialization("bad uuid"))?,
                    email,
                })
            })
            .transpose()
        })
        .await
    }

    async fn upsert_dataset(&self, dataset: Dataset) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO datasets (id, owner_id, name, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                params![
                    dataset.id.to_string(),
                    dataset.owner_id.to_string(),
                    dataset.name,
                    dataset.created_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, owner_id, name, created_at FROM datasets WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    let id: String = row.get(0)?;
                    let owner_id: String = row.get(1)?;
                    let name: String = row.get(2)?;
                    let created_at: i64 = row.get(3)?;
                    Ok((id, owner_id, name, created_at))
                },
            )
            .optional()?
            .map(|(id, owner_id, name, created_at)| -> Result<Dataset> {
                Ok(Dataset {
                    id: id.parse().map_err(|_| StorageError::serialization("bad uuid"))?,
                    owner_id: owner_id
                        .parse()
                        .map_err(|_| StorageError::serialization("bad uuid"))?,
                    name,
                    created_at,
                })
            })
            .transpose()
        })
        .await
    }

    async fn list_datasets(&self, owner_id: Uuid) -> Result<Vec<Dataset>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, name, created_at FROM datasets WHERE owner_id = ?1",
            )?;
            let rows = stmt.query_map(params![owner_id.to_string()], |row| {
                let id: String = row.get(0)?;
                let owner_id: String = row.get(1)?;
                let name: String = row.get(2)?;
                let created_at: i64 = row.get(3)?;
                Ok((id, owner_id, name, created_at))
            })?;
            let mut datasets = Vec::new();
            for row in rows {
                let (id, owner_id, name, created_at) = row?;
                datasets.push(Dataset {
                    id: id.parse().map_err(|_| StorageError::serialization("bad uuid"))?,
                    owner_id: owner_id
                        .parse()
                        .map_err(|_| StorageError::serialization("bad uuid"))?,
                    name,
                    created_at,
                });
            }
            Ok(datasets)
        })
        .await
    }

    async fn delete_dataset(&self, id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM datasets WHERE id = ?1", params![id.to_string()])?;
            conn.execute(
                "DELETE FROM dataset_databases WHERE dataset_id = ?1",
                params![id.to_string()],
            )?;
            Ok(())
        })
        .await
    }

    async fn upsert_dataset_database(&self, db: DatasetDatabase) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO dataset_databases
                    (dataset_id, owner_id, vector_db_name, graph_db_name, vector_provider, graph_provider, connection_info)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(dataset_id) DO UPDATE SET
                    vector_db_name = excluded.vector_db_name,
                    graph_db_name = excluded.graph_db_name,
                    vector_provider = excluded.vector_provider,
                    graph_provider = excluded.graph_provider,
                    connection_info = excluded.connection_info",
                params![
                    db.dataset_id.to_string(),
                    db.owner_id.to_string(),
                    db.vector_db_name,
                    db.graph_db_name,
                    db.vector_provider,
                    db.graph_provider,
                    serde_json::to_string(&db.connection_info)?,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_dataset_database(&self, dataset_id: Uuid) -> Result<Option<DatasetDatabase>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT dataset_id, owner_id, vector_db_name, graph_db_name, vector_provider, graph_provider, connection_info
                 FROM dataset_databases WHERE dataset_id = ?1",
                params![dataset_id.to_string()],
                |row| {
                    let dataset_id: String = row.get(0)?;
                    let owner_id: String = row.get(1)?;
                    let vector_db_name: String = row.get(2)?;
                    let graph_db_name: String = row.get(3)?;
                    let vector_provider: String = row.get(4)?;
                    let graph_provider: String = row.get(5)?;
                    let connection_info: String = row.get(6)?;
                    Ok((
                        dataset_id,
                        owner_id,
                        vector_db_name,
                        graph_db_name,
                        vector_provider,
                        graph_provider,
                        connection_info,
                    ))
                },
            )
            .optional()?
            .map(
                |(dataset_id, owner_id, vector_db_name, graph_db_name, vector_provider, graph_provider, connection_info)|
                 -> Result<DatasetDatabase> {
                    Ok(DatasetDatabase {
                        dataset_id: dataset_id
                            .parse()
                            .map_err(|_| StorageError::serialization("bad uuid"))?,
                        owner_id: owner_id
                            .parse()
                            .map_err(|_| StorageError::serialization("bad uuid"))?,
                        vector_db_name,
                        graph_db_name,
                        vector_provider,
                        graph_provider,
                        connection_info: serde_json::from_str(&connection_info)?,
                    })
                },
            )
            .transpose()
        })
        .await
    }

    async fn start_run(&self, pipeline_name: &str, dataset_id: Uuid) -> Result<PipelineRun> {
        let pipeline_name = pipeline_name.to_string();
        self.with_conn(move |conn| {
            let run = PipelineRun {
                run_id: cognee_ir::random_id(),
                pipeline_id: cognee_ir::stable_id(&pipeline_name),
                pipeline_name: pipeline_name.clone(),
                dataset_id,
                started_at: chrono::Utc::now().timestamp_millis(),
                completed_at: None,
                status: RunStatus::Started,
                error: None,
            };
            conn.execute(
                "INSERT INTO pipeline_runs (run_id, pipeline_id, pipeline_name, dataset_id, started_at, completed_at, status, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, NULL)",
                params![
                    run.run_id.to_string(),
                    run.pipeline_id.to_string(),
                    run.pipeline_name,
                    run.dataset_id.to_string(),
                    run.started_at,
                    status_to_str(run.status),
                ],
            )?;
            Ok(run)
        })
        .await
    }

    async fn complete_run(&self, run_id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE pipeline_runs SET status = ?1, completed_at = ?2 WHERE run_id = ?3",
                params![
                    status_to_str(RunStatus::Completed),
                    chrono::Utc::now().timestamp_millis(),
                    run_id.to_string()
                ],
            )?;
            if updated == 0 {
                return Err(StorageError::run_not_found(run_id));
            }
            Ok(())
        })
        .await
    }

    async fn fail_run(&self, run_id: Uuid, error: &str) -> Result<()> {
        let error = error.to_string();
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE pipeline_runs SET status = ?1, completed_at = ?2, error = ?3 WHERE run_id = ?4",
                params![
                    status_to_str(RunStatus::Errored),
                    chrono::Utc::now().timestamp_millis(),
                    error,
                    run_id.to_string()
                ],
            )?;
            if updated == 0 {
                return Err(StorageError::run_not_found(run_id));
            }
            Ok(())
        })
        .await
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<PipelineRun>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT run_id, pipeline_id, pipeline_name, dataset_id, started_at, completed_at, status, error
                 FROM pipeline_runs WHERE run_id = ?1",
                params![run_id.to_string()],
                map_run_row,
            )
            .optional()?
            .map(run_from_row)
            .transpose()
        })
        .await
    }

    async fn dangling_runs(&self) -> Result<Vec<PipelineRun>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT run_id, pipeline_id, pipeline_name, dataset_id, started_at, completed_at, status, error
                 FROM pipeline_runs WHERE status = 'started'",
            )?;
            let rows = stmt.query_map([], map_run_row)?;
            let mut runs = Vec::new();
            for row in rows {
                runs.push(run_from_row(row?)?);
            }
            Ok(runs)
        })
        .await
    }

    async fn record_access(&self, user_id: Uuid, dataset_id: Uuid, action: &str) -> Result<()> {
        let action = action.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO data_access_tracking (id, user_id, dataset_id, action, accessed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    cognee_ir::random_id().to_string(),
                    user_id.to_string(),
                    dataset_id.to_string(),
                    action,
                    chrono::Utc::now().timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn upsert_principal_configuration(&self, config: PrincipalConfiguration) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO principal_configuration (principal_id, settings) VALUES (?1, ?2)
                 ON CONFLICT(principal_id) DO UPDATE SET settings = excluded.settings",
                params![config.principal_id.to_string(), serde_json::to_string(&config.settings)?],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_principal_configuration(
        &self,
        principal_id: Uuid,
    ) -> Result<Option<PrincipalConfiguration>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT principal_id, settings FROM principal_configuration WHERE principal_id = ?1",
                params![principal_id.to_string()],
                |row| {
                    let principal_id: String = row.get(0)?;
                    let settings: String = row.get(1)?;
                    Ok((principal_id, settings))
                },
            )
            .optional()?
            .map(|(principal_id, settings)| -> Result<PrincipalConfiguration> {
                Ok(PrincipalConfiguration {
                    principal_id: principal_id
                        .parse()
                        .map_err(|_| StorageError::serialization("bad uuid"))?,
                    settings: serde_json::from_str(&settings)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn mirror_node(&self, node: NodeMirror) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO nodes (id, node_type) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET node_type = excluded.node_type",
                params![node.id.to_string(), node.node_type],
            )?;
            Ok(())
        })
        .await
    }

    async fn mirror_edge(&self, edge: EdgeMirror) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO edges (source_id, target_id, relation) VALUES (?1, ?2, ?3)",
                params![edge.source_id.to_string(), edge.target_id.to_string(), edge.relation_name],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_node_mirrors(&self, node_type: &str) -> Result<Vec<NodeMirror>> {
        let node_type = node_type.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT id, node_type FROM nodes WHERE node_type = ?1")?;
            let rows = stmt.query_map(params![node_type], |row| {
                let id: String = row.get(0)?;
                let node_type: String = row.get(1)?;
                Ok((id, node_type))
            })?;
            let mut mirrors = Vec::new();
            for row in rows {
                let (id, node_type) = row?;
                mirrors.push(NodeMirror {
                    id: id.parse().map_err(|_| StorageError::serialization("bad uuid"))?,
                    node_type,
                });
            }
            Ok(mirrors)
        })
        .await
    }

    async fn list_edge_mirrors_from(&self, source_id: Uuid) -> Result<Vec<EdgeMirror>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT source_id, target_id, relation FROM edges WHERE source_id = ?1",
            )?;
            let rows = stmt.query_map(params![source_id.to_string()], |row| {
                let source_id: String = row.get(0)?;
                let target_id: String = row.get(1)?;
                let relation: String = row.get(2)?;
                Ok((source_id, target_id, relation))
            })?;
            let mut mirrors = Vec::new();
            for row in rows {
                let (source_id, target_id, relation) = row?;
                mirrors.push(EdgeMirror {
                    source_id: source_id.parse().map_err(|_| StorageError::serialization("bad uuid"))?,
                    target_id: target_id.parse().map_err(|_| StorageError::serialization("bad uuid"))?,
                    relation_name: relation,
                });
            }
            Ok(mirrors)
        })
        .await
    }
}

type RunRow = (String, String, String, String, i64, Option<i64>, String, Option<String>);

fn map_run_row(row: &rusqlite::Row) -> rusqlite::Result<RunRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn run_from_row(row: RunRow) -> Result<PipelineRun> {
    let (run_id, pipeline_id, pipeline_name, dataset_id, started_at, completed_at, status, error) = row;
    Ok(PipelineRun {
        run_id: run_id.parse().map_err(|_| StorageError::serialization("bad uuid"))?,
        pipeline_id: pipeline_id
            .parse()
            .map_err(|_| StorageError::serialization("bad uuid"))?,
        pipeline_name,
        dataset_id: dataset_id
            .parse()
            .map_err(|_| StorageError::serialization("bad uuid"))?,
        started_at,
        completed_at,
        status: status_from_str(&status),
        error,
    })
}
