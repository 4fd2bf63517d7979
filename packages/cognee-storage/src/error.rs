//! Storage-layer error type shared by the graph store, vector index, router
//! and relational catalog (spec 4.2-4.4, 4.9).

use std::fmt;

/// Coarse error classification, kept independent of any one backend so
/// callers can match on `kind` without depending on `rusqlite` types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    Serialization,
    CollectionNotFound,
    NodeNotFound,
    DatasetNotFound,
    DatasetDatabaseNotFound,
    RunNotFound,
    Transaction,
    Config,
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::Serialization => "serialization",
            ErrorKind::CollectionNotFound => "collection_not_found",
            ErrorKind::NodeNotFound => "node_not_found",
            ErrorKind::DatasetNotFound => "dataset_not_found",
            ErrorKind::DatasetDatabaseNotFound => "dataset_database_not_found",
            ErrorKind::RunNotFound => "run_not_found",
            ErrorKind::Transaction => "transaction",
            ErrorKind::Config => "config",
            ErrorKind::IO => "io",
        }
    }
}

/// A storage-layer error: a `kind`, a human message, and an optional source.
#[derive(Debug)]
pub struct StorageError {
    pub kind: ErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn collection_not_found(name: impl fmt::Display) -> Self {
        Self::new(ErrorKind::CollectionNotFound, format!("collection not found: {name}"))
    }

    pub fn node_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NodeNotFound, format!("node not found: {id}"))
    }

    pub fn dataset_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::DatasetNotFound, format!("dataset not found: {id}"))
    }

    pub fn dataset_database_not_found(id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::DatasetDatabaseNotFound,
            format!("dataset database not found: {id}"),
        )
    }

    pub fn run_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::RunNotFound, format!("run not found: {id}"))
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transaction, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::new(ErrorKind::Database, format!("SQLite error: {err}")).with_source(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::new(ErrorKind::Serialization, format!("JSON error: {err}")).with_source(err)
    }
}

impl From<cognee_ir::IrError> for StorageError {
    fn from(err: cognee_ir::IrError) -> Self {
        StorageError::new(ErrorKind::Serialization, format!("IR error: {err}"))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = StorageError::node_not_found("abc123def");
        let msg = format!("{}", err);
        assert!(msg.contains("node_not_found"));
        assert!(msg.contains("abc123def"));
    }

    #[test]
    fn test_database_error() {
        let err = StorageError::database("Connection failed");
        assert_eq!(err.kind, ErrorKind::Database);
        assert_eq!(err.message, "Connection failed");
        assert!(err.source.is_none());

        let msg = format!("{}", err);
        assert_eq!(msg, "[database] Connection failed");
    }

    #[test]
    fn test_serialization_error() {
        let err = StorageError::serialization("Invalid JSON");
        assert_eq!(err.kind, ErrorKind::Serialization);
        let msg = format!("{}", err);
        assert_eq!(msg, "[serialization] Invalid JSON");
    }

    #[test]
    fn test_collection_not_found() {
        let err = StorageError::collection_not_found("Entity_name");
        assert_eq!(err.kind, ErrorKind::CollectionNotFound);
        assert!(err.message.contains("Entity_name"));
    }

    #[test]
    fn test_dataset_database_not_found() {
        let err = StorageError::dataset_database_not_found("ds-1");
        assert_eq!(err.kind, ErrorKind::DatasetDatabaseNotFound);
    }

    #[test]
    fn test_with_source() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = StorageError::database("DB file missing").with_source(io_err);

        assert_eq!(err.kind, ErrorKind::Database);
        assert!(err.source.is_some());

        let source = err.source().unwrap();
        assert!(source.to_string().contains("file not found"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_from_rusqlite_error() {
        use rusqlite::Error as SqliteError;

        let sqlite_err = SqliteError::QueryReturnedNoRows;
        let err: StorageError = sqlite_err.into();

        assert_eq!(err.kind, ErrorKind::Database);
        assert!(err.message.contains("SQLite error"));
        assert!(err.source.is_some());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json")
            .err()
            .unwrap();
        let err: StorageError = json_err.into();

        assert_eq!(err.kind, ErrorKind::Serialization);
        assert!(err.message.contains("JSON error"));
        assert!(err.source.is_some());
    }

    #[test]
    fn test_result_propagation() {
        fn inner() -> Result<()> {
            Err(StorageError::node_not_found("test"))
        }

        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.kind, ErrorKind::NodeNotFound);
    }
}
