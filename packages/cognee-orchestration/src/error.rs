use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("storage error: {0}")]
    Storage(#[from] cognee_storage::StorageError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// Spec 4.6 step 4: the ready queue drained before every declared task ran.
    #[error("wrong task order: cycle or orphan dependency in pipeline DAG")]
    WrongTaskOrder,

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// Carries the task name, the underlying message, and a truncated
    /// traceback-equivalent for the run log (spec 4.6 "errored" record).
    #[error("task '{task}' failed: {message}")]
    TaskExecution {
        task: String,
        message: String,
        trace: String,
    },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    pub fn serialization<E: std::fmt::Display>(e: E) -> Self {
        Self::Serialization(e.to_string())
    }

    pub fn parse<E: std::fmt::Display>(e: E) -> Self {
        Self::Parse(e.to_string())
    }

    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    pub fn task_execution(task: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::TaskExecution {
            task: task.into(),
            message: message.to_string(),
            trace: String::new(),
        }
    }

    /// Classifies this error for retry purposes (spec 4.5 step 6, 4.7): a
    /// batch/LLM call worth retrying with backoff is `Transient`; everything
    /// else escalates immediately.
    pub fn category(&self) -> ErrorCategory {
        match self {
            OrchestratorError::Storage(e) => match e.kind {
                cognee_storage::ErrorKind::Database | cognee_storage::ErrorKind::Transaction => {
                    ErrorCategory::Transient
                }
                cognee_storage::ErrorKind::IO => ErrorCategory::Infrastructure,
                _ => ErrorCategory::Permanent,
            },
            OrchestratorError::Timeout(_) => ErrorCategory::Transient,
            OrchestratorError::Io(_) => ErrorCategory::Infrastructure,
            OrchestratorError::Other(e) => {
                let msg = e.to_string().to_lowercase();
                if msg.contains("timeout") || msg.contains("rate limit") || msg.contains("connection") {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            _ => ErrorCategory::Permanent,
        }
    }
}

/// Retries `f` with exponential backoff (doubling from `base_delay`) while
/// the error classifies as `ErrorCategory::Transient`, up to `max_attempts`
/// total attempts. Non-transient errors and the last attempt propagate
/// immediately (spec 4.5 step 6, 4.7).
pub async fn retry_transient<T, F, Fut>(
    max_attempts: u32,
    base_delay: std::time::Duration,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < max_attempts && e.category() == ErrorCategory::Transient => {
                let backoff = base_delay * 2u32.pow(attempt);
                tracing::warn!(
                    "attempt {}/{} failed with a transient error, retrying in {:?}: {}",
                    attempt + 1,
                    max_attempts,
                    backoff,
                    e
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Error category for retry logic (spec 4.7: LLM calls retried with
/// exponential backoff on rate-limit/timeout; schema-validation failures
/// retried once; persistent failure drops the unit of work).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Transient error - retry automatically (e.g., timeout, rate limit).
    Transient,
    /// Permanent error - don't retry (e.g., invalid input, schema mismatch after repair).
    Permanent,
    /// Infrastructure error - alert ops (e.g., store unreachable, OOM).
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "transient" => Ok(ErrorCategory::Transient),
            "permanent" => Ok(ErrorCategory::Permanent),
            "infrastructure" => Ok(ErrorCategory::Infrastructure),
            _ => Err(OrchestratorError::parse(format!(
                "invalid error category: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_roundtrip() {
        for category in &[
            ErrorCategory::Transient,
            ErrorCategory::Permanent,
            ErrorCategory::Infrastructure,
        ] {
            let s = category.as_str();
            let parsed = ErrorCategory::from_str(s).unwrap();
            assert_eq!(*category, parsed);
        }
    }

    #[test]
    fn test_error_category_invalid() {
        assert!(ErrorCategory::from_str("invalid").is_err());
    }

    #[test]
    fn test_task_execution_error_display() {
        let err = OrchestratorError::task_execution("chunk_naive", "token budget exceeded");
        assert!(err.to_string().contains("chunk_naive"));
        assert!(err.to_string().contains("token budget exceeded"));
    }

    #[test]
    fn test_storage_transaction_error_is_transient() {
        let err = OrchestratorError::Storage(cognee_storage::StorageError::transaction("locked"));
        assert_eq!(err.category(), ErrorCategory::Transient);
    }

    #[test]
    fn test_storage_node_not_found_is_permanent() {
        let err = OrchestratorError::Storage(cognee_storage::StorageError::node_not_found("abc"));
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }

    #[tokio::test]
    async fn test_retry_transient_recovers_before_max_attempts() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = retry_transient(3, std::time::Duration::from_millis(1), || {
            let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(OrchestratorError::Storage(cognee_storage::StorageError::transaction("busy")))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_transient_gives_up_on_permanent_error() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<()> = retry_transient(3, std::time::Duration::from_millis(1), || {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move { Err(OrchestratorError::Storage(cognee_storage::StorageError::node_not_found("x"))) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
