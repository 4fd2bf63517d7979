//! External collaborator interfaces (spec 6). The core only ever reaches an
//! LLM, an embedder, a file, or an auth principal through these traits; no
//! concrete provider lives in this crate.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// `FileStorage.read(path) -> bytes` and its local/S3/HTTP variants; the
/// core never opens files directly (spec 6).
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// `LLMGateway.acreate_structured_output` (spec 6): returns a JSON value
/// that the caller validates against its own schema; retry/repair policy
/// (spec 4.7 "extraction failure") lives in the calling task, not here.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn create_structured_output(
        &self,
        text: &str,
        system_prompt: &str,
        response_schema: &Value,
    ) -> Result<Value>;

    /// Plain completion, used by retrieval's completion-style search types
    /// (spec 4.8 step 6).
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// `EmbeddingEngine.embed_text` plus the tokenizer facts chunking needs to
/// respect `max_tokens` (spec 4.2, 4.7).
#[async_trait]
pub trait EmbeddingEngine: Send + Sync {
    async fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
    fn max_tokens(&self) -> usize;
    fn count_tokens(&self, text: &str) -> usize;
}

/// `AuthContext.get_current_user()` (spec 6).
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: uuid::Uuid,
    pub tenant_id: uuid::Uuid,
    pub roles: Vec<String>,
}

pub trait AuthContext: Send + Sync {
    fn get_current_user(&self) -> CurrentUser;
}

/// Fixed-principal `AuthContext` for tests and single-tenant deployments.
pub struct StaticAuthContext {
    user: CurrentUser,
}

impl StaticAuthContext {
    pub fn new(user: CurrentUser) -> Self {
        Self { user }
    }
}

impl AuthContext for StaticAuthContext {
    fn get_current_user(&self) -> CurrentUser {
        self.user.clone()
    }
}

/// Whitespace tokenizer + a deterministic embedding (hashed bag-of-words).
/// Stands in for a real embedder/LLM in tests and as the default wiring for
/// `add`/`cognify`/`search` when no provider is configured; never calls out
/// to a network.
pub struct DeterministicEmbeddingEngine {
    dims: usize,
    max_tokens: usize,
}

impl DeterministicEmbeddingEngine {
    pub fn new(dims: usize, max_tokens: usize) -> Self {
        Self { dims, max_tokens }
    }
}

impl Default for DeterministicEmbeddingEngine {
    fn default() -> Self {
        Self::new(32, 512)
    }
}

#[async_trait]
impl EmbeddingEngine for DeterministicEmbeddingEngine {
    async fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hashed_embedding(t, self.dims)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

fn hashed_embedding(text: &str, dims: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut vector = vec![0.0f32; dims];
    for word in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        let bucket = (hasher.finish() as usize) % dims;
        vector[bucket] += 1.0;
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_embedding_is_stable() {
        let engine = DeterministicEmbeddingEngine::default();
        let a = engine.embed_text(&["alice met bob".to_string()]).await.unwrap();
        let b = engine.embed_text(&["alice met bob".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn count_tokens_splits_on_whitespace() {
        let engine = DeterministicEmbeddingEngine::default();
        assert_eq!(engine.count_tokens("alice met bob"), 3);
    }

    #[test]
    fn static_auth_context_returns_fixed_user() {
        let user = CurrentUser {
            id: uuid::Uuid::new_v4(),
            tenant_id: uuid::Uuid::new_v4(),
            roles: vec!["owner".into()],
        };
        let ctx = StaticAuthContext::new(user.clone());
        assert_eq!(ctx.get_current_user(), user);
    }
}
