//! Chunking tasks (spec 4.7 step 3): split raw text into `DocumentChunk`
//! DataPoints under a token budget. Chunk ids are derived deterministically
//! from `"<document_id>:<chunk_index>"` so re-ingesting identical input
//! reproduces the same ids (spec 4.1, testable property 2).

use cognee_ir::{DataPointBase, DocumentChunk, Node};
use uuid::Uuid;

use crate::error::Result;
use crate::interfaces::EmbeddingEngine;

/// Safety margin subtracted from `embedder.max_tokens` so no chunk, once
/// embedded with its surrounding context, exceeds the embedder's true limit.
const TOKEN_SAFETY_MARGIN: usize = 16;

fn chunk_key(document_id: Uuid, index: u32) -> String {
    format!("{document_id}:{index}")
}

fn make_chunk(document_id: Uuid, index: u32, text: String) -> Node {
    Node::DocumentChunk(DocumentChunk {
        base: DataPointBase::new_deterministic(&chunk_key(document_id, index)),
        document_id,
        chunk_index: index,
        text,
        contains: Vec::new(),
    })
}

/// Greedy whitespace-token chunker: accumulates words until the next one
/// would exceed the budget, then starts a new chunk.
pub fn chunk_naive(document_id: Uuid, text: &str, embedder: &dyn EmbeddingEngine) -> Result<Vec<Node>> {
    let budget = embedder.max_tokens().saturating_sub(TOKEN_SAFETY_MARGIN).max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;
    let mut index = 0u32;

    for word in text.split_whitespace() {
        if current_tokens > 0 && current_tokens + 1 > budget {
            chunks.push(make_chunk(document_id, index, current.clone()));
            index += 1;
            current.clear();
            current_tokens = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
        current_tokens += 1;
    }
    if !current.is_empty() {
        chunks.push(make_chunk(document_id, index, current));
    }
    Ok(chunks)
}

/// Row-structured chunker (e.g. CSV/log lines): never splits a row
/// mid-key-value pair (spec 4.7 step 3). Each row is appended whole; when
/// appending it would exceed the budget, it starts a fresh chunk instead of
/// truncating the row.
pub fn chunk_by_row(document_id: Uuid, text: &str, embedder: &dyn EmbeddingEngine) -> Result<Vec<Node>> {
    let budget = embedder.max_tokens().saturating_sub(TOKEN_SAFETY_MARGIN).max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;
    let mut index = 0u32;

    for row in text.lines() {
        let row_tokens = embedder.count_tokens(row);
        if current_tokens > 0 && current_tokens + row_tokens > budget {
            chunks.push(make_chunk(document_id, index, current.clone()));
            index += 1;
            current.clear();
            current_tokens = 0;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(row);
        current_tokens += row_tokens;
    }
    if !current.is_empty() {
        chunks.push(make_chunk(document_id, index, current));
    }
    Ok(chunks)
}

/// Source-code chunker: splits on blank-line boundaries (a cheap proxy for
/// top-level definitions) under the same token budget, emitting
/// `SourceCodeChunk` rather than `DocumentChunk` (spec 4.1 `index_fields = ["code"]`).
pub fn chunk_code(
    file_path: &str,
    code: &str,
    embedder: &dyn EmbeddingEngine,
) -> Result<Vec<Node>> {
    use cognee_ir::SourceCodeChunk;

    let budget = embedder.max_tokens().saturating_sub(TOKEN_SAFETY_MARGIN).max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;

    for block in code.split("\n\n") {
        let block_tokens = embedder.count_tokens(block);
        if current_tokens > 0 && current_tokens + block_tokens > budget {
            chunks.push(Node::SourceCodeChunk(SourceCodeChunk {
                base: DataPointBase::new_deterministic(&format!("{file_path}:{}", chunks.len())),
                file_path: file_path.to_string(),
                code: current.clone(),
            }));
            current.clear();
            current_tokens = 0;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(block);
        current_tokens += block_tokens;
    }
    if !current.is_empty() {
        chunks.push(Node::SourceCodeChunk(SourceCodeChunk {
            base: DataPointBase::new_deterministic(&format!("{file_path}:{}", chunks.len())),
            file_path: file_path.to_string(),
            code: current,
        }));
    }
    Ok(chunks)
}
