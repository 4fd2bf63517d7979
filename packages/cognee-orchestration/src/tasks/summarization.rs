//! `summarization` (spec 4.7 step 6): one `Summary` DataPoint per chunk, via
//! an LLM completion call, linked back to its source chunk through the
//! `made_from` implicit edge.

use cognee_ir::{DataPointBase, DocumentChunk, Node, Summary};

use crate::error::Result;
use crate::interfaces::LlmGateway;

const SUMMARY_PROMPT_PREFIX: &str = "Summarize the following text in 1-2 sentences:\n\n";

/// Produces a `Summary` node for each input chunk. Chunks whose text is
/// empty are skipped rather than sent to the LLM (spec 4.5 "skip fields
/// whose value is empty/None" applies equally to summarization inputs).
pub async fn summarization(chunks: &[Node], llm: &dyn LlmGateway) -> Result<Vec<Node>> {
    let mut summaries = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let Node::DocumentChunk(DocumentChunk { text, .. }) = chunk else {
            continue;
        };
        if text.is_empty() {
            continue;
        }

        let prompt = format!("{SUMMARY_PROMPT_PREFIX}{text}");
        let summary_text = llm.complete(&prompt).await?;

        summaries.push(Node::Summary(Summary {
            base: DataPointBase::new_deterministic(&format!("summary:{}", chunk.id())),
            text: summary_text,
            made_from: Some(Box::new(chunk.clone())),
        }));
    }

    Ok(summaries)
}
