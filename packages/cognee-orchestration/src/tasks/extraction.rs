//! `extract_graph_from_data` (spec 4.7 step 4): turns a chunk's text into
//! `Entity`/`EntityType` DataPoints plus explicit relationship edges, via one
//! structured LLM call per chunk.

use std::time::Duration;

use cognee_ir::{DataPointBase, Edge, Entity, EntityType, Node};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{retry_transient, OrchestratorError, Result};
use crate::interfaces::LlmGateway;

const SYSTEM_PROMPT: &str = "Extract entities and relationships from the given text. \
Respond only with JSON matching the given schema.";

/// LLM calls are retried on rate-limit/timeout independently of the
/// schema-repair retry below (spec 4.7).
const MAX_LLM_ATTEMPTS: u32 = 3;
const LLM_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "entities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "description": {"type": "string"},
                        "entity_type": {"type": "string"}
                    },
                    "required": ["name", "entity_type"]
                }
            },
            "relationships": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "source": {"type": "string"},
                        "target": {"type": "string"},
                        "relation": {"type": "string"}
                    },
                    "required": ["source", "target", "relation"]
                }
            }
        },
        "required": ["entities", "relationships"]
    })
}

#[derive(Debug, Deserialize)]
struct ExtractedEntity {
    name: String,
    #[serde(default)]
    description: String,
    entity_type: String,
}

#[derive(Debug, Deserialize)]
struct ExtractedRelationship {
    source: String,
    target: String,
    relation: String,
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    entities: Vec<ExtractedEntity>,
    relationships: Vec<ExtractedRelationship>,
}

/// Extracts a small entity/relationship graph from `text` bound to the
/// originating chunk via an implicit `mentions` edge. Retries once with a
/// repair prompt on schema-validation failure (spec 4.7, 7 "extraction
/// failure").
pub async fn extract_graph_from_data(
    chunk_id: uuid::Uuid,
    text: &str,
    llm: &dyn LlmGateway,
) -> Result<(Vec<Node>, Vec<Edge>)> {
    let schema = response_schema();

    let first = retry_transient(MAX_LLM_ATTEMPTS, LLM_RETRY_BASE_DELAY, || {
        llm.create_structured_output(text, SYSTEM_PROMPT, &schema)
    })
    .await?;
    let parsed: ExtractionResponse = match serde_json::from_value(first) {
        Ok(parsed) => parsed,
        Err(_) => {
            // Schema-validation failure: retry once with a repair prompt
            // before surfacing a parse error (spec 4.7, 7 "extraction failure").
            // The repair call itself still gets the rate-limit/timeout backoff.
            let repair_prompt = format!(
                "Your previous response did not match the required schema. \
                 Re-extract entities and relationships from:\n\n{text}"
            );
            let retried = retry_transient(MAX_LLM_ATTEMPTS, LLM_RETRY_BASE_DELAY, || {
                llm.create_structured_output(&repair_prompt, SYSTEM_PROMPT, &schema)
            })
            .await?;
            serde_json::from_value(retried)
                .map_err(|e| OrchestratorError::parse(format!("extraction response: {e}")))?
        }
    };

    let mut entity_types: std::collections::HashMap<String, Node> = std::collections::HashMap::new();
    let mut entities_by_name: std::collections::HashMap<String, Node> = std::collections::HashMap::new();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for extracted in &parsed.entities {
        let entity_type = entity_types
            .entry(extracted.entity_type.clone())
            .or_insert_with(|| {
                Node::EntityType(EntityType {
                    base: DataPointBase::new_deterministic(&format!(
                        "entity_type:{}",
                        extracted.entity_type.to_lowercase()
                    )),
                    name: extracted.entity_type.clone(),
                })
            })
            .clone();

        let entity = Node::Entity(Entity {
            base: DataPointBase::new_random(),
            name: extracted.name.clone(),
            description: extracted.description.clone(),
            is_a: Some(Box::new(entity_type)),
        });

        edges.push(Edge::new(chunk_id, entity.id(), "mentions"));
        entities_by_name.insert(extracted.name.clone(), entity.clone());
        nodes.push(entity);
    }

    for entity_type in entity_types.into_values() {
        nodes.push(entity_type);
    }

    for rel in &parsed.relationships {
        let (Some(source), Some(target)) = (
            entities_by_name.get(&rel.source),
            entities_by_name.get(&rel.target),
        ) else {
            continue;
        };
        edges.push(Edge::new(source.id(), target.id(), rel.relation.clone()));
    }

    Ok((nodes, edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct StubGateway {
        response: Value,
    }

    #[async_trait]
    impl LlmGateway for StubGateway {
        async fn create_structured_output(
            &self,
            _text: &str,
            _system_prompt: &str,
            _schema: &Value,
        ) -> Result<Value> {
            Ok(self.response.clone())
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn extracts_entities_and_relationship_edges() {
        let gateway = StubGateway {
            response: json!({
                "entities": [
                    {"name": "Alice", "description": "a person", "entity_type": "Person"},
                    {"name": "Bob", "description": "a person", "entity_type": "Person"}
                ],
                "relationships": [
                    {"source": "Alice", "target": "Bob", "relation": "knows"}
                ]
            }),
        };

        let chunk_id = Uuid::new_v4();
        let (nodes, edges) = extract_graph_from_data(chunk_id, "Alice knows Bob.", &gateway)
            .await
            .unwrap();

        let entity_count = nodes.iter().filter(|n| n.type_name() == "Entity").count();
        let type_count = nodes.iter().filter(|n| n.type_name() == "EntityType").count();
        assert_eq!(entity_count, 2);
        assert_eq!(type_count, 1);

        assert!(edges.iter().any(|e| e.relation_name == "knows"));
        assert_eq!(edges.iter().filter(|e| e.relation_name == "mentions").count(), 2);
    }

    #[tokio::test]
    async fn shared_entity_type_is_deduplicated() {
        let gateway = StubGateway {
            response: json!({
                "entities": [
                    {"name": "Alice", "description": "", "entity_type": "Person"},
                    {"name": "Bob", "description": "", "entity_type": "Person"}
                ],
                "relationships": []
            }),
        };

        let (nodes, _) = extract_graph_from_data(Uuid::new_v4(), "text", &gateway)
            .await
            .unwrap();

        let type_count = nodes.iter().filter(|n| n.type_name() == "EntityType").count();
        assert_eq!(type_count, 1);
    }

    #[tokio::test]
    async fn malformed_response_surfaces_as_parse_error() {
        let gateway = StubGateway {
            response: json!({"unexpected": true}),
        };

        let result = extract_graph_from_data(Uuid::new_v4(), "text", &gateway).await;
        assert!(result.is_err());
    }

    struct FlakyGateway {
        response: Value,
        failures_remaining: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl LlmGateway for FlakyGateway {
        async fn create_structured_output(
            &self,
            _text: &str,
            _system_prompt: &str,
            _schema: &Value,
        ) -> Result<Value> {
            if self.failures_remaining.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                return Err(OrchestratorError::Timeout("llm call timed out".into()));
            }
            Ok(self.response.clone())
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn transient_llm_failure_is_retried_with_backoff() {
        let gateway = FlakyGateway {
            response: json!({
                "entities": [{"name": "Alice", "description": "", "entity_type": "Person"}],
                "relationships": []
            }),
            failures_remaining: std::sync::atomic::AtomicU32::new(2),
        };

        let (nodes, _) = extract_graph_from_data(Uuid::new_v4(), "text", &gateway)
            .await
            .unwrap();

        assert_eq!(nodes.iter().filter(|n| n.type_name() == "Entity").count(), 1);
    }
}
