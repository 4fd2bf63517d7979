//! Concrete DataPoint subclasses, unified behind the `Node` sum type.
//!
//! Spec 9's "dynamic typing -> tagged variants" design note: instead of a
//! runtime-typed class hierarchy, every concrete subclass is a variant of one
//! enum. Traversal and materialization dispatch on the tag instead of relying
//! on reflection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::base::DataPointBase;

macro_rules! base_accessors {
    ($self:expr) => {
        match $self {
            Node::DocumentChunk(n) => &n.base,
            Node::Entity(n) => &n.base,
            Node::EntityType(n) => &n.base,
            Node::Summary(n) => &n.base,
            Node::CodePart(n) => &n.base,
            Node::SourceCodeChunk(n) => &n.base,
            Node::NodeSet(n) => &n.base,
        }
    };
}

/// A chunk of a source document; `index_fields = ["text"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub base: DataPointBase,
    pub document_id: Uuid,
    pub chunk_index: u32,
    pub text: String,
    /// Entities/summaries extracted from this chunk (implicit edge `contains`).
    #[serde(default)]
    pub contains: Vec<Node>,
}

/// An extracted entity; `index_fields = ["name", "description"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub base: DataPointBase,
    pub name: String,
    pub description: String,
    /// Parent `EntityType` (implicit edge `is_a`).
    pub is_a: Option<Box<Node>>,
}

/// The type of an `Entity` (e.g. "Person", "City"); `index_fields = ["name"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub base: DataPointBase,
    pub name: String,
}

/// A per-chunk summary; `index_fields = ["text"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub base: DataPointBase,
    pub text: String,
    /// The chunk this summarizes (implicit edge `made_from`).
    pub made_from: Option<Box<Node>>,
}

/// A unit of source code (function, class, ...); `index_fields = ["source_code"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodePart {
    pub base: DataPointBase,
    pub part_name: String,
    pub source_code: String,
}

/// A chunk of raw source text used by the `chunk_code` task; `index_fields = ["code"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCodeChunk {
    pub base: DataPointBase,
    pub file_path: String,
    pub code: String,
}

/// A named tag attached to DataPoints for coarse filtering/cleanup. No index fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSet {
    pub base: DataPointBase,
    pub name: String,
}

/// The union of every concrete DataPoint subclass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    DocumentChunk(DocumentChunk),
    Entity(Entity),
    EntityType(EntityType),
    Summary(Summary),
    CodePart(CodePart),
    SourceCodeChunk(SourceCodeChunk),
    NodeSet(NodeSet),
}

impl Node {
    pub fn id(&self) -> Uuid {
        base_accessors!(self).id
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Node::DocumentChunk(_) => "DocumentChunk",
            Node::Entity(_) => "Entity",
            Node::EntityType(_) => "EntityType",
            Node::Summary(_) => "Summary",
            Node::CodePart(_) => "CodePart",
            Node::SourceCodeChunk(_) => "SourceCodeChunk",
            Node::NodeSet(_) => "NodeSet",
        }
    }

    pub fn base(&self) -> &DataPointBase {
        base_accessors!(self)
    }

    pub fn base_mut(&mut self) -> &mut DataPointBase {
        match self {
            Node::DocumentChunk(n) => &mut n.base,
            Node::Entity(n) => &mut n.base,
            Node::EntityType(n) => &mut n.base,
            Node::Summary(n) => &mut n.base,
            Node::CodePart(n) => &mut n.base,
            Node::SourceCodeChunk(n) => &mut n.base,
            Node::NodeSet(n) => &mut n.base,
        }
    }

    /// The attribute names embedded into the vector store (spec 4.1).
    pub fn index_fields(&self) -> &'static [&'static str] {
        match self {
            Node::DocumentChunk(_) => &["text"],
            Node::Entity(_) => &["name", "description"],
            Node::EntityType(_) => &["name"],
            Node::Summary(_) => &["text"],
            Node::CodePart(_) => &["source_code"],
            Node::SourceCodeChunk(_) => &["code"],
            Node::NodeSet(_) => &[],
        }
    }

    /// The text backing one index field, or `None` if the field is empty (spec 4.5: "skip
    /// fields whose value is empty/None").
    pub fn field_text(&self, field: &str) -> Option<String> {
        let text = match (self, field) {
            (Node::DocumentChunk(n), "text") => n.text.clone(),
            (Node::Entity(n), "name") => n.name.clone(),
            (Node::Entity(n), "description") => n.description.clone(),
            (Node::EntityType(n), "name") => n.name.clone(),
            (Node::Summary(n), "text") => n.text.clone(),
            (Node::CodePart(n), "source_code") => n.source_code.clone(),
            (Node::SourceCodeChunk(n), "code") => n.code.clone(),
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Embeddable-text view: the values of `index_fields`, joined in declared order.
    pub fn embeddable_text(&self) -> String {
        self.index_fields()
            .iter()
            .filter_map(|f| self.field_text(f))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Collection name a given index field is embedded into (spec 4.5/6, `"<Subclass>_<field>"`).
    pub fn collection_name(&self, field: &str) -> String {
        format!("{}_{}", self.type_name(), field)
    }

    /// Scalar graph-node properties (everything except nested DataPoint fields).
    pub fn scalar_properties(&self) -> Map<String, Value> {
        let base = self.base();
        let mut props = Map::new();
        props.insert("id".into(), Value::String(base.id.to_string()));
        props.insert("version".into(), Value::from(base.version));
        props.insert("created_at".into(), Value::from(base.created_at));
        props.insert("updated_at".into(), Value::from(base.updated_at));
        if let Some(set_id) = base.belongs_to_set {
            props.insert("belongs_to_set".into(), Value::String(set_id.to_string()));
        }
        if let Some(p) = &base.source_pipeline {
            props.insert("source_pipeline".into(), Value::String(p.clone()));
        }
        if let Some(t) = &base.source_task {
            props.insert("source_task".into(), Value::String(t.clone()));
        }

        match self {
            Node::DocumentChunk(n) => {
                props.insert("document_id".into(), Value::String(n.document_id.to_string()));
                props.insert("chunk_index".into(), Value::from(n.chunk_index));
                props.insert("text".into(), Value::String(n.text.clone()));
            }
            Node::Entity(n) => {
                props.insert("name".into(), Value::String(n.name.clone()));
                props.insert("description".into(), Value::String(n.description.clone()));
            }
            Node::EntityType(n) => {
                props.insert("name".into(), Value::String(n.name.clone()));
            }
            Node::Summary(n) => {
                props.insert("text".into(), Value::String(n.text.clone()));
            }
            Node::CodePart(n) => {
                props.insert("part_name".into(), Value::String(n.part_name.clone()));
                props.insert("source_code".into(), Value::String(n.source_code.clone()));
            }
            Node::SourceCodeChunk(n) => {
                props.insert("file_path".into(), Value::String(n.file_path.clone()));
                props.insert("code".into(), Value::String(n.code.clone()));
            }
            Node::NodeSet(n) => {
                props.insert("name".into(), Value::String(n.name.clone()));
            }
        }
        props
    }

    /// Nested DataPoint-typed fields, paired with the field name that becomes the
    /// implicit edge's relation name (spec 4.5 step 1).
    pub fn child_edges(&self) -> Vec<(&'static str, &Node)> {
        match self {
            Node::DocumentChunk(n) => n.contains.iter().map(|c| ("contains", c)).collect(),
            Node::Entity(n) => n
                .is_a
                .as_deref()
                .map(|c| vec![("is_a", c)])
                .unwrap_or_default(),
            Node::Summary(n) => n
                .made_from
                .as_deref()
                .map(|c| vec![("made_from", c)])
                .unwrap_or_default(),
            Node::EntityType(_) | Node::CodePart(_) | Node::SourceCodeChunk(_) | Node::NodeSet(_) => {
                vec![]
            }
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
