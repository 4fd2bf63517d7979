//! Closure walk (spec 4.5 step 1) and provenance stamping (spec 4.6, 3.4).

use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use crate::edge::Edge;
use crate::node::Node;

/// The result of walking a forest of `Node`s through their DataPoint-typed fields:
/// every reachable node (deduplicated by id, first occurrence wins) plus one
/// implicit `Edge` per parent -> child field traversed.
#[derive(Debug, Clone, Default)]
pub struct Closure {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Closure {
    /// Build the closure of `roots` plus everything reachable through nested
    /// DataPoint fields (spec 4.5 edge case: cyclic references are safe because
    /// the walk is keyed by id, not by pointer identity).
    pub fn build(roots: &[Node]) -> Self {
        let mut seen = HashSet::new();
        let mut recursed = HashSet::new();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        for root in roots {
            Self::walk(root, &mut seen, &mut recursed, &mut nodes, &mut edges);
        }

        Closure { nodes, edges }
    }

    fn walk(
        node: &Node,
        seen: &mut HashSet<Uuid>,
        recursed: &mut HashSet<Uuid>,
        nodes: &mut Vec<Node>,
        edges: &mut Vec<Edge>,
    ) {
        let id = node.id();

        // First occurrence wins; later occurrences of the same id still
        // contribute an edge below but are not re-added to `nodes`.
        if seen.insert(id) {
            nodes.push(node.clone());
        }

        // Only descend into a node's children once, even if it is reached
        // through multiple parents.
        if !recursed.insert(id) {
            return;
        }

        for (field_name, child) in node.child_edges() {
            edges.push(Edge::new(id, child.id(), field_name));
            Self::walk(child, seen, recursed, nodes, edges);
        }
    }
}

/// Stamp `source_pipeline`/`source_task` on `node` and everything reachable from
/// it, never overwriting values that are already set (spec invariant 4).
pub fn stamp_provenance(node: &mut Node, pipeline: &str, task: &str) {
    let mut visited = HashSet::new();
    stamp_inner(node, pipeline, task, &mut visited);
}

pub fn stamp_provenance_all(nodes: &mut [Node], pipeline: &str, task: &str) {
    let mut visited = HashSet::new();
    for node in nodes.iter_mut() {
        stamp_inner(node, pipeline, task, &mut visited);
    }
    debug!("Stamped provenance on {} node(s) for {}/{}", visited.len(), pipeline, task);
}

fn stamp_inner(node: &mut Node, pipeline: &str, task: &str, visited: &mut HashSet<Uuid>) {
    if !visited.insert(node.id()) {
        return;
    }
    node.base_mut().stamp_provenance(pipeline, task);

    match node {
        Node::DocumentChunk(n) => {
            for child in n.contains.iter_mut() {
                stamp_inner(child, pipeline, task, visited);
            }
        }
        Node::Entity(n) => {
            if let Some(child) = n.is_a.as_deref_mut() {
                stamp_inner(child, pipeline, task, visited);
            }
        }
        Node::Summary(n) => {
            if let Some(child) = n.made_from.as_deref_mut() {
                stamp_inner(child, pipeline, task, visited);
            }
        }
        Node::EntityType(_) | Node::CodePart(_) | Node::SourceCodeChunk(_) | Node::NodeSet(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::DataPointBase;
    use crate::node::{DocumentChunk, Entity, EntityType};
    use pretty_assertions::assert_eq;

    fn chunk_with_entity() -> Node {
        let entity = Node::Entity(Entity {
            base: DataPointBase::new_random(),
            name: "Alice".into(),
            description: "".into(),
            is_a: Some(Box::new(Node::EntityType(EntityType {
                base: DataPointBase::new_random(),
                name: "Person".into(),
            }))),
        });
        Node::DocumentChunk(DocumentChunk {
            base: DataPointBase::new_random(),
            document_id: Uuid::new_v4(),
            chunk_index: 0,
            text: "Alice met Bob.".into(),
            contains: vec![entity],
        })
    }

    #[test]
    fn closure_collects_nested_nodes_and_implicit_edges() {
        let root = chunk_with_entity();
        let closure = Closure::build(std::slice::from_ref(&root));

        // chunk + entity + entity_type
        assert_eq!(closure.nodes.len(), 3);
        assert_eq!(closure.edges.len(), 2);

        let relations: Vec<&str> = closure
            .edges
            .iter()
            .map(|e| e.relation_name.as_str())
            .collect();
        assert!(relations.contains(&"contains"));
        assert!(relations.contains(&"is_a"));
    }

    #[test]
    fn closure_dedupes_shared_nodes_by_id_first_occurrence_wins() {
        let shared_type = Node::EntityType(EntityType {
            base: DataPointBase::new_random(),
            name: "Person".into(),
        });
        let entity_a = Node::Entity(Entity {
            base: DataPointBase::new_random(),
            name: "Alice".into(),
            description: "".into(),
            is_a: Some(Box::new(shared_type.clone())),
        });
        let entity_b = Node::Entity(Entity {
            base: DataPointBase::new_random(),
            name: "Bob".into(),
            description: "".into(),
            is_a: Some(Box::new(shared_type)),
        });

        let closure = Closure::build(&[entity_a, entity_b]);

        // 2 entities + 1 shared EntityType (deduped)
        assert_eq!(closure.nodes.len(), 3);
        assert_eq!(closure.edges.len(), 2);
    }

    #[test]
    fn stamp_provenance_reaches_nested_nodes_without_overwrite() {
        let mut root = chunk_with_entity();
        // Pre-set provenance on the nested entity type to verify monotonicity.
        if let Node::DocumentChunk(chunk) = &mut root {
            if let Node::Entity(entity) = &mut chunk.contains[0] {
                if let Some(entity_type) = entity.is_a.as_deref_mut() {
                    entity_type.base_mut().stamp_provenance("pre", "pre_task");
                }
            }
        }

        stamp_provenance(&mut root, "demo", "emit");

        assert_eq!(root.base().source_pipeline.as_deref(), Some("demo"));
        if let Node::DocumentChunk(chunk) = &root {
            if let Node::Entity(entity) = &chunk.contains[0] {
                assert_eq!(entity.base.source_pipeline.as_deref(), Some("demo"));
                let entity_type = entity.is_a.as_deref().unwrap();
                // Pre-set value survives the stamping pass.
                assert_eq!(entity_type.base().source_pipeline.as_deref(), Some("pre"));
            }
        }
    }
}
