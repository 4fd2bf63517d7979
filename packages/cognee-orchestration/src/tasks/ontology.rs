//! `ontology_resolver` (spec 4.7 step 5, optional): collapses entities whose
//! normalized labels collide into a single canonical id, so "Paris" and
//! "paris" (or NFC/NFD variants of the same label) resolve to the same
//! entity post-ontology (spec 8 boundary behavior).

use std::collections::HashMap;

use cognee_ir::{Edge, Node};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::error::Result;

fn normalize_label(label: &str) -> String {
    label.nfc().collect::<String>().to_lowercase()
}

/// Rewrites every `Entity` id to `uuid5(NAMESPACE_OID, "entity:<normalized name>")`
/// and remaps edge endpoints accordingly, so synonymous entities merge by
/// construction rather than by a separate merge step.
pub fn ontology_resolver(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<(Vec<Node>, Vec<Edge>)> {
    let mut remap: HashMap<Uuid, Uuid> = HashMap::new();
    let mut by_canonical_id: HashMap<Uuid, Node> = HashMap::new();

    for node in nodes {
        let canonical_id = if let Node::Entity(entity) = &node {
            cognee_ir::stable_id(&format!("entity:{}", normalize_label(&entity.name)))
        } else {
            node.id()
        };
        remap.insert(node.id(), canonical_id);

        let mut node = node;
        node.base_mut().id = canonical_id;
        by_canonical_id.entry(canonical_id).or_insert(node);
    }

    let resolved_nodes: Vec<Node> = by_canonical_id.into_values().collect();

    let mut seen_edges = std::collections::HashSet::new();
    let mut resolved_edges = Vec::new();
    for mut edge in edges {
        edge.source_id = *remap.get(&edge.source_id).unwrap_or(&edge.source_id);
        edge.target_id = *remap.get(&edge.target_id).unwrap_or(&edge.target_id);
        let key = (edge.source_id, edge.target_id, edge.relation_name.clone());
        if seen_edges.insert(key) {
            resolved_edges.push(edge);
        }
    }

    Ok((resolved_nodes, resolved_edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognee_ir::{DataPointBase, Entity};

    fn entity(name: &str) -> Node {
        Node::Entity(Entity {
            base: DataPointBase::new_random(),
            name: name.to_string(),
            description: String::new(),
            is_a: None,
        })
    }

    #[test]
    fn case_insensitive_synonyms_collapse_to_one_entity() {
        let nodes = vec![entity("Paris"), entity("paris")];
        let (resolved, _) = ontology_resolver(nodes, vec![]).unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn nfc_and_nfd_variants_collapse_to_the_same_id() {
        let nfc = "caf\u{00e9}";
        let nfd = "cafe\u{0301}";
        let nodes = vec![entity(nfc), entity(nfd)];
        let (resolved, _) = ontology_resolver(nodes, vec![]).unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn edges_are_remapped_to_canonical_ids() {
        let alice = entity("Alice");
        let alice2 = entity("alice");
        let alice_id = alice.id();
        let alice2_id = alice2.id();
        let edges = vec![Edge::new(alice_id, alice2_id, "self_ref")];

        let (resolved, resolved_edges) = ontology_resolver(vec![alice, alice2], edges).unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved_edges.len(), 1);
        assert_eq!(resolved_edges[0].source_id, resolved[0].id());
        assert_eq!(resolved_edges[0].target_id, resolved[0].id());
    }
}
