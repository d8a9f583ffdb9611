//! Structural validation and sanitization of candidate graphs.
//!
//! `validate` is a pure check that short-circuits on the first problem, in
//! this order: graph shape, node fields, edge fields, id uniqueness, edge
//! endpoints.
//! `sanitize` is the tolerant counterpart used on generator output: it drops
//! repeated ids and edges whose endpoints are missing, and reports what it
//! dropped.

use crate::model::{Edge, Node, Ontology};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    #[error("node {id:?} is missing field `{field}`")]
    NodeMissingField { id: String, field: &'static str },

    #[error("edge {id:?} is missing field `{field}`")]
    EdgeMissingField { id: String, field: &'static str },

    #[error("duplicate {kind} id {id:?}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("edge {edge_id:?} references unknown node {node_id:?}")]
    DanglingEdgeReference { edge_id: String, node_id: String },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Check the structural invariants of a typed graph.
pub fn validate(graph: &Ontology) -> Result<()> {
    for (index, node) in graph.nodes.iter().enumerate() {
        if node.id.is_empty() {
            return Err(ValidationError::NodeMissingField {
                id: format!("#{}", index),
                field: "id",
            });
        }
        if node.name.is_empty() {
            return Err(ValidationError::NodeMissingField {
                id: node.id.clone(),
                field: "name",
            });
        }
    }

    for (index, edge) in graph.edges.iter().enumerate() {
        let label = if edge.id.is_empty() {
            format!("#{}", index)
        } else {
            edge.id.clone()
        };
        for (field, value) in [("id", &edge.id), ("source", &edge.source), ("target", &edge.target)] {
            if value.is_empty() {
                return Err(ValidationError::EdgeMissingField { id: label, field });
            }
        }
    }

    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                kind: "node",
                id: node.id.clone(),
            });
        }
    }
    let mut seen = HashSet::new();
    for edge in &graph.edges {
        if !seen.insert(edge.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                kind: "edge",
                id: edge.id.clone(),
            });
        }
    }

    let ids = graph.node_ids();
    for edge in &graph.edges {
        if let Some(missing) = missing_endpoint(edge, &ids) {
            return Err(ValidationError::DanglingEdgeReference {
                edge_id: edge.id.clone(),
                node_id: missing.to_string(),
            });
        }
    }

    Ok(())
}

/// Decode and validate an untyped JSON graph.
///
/// `nodes` and `edges` must be present as arrays; anything serde cannot map
/// onto the record shapes is reported as [`ValidationError::MalformedGraph`].
pub fn validate_value(value: &Value) -> Result<Ontology> {
    let graph = decode_graph(value)?;
    validate(&graph)?;
    Ok(graph)
}

/// Decode an untyped JSON graph without checking node/edge invariants.
pub fn decode_graph(value: &Value) -> Result<Ontology> {
    let object = value
        .as_object()
        .ok_or_else(|| ValidationError::MalformedGraph("graph is not a JSON object".to_string()))?;
    for key in ["nodes", "edges"] {
        match object.get(key) {
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(ValidationError::MalformedGraph(format!(
                    "`{}` is not an array",
                    key
                )))
            }
            None => {
                return Err(ValidationError::MalformedGraph(format!(
                    "`{}` is missing",
                    key
                )))
            }
        }
    }
    serde_json::from_value(value.clone()).map_err(|e| ValidationError::MalformedGraph(e.to_string()))
}

/// An edge removed by [`sanitize`] and the endpoint that was missing.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedEdge {
    pub edge: Edge,
    pub missing_node: String,
}

/// A record removed by [`sanitize`] because an earlier record has its id.
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateRecord {
    Node(Node),
    Edge(Edge),
}

impl DuplicateRecord {
    pub fn id(&self) -> &str {
        match self {
            DuplicateRecord::Node(node) => &node.id,
            DuplicateRecord::Edge(edge) => &edge.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DuplicateRecord::Node(_) => "node",
            DuplicateRecord::Edge(_) => "edge",
        }
    }
}

/// Result of [`sanitize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub graph: Ontology,
    pub dropped: Vec<DroppedEdge>,
    pub duplicates: Vec<DuplicateRecord>,
}

/// Make a generator graph structurally sound.
///
/// Later nodes repeating an earlier node id are removed first. Then each
/// edge is dropped if an endpoint is not a node, or if a kept edge already
/// has its id. The first occurrence of an id always wins. A graph with
/// unique ids and no dangling edges comes back unchanged.
pub fn sanitize(graph: Ontology) -> Sanitized {
    let Ontology {
        version,
        created_at,
        updated_at,
        nodes,
        edges,
        metadata,
    } = graph;

    let mut duplicates = Vec::new();
    let mut unique_nodes = Vec::with_capacity(nodes.len());
    let mut node_ids = HashSet::new();
    for node in nodes {
        if node_ids.contains(&node.id) {
            tracing::warn!(node_id = %node.id, name = %node.name, "dropping node with duplicate id");
            duplicates.push(DuplicateRecord::Node(node));
        } else {
            node_ids.insert(node.id.clone());
            unique_nodes.push(node);
        }
    }

    let ids: HashSet<&str> = unique_nodes.iter().map(|n| n.id.as_str()).collect();
    let mut edge_ids = HashSet::new();
    let mut kept = Vec::with_capacity(edges.len());
    let mut dropped = Vec::new();

    for edge in edges {
        if let Some(missing) = missing_endpoint(&edge, &ids) {
            let missing_node = missing.to_string();
            tracing::warn!(
                edge_id = %edge.id,
                missing_node = %missing_node,
                "dropping edge with dangling endpoint"
            );
            dropped.push(DroppedEdge { edge, missing_node });
        } else if edge_ids.contains(&edge.id) {
            tracing::warn!(edge_id = %edge.id, "dropping edge with duplicate id");
            duplicates.push(DuplicateRecord::Edge(edge));
        } else {
            edge_ids.insert(edge.id.clone());
            kept.push(edge);
        }
    }

    let graph = Ontology {
        version,
        created_at,
        updated_at,
        nodes: unique_nodes,
        edges: kept,
        metadata,
    };
    Sanitized {
        graph,
        dropped,
        duplicates,
    }
}

fn missing_endpoint<'a>(edge: &'a Edge, ids: &HashSet<&str>) -> Option<&'a str> {
    if !ids.contains(edge.source.as_str()) {
        Some(&edge.source)
    } else if !ids.contains(edge.target.as_str()) {
        Some(&edge.target)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{create_empty, Node};
    use serde_json::json;

    fn two_nodes() -> Ontology {
        let mut graph = create_empty();
        graph.nodes.push(Node::new("a", "A"));
        graph.nodes.push(Node::new("b", "B"));
        graph
    }

    #[test]
    fn test_empty_graph_is_valid() {
        assert_eq!(validate(&create_empty()), Ok(()));
    }

    #[test]
    fn test_dangling_target() {
        let mut graph = two_nodes();
        graph.edges.push(Edge::new("e1", "a", "z", "rel"));
        assert_eq!(
            validate(&graph),
            Err(ValidationError::DanglingEdgeReference {
                edge_id: "e1".to_string(),
                node_id: "z".to_string(),
            })
        );
    }

    #[test]
    fn test_node_missing_name() {
        let mut graph = two_nodes();
        graph.nodes.push(Node::new("c", ""));
        assert_eq!(
            validate(&graph),
            Err(ValidationError::NodeMissingField {
                id: "c".to_string(),
                field: "name"
            })
        );
    }

    #[test]
    fn test_edge_missing_source_reported_before_dangling() {
        let mut graph = two_nodes();
        graph.edges.push(Edge::new("e0", "a", "zz", "rel"));
        graph.edges.push(Edge::new("e1", "", "b", "rel"));
        assert_eq!(
            validate(&graph),
            Err(ValidationError::EdgeMissingField {
                id: "e1".to_string(),
                field: "source"
            })
        );
    }

    #[test]
    fn test_node_checks_come_first() {
        let mut graph = two_nodes();
        graph.edges.push(Edge::new("", "a", "b", "rel"));
        graph.nodes.push(Node::new("", "Anonymous"));
        assert!(matches!(
            validate(&graph),
            Err(ValidationError::NodeMissingField { field: "id", .. })
        ));
    }

    #[test]
    fn test_validate_value_requires_arrays() {
        let err = validate_value(&json!({"nodes": []})).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedGraph(_)));

        let err = validate_value(&json!({"nodes": {}, "edges": []})).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedGraph(_)));

        let err = validate_value(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedGraph(_)));
    }

    #[test]
    fn test_validate_value_reports_missing_node_name() {
        let err = validate_value(&json!({
            "nodes": [{"id": "a"}],
            "edges": []
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::NodeMissingField {
                id: "a".to_string(),
                field: "name"
            }
        );
    }

    #[test]
    fn test_sanitize_drops_only_dangling() {
        let mut graph = two_nodes();
        graph.edges.push(Edge::new("ok", "a", "b", "rel"));
        graph.edges.push(Edge::new("bad", "ghost", "b", "rel"));

        let Sanitized {
            graph: pruned,
            dropped,
            duplicates,
        } = sanitize(graph);
        assert_eq!(pruned.edges.len(), 1);
        assert_eq!(pruned.edges[0].id, "ok");
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].missing_node, "ghost");
        assert!(duplicates.is_empty());
        assert_eq!(validate(&pruned), Ok(()));
    }

    #[test]
    fn test_sanitize_clean_graph_unchanged() {
        let mut graph = two_nodes();
        graph.edges.push(Edge::new("ok", "a", "b", "rel"));
        let sanitized = sanitize(graph.clone());
        assert!(sanitized.dropped.is_empty());
        assert!(sanitized.duplicates.is_empty());
        assert_eq!(sanitized.graph, graph);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut graph = two_nodes();
        graph.nodes.push(Node::new("a", "Again"));
        assert_eq!(
            validate(&graph),
            Err(ValidationError::DuplicateId {
                kind: "node",
                id: "a".to_string(),
            })
        );

        let mut graph = two_nodes();
        graph.edges.push(Edge::new("e1", "a", "b", "rel"));
        graph.edges.push(Edge::new("e1", "b", "a", "rel"));
        assert_eq!(
            validate(&graph),
            Err(ValidationError::DuplicateId {
                kind: "edge",
                id: "e1".to_string(),
            })
        );

        // Node and edge ids live in separate namespaces.
        let mut graph = two_nodes();
        graph.edges.push(Edge::new("a", "a", "b", "rel"));
        assert_eq!(validate(&graph), Ok(()));
    }

    #[test]
    fn test_sanitize_keeps_first_of_each_id() {
        let mut graph = create_empty();
        graph.nodes.push(Node::new("c1", "Transformer"));
        graph.nodes.push(Node::new("c1", "Attention"));
        graph.nodes.push(Node::new("c2", "BERT"));
        graph.edges.push(Edge::new("e1", "c2", "ghost", "rel"));
        graph.edges.push(Edge::new("e1", "c2", "c1", "based on"));
        graph.edges.push(Edge::new("e1", "c1", "c2", "contains"));

        let sanitized = sanitize(graph);
        let g = &sanitized.graph;
        assert_eq!(g.nodes.len(), 2);
        assert_eq!(g.node("c1").map(|n| n.name.as_str()), Some("Transformer"));
        assert_eq!(g.edges.len(), 1);
        assert_eq!(g.edges[0].relation, "based on");
        assert_eq!(sanitized.dropped.len(), 1);
        assert_eq!(sanitized.dropped[0].missing_node, "ghost");

        let dups: Vec<(&str, &str)> = sanitized
            .duplicates
            .iter()
            .map(|d| (d.kind(), d.id()))
            .collect();
        assert_eq!(dups, vec![("node", "c1"), ("edge", "e1")]);
        assert_eq!(validate(g), Ok(()));
    }
}
