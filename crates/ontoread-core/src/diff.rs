//! Snapshot comparison.
//!
//! Entities are matched by id. Nodes compare on name, type and description;
//! edges on source, target, relation and description. Node and edge
//! comparisons are independent: an edge whose endpoint node disappeared is
//! reported as a removed edge on its own, and nothing cascades here.

use crate::model::{Edge, Node, Ontology};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Both sides of an entity that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modified<T> {
    pub old: T,
    pub new: T,
}

/// Classified difference between two snapshots. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyDiff {
    pub added_nodes: Vec<Node>,
    pub removed_nodes: Vec<Node>,
    pub modified_nodes: Vec<Modified<Node>>,
    pub added_edges: Vec<Edge>,
    pub removed_edges: Vec<Edge>,
    pub modified_edges: Vec<Modified<Edge>>,
}

/// Sentinel returned by [`summarize`] when nothing changed.
pub const NO_CHANGES: &str = "No changes";

/// Compare two snapshots.
///
/// A missing side is treated as an empty graph, so every entry of the other
/// side becomes an addition (or a removal).
pub fn diff(old: Option<&Ontology>, new: Option<&Ontology>) -> OntologyDiff {
    let empty_nodes: &[Node] = &[];
    let empty_edges: &[Edge] = &[];

    let (old_nodes, old_edges) = old
        .map(|g| (g.nodes.as_slice(), g.edges.as_slice()))
        .unwrap_or((empty_nodes, empty_edges));
    let (new_nodes, new_edges) = new
        .map(|g| (g.nodes.as_slice(), g.edges.as_slice()))
        .unwrap_or((empty_nodes, empty_edges));

    let (added_nodes, removed_nodes, modified_nodes) =
        compare(old_nodes, new_nodes, |n| &n.id, node_changed);
    let (added_edges, removed_edges, modified_edges) =
        compare(old_edges, new_edges, |e| &e.id, edge_changed);

    OntologyDiff {
        added_nodes,
        removed_nodes,
        modified_nodes,
        added_edges,
        removed_edges,
        modified_edges,
    }
}

/// Convenience for the common two-snapshot case.
pub fn diff_graphs(old: &Ontology, new: &Ontology) -> OntologyDiff {
    diff(Some(old), Some(new))
}

type Classified<T> = (Vec<T>, Vec<T>, Vec<Modified<T>>);

fn compare<T, K, C>(old: &[T], new: &[T], key: K, changed: C) -> Classified<T>
where
    T: Clone,
    K: Fn(&T) -> &String,
    C: Fn(&T, &T) -> bool,
{
    let old_by_id: HashMap<&String, &T> = old.iter().map(|x| (key(x), x)).collect();
    let new_by_id: HashMap<&String, &T> = new.iter().map(|x| (key(x), x)).collect();

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for item in new {
        match old_by_id.get(key(item)) {
            None => added.push(item.clone()),
            Some(previous) if changed(*previous, item) => modified.push(Modified {
                old: (*previous).clone(),
                new: item.clone(),
            }),
            Some(_) => {}
        }
    }

    let removed = old
        .iter()
        .filter(|item| !new_by_id.contains_key(key(*item)))
        .cloned()
        .collect();

    (added, removed, modified)
}

/// Node fields the diff compares differ.
pub fn node_changed(old: &Node, new: &Node) -> bool {
    old.name != new.name || old.node_type != new.node_type || old.description != new.description
}

pub fn edge_changed(old: &Edge, new: &Edge) -> bool {
    old.source != new.source
        || old.target != new.target
        || old.relation != new.relation
        || old.description != new.description
}

impl OntologyDiff {
    pub fn has_changes(&self) -> bool {
        !(self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
            && self.modified_edges.is_empty())
    }

    pub fn summarize(&self) -> String {
        summarize(self)
    }

    /// Id-only view for audit records.
    pub fn change_set(&self) -> ChangeSet {
        ChangeSet::from(self)
    }
}

/// True iff any category is non-empty.
pub fn has_changes(diff: &OntologyDiff) -> bool {
    diff.has_changes()
}

/// Render the diff as a bullet list: nodes (added, modified, removed) first,
/// then edges in the same order. Empty categories are skipped.
pub fn summarize(diff: &OntologyDiff) -> String {
    let mut lines = Vec::new();

    if !diff.added_nodes.is_empty() {
        lines.push(format!("- Added nodes: {}", node_names(diff.added_nodes.iter())));
    }
    if !diff.modified_nodes.is_empty() {
        lines.push(format!(
            "- Modified nodes: {}",
            node_names(diff.modified_nodes.iter().map(|m| &m.new))
        ));
    }
    if !diff.removed_nodes.is_empty() {
        lines.push(format!(
            "- Removed nodes: {}",
            node_names(diff.removed_nodes.iter())
        ));
    }
    if !diff.added_edges.is_empty() {
        lines.push(format!(
            "- Added edges ({}): {}",
            diff.added_edges.len(),
            edge_labels(diff.added_edges.iter())
        ));
    }
    if !diff.modified_edges.is_empty() {
        lines.push(format!(
            "- Modified edges ({}): {}",
            diff.modified_edges.len(),
            edge_labels(diff.modified_edges.iter().map(|m| &m.new))
        ));
    }
    if !diff.removed_edges.is_empty() {
        lines.push(format!(
            "- Removed edges ({}): {}",
            diff.removed_edges.len(),
            edge_labels(diff.removed_edges.iter())
        ));
    }

    if lines.is_empty() {
        NO_CHANGES.to_string()
    } else {
        lines.join("\n")
    }
}

fn node_names<'a>(nodes: impl Iterator<Item = &'a Node>) -> String {
    nodes.map(|n| n.name.as_str()).collect::<Vec<_>>().join(", ")
}

fn edge_labels<'a>(edges: impl Iterator<Item = &'a Edge>) -> String {
    edges
        .map(|e| format!("{} -[{}]-> {}", e.source, e.relation, e.target))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ids touched by a merge, stored on history items.
///
/// Also the shape of the `changes` object some generator replies carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub added_nodes: Vec<String>,
    #[serde(default)]
    pub removed_nodes: Vec<String>,
    #[serde(default)]
    pub modified_nodes: Vec<String>,
    #[serde(default)]
    pub added_edges: Vec<String>,
    #[serde(default)]
    pub removed_edges: Vec<String>,
    #[serde(default)]
    pub modified_edges: Vec<String>,
    /// Rendered [`summarize`] output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ChangeSet {
    /// Compare id lists, ignoring order and the rendered summary.
    pub fn same_ids(&self, other: &ChangeSet) -> bool {
        fn sorted(v: &[String]) -> Vec<&String> {
            let mut v: Vec<&String> = v.iter().collect();
            v.sort();
            v
        }
        sorted(&self.added_nodes) == sorted(&other.added_nodes)
            && sorted(&self.removed_nodes) == sorted(&other.removed_nodes)
            && sorted(&self.modified_nodes) == sorted(&other.modified_nodes)
            && sorted(&self.added_edges) == sorted(&other.added_edges)
            && sorted(&self.removed_edges) == sorted(&other.removed_edges)
            && sorted(&self.modified_edges) == sorted(&other.modified_edges)
    }
}

impl From<&OntologyDiff> for ChangeSet {
    fn from(diff: &OntologyDiff) -> Self {
        fn ids<T>(items: &[T], id: impl Fn(&T) -> &String) -> Vec<String> {
            items.iter().map(|x| id(x).clone()).collect()
        }
        ChangeSet {
            added_nodes: ids(&diff.added_nodes, |n| &n.id),
            removed_nodes: ids(&diff.removed_nodes, |n| &n.id),
            modified_nodes: ids(&diff.modified_nodes, |m| &m.new.id),
            added_edges: ids(&diff.added_edges, |e| &e.id),
            removed_edges: ids(&diff.removed_edges, |e| &e.id),
            modified_edges: ids(&diff.modified_edges, |m| &m.new.id),
            summary: Some(summarize(diff)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{create_empty, Provenance};

    fn base() -> Ontology {
        let mut g = create_empty();
        g.nodes.push(Node::new("c1", "Transformer").with_type("architecture"));
        g.nodes.push(Node::new("c2", "Attention").with_type("mechanism"));
        g.edges.push(Edge::new("e1", "c1", "c2", "contains"));
        g
    }

    #[test]
    fn test_identical_graphs_have_no_changes() {
        let g = base();
        let d = diff_graphs(&g, &g);
        assert!(!d.has_changes());
        assert_eq!(summarize(&d), NO_CHANGES);
    }

    #[test]
    fn test_modification_detected_per_field() {
        let old = base();
        let mut new = base();
        new.nodes[0].description = "Neural architecture".to_string();
        new.edges[0].relation = "includes".to_string();

        let d = diff_graphs(&old, &new);
        assert_eq!(d.modified_nodes.len(), 1);
        assert_eq!(d.modified_nodes[0].old.description, "");
        assert_eq!(d.modified_nodes[0].new.description, "Neural architecture");
        assert_eq!(d.modified_edges.len(), 1);
        assert!(d.added_nodes.is_empty() && d.removed_nodes.is_empty());
    }

    #[test]
    fn test_provenance_and_properties_do_not_count() {
        let old = base();
        let mut new = base();
        new.nodes[1].provenance = Provenance::Auto;
        new.nodes[1] = new.nodes[1].clone().with_property("layer", 2i64);
        new.edges[0].provenance = Provenance::Auto;
        assert!(!diff_graphs(&old, &new).has_changes());
    }

    #[test]
    fn test_removed_node_edges_reported_independently() {
        let old = base();
        let mut new = base();
        new.nodes.retain(|n| n.id != "c2");
        new.edges.clear();

        let d = diff_graphs(&old, &new);
        assert_eq!(d.removed_nodes.len(), 1);
        assert_eq!(d.removed_edges.len(), 1);
        assert_eq!(d.removed_edges[0].id, "e1");
    }

    #[test]
    fn test_missing_side_degrades_to_wholesale() {
        let g = base();
        let d = diff(None, Some(&g));
        assert_eq!(d.added_nodes.len(), 2);
        assert_eq!(d.added_edges.len(), 1);
        assert!(d.removed_nodes.is_empty());

        let d = diff(Some(&g), None);
        assert_eq!(d.removed_nodes.len(), 2);
        assert_eq!(d.removed_edges.len(), 1);
        assert!(d.added_nodes.is_empty());

        assert!(!diff(None, None).has_changes());
    }

    #[test]
    fn test_summary_order() {
        let old = base();
        let mut new = base();
        new.nodes.push(Node::new("c3", "BERT"));
        new.nodes[0].name = "Transformer v2".to_string();
        new.nodes.retain(|n| n.id != "c2");
        new.edges.clear();
        new.edges.push(Edge::new("e2", "c3", "c1", "based on"));

        let summary = summarize(&diff_graphs(&old, &new));
        assert_eq!(
            summary,
            "- Added nodes: BERT\n\
             - Modified nodes: Transformer v2\n\
             - Removed nodes: Attention\n\
             - Added edges (1): c3 -[based on]-> c1\n\
             - Removed edges (1): c1 -[contains]-> c2"
        );
    }

    #[test]
    fn test_change_set_ids() {
        let old = base();
        let mut new = base();
        new.nodes.push(Node::new("c3", "BERT"));
        let set = ChangeSet::from(&diff_graphs(&old, &new));
        assert_eq!(set.added_nodes, vec!["c3".to_string()]);
        assert!(set.removed_edges.is_empty());
        assert_eq!(set.summary.as_deref(), Some("- Added nodes: BERT"));

        let reported = ChangeSet {
            added_nodes: vec!["c3".to_string()],
            ..Default::default()
        };
        assert!(set.same_ids(&reported));
    }
}
