//! Mermaid flowchart rendering and best-effort parsing.
//!
//! The parser recognises a small line-oriented subset:
//!
//! ```text
//! graph TD
//!     subgraph A [Actors]
//!         A1[State]
//!     end
//!     A1 -- trades with --> B1;
//!     A1 -->|regulates| B2
//!     B1 --> B2
//! ```
//!
//! Anything else on a line is ignored. The parsed graph is not validated here.

use crate::model::{create_empty, Edge, Node, Ontology, OntologyMetadata, PropertyValue};
use crate::model::{Provenance, RelationType, Strength};
use regex::Regex;
use std::collections::{HashMap, HashSet};

#[derive(Debug, thiserror::Error)]
pub enum NotationError {
    #[error("no nodes or edges recognised in notation")]
    Empty,

    #[error("notation pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, NotationError>;

const SUBGRAPH_TYPE: &str = "SYSTEM_MODEL";
const CONCEPT_TYPE: &str = "THEORY_CONCEPT";
const DEFAULT_DOMAIN: &str = "DOM_SOCIETY_TECH";
const DEFAULT_RELATION: &str = "related-to";
const CORE_CONCEPT_COUNT: usize = 5;

// ============================================================================
// Rendering
// ============================================================================

/// Render a graph as a top-down flowchart.
///
/// Nodes flagged `is_subgraph` open a `subgraph` block containing the nodes
/// whose `subgraph` property names them. Nodes pointing at an unknown
/// subgraph are rendered standalone.
pub fn to_mermaid(graph: &Ontology) -> String {
    let subgraphs: Vec<&Node> = graph
        .nodes
        .iter()
        .filter(|n| is_subgraph(n))
        .collect();
    let subgraph_ids: HashSet<&str> = subgraphs.iter().map(|n| n.id.as_str()).collect();

    let mut members: HashMap<&str, Vec<&Node>> = HashMap::new();
    let mut standalone = Vec::new();
    for node in graph.nodes.iter().filter(|n| !is_subgraph(n)) {
        match subgraph_of(node).filter(|id| subgraph_ids.contains(id)) {
            Some(parent) => members.entry(parent).or_default().push(node),
            None => standalone.push(node),
        }
    }

    let mut out = String::from("graph TD\n");
    for subgraph in subgraphs {
        out.push_str(&format!("    subgraph {} [{}]\n", subgraph.id, subgraph.name));
        for node in members.get(subgraph.id.as_str()).into_iter().flatten() {
            out.push_str(&format!("        {}[{}]\n", node.id, node.name));
        }
        out.push_str("    end\n\n");
    }

    for node in &standalone {
        out.push_str(&format!("    {}[{}]\n", node.id, node.name));
    }
    if !standalone.is_empty() {
        out.push('\n');
    }

    for edge in &graph.edges {
        out.push_str(&render_edge(edge));
    }
    out
}

/// Labels containing `-` cannot use the `A -- label --> B` form.
fn render_edge(edge: &Edge) -> String {
    if edge.relation.is_empty() {
        format!("    {} --> {};\n", edge.source, edge.target)
    } else if edge.relation.contains('-') {
        format!("    {} -->|{}| {};\n", edge.source, edge.relation, edge.target)
    } else {
        format!(
            "    {} -- {} --> {};\n",
            edge.source, edge.relation, edge.target
        )
    }
}

fn is_subgraph(node: &Node) -> bool {
    node.property("is_subgraph")
        .and_then(PropertyValue::as_bool)
        .unwrap_or(false)
}

fn subgraph_of(node: &Node) -> Option<&str> {
    node.property("subgraph").and_then(PropertyValue::as_str)
}

// ============================================================================
// Parsing
// ============================================================================

struct Grammar {
    subgraph: Regex,
    node: Regex,
    labeled_edge: Regex,
    piped_edge: Regex,
    bare_edge: Regex,
}

impl Grammar {
    fn new() -> Result<Self> {
        Ok(Self {
            subgraph: Regex::new(r"subgraph\s+(\S+)\s+\[([^\]]+)\]")?,
            node: Regex::new(r#"^([A-Z]\d*)\["?([^\]"]+)"?\]"#)?,
            labeled_edge: Regex::new(r"^([A-Z]\d*)\s+--\s+([^-]+)\s+-->\s+([A-Z]\d*)")?,
            piped_edge: Regex::new(r"^([A-Z]\d*)\s+-->?\|([^|]+)\|\s+([A-Z]\d*)")?,
            bare_edge: Regex::new(r"^([A-Z]\d*)\s+-->\s+([A-Z]\d*)")?,
        })
    }

    /// `(source, relation, target)` for the first edge form that matches.
    fn edge<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str, &'a str)> {
        for re in [&self.labeled_edge, &self.piped_edge] {
            if let Some(c) = re.captures(line) {
                let (source, relation, target) = (c.get(1)?, c.get(2)?, c.get(3)?);
                return Some((source.as_str(), relation.as_str(), target.as_str()));
            }
        }
        let c = self.bare_edge.captures(line)?;
        Some((c.get(1)?.as_str(), DEFAULT_RELATION, c.get(2)?.as_str()))
    }
}

struct OpenSubgraph {
    id: String,
    label: String,
}

/// Parse flowchart text into a fresh version-1 graph.
pub fn parse_mermaid(text: &str) -> Result<Ontology> {
    let grammar = Grammar::new()?;
    let mut graph = create_empty();
    let mut current: Option<OpenSubgraph> = None;

    for raw in text.lines() {
        let trimmed = raw.trim();
        let line = trimmed.strip_suffix(';').unwrap_or(trimmed);

        if let Some(c) = grammar.subgraph.captures(line) {
            let (id, label) = (c[1].to_string(), c[2].to_string());
            if graph.node(&id).is_none() {
                graph.nodes.push(
                    Node::new(id.clone(), label.clone())
                        .with_type(SUBGRAPH_TYPE)
                        .with_description(format!("Subgraph: {}", label))
                        .with_property("entity_type", SUBGRAPH_TYPE)
                        .with_property("domain", DEFAULT_DOMAIN)
                        .with_property("is_subgraph", true),
                );
            }
            current = Some(OpenSubgraph { id, label });
            continue;
        }

        if line == "end" {
            current = None;
            continue;
        }

        if let Some(c) = grammar.node.captures(line) {
            let id = &c[1];
            if graph.node(id).is_none() {
                let description = current
                    .as_ref()
                    .map(|s| format!("Part of: {}", s.label))
                    .unwrap_or_default();
                let parent = current
                    .as_ref()
                    .map(|s| PropertyValue::from(s.id.as_str()))
                    .unwrap_or(PropertyValue::Null);
                graph.nodes.push(
                    Node::new(id, &c[2])
                        .with_type(CONCEPT_TYPE)
                        .with_description(description)
                        .with_property("entity_type", CONCEPT_TYPE)
                        .with_property("domain", DEFAULT_DOMAIN)
                        .with_property("subgraph", parent),
                );
            }
            continue;
        }

        if let Some((source, relation, target)) = grammar.edge(line) {
            let id = format!("edge-{}", graph.edges.len() + 1);
            graph.edges.push(
                Edge::new(id, source.trim(), target.trim(), relation.trim())
                    .with_relation_type(RelationType::Structural)
                    .with_strength(Strength::Medium)
                    .with_provenance(Provenance::Manual),
            );
        }
    }

    if graph.is_empty() {
        return Err(NotationError::Empty);
    }

    graph.metadata = Some(OntologyMetadata {
        core_concepts: graph
            .nodes
            .iter()
            .take(CORE_CONCEPT_COUNT)
            .map(|n| n.name.clone())
            .collect(),
        domains_used: vec![DEFAULT_DOMAIN.to_string()],
        ..Default::default()
    });
    Ok(graph)
}
