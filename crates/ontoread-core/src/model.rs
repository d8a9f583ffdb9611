//! Ontology record shapes: nodes, edges and the versioned graph snapshot.
//!
//! Records are deserialized leniently at the boundary (generator replies and
//! imported files are loosely typed JSON) and then checked by
//! [`crate::validate`]. Required identity fields default to empty strings when
//! missing so the validator can name them instead of failing inside serde.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// Identifier of a node within one ontology.
pub type NodeId = String;

/// Identifier of an edge within one ontology.
pub type EdgeId = String;

// ============================================================================
// Enumerations
// ============================================================================

/// Kind of concept a node represents.
///
/// The known kinds come from the generator prompt; anything else is kept
/// verbatim as [`NodeType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Architecture,
    Mechanism,
    Model,
    Component,
    #[default]
    Concept,
    Other(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Architecture => "architecture",
            NodeType::Mechanism => "mechanism",
            NodeType::Model => "model",
            NodeType::Component => "component",
            NodeType::Concept => "concept",
            NodeType::Other(s) => s,
        }
    }
}

impl From<String> for NodeType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "architecture" => NodeType::Architecture,
            "mechanism" => NodeType::Mechanism,
            "model" => NodeType::Model,
            "component" => NodeType::Component,
            "concept" => NodeType::Concept,
            _ => NodeType::Other(s),
        }
    }
}

impl From<&str> for NodeType {
    fn from(s: &str) -> Self {
        NodeType::from(s.to_string())
    }
}

impl From<NodeType> for String {
    fn from(t: NodeType) -> Self {
        match t {
            NodeType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category of an edge's relation label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Structural,
    Behavioral,
    Temporal,
    Logical,
}

/// How strongly an edge binds its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

/// Whether a record was entered by hand or produced by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Manual,
    Auto,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Manual => f.write_str("manual"),
            Provenance::Auto => f.write_str("auto"),
        }
    }
}

/// Scalar stored in a node's open `properties` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    Text(String),
    Null,
    /// Arrays and objects, kept as-is.
    Json(serde_json::Value),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Integer(n)
    }
}

impl From<u64> for PropertyValue {
    fn from(n: u64) -> Self {
        i64::try_from(n)
            .map(PropertyValue::Integer)
            .unwrap_or(PropertyValue::Unsigned(n))
    }
}

// ============================================================================
// Records
// ============================================================================

/// A labeled concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: NodeId,
    #[serde(default, deserialize_with = "loose_string")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: String,
    /// Domain tags, layer number, subgraph membership and similar extras.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, PropertyValue>>,
    #[serde(default, alias = "source", deserialize_with = "lenient_or_default")]
    pub provenance: Provenance,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: NodeType::default(),
            description: String::new(),
            properties: None,
            provenance: Provenance::default(),
        }
    }

    pub fn with_type(mut self, node_type: impl Into<NodeType>) -> Self {
        self.node_type = node_type.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Look up a single property.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.as_ref().and_then(|p| p.get(key))
    }
}

/// A labeled directed relation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: EdgeId,
    #[serde(default, deserialize_with = "loose_string")]
    pub source: NodeId,
    #[serde(default, deserialize_with = "loose_string")]
    pub target: NodeId,
    /// Free-text semantic label ("contains", "based on", ...).
    #[serde(default, deserialize_with = "loose_string")]
    pub relation: String,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub relation_type: Option<RelationType>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub strength: Option<Strength>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub provenance: Provenance,
}

impl Edge {
    pub fn new(
        id: impl Into<EdgeId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            relation_type: None,
            description: String::new(),
            strength: None,
            provenance: Provenance::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_relation_type(mut self, relation_type: RelationType) -> Self {
        self.relation_type = Some(relation_type);
        self
    }

    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// True when either endpoint is `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Optional descriptive block attached to a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntologyMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub core_concepts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_domain_links: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains_used: Vec<String>,
}

/// One snapshot of the knowledge graph.
///
/// Node and edge order carries no meaning; it is preserved only so exports
/// stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ontology {
    #[serde(default = "first_version")]
    pub version: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<OntologyMetadata>,
}

fn first_version() -> u64 {
    1
}

impl Default for Ontology {
    fn default() -> Self {
        create_empty()
    }
}

impl Ontology {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// No nodes and no edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn stats(&self) -> OntologyStats {
        let mut stats = OntologyStats {
            version: self.version,
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            ..Default::default()
        };
        for node in &self.nodes {
            *stats
                .nodes_by_type
                .entry(node.node_type.as_str().to_string())
                .or_insert(0) += 1;
            match node.provenance {
                Provenance::Manual => stats.manual_nodes += 1,
                Provenance::Auto => stats.auto_nodes += 1,
            }
        }
        stats
    }
}

/// Counts shown in listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OntologyStats {
    pub version: u64,
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub manual_nodes: usize,
    pub auto_nodes: usize,
}

impl fmt::Display for OntologyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}: {} nodes ({} manual, {} auto), {} edges",
            self.version, self.nodes, self.manual_nodes, self.auto_nodes, self.edges
        )
    }
}

// ============================================================================
// Lifecycle helpers
// ============================================================================

/// A fresh graph: version 1, no records, both timestamps now.
pub fn create_empty() -> Ontology {
    let now = Utc::now();
    Ontology {
        version: 1,
        created_at: now,
        updated_at: now,
        nodes: Vec::new(),
        edges: Vec::new(),
        metadata: None,
    }
}

/// Copy of `graph` with `updated_at` refreshed and nothing else changed.
pub fn touch(graph: &Ontology) -> Ontology {
    Ontology {
        updated_at: Utc::now(),
        ..graph.clone()
    }
}

/// Generate a local id such as `node-3f2a9c01b7de`.
pub fn generate_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &uuid[..12])
}

// ============================================================================
// Lenient field decoding
// ============================================================================

/// Accept strings, numbers, booleans and null for text fields.
fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!(
            "expected a string, found {}",
            other
        ))),
    }
}

/// Values outside the enum become `None` instead of failing the record.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_empty() {
        let graph = create_empty();
        assert_eq!(graph.version, 1);
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert_eq!(graph.created_at, graph.updated_at);
    }

    #[test]
    fn test_touch_only_changes_updated_at() {
        let mut graph = create_empty();
        graph.nodes.push(Node::new("a", "A"));
        graph.updated_at = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let touched = touch(&graph);
        assert!(touched.updated_at > graph.updated_at);
        assert_eq!(touched.nodes, graph.nodes);
        assert_eq!(touched.version, graph.version);
        assert_eq!(touched.created_at, graph.created_at);
    }

    #[test]
    fn test_node_type_open_set() {
        let node: Node = serde_json::from_value(json!({
            "id": "s1", "name": "Layer", "type": "SYSTEM_MODEL"
        }))
        .unwrap();
        assert_eq!(node.node_type, NodeType::Other("SYSTEM_MODEL".to_string()));
        assert_eq!(serde_json::to_value(&node).unwrap()["type"], "SYSTEM_MODEL");

        let node: Node =
            serde_json::from_value(json!({"id": "m", "name": "M", "type": "model"})).unwrap();
        assert_eq!(node.node_type, NodeType::Model);
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let node: Node = serde_json::from_value(json!({"name": "Nameless"})).unwrap();
        assert_eq!(node.id, "");
        assert_eq!(node.node_type, NodeType::Concept);
        assert_eq!(node.provenance, Provenance::Manual);
    }

    #[test]
    fn test_lenient_edge_fields() {
        let edge: Edge = serde_json::from_value(json!({
            "id": 7,
            "source": "a",
            "target": "b",
            "relation": "causes",
            "relation_type": "causal",
            "strength": "strong",
            "provenance": "robot"
        }))
        .unwrap();
        assert_eq!(edge.id, "7");
        assert_eq!(edge.relation_type, None);
        assert_eq!(edge.strength, Some(Strength::Strong));
        assert_eq!(edge.provenance, Provenance::Manual);
    }

    #[test]
    fn test_node_accepts_legacy_source_key() {
        let node: Node =
            serde_json::from_value(json!({"id": "a", "name": "A", "source": "auto"})).unwrap();
        assert_eq!(node.provenance, Provenance::Auto);
    }

    #[test]
    fn test_property_values() {
        let node: Node = serde_json::from_value(json!({
            "id": "a",
            "name": "A",
            "properties": {"layer": 2, "is_subgraph": true, "domain": "econ", "subgraph": null}
        }))
        .unwrap();
        assert_eq!(node.property("layer"), Some(&PropertyValue::Integer(2)));
        assert_eq!(node.property("is_subgraph").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(node.property("domain").and_then(|v| v.as_str()), Some("econ"));
        assert_eq!(node.property("subgraph"), Some(&PropertyValue::Null));
    }

    #[test]
    fn test_large_integer_property_is_exact() {
        let node: Node = serde_json::from_value(json!({
            "id": "a",
            "name": "A",
            "properties": {"max": u64::MAX, "min": i64::MIN, "ratio": 0.25}
        }))
        .unwrap();
        assert_eq!(node.property("max"), Some(&PropertyValue::Unsigned(u64::MAX)));
        assert_eq!(node.property("min"), Some(&PropertyValue::Integer(i64::MIN)));
        assert_eq!(node.property("ratio"), Some(&PropertyValue::Float(0.25)));

        let text = serde_json::to_string(&node).unwrap();
        assert!(text.contains("18446744073709551615"));
        let back: Node = serde_json::from_str(&text).unwrap();
        assert_eq!(back, node);

        assert_eq!(PropertyValue::from(7u64), PropertyValue::Integer(7));
        assert_eq!(PropertyValue::from(u64::MAX), PropertyValue::Unsigned(u64::MAX));
    }

    #[test]
    fn test_generate_id_prefix() {
        let a = generate_id("edge");
        let b = generate_id("edge");
        assert!(a.starts_with("edge-"));
        assert_eq!(a.len(), "edge-".len() + 12);
        assert_ne!(a, b);
    }

    #[test]
    fn test_stats() {
        let mut graph = create_empty();
        graph.nodes.push(Node::new("a", "A").with_type("model"));
        graph
            .nodes
            .push(Node::new("b", "B").with_provenance(Provenance::Auto));
        graph.edges.push(Edge::new("e", "a", "b", "uses"));
        let stats = graph.stats();
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.auto_nodes, 1);
        assert_eq!(stats.nodes_by_type.get("model"), Some(&1));
        assert_eq!(stats.to_string(), "v1: 2 nodes (1 manual, 1 auto), 1 edges");
    }
}
