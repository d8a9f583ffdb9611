//! Manual graph edits.
//!
//! Every record created here carries [`Provenance::Manual`]. Removing a node
//! also removes the edges that touch it. Callers are expected to `touch` and
//! persist the graph afterwards.

use crate::model::{generate_id, Edge, Node, NodeType, Ontology, PropertyValue, Provenance};
use crate::model::{RelationType, Strength};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    #[error("id already in use: {0}")]
    DuplicateId(String),

    #[error("edge endpoint does not exist: {0}")]
    UnknownEndpoint(String),
}

pub type Result<T> = std::result::Result<T, EditError>;

/// Default name for nodes added without one.
pub const DEFAULT_NODE_NAME: &str = "New concept";

/// Default relation for edges added without one.
pub const DEFAULT_RELATION: &str = "related-to";

/// Input for [`Ontology::add_node`].
#[derive(Debug, Clone, Default)]
pub struct NodeDraft {
    pub id: Option<String>,
    pub name: Option<String>,
    pub node_type: Option<NodeType>,
    pub description: Option<String>,
    pub properties: Option<BTreeMap<String, PropertyValue>>,
}

/// Field-wise update for [`Ontology::update_node`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub name: Option<String>,
    pub node_type: Option<NodeType>,
    pub description: Option<String>,
    pub properties: Option<BTreeMap<String, PropertyValue>>,
}

/// Input for [`Ontology::add_edge`].
#[derive(Debug, Clone, Default)]
pub struct EdgeDraft {
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    pub relation: Option<String>,
    pub relation_type: Option<RelationType>,
    pub description: Option<String>,
    pub strength: Option<Strength>,
}

/// Field-wise update for [`Ontology::update_edge`].
#[derive(Debug, Clone, Default)]
pub struct EdgePatch {
    pub source: Option<String>,
    pub target: Option<String>,
    pub relation: Option<String>,
    pub relation_type: Option<RelationType>,
    pub description: Option<String>,
    pub strength: Option<Strength>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl Ontology {
    /// Append a manual node and return its id.
    pub fn add_node(&mut self, draft: NodeDraft) -> Result<String> {
        let id = non_empty(draft.id).unwrap_or_else(|| generate_id("node"));
        if self.node(&id).is_some() {
            return Err(EditError::DuplicateId(id));
        }
        self.nodes.push(Node {
            id: id.clone(),
            name: non_empty(draft.name).unwrap_or_else(|| DEFAULT_NODE_NAME.to_string()),
            node_type: draft.node_type.unwrap_or_default(),
            description: draft.description.unwrap_or_default(),
            properties: draft.properties,
            provenance: Provenance::Manual,
        });
        Ok(id)
    }

    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| EditError::NodeNotFound(id.to_string()))?;
        if let Some(name) = non_empty(patch.name) {
            node.name = name;
        }
        if let Some(node_type) = patch.node_type {
            node.node_type = node_type;
        }
        if let Some(description) = patch.description {
            node.description = description;
        }
        if let Some(properties) = patch.properties {
            node.properties
                .get_or_insert_with(BTreeMap::new)
                .extend(properties);
        }
        node.provenance = Provenance::Manual;
        Ok(())
    }

    /// Remove a node and every edge touching it. Returns the removed edges.
    pub fn remove_node(&mut self, id: &str) -> Result<Vec<Edge>> {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return Err(EditError::NodeNotFound(id.to_string()));
        }
        let (removed, kept): (Vec<Edge>, Vec<Edge>) =
            std::mem::take(&mut self.edges).into_iter().partition(|e| e.touches(id));
        self.edges = kept;
        Ok(removed)
    }

    /// Append a manual edge between existing nodes and return its id.
    pub fn add_edge(&mut self, draft: EdgeDraft) -> Result<String> {
        for endpoint in [&draft.source, &draft.target] {
            if self.node(endpoint).is_none() {
                return Err(EditError::UnknownEndpoint(endpoint.clone()));
            }
        }
        let id = non_empty(draft.id).unwrap_or_else(|| generate_id("edge"));
        if self.edge(&id).is_some() {
            return Err(EditError::DuplicateId(id));
        }
        self.edges.push(Edge {
            id: id.clone(),
            source: draft.source,
            target: draft.target,
            relation: non_empty(draft.relation).unwrap_or_else(|| DEFAULT_RELATION.to_string()),
            relation_type: draft.relation_type,
            description: draft.description.unwrap_or_default(),
            strength: draft.strength,
            provenance: Provenance::Manual,
        });
        Ok(id)
    }

    pub fn update_edge(&mut self, id: &str, patch: EdgePatch) -> Result<()> {
        for endpoint in [&patch.source, &patch.target].into_iter().flatten() {
            if self.node(endpoint).is_none() {
                return Err(EditError::UnknownEndpoint(endpoint.clone()));
            }
        }
        let edge = self
            .edge_mut(id)
            .ok_or_else(|| EditError::EdgeNotFound(id.to_string()))?;
        if let Some(source) = patch.source {
            edge.source = source;
        }
        if let Some(target) = patch.target {
            edge.target = target;
        }
        if let Some(relation) = non_empty(patch.relation) {
            edge.relation = relation;
        }
        if patch.relation_type.is_some() {
            edge.relation_type = patch.relation_type;
        }
        if let Some(description) = patch.description {
            edge.description = description;
        }
        if patch.strength.is_some() {
            edge.strength = patch.strength;
        }
        edge.provenance = Provenance::Manual;
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EditError::EdgeNotFound(id.to_string()))?;
        Ok(self.edges.remove(index))
    }
}
