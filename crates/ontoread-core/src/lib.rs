//! Ontoread core: the ontology graph model and the logic around it.
//!
//! An ontology is a small labeled graph of concepts (nodes) and semantic
//! relations (edges), versioned as whole snapshots. This crate owns:
//!
//! - [`model`]: record shapes and lifecycle helpers (`create_empty`, `touch`)
//! - [`validate`]: structural invariants and dangling-edge sanitization
//! - [`diff`]: id-keyed comparison of two snapshots and its text summary
//! - [`edit`]: manual node/edge edits with cascading node removal
//! - [`exchange`]: JSON import/export of the persisted shape
//! - [`notation`]: Mermaid flowchart rendering and best-effort parsing
//!
//! Nothing here performs I/O; persistence lives in `ontoread-storage` and the
//! generation pipeline in `ontoread-llm-sync`.

pub mod diff;
pub mod edit;
pub mod exchange;
pub mod model;
pub mod notation;
pub mod validate;

pub use diff::{
    diff, diff_graphs, edge_changed, has_changes, node_changed, summarize, ChangeSet, Modified,
    OntologyDiff, NO_CHANGES,
};
pub use edit::{EdgeDraft, EdgePatch, EditError, NodeDraft, NodePatch};
pub use exchange::{export_json, import_json, ImportError};
pub use model::{
    create_empty, generate_id, touch, Edge, EdgeId, Node, NodeId, NodeType, Ontology,
    OntologyMetadata, OntologyStats, PropertyValue, Provenance, RelationType, Strength,
};
pub use notation::{parse_mermaid, to_mermaid, NotationError};
pub use validate::{
    decode_graph, sanitize, validate, validate_value, DroppedEdge, DuplicateRecord, Sanitized,
    ValidationError,
};
