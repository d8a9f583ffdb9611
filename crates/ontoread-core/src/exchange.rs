//! JSON file import/export of the graph record.
//!
//! Export writes exactly the persisted shape; import parses, checks the
//! structure and validates before handing the graph back.

use crate::model::Ontology;
use crate::validate::{validate_value, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Pretty-printed JSON of the graph.
pub fn export_json(graph: &Ontology) -> String {
    // Serializing plain data with string keys cannot fail.
    serde_json::to_string_pretty(graph).unwrap_or_default()
}

/// Parse and validate a graph document.
pub fn import_json(text: &str) -> Result<Ontology, ImportError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    Ok(validate_value(&value)?)
}
