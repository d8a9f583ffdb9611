//! Locating and decoding the JSON document inside a generator reply.
//!
//! Replies arrive fenced (```json ... ``` or bare ```), embedded in prose, or
//! clean. Graphs come either flat (`{nodes, edges, changes?}`) or wrapped
//! (`{ontology: {nodes, edges}, changes?}`).

use ontoread_core::ChangeSet;
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationParseError {
    #[error("generator returned an empty reply")]
    Empty,
    #[error("reply is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("reply JSON is not an object")]
    NotAnObject,
    #[error("reply pattern failed to compile: {0}")]
    Pattern(String),
}

/// Candidate graph payload and the generator's own change list, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphReply {
    /// Untyped graph, checked by the pipeline's validation stage.
    pub graph: Value,
    pub changes: Option<ChangeSet>,
}

/// The JSON text inside `reply`.
///
/// Prefers the first fenced block, then the outermost `{...}` span, then the
/// trimmed reply as-is.
pub fn extract_json(reply: &str) -> Result<String, GenerationParseError> {
    let fence = Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```")
        .map_err(|e| GenerationParseError::Pattern(e.to_string()))?;

    if let Some(block) = fence.captures(reply).and_then(|c| c.get(1)) {
        let inner = block.as_str().trim();
        if !inner.is_empty() {
            return Ok(inner.to_string());
        }
    }

    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(reply[start..=end].to_string()),
        _ => Ok(reply.trim().to_string()),
    }
}

pub fn parse_graph_reply(reply: &str) -> Result<GraphReply, GenerationParseError> {
    if reply.trim().is_empty() {
        return Err(GenerationParseError::Empty);
    }

    let text = extract_json(reply)?;
    let mut value: Value =
        serde_json::from_str(&text).map_err(|e| GenerationParseError::InvalidJson(e.to_string()))?;
    let object = value
        .as_object_mut()
        .ok_or(GenerationParseError::NotAnObject)?;

    let changes = object.remove("changes").and_then(parse_changes);
    let graph = match object.remove("ontology") {
        Some(inner @ Value::Object(_)) => inner,
        Some(other) => {
            object.insert("ontology".to_string(), other);
            value
        }
        None => value,
    };

    Ok(GraphReply { graph, changes })
}

/// Lenient: a `changes` object that does not fit is ignored, not an error.
fn parse_changes(value: Value) -> Option<ChangeSet> {
    match serde_json::from_value::<ChangeSet>(value) {
        Ok(changes) => Some(changes),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring unreadable changes object");
            None
        }
    }
}
