//! The external generator seam.
//!
//! The pipeline only sees [`Generator`]: a kind, a payload, and a text reply.
//! [`LLMGenerator`](crate::llm::LLMGenerator) backs it with a chat-completion
//! provider; [`ScriptedGenerator`] replays canned replies for tests and dry
//! runs.

use crate::llm::LLMError;
use async_trait::async_trait;
use ontoread_core::Ontology;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationKind {
    /// Graph from raw text alone.
    Build,
    /// Full replacement graph given the current one.
    Update,
    /// Markdown reply with bracketed concepts.
    Format,
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationKind::Build => f.write_str("build"),
            GenerationKind::Update => f.write_str("update"),
            GenerationKind::Format => f.write_str("format"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPayload {
    pub content: String,
    /// Prior graph for `update`, accepted graph for `format`.
    pub graph: Option<Ontology>,
}

impl GenerationPayload {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            graph: None,
        }
    }

    pub fn with_graph(mut self, graph: Ontology) -> Self {
        self.graph = Some(graph);
        self
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        kind: GenerationKind,
        payload: &GenerationPayload,
    ) -> Result<String, LLMError>;

    /// Credentials and model are present. Checked before any call.
    fn is_configured(&self) -> bool;

    fn describe(&self) -> String;
}

// ============================================================================
// Scripted Generator
// ============================================================================

enum Scripted {
    Reply(String),
    Fail(LLMError),
}

/// Replays queued replies per kind, in order.
///
/// A `format` request with nothing queued echoes the graph's node names in
/// brackets, so tests only need to script the graph replies.
pub struct ScriptedGenerator {
    build: Mutex<VecDeque<Scripted>>,
    update: Mutex<VecDeque<Scripted>>,
    format: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<(GenerationKind, GenerationPayload)>>,
    configured: bool,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            build: Mutex::new(VecDeque::new()),
            update: Mutex::new(VecDeque::new()),
            format: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            configured: true,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    fn queue(&self, kind: GenerationKind) -> &Mutex<VecDeque<Scripted>> {
        match kind {
            GenerationKind::Build => &self.build,
            GenerationKind::Update => &self.update,
            GenerationKind::Format => &self.format,
        }
    }

    pub fn push_reply(&self, kind: GenerationKind, reply: impl Into<String>) -> &Self {
        self.queue(kind).lock().push_back(Scripted::Reply(reply.into()));
        self
    }

    pub fn push_failure(&self, kind: GenerationKind, message: impl Into<String>) -> &Self {
        self.queue(kind)
            .lock()
            .push_back(Scripted::Fail(LLMError::Api(message.into())));
        self
    }

    /// Every request seen so far, oldest first.
    pub fn calls(&self) -> Vec<(GenerationKind, GenerationPayload)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, kind: GenerationKind) -> usize {
        self.calls.lock().iter().filter(|(k, _)| *k == kind).count()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        kind: GenerationKind,
        payload: &GenerationPayload,
    ) -> Result<String, LLMError> {
        self.calls.lock().push((kind, payload.clone()));

        let next = self.queue(kind).lock().pop_front();
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(err)) => Err(err),
            None if kind == GenerationKind::Format => {
                let names: Vec<String> = payload
                    .graph
                    .iter()
                    .flat_map(|g| g.nodes.iter())
                    .map(|n| format!("[{}]", n.name))
                    .collect();
                Ok(format!("## Core concepts\n{}", names.join(", ")))
            }
            None => Err(LLMError::Api(format!("no scripted {} reply", kind))),
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontoread_core::{create_empty, Node};

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let generator = ScriptedGenerator::new();
        generator
            .push_reply(GenerationKind::Build, "first")
            .push_failure(GenerationKind::Build, "boom");

        let payload = GenerationPayload::new("text");
        assert_eq!(
            generator.generate(GenerationKind::Build, &payload).await,
            Ok("first".to_string())
        );
        assert_eq!(
            generator.generate(GenerationKind::Build, &payload).await,
            Err(LLMError::Api("boom".to_string()))
        );
        assert!(generator
            .generate(GenerationKind::Build, &payload)
            .await
            .is_err());
        assert_eq!(generator.call_count(GenerationKind::Build), 3);
    }

    #[tokio::test]
    async fn test_default_format_reply_lists_concepts() {
        let generator = ScriptedGenerator::new();
        let mut graph = create_empty();
        graph.nodes.push(Node::new("c1", "Transformer"));
        graph.nodes.push(Node::new("c2", "Attention"));

        let reply = generator
            .generate(
                GenerationKind::Format,
                &GenerationPayload::new("text").with_graph(graph),
            )
            .await
            .unwrap();
        assert!(reply.contains("[Transformer], [Attention]"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(GenerationKind::Update.to_string(), "update");
        assert!(!ScriptedGenerator::unconfigured().is_configured());
    }
}
