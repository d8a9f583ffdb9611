//! Merge/update pipeline
//!
//! One submission runs through a fixed sequence of stages:
//!
//! ```text
//!   Idle → GeneratingCandidate → Sanitizing → Validating
//!        → Diffing (update only) → Formatting → Persisting → Idle
//! ```
//!
//! Any stage may fail. A failure moves to `Failed`, emits
//! [`PipelineEvent::Failed`] and returns to `Idle`; the stored graph is left
//! exactly as it was. The pipeline never retries on its own.

use crate::generator::{GenerationKind, GenerationPayload, Generator};
use crate::llm::LLMError;
use crate::reply::{parse_graph_reply, GenerationParseError};
use chrono::Utc;
use ontoread_core::{
    decode_graph, diff_graphs, edge_changed, node_changed, sanitize, validate, ChangeSet,
    DroppedEdge, DuplicateRecord, Ontology, OntologyDiff, Provenance, Sanitized, ValidationError,
    NO_CHANGES,
};
use ontoread_storage::{HistoryItem, HistoryKind, OntologyStore};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// States, Events, Errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    GeneratingCandidate,
    Sanitizing,
    Validating,
    Diffing,
    Formatting,
    Persisting,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::GeneratingCandidate => "generating",
            PipelineStage::Sanitizing => "sanitizing",
            PipelineStage::Validating => "validating",
            PipelineStage::Diffing => "diffing",
            PipelineStage::Formatting => "formatting",
            PipelineStage::Persisting => "persisting",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StageEntered {
        stage: PipelineStage,
    },
    /// Candidate edges removed for pointing at unknown nodes.
    EdgesDropped {
        dropped: Vec<DroppedEdge>,
    },
    /// Candidate records removed for repeating an earlier id.
    DuplicatesDropped {
        duplicates: Vec<DuplicateRecord>,
    },
    Committed {
        kind: HistoryKind,
        version: u64,
        history_id: String,
    },
    Failed {
        stage: PipelineStage,
        error: String,
    },
}

pub type PipelineEventHandler = Box<dyn Fn(PipelineEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("input text is empty")]
    EmptyInput,

    #[error("generator is not configured: set a model name, and an API token for hosted providers")]
    NotConfigured,

    #[error("generation failed: {0}")]
    GenerationFailed(#[from] LLMError),

    #[error("could not parse generator reply: {0}")]
    GenerationParse(#[from] GenerationParseError),

    #[error("candidate graph rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to write {0} to the store")]
    PersistenceWrite(&'static str),
}

// ============================================================================
// Results
// ============================================================================

/// A committed submission.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub kind: HistoryKind,
    pub ontology: Ontology,
    /// Diff against the prior graph. `None` for builds.
    pub diff: Option<OntologyDiff>,
    /// Id view of `diff`, as stored on the history item.
    pub changes: Option<ChangeSet>,
    /// Formatted reply.
    pub output: String,
    pub dropped: Vec<DroppedEdge>,
    pub duplicates: Vec<DuplicateRecord>,
    pub history_id: String,
}

impl MergeOutcome {
    pub fn summary(&self) -> String {
        self.diff
            .as_ref()
            .map(OntologyDiff::summarize)
            .unwrap_or_else(|| NO_CHANGES.to_string())
    }
}

/// A stamped build candidate that was not saved.
#[derive(Debug, Clone)]
pub struct Preview {
    pub ontology: Ontology,
    pub dropped: Vec<DroppedEdge>,
    pub duplicates: Vec<DuplicateRecord>,
}

struct Candidate {
    graph: Ontology,
    claimed_changes: Option<ChangeSet>,
    dropped: Vec<DroppedEdge>,
    duplicates: Vec<DuplicateRecord>,
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    generator: Arc<dyn Generator>,
    store: Arc<OntologyStore>,
    stage: PipelineStage,
    event_handlers: Vec<PipelineEventHandler>,
}

impl Pipeline {
    pub fn new(generator: Arc<dyn Generator>, store: Arc<OntologyStore>) -> Self {
        Self {
            generator,
            store,
            stage: PipelineStage::Idle,
            event_handlers: Vec::new(),
        }
    }

    pub fn on_event(&mut self, handler: PipelineEventHandler) {
        self.event_handlers.push(handler);
    }

    fn emit(&self, event: PipelineEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn store(&self) -> &OntologyStore {
        &self.store
    }

    fn enter(&mut self, stage: PipelineStage) {
        tracing::debug!(%stage, "pipeline stage");
        self.stage = stage;
        self.emit(PipelineEvent::StageEntered { stage });
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Build when nothing usable is stored, update otherwise.
    pub async fn submit(&mut self, raw_text: &str) -> Result<MergeOutcome, PipelineError> {
        match self.store.get_graph() {
            Some(current) if !current.nodes.is_empty() => {
                self.merge_update(raw_text, &current).await
            }
            _ => self.build_from_scratch(raw_text).await,
        }
    }

    /// Generate a fresh graph (version 1) from `raw_text` and persist it.
    pub async fn build_from_scratch(
        &mut self,
        raw_text: &str,
    ) -> Result<MergeOutcome, PipelineError> {
        let result = self.run_build(raw_text).await;
        self.finish(result)
    }

    /// Merge `raw_text` into `current` and persist the next version.
    pub async fn merge_update(
        &mut self,
        raw_text: &str,
        current: &Ontology,
    ) -> Result<MergeOutcome, PipelineError> {
        let result = self.run_update(raw_text, current).await;
        self.finish(result)
    }

    /// Generate, sanitize, validate and stamp a build without saving.
    pub async fn preview_build(&mut self, raw_text: &str) -> Result<Preview, PipelineError> {
        let result = self.run_preview(raw_text).await;
        self.finish(result)
    }

    // ========================================================================
    // Stage Sequences
    // ========================================================================

    async fn run_build(&mut self, raw_text: &str) -> Result<MergeOutcome, PipelineError> {
        self.check_ready(raw_text)?;
        let candidate = self
            .candidate(GenerationKind::Build, GenerationPayload::new(raw_text))
            .await?;
        let ontology = stamp_build(candidate.graph);

        let output = self.format(raw_text, &ontology).await?;
        let item = HistoryItem::new(HistoryKind::Build, raw_text, &output, ontology.version);
        let history_id = self.persist(&ontology, item)?;

        Ok(MergeOutcome {
            kind: HistoryKind::Build,
            ontology,
            diff: None,
            changes: None,
            output,
            dropped: candidate.dropped,
            duplicates: candidate.duplicates,
            history_id,
        })
    }

    async fn run_update(
        &mut self,
        raw_text: &str,
        current: &Ontology,
    ) -> Result<MergeOutcome, PipelineError> {
        self.check_ready(raw_text)?;
        let payload = GenerationPayload::new(raw_text).with_graph(current.clone());
        let candidate = self.candidate(GenerationKind::Update, payload).await?;
        let ontology = stamp_update(candidate.graph, current);

        self.enter(PipelineStage::Diffing);
        let diff = diff_graphs(current, &ontology);
        let changes = diff.change_set();
        if let Some(claimed) = &candidate.claimed_changes {
            if !claimed.same_ids(&changes) {
                tracing::debug!(
                    claimed = ?claimed,
                    computed = ?changes,
                    "generator change list disagrees with computed diff"
                );
            }
        }

        let output = self.format(raw_text, &ontology).await?;
        let item = HistoryItem::new(HistoryKind::Update, raw_text, &output, ontology.version)
            .with_changes(changes.clone());
        let history_id = self.persist(&ontology, item)?;

        Ok(MergeOutcome {
            kind: HistoryKind::Update,
            ontology,
            diff: Some(diff),
            changes: Some(changes),
            output,
            dropped: candidate.dropped,
            duplicates: candidate.duplicates,
            history_id,
        })
    }

    async fn run_preview(&mut self, raw_text: &str) -> Result<Preview, PipelineError> {
        self.check_ready(raw_text)?;
        let candidate = self
            .candidate(GenerationKind::Build, GenerationPayload::new(raw_text))
            .await?;
        Ok(Preview {
            ontology: stamp_build(candidate.graph),
            dropped: candidate.dropped,
            duplicates: candidate.duplicates,
        })
    }

    fn finish<T>(&mut self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        if let Err(err) = &result {
            let stage = self.stage;
            tracing::warn!(%stage, error = %err, "pipeline failed; stored graph unchanged");
            self.enter(PipelineStage::Failed);
            self.emit(PipelineEvent::Failed {
                stage,
                error: err.to_string(),
            });
        }
        self.enter(PipelineStage::Idle);
        result
    }

    // ========================================================================
    // Stages
    // ========================================================================

    fn check_ready(&self, raw_text: &str) -> Result<(), PipelineError> {
        if raw_text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if !self.generator.is_configured() {
            return Err(PipelineError::NotConfigured);
        }
        Ok(())
    }

    async fn candidate(
        &mut self,
        kind: GenerationKind,
        payload: GenerationPayload,
    ) -> Result<Candidate, PipelineError> {
        self.enter(PipelineStage::GeneratingCandidate);
        let generator = Arc::clone(&self.generator);
        tracing::info!(%kind, generator = %generator.describe(), "requesting candidate graph");
        let reply = generator.generate(kind, &payload).await?;
        let parsed = parse_graph_reply(&reply)?;

        self.enter(PipelineStage::Sanitizing);
        let decoded = decode_graph(&parsed.graph)?;
        let Sanitized {
            graph,
            dropped,
            duplicates,
        } = sanitize(decoded);
        if !duplicates.is_empty() {
            self.emit(PipelineEvent::DuplicatesDropped {
                duplicates: duplicates.clone(),
            });
        }
        if !dropped.is_empty() {
            self.emit(PipelineEvent::EdgesDropped {
                dropped: dropped.clone(),
            });
        }

        self.enter(PipelineStage::Validating);
        validate(&graph)?;

        Ok(Candidate {
            graph,
            claimed_changes: parsed.changes,
            dropped,
            duplicates,
        })
    }

    async fn format(&mut self, raw_text: &str, ontology: &Ontology) -> Result<String, PipelineError> {
        self.enter(PipelineStage::Formatting);
        let payload = GenerationPayload::new(raw_text).with_graph(ontology.clone());
        let generator = Arc::clone(&self.generator);
        Ok(generator.generate(GenerationKind::Format, &payload).await?)
    }

    /// Save the graph, then the history item. A failed history write puts
    /// the prior graph back.
    fn persist(&mut self, ontology: &Ontology, item: HistoryItem) -> Result<String, PipelineError> {
        self.enter(PipelineStage::Persisting);
        let prior = self.store.get_graph();

        if !self.store.save_graph(ontology) {
            return Err(PipelineError::PersistenceWrite("graph"));
        }

        let history_id = item.id.clone();
        let kind = item.kind;
        if !self.store.append_history(item) {
            let restored = match &prior {
                Some(graph) => self.store.save_graph(graph),
                None => self.store.clear_graph(),
            };
            if !restored {
                tracing::warn!("could not restore prior graph after history write failure");
            }
            return Err(PipelineError::PersistenceWrite("history"));
        }

        tracing::info!(
            %kind,
            version = ontology.version,
            nodes = ontology.nodes.len(),
            edges = ontology.edges.len(),
            "ontology committed"
        );
        self.emit(PipelineEvent::Committed {
            kind,
            version: ontology.version,
            history_id: history_id.clone(),
        });
        Ok(history_id)
    }
}

// ============================================================================
// Stamping
// ============================================================================

/// Version 1, fresh timestamps, every record generated.
pub fn stamp_build(mut graph: Ontology) -> Ontology {
    let now = Utc::now();
    graph.version = 1;
    graph.created_at = now;
    graph.updated_at = now;
    for node in &mut graph.nodes {
        node.provenance = Provenance::Auto;
    }
    for edge in &mut graph.edges {
        edge.provenance = Provenance::Auto;
    }
    graph
}

/// Next version of `prior`.
///
/// Records the generator added or changed become `auto`. Records it passed
/// through unchanged keep their prior provenance and properties.
pub fn stamp_update(mut graph: Ontology, prior: &Ontology) -> Ontology {
    graph.version = prior.version + 1;
    graph.created_at = prior.created_at;
    graph.updated_at = Utc::now();

    for node in &mut graph.nodes {
        match prior.node(&node.id) {
            Some(old) if !node_changed(old, node) => {
                node.provenance = old.provenance;
                if node.properties.is_none() {
                    node.properties = old.properties.clone();
                }
            }
            _ => node.provenance = Provenance::Auto,
        }
    }
    for edge in &mut graph.edges {
        edge.provenance = match prior.edge(&edge.id) {
            Some(old) if !edge_changed(old, edge) => old.provenance,
            _ => Provenance::Auto,
        };
    }
    if graph.metadata.is_none() {
        graph.metadata = prior.metadata.clone();
    }
    graph
}
