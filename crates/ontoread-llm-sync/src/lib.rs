//! Ontoread LLM Sync: text → ontology through an external generator
//!
//! ```text
//!   raw text ──► Generator (build | update) ──► reply JSON
//!                                                  │
//!        ┌──────────── sanitize ◄── decode ◄───────┘
//!        ▼
//!     validate ──► stamp ──► diff (update) ──► Generator (format)
//!                                                  │
//!                         OntologyStore ◄──────────┘
//!                      (graph, then history)
//! ```
//!
//! - [`generator`]: the `Generator` seam and a scripted implementation
//! - [`llm`]: chat-completion providers behind the seam
//! - [`prompts`]: build/update/format templates
//! - [`reply`]: JSON extraction from fenced or prose replies
//! - [`pipeline`]: the stage machine that commits a submission atomically

pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod reply;

pub use generator::{GenerationKind, GenerationPayload, Generator, ScriptedGenerator};
pub use llm::{LLMError, LLMGenerator, LLMProvider};
pub use pipeline::{
    MergeOutcome, Pipeline, PipelineError, PipelineEvent, PipelineEventHandler, PipelineStage,
    Preview,
};
pub use reply::{extract_json, parse_graph_reply, GenerationParseError, GraphReply};

#[cfg(feature = "http")]
pub use llm::providers::{generator_from_settings, ConfigError, LLMConfig, Provider};
