//! Chat-completion provider interface
//!
//! The request/response shapes shared by every vendor client, and the
//! `LLMGenerator` adapter that turns a provider into the pipeline's
//! [`Generator`](crate::generator::Generator).

#[cfg(feature = "http")]
pub mod providers;

use crate::generator::{GenerationKind, GenerationPayload, Generator};
use crate::prompts;
use async_trait::async_trait;
use std::sync::Arc;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: usize = 2000;

// ============================================================================
// LLM Provider Interface
// ============================================================================

/// Trait for LLM API providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError>;

    fn model_info(&self) -> ModelInfo;
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Single user turn with the default sampling parameters.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message {
                role: Role::User,
                content: prompt.into(),
            }],
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            temperature: Some(DEFAULT_TEMPERATURE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
}

// ============================================================================
// Generator Adapter
// ============================================================================

/// Renders the prompt for each generation kind and sends it to a provider.
pub struct LLMGenerator {
    provider: Arc<dyn LLMProvider>,
    configured: bool,
}

impl LLMGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            configured: true,
        }
    }

    /// Mark the generator unusable (missing token or model) so the pipeline
    /// refuses before any network call.
    pub fn with_configured(mut self, configured: bool) -> Self {
        self.configured = configured;
        self
    }
}

#[async_trait]
impl Generator for LLMGenerator {
    async fn generate(
        &self,
        kind: GenerationKind,
        payload: &GenerationPayload,
    ) -> Result<String, LLMError> {
        let prompt = prompts::render(kind, payload);
        let request = CompletionRequest::user(prompt);
        let response = self.provider.complete(&request).await?;

        if response.finish_reason == FinishReason::Length {
            tracing::warn!(
                kind = %kind,
                completion_tokens = response.usage.completion_tokens,
                "reply truncated at max_tokens"
            );
        }
        tracing::debug!(
            kind = %kind,
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "generation complete"
        );
        Ok(response.content)
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn describe(&self) -> String {
        let info = self.provider.model_info();
        format!("{}/{}", info.provider, info.name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records the last request and replies with a fixed text.
    struct EchoProvider {
        reply: String,
        last: Mutex<Option<CompletionRequest>>,
    }

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LLMError> {
            *self.last.lock() = Some(request.clone());
            Ok(CompletionResponse {
                content: self.reply.clone(),
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
                model: "echo-1".to_string(),
            })
        }

        fn model_info(&self) -> ModelInfo {
            ModelInfo {
                provider: "echo".to_string(),
                name: "echo-1".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn test_generator_sends_rendered_prompt() {
        let provider = Arc::new(EchoProvider {
            reply: "{\"nodes\":[],\"edges\":[]}".to_string(),
            last: Mutex::new(None),
        });
        let generator = LLMGenerator::new(provider.clone());

        let payload = GenerationPayload::new("Transformers use attention.");
        let reply = generator.generate(GenerationKind::Build, &payload).await.unwrap();
        assert_eq!(reply, "{\"nodes\":[],\"edges\":[]}");

        let request = provider.last.lock().clone().unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert!(request.messages[0].content.contains("Transformers use attention."));
        assert_eq!(request.temperature, Some(DEFAULT_TEMPERATURE));
        assert_eq!(request.max_tokens, Some(DEFAULT_MAX_TOKENS));
        assert_eq!(generator.describe(), "echo/echo-1");
    }

    #[test]
    fn test_unconfigured_flag() {
        let provider = Arc::new(EchoProvider {
            reply: String::new(),
            last: Mutex::new(None),
        });
        assert!(!LLMGenerator::new(provider).with_configured(false).is_configured());
    }
}
