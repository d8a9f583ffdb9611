//! LLM API Providers
//!
//! Concrete clients for OpenAI-compatible chat completions (OpenAI, Moonshot,
//! custom endpoints), Anthropic messages, and local OpenAI-compatible servers.

use super::*;
use ontoread_storage::Settings;
use reqwest::Client;
use std::time::Duration;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const MOONSHOT_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const LOCAL_BASE_URL: &str = "http://localhost:8000";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Moonshot,
    Anthropic,
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Moonshot => "moonshot",
            Provider::Anthropic => "anthropic",
            Provider::Local => "local",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "moonshot" | "kimi" => Ok(Provider::Moonshot),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "local" | "ollama" | "vllm" => Ok(Provider::Local),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

impl LLMConfig {
    /// Derive a provider config from the saved user settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let provider: Provider = settings.model_provider.parse()?;
        if settings.model_name.is_empty() {
            return Err(ConfigError::Invalid("model name is empty".to_string()));
        }
        if settings.api_token.is_empty() && settings.requires_token() {
            return Err(ConfigError::MissingToken(provider.as_str().to_string()));
        }
        Ok(Self {
            provider,
            api_key: settings.api_token.clone(),
            model: settings.model_name.clone(),
            base_url: settings.api_endpoint.clone().filter(|u| !u.is_empty()),
            timeout_secs: if provider == Provider::Local { 120 } else { 60 },
        })
    }

    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::OpenAI,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            timeout_secs: 60,
        }
    }

    pub fn moonshot(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::Moonshot,
            ..Self::openai(api_key, model)
        }
    }

    pub fn anthropic(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::Anthropic,
            ..Self::openai(api_key, model)
        }
    }

    pub fn local(url: &str, model: &str) -> Self {
        Self {
            provider: Provider::Local,
            api_key: String::new(),
            model: model.to_string(),
            base_url: Some(url.to_string()),
            timeout_secs: 120,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown provider: {0} (expected openai, moonshot, anthropic or local)")]
    UnknownProvider(String),
    #[error("No API token configured for {0}")]
    MissingToken(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// `base` unless it already names the full endpoint.
fn endpoint(base: &str, path: &str) -> String {
    if base.ends_with(path) {
        base.to_string()
    } else {
        format!("{}{}", base, path)
    }
}

fn http_client(timeout_secs: u64) -> Result<Client, LLMError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LLMError::Network(format!("failed to create HTTP client: {}", e)))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LLMError> {
    let status = response.status();
    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(LLMError::RateLimited {
            retry_after_ms: retry_after * 1000,
        });
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(LLMError::Api(format!("{}: {}", status, error_text)));
    }
    Ok(response)
}

// ============================================================================
// OpenAI-compatible chat completions
// ============================================================================

fn chat_messages(request: &CompletionRequest) -> Vec<serde_json::Value> {
    request
        .messages
        .iter()
        .map(|m| serde_json::json!({"role": m.role.as_str(), "content": m.content}))
        .collect()
}

pub(crate) fn openai_body(model: &str, request: &CompletionRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": chat_messages(request),
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    body
}

pub(crate) fn parse_openai_response(
    data: &serde_json::Value,
    model: &str,
) -> Result<CompletionResponse, LLMError> {
    let content = data["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| LLMError::InvalidResponse("missing choices[0].message.content".to_string()))?
        .to_string();

    let finish_reason = match data["choices"][0]["finish_reason"].as_str() {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    Ok(CompletionResponse {
        content,
        finish_reason,
        usage: Usage {
            prompt_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            completion_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
        },
        model: data["model"].as_str().unwrap_or(model).to_string(),
    })
}

/// OpenAI, Moonshot, or any server speaking the same protocol.
pub struct OpenAIClient {
    client: Client,
    config: LLMConfig,
}

impl OpenAIClient {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        let default = match self.config.provider {
            Provider::Moonshot => MOONSHOT_BASE_URL,
            _ => OPENAI_BASE_URL,
        };
        endpoint(&self.config.base_url_or(default), "/chat/completions")
    }
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let response = self
            .client
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_body(&self.config.model, request))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        let data: serde_json::Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LLMError::InvalidResponse(e.to_string()))?;

        parse_openai_response(&data, &self.config.model)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: self.config.provider.as_str().to_string(),
            name: self.config.model.clone(),
        }
    }
}

// ============================================================================
// Anthropic Provider
// ============================================================================

pub(crate) fn anthropic_body(model: &str, request: &CompletionRequest) -> serde_json::Value {
    let system = request
        .messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.clone());

    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| serde_json::json!({"role": m.role.as_str(), "content": m.content}))
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    });
    if let Some(sys) = system {
        body["system"] = serde_json::json!(sys);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    body
}

pub(crate) fn parse_anthropic_response(
    data: &serde_json::Value,
    model: &str,
) -> Result<CompletionResponse, LLMError> {
    let content = data["content"]
        .as_array()
        .and_then(|blocks| blocks.iter().find_map(|b| b["text"].as_str()))
        .ok_or_else(|| LLMError::InvalidResponse("missing text content block".to_string()))?
        .to_string();

    let finish_reason = match data["stop_reason"].as_str() {
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Stop,
    };

    Ok(CompletionResponse {
        content,
        finish_reason,
        usage: Usage {
            prompt_tokens: data["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
            completion_tokens: data["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
        },
        model: model.to_string(),
    })
}

pub struct AnthropicClient {
    client: Client,
    config: LLMConfig,
}

impl AnthropicClient {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LLMProvider for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let url = endpoint(&self.config.base_url_or(ANTHROPIC_BASE_URL), "/messages");

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&anthropic_body(&self.config.model, request))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        let data: serde_json::Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LLMError::InvalidResponse(e.to_string()))?;

        parse_anthropic_response(&data, &self.config.model)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: Provider::Anthropic.as_str().to_string(),
            name: self.config.model.clone(),
        }
    }
}

// ============================================================================
// Local Provider (Ollama, vLLM, etc.)
// ============================================================================

pub struct LocalClient {
    client: Client,
    config: LLMConfig,
}

impl LocalClient {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LLMProvider for LocalClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        // OpenAI-compatible API (vLLM, Ollama in OpenAI mode)
        let url = endpoint(&self.config.base_url_or(LOCAL_BASE_URL), "/v1/chat/completions");

        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&openai_body(&self.config.model, request));
        if !self.config.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        let data: serde_json::Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LLMError::InvalidResponse(e.to_string()))?;

        parse_openai_response(&data, &self.config.model)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: Provider::Local.as_str().to_string(),
            name: self.config.model.clone(),
        }
    }
}

// ============================================================================
// Unified Client
// ============================================================================

/// Dispatches to the client for the configured provider.
pub enum UnifiedClient {
    OpenAI(OpenAIClient),
    Anthropic(AnthropicClient),
    Local(LocalClient),
}

impl UnifiedClient {
    pub fn from_config(config: LLMConfig) -> Result<Self, LLMError> {
        Ok(match config.provider {
            Provider::OpenAI | Provider::Moonshot => Self::OpenAI(OpenAIClient::new(config)?),
            Provider::Anthropic => Self::Anthropic(AnthropicClient::new(config)?),
            Provider::Local => Self::Local(LocalClient::new(config)?),
        })
    }
}

#[async_trait]
impl LLMProvider for UnifiedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        match self {
            Self::OpenAI(c) => c.complete(request).await,
            Self::Anthropic(c) => c.complete(request).await,
            Self::Local(c) => c.complete(request).await,
        }
    }

    fn model_info(&self) -> ModelInfo {
        match self {
            Self::OpenAI(c) => c.model_info(),
            Self::Anthropic(c) => c.model_info(),
            Self::Local(c) => c.model_info(),
        }
    }
}

/// Generator backed by the provider named in `settings`.
///
/// Settings without a token or model still produce a generator; it reports
/// itself unconfigured so the pipeline fails before any request.
pub fn generator_from_settings(settings: &Settings) -> Result<LLMGenerator, ConfigError> {
    let configured = settings.is_configured();
    let config = match LLMConfig::from_settings(settings) {
        Ok(config) => config,
        Err(ConfigError::MissingToken(_)) | Err(ConfigError::Invalid(_)) if !configured => {
            let provider: Provider = settings.model_provider.parse()?;
            LLMConfig {
                provider,
                api_key: String::new(),
                model: settings.model_name.clone(),
                base_url: settings.api_endpoint.clone(),
                timeout_secs: 60,
            }
        }
        Err(e) => return Err(e),
    };
    let client = UnifiedClient::from_config(config)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(LLMGenerator::new(Arc::new(client)).with_configured(configured))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(provider: &str, token: &str) -> Settings {
        Settings {
            model_provider: provider.to_string(),
            model_name: "m-1".to_string(),
            api_token: token.to_string(),
            api_endpoint: None,
        }
    }

    #[test]
    fn test_config_creation() {
        let config = LLMConfig::openai("test-key", "gpt-4");
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "gpt-4");
    }

    #[test]
    fn test_config_from_settings() {
        let config = LLMConfig::from_settings(&settings("Moonshot", "sk-1")).unwrap();
        assert_eq!(config.provider, Provider::Moonshot);
        assert_eq!(config.timeout_secs, 60);

        let config = LLMConfig::from_settings(&settings("local", "")).unwrap();
        assert_eq!(config.provider, Provider::Local);
        assert_eq!(config.timeout_secs, 120);

        assert_eq!(
            LLMConfig::from_settings(&settings("openai", "")).unwrap_err(),
            ConfigError::MissingToken("openai".to_string())
        );
        assert!(matches!(
            LLMConfig::from_settings(&settings("gemini", "k")),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_endpoint_urls() {
        let moonshot = OpenAIClient::new(LLMConfig::moonshot("k", "m")).unwrap();
        assert_eq!(moonshot.url(), "https://api.moonshot.cn/v1/chat/completions");

        let custom = OpenAIClient::new(
            LLMConfig::openai("k", "m").with_base_url("https://proxy.local/v1/chat/completions"),
        )
        .unwrap();
        assert_eq!(custom.url(), "https://proxy.local/v1/chat/completions");

        let trailing = OpenAIClient::new(LLMConfig::openai("k", "m").with_base_url("https://x/v1/"))
            .unwrap();
        assert_eq!(trailing.url(), "https://x/v1/chat/completions");
    }

    #[test]
    fn test_openai_body_and_response() {
        let body = openai_body("gpt-4o", &CompletionRequest::user("hi"));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["max_tokens"], 2000);

        let data = json!({
            "choices": [{"message": {"content": "{}"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let response = parse_openai_response(&data, "gpt-4o").unwrap();
        assert_eq!(response.content, "{}");
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert_eq!(response.usage.prompt_tokens, 12);

        assert!(matches!(
            parse_openai_response(&json!({"choices": []}), "gpt-4o"),
            Err(LLMError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_anthropic_body_and_response() {
        let mut request = CompletionRequest::user("hi");
        request.messages.insert(
            0,
            Message {
                role: Role::System,
                content: "be terse".to_string(),
            },
        );
        let body = anthropic_body("claude", &request);
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["max_tokens"], 2000);

        let data = json!({
            "content": [{"type": "text", "text": "answer"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 1}
        });
        let response = parse_anthropic_response(&data, "claude").unwrap();
        assert_eq!(response.content, "answer");
        assert_eq!(response.usage.completion_tokens, 1);
    }

    #[test]
    fn test_generator_from_settings() {
        let generator = generator_from_settings(&settings("anthropic", "sk-ant")).unwrap();
        assert!(generator.is_configured());
        assert_eq!(generator.describe(), "anthropic/m-1");

        let generator = generator_from_settings(&settings("openai", "")).unwrap();
        assert!(!generator.is_configured());

        assert!(generator_from_settings(&settings("gemini", "k")).is_err());
    }

    #[test]
    fn test_local_generator_is_ready_without_token() {
        for name in ["local", "ollama", "vllm"] {
            let s = settings(name, "");
            assert_eq!(name.parse::<Provider>(), Ok(Provider::Local));
            assert!(!s.requires_token());

            let generator = generator_from_settings(&s).unwrap();
            assert!(generator.is_configured());
            assert_eq!(generator.describe(), "local/m-1");
        }

        let mut nameless = settings("local", "");
        nameless.model_name.clear();
        assert!(!generator_from_settings(&nameless).unwrap().is_configured());
    }
}
