//! User settings for the external generator.
//!
//! Saved values win; empty or missing fields fall back to the environment,
//! then to built-in defaults.

use serde::{Deserialize, Serialize};

pub const ENV_PROVIDER: &str = "ONTOREAD_AI_PROVIDER";
pub const ENV_MODEL: &str = "ONTOREAD_AI_MODEL";
pub const ENV_API_TOKEN: &str = "ONTOREAD_AI_API_TOKEN";
pub const ENV_ENDPOINT: &str = "ONTOREAD_AI_ENDPOINT";

pub const DEFAULT_PROVIDER: &str = "moonshot";
pub const DEFAULT_MODEL: &str = "moonshot-v1-8k";

/// Provider names for self-hosted servers that take no API token.
pub const TOKENLESS_PROVIDERS: &[&str] = &["local", "ollama", "vllm"];

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub model_provider: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub api_token: String,
    /// Overrides the provider's default base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("model_provider", &self.model_provider)
            .field("model_name", &self.model_name)
            .field("api_token", &self.masked_token())
            .field("api_endpoint", &self.api_endpoint)
            .finish()
    }
}

impl Settings {
    /// Defaults taken from `ONTOREAD_AI_*` variables.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            model_provider: var(ENV_PROVIDER).unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            model_name: var(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_token: var(ENV_API_TOKEN).unwrap_or_default(),
            api_endpoint: var(ENV_ENDPOINT),
        }
    }

    /// Fill every empty field of `saved` from `defaults`.
    pub fn resolve(saved: Option<Settings>, defaults: Settings) -> Settings {
        let Some(saved) = saved else {
            return defaults;
        };
        let pick = |value: String, fallback: String| if value.is_empty() { fallback } else { value };
        Settings {
            model_provider: pick(saved.model_provider, defaults.model_provider),
            model_name: pick(saved.model_name, defaults.model_name),
            api_token: pick(saved.api_token, defaults.api_token),
            api_endpoint: saved
                .api_endpoint
                .filter(|e| !e.is_empty())
                .or(defaults.api_endpoint),
        }
    }

    pub fn requires_token(&self) -> bool {
        let provider = self.model_provider.trim().to_ascii_lowercase();
        !TOKENLESS_PROVIDERS.contains(&provider.as_str())
    }

    /// A generator call can be attempted: a model name, plus a token for
    /// hosted providers.
    pub fn is_configured(&self) -> bool {
        !self.model_name.is_empty() && (!self.api_token.is_empty() || !self.requires_token())
    }

    /// Token with all but the last four characters hidden.
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.api_token.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), tail)
    }
}
