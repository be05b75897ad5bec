pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod openai;

use async_trait::async_trait;
use futures_util::Stream;
use serde::Deserialize;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::LlmError;
use crate::event::StreamEvent;
use crate::prompt::Prompt;
use crate::retry::RetryPolicy;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// A streamed-completion backend.
#[async_trait]
pub trait Provider: fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Opens a streamed completion for `prompt`, with the tool palette
    /// attached and tool choice left to the model.
    ///
    /// Connection failures are retried under the provider's retry policy
    /// before this returns an error. Errors inside the returned stream are
    /// final.
    async fn stream(&self, prompt: &Prompt) -> Result<EventStream, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::Gemini => "gemini-2.5-flash",
        }
    }

    pub fn default_api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GOOGLE_API_KEY",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(LlmError::Config(format!("unknown provider {other:?}"))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        })
    }
}

/// `[llm]` configuration section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model id; the provider's default when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// API origin; the provider's public endpoint when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

fn default_max_tokens() -> u32 {
    256
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_retry_max_ms() -> u64 {
    8000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            api_key_env: None,
            base_url: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff_ms: self.retry_base_ms,
            max_backoff_ms: self.retry_max_ms,
        }
    }
}

/// Connection settings shared by the HTTP providers.
#[derive(Clone)]
pub struct ProviderSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub retry: RetryPolicy,
}

impl ProviderSettings {
    pub fn from_config(config: &LlmConfig, api_key: String) -> Self {
        Self {
            model: config.model().to_string(),
            base_url: config.base_url().to_string(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: config.retry_policy(),
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Builds the configured provider.
///
/// # Errors
///
/// Returns `LlmError::MissingApiKey` if `api_key` is empty.
pub fn from_config(config: &LlmConfig, api_key: String) -> Result<Arc<dyn Provider>, LlmError> {
    if api_key.trim().is_empty() {
        return Err(LlmError::MissingApiKey(config.api_key_env().to_string()));
    }

    let settings = ProviderSettings::from_config(config, api_key);
    let client = reqwest::Client::new();
    Ok(match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(client, settings)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(client, settings)),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(client, settings)),
    })
}
