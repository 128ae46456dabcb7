//! Chat collaborator - language model providers
//!
//! One [`ChatClient`] implementation per provider, picked from config by
//! [`build_client`]. Responses are normalized to a single reply plus token
//! counts whatever the wire format.

pub mod compat;
pub mod lmstudio;
pub mod ollama;
pub mod openrouter;
pub mod pricing;

pub use lmstudio::LmStudioClient;
pub use ollama::OllamaClient;
pub use openrouter::OpenRouterClient;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::config::AiConfig;
use crate::{Error, Result};
use pricing::ModelPricing;

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenRouter,
    Ollama,
    LmStudio,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenRouter, Provider::Ollama, Provider::LmStudio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::Ollama => "ollama",
            Provider::LmStudio => "lmstudio",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenRouter => openrouter::DEFAULT_BASE_URL,
            Provider::Ollama => ollama::DEFAULT_BASE_URL,
            Provider::LmStudio => lmstudio::DEFAULT_BASE_URL,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "OpenRouter",
            Provider::Ollama => "Ollama",
            Provider::LmStudio => "LM Studio",
        }
    }

    /// Local providers never bill
    pub fn is_local(&self) -> bool {
        !matches!(self, Provider::OpenRouter)
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openrouter" => Ok(Provider::OpenRouter),
            "ollama" => Ok(Provider::Ollama),
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(Provider::LmStudio),
            _ => Err(Error::InvalidValue(format!("unknown provider: {}", s))),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// A system prompt followed by one user message
    pub fn new(model: &str, system_prompt: &str, user_message: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_message)],
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A normalized chat reply
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub model: String,
    pub content: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub provider: Provider,
    pub pricing: Option<ModelPricing>,
}

/// A language model endpoint
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

/// Infer the provider from a model id: `vendor/model` is OpenRouter,
/// `name:tag` is Ollama, anything else LM Studio.
pub fn parse_model_string(model: &str) -> Result<(Provider, String)> {
    let model = model.trim();
    if model.is_empty() {
        return Err(Error::InvalidValue("model string cannot be empty".to_string()));
    }

    let provider = if model.contains('/') {
        Provider::OpenRouter
    } else if model.contains(':') {
        Provider::Ollama
    } else {
        Provider::LmStudio
    };
    Ok((provider, model.to_string()))
}

/// Build the client for the configured provider
pub fn build_client(config: &AiConfig) -> Result<Arc<dyn ChatClient>> {
    let base_url = config.base_url(config.provider);
    let timeout = config.timeout();

    let client: Arc<dyn ChatClient> = match config.provider {
        Provider::OpenRouter => {
            let api_key = config.api_key(Provider::OpenRouter).ok_or_else(|| {
                Error::NotConfigured("OpenRouter API key missing (set it in ai.toml or OPENROUTER_API_KEY)".to_string())
            })?;
            Arc::new(OpenRouterClient::new(&base_url, &api_key, timeout)?)
        }
        Provider::Ollama => Arc::new(OllamaClient::new(&base_url, timeout)?),
        Provider::LmStudio => Arc::new(LmStudioClient::new(&base_url, timeout)?),
    };
    Ok(client)
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))
}

/// Turn a non-2xx response into a chat error carrying the body
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Chat(format!("API request failed with status {}: {}", status, body)))
}

/// Transport failure. The client's own deadline is a timeout like the
/// caller's, so both surface as `ChatTimeout` whichever fires first.
pub(crate) fn request_error(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::ChatTimeout(timeout)
    } else {
        Error::Chat(format!("request failed: {}", e))
    }
}
