//! Ollama client

use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use super::{
    ChatClient, ChatMessage, ChatRequest, ChatResponse, ModelInfo, Provider, TokenUsage,
    check_status, http_client, request_error,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: String,
    message: Option<OllamaMessage>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
    #[serde(default)]
    size: u64,
}

pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
            timeout,
        })
    }
}

fn to_wire(request: &ChatRequest) -> OllamaChatRequest<'_> {
    let options = if request.temperature.is_some() || request.max_tokens.is_some() {
        Some(OllamaOptions {
            temperature: request.temperature,
            num_predict: request.max_tokens,
        })
    } else {
        None
    };

    OllamaChatRequest {
        model: &request.model,
        messages: &request.messages,
        stream: false,
        options,
    }
}

fn from_wire(body: OllamaChatResponse, requested_model: &str) -> Result<ChatResponse> {
    let message = body.message.ok_or(Error::EmptyResponse)?;
    Ok(ChatResponse {
        model: if body.model.is_empty() { requested_model.to_string() } else { body.model },
        content: message.content,
        usage: TokenUsage {
            prompt_tokens: body.prompt_eval_count,
            completion_tokens: body.eval_count,
        },
    })
}

fn models_from_tags(tags: OllamaTags) -> Vec<ModelInfo> {
    tags.models
        .into_iter()
        .map(|model| ModelInfo {
            id: model.name.clone(),
            description: format!("Local Ollama model ({:.1} GB)", model.size as f64 / 1e9),
            name: model.name,
            provider: Provider::Ollama,
            pricing: None,
        })
        .collect()
}

#[async_trait]
impl ChatClient for OllamaClient {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&to_wire(request))
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let body: OllamaChatResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        from_wire(body, &request.model)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let tags: OllamaTags = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        Ok(models_from_tags(tags))
    }
}
