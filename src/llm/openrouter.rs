//! OpenRouter client

use std::time::Duration;
use async_trait::async_trait;
use crate::Result;
use super::compat::{CompletionResponse, ModelList};
use super::{
    ChatClient, ChatRequest, ChatResponse, ModelInfo, Provider, check_status, http_client,
    request_error,
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

const REFERER: &str = "https://github.com/sqlterm/sqlterm-ai";
const TITLE: &str = "sqlterm";

pub struct OpenRouterClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: http_client(timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl ChatClient for OpenRouterClient {
    fn provider(&self) -> Provider {
        Provider::OpenRouter
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(request)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let body: CompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        body.into_chat_response(&request.model)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let list: ModelList = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        Ok(list.into_model_infos(Provider::OpenRouter))
    }
}
