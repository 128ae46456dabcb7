//! LM Studio client (OpenAI-compatible local server)

use std::time::Duration;
use async_trait::async_trait;
use crate::Result;
use super::compat::{CompletionResponse, ModelList};
use super::{
    ChatClient, ChatRequest, ChatResponse, ModelInfo, Provider, check_status, http_client,
    request_error,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234";

pub struct LmStudioClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl LmStudioClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl ChatClient for LmStudioClient {
    fn provider(&self) -> Provider {
        Provider::LmStudio
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
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
            .get(format!("{}/v1/models", self.base_url))
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let list: ModelList = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        Ok(list.into_model_infos(Provider::LmStudio))
    }
}
