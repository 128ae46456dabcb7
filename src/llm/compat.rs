//! OpenAI-compatible wire format, spoken by OpenRouter and LM Studio

use serde::Deserialize;
use crate::{Error, Result};
use super::pricing::ModelPricing;
use super::{ChatResponse, ModelInfo, Provider, TokenUsage};

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletionUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

/// Model listing as returned by `/models`
#[derive(Debug, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pricing: Option<ModelEntryPricing>,
}

/// Per-token prices, sent as decimal strings
#[derive(Debug, Deserialize)]
pub struct ModelEntryPricing {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub completion: String,
}

impl ModelList {
    /// Listing entries as models of `provider`. Entries without a name or
    /// description fall back to the id and a generic label.
    pub fn into_model_infos(self, provider: Provider) -> Vec<ModelInfo> {
        self.data
            .into_iter()
            .map(|model| ModelInfo {
                name: model.name.unwrap_or_else(|| model.id.clone()),
                description: model
                    .description
                    .unwrap_or_else(|| format!("{} model", provider.display_name())),
                pricing: model
                    .pricing
                    .map(|p| ModelPricing::from_per_token_strings(&p.prompt, &p.completion)),
                id: model.id,
                provider,
            })
            .collect()
    }
}

impl CompletionResponse {
    /// First choice's text; no choices is an error
    pub fn into_chat_response(self, requested_model: &str) -> Result<ChatResponse> {
        let content = self
            .choices
            .into_iter()
            .next()
            .ok_or(Error::EmptyResponse)?
            .message
            .content
            .unwrap_or_default();

        let usage = self.usage.unwrap_or_default();
        Ok(ChatResponse {
            model: if self.model.is_empty() { requested_model.to_string() } else { self.model },
            content,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let body = r#"{
            "id": "gen-1",
            "model": "openai/gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "SELECT 1"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        let response = parsed.into_chat_response("ignored").unwrap();

        assert_eq!(response.content, "SELECT 1");
        assert_eq!(response.model, "openai/gpt-4o");
        assert_eq!(response.usage, TokenUsage { prompt_tokens: 12, completion_tokens: 3 });
    }

    #[test]
    fn test_no_choices_is_empty_response() {
        let parsed: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = parsed.into_chat_response("m").unwrap_err();
        assert!(matches!(err, Error::EmptyResponse));
    }

    #[test]
    fn test_openrouter_model_listing() {
        let body = r#"{"data": [{
            "id": "openai/gpt-4o",
            "name": "OpenAI: GPT-4o",
            "description": "Flagship model",
            "pricing": {"prompt": "0.000005", "completion": "0.000015"}
        }]}"#;
        let list: ModelList = serde_json::from_str(body).unwrap();
        let models = list.into_model_infos(Provider::OpenRouter);

        assert_eq!(models[0].id, "openai/gpt-4o");
        assert_eq!(models[0].name, "OpenAI: GPT-4o");
        let pricing = models[0].pricing.unwrap();
        assert!((pricing.cost(1_000_000, 0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_model_listing() {
        let body = r#"{"object": "list", "data": [{"id": "qwen2.5-7b-instruct", "object": "model"}]}"#;
        let list: ModelList = serde_json::from_str(body).unwrap();
        let models = list.into_model_infos(Provider::LmStudio);

        assert_eq!(models[0].name, "qwen2.5-7b-instruct");
        assert_eq!(models[0].description, "LM Studio model");
        assert!(models[0].pricing.is_none());
    }

    #[test]
    fn test_missing_usage_defaults_to_zero() {
        let body = r#"{"choices": [{"message": {"content": "hi"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        let response = parsed.into_chat_response("local-model").unwrap();
        assert_eq!(response.model, "local-model");
        assert_eq!(response.usage, TokenUsage::default());
    }
}
