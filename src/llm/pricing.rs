//! Token pricing

use serde::Serialize;
use super::Provider;

/// USD per token
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPricing {
    pub input_per_token: f64,
    pub output_per_token: f64,
}

impl ModelPricing {
    pub const fn per_million(input: f64, output: f64) -> Self {
        Self {
            input_per_token: input / 1_000_000.0,
            output_per_token: output / 1_000_000.0,
        }
    }

    /// Parse OpenRouter's per-token decimal strings; junk reads as free
    pub fn from_per_token_strings(input: &str, output: &str) -> Self {
        Self {
            input_per_token: input.parse().unwrap_or(0.0),
            output_per_token: output.parse().unwrap_or(0.0),
        }
    }

    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        f64::from(input_tokens) * self.input_per_token + f64::from(output_tokens) * self.output_per_token
    }
}

/// Rates for popular OpenRouter models (USD per 1M tokens)
const KNOWN_MODELS: &[(&str, ModelPricing)] = &[
    ("anthropic/claude-3.5-sonnet", ModelPricing::per_million(3.0, 15.0)),
    ("anthropic/claude-3-haiku", ModelPricing::per_million(0.25, 1.25)),
    ("openai/gpt-4o", ModelPricing::per_million(5.0, 15.0)),
    ("openai/gpt-4o-mini", ModelPricing::per_million(0.15, 0.6)),
];

/// Applied to OpenRouter models missing from the table
pub const DEFAULT_PRICING: ModelPricing = ModelPricing::per_million(1.0, 3.0);

pub fn pricing_for(model: &str) -> Option<ModelPricing> {
    KNOWN_MODELS
        .iter()
        .find(|(id, _)| *id == model)
        .map(|(_, pricing)| *pricing)
}

/// Cost of one call in USD
pub fn calculate_cost(provider: Provider, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    if provider.is_local() {
        return 0.0;
    }
    pricing_for(model)
        .unwrap_or(DEFAULT_PRICING)
        .cost(input_tokens, output_tokens)
}

/// `Free`, `$0.001234` below a cent, `$1.50` otherwise
pub fn format_price(price: f64) -> String {
    if price <= 0.0 {
        "Free".to_string()
    } else if price < 0.01 {
        format!("${:.6}", price)
    } else {
        format!("${:.2}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_cost() {
        let cost = calculate_cost(Provider::OpenRouter, "openai/gpt-4o", 1_000_000, 1_000_000);
        assert!((cost - 20.0).abs() < 1e-9);

        let cost = calculate_cost(Provider::OpenRouter, "anthropic/claude-3-haiku", 2000, 400);
        assert!((cost - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_model_uses_default_rate() {
        // 0.001 per 1k input, 0.003 per 1k output
        let cost = calculate_cost(Provider::OpenRouter, "mistralai/mixtral", 1000, 1000);
        assert!((cost - 0.004).abs() < 1e-12);
    }

    #[test]
    fn test_local_providers_are_free() {
        assert_eq!(calculate_cost(Provider::Ollama, "llama3:8b", 10_000, 10_000), 0.0);
        assert_eq!(calculate_cost(Provider::LmStudio, "openai/gpt-4o", 10_000, 10_000), 0.0);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0.0), "Free");
        assert_eq!(format_price(-1.0), "Free");
        assert_eq!(format_price(0.001234), "$0.001234");
        assert_eq!(format_price(1.5), "$1.50");
        assert_eq!(format_price(100.0), "$100.00");
    }

    #[test]
    fn test_per_token_strings() {
        let pricing = ModelPricing::from_per_token_strings("0.000003", "oops");
        assert!((pricing.input_per_token - 0.000003).abs() < 1e-15);
        assert_eq!(pricing.output_per_token, 0.0);
    }
}
