use tabled::{settings::Style, Table, Tabled};
use crate::llm::ModelInfo;
use crate::llm::pricing::format_price;
use crate::storage::{DailyUsage, ProviderUsage};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Two-column metric/value table
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

#[derive(Tabled)]
struct DailyRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Requests")]
    requests: u64,
    #[tabled(rename = "Tokens")]
    tokens: u64,
    #[tabled(rename = "Cost")]
    cost: String,
}

pub fn daily_usage_table(days: &[DailyUsage]) -> String {
    let rows: Vec<DailyRow> = days
        .iter()
        .map(|d| DailyRow {
            date: d.date.clone(),
            provider: d.provider.clone(),
            model: d.model.clone(),
            requests: d.total_requests,
            tokens: d.input_tokens + d.output_tokens,
            cost: format_price(d.total_cost),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct ProviderRow {
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Requests")]
    requests: u64,
    #[tabled(rename = "Input")]
    input_tokens: u64,
    #[tabled(rename = "Output")]
    output_tokens: u64,
    #[tabled(rename = "Cost")]
    cost: String,
}

pub fn provider_usage_table(usage: &[ProviderUsage]) -> String {
    let rows: Vec<ProviderRow> = usage
        .iter()
        .map(|u| ProviderRow {
            provider: u.provider.clone(),
            model: u.model.clone(),
            requests: u.totals.requests,
            input_tokens: u.totals.input_tokens,
            output_tokens: u.totals.output_tokens,
            cost: format_price(u.totals.cost),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Input / 1M")]
    input: String,
    #[tabled(rename = "Output / 1M")]
    output: String,
}

/// Models a provider offers, priced per million tokens
pub fn models_table(models: &[ModelInfo]) -> String {
    let rows: Vec<ModelRow> = models
        .iter()
        .map(|m| {
            let (input, output) = match m.pricing {
                Some(p) => (p.input_per_token * 1e6, p.output_per_token * 1e6),
                None => (0.0, 0.0),
            };
            ModelRow {
                id: m.id.clone(),
                name: m.name.clone(),
                input: format_price(input),
                output: format_price(output),
            }
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_table() {
        assert!(stats_table(&[]).is_empty());
        let rendered = stats_table(&[("Tables", "2"), ("Patterns", "0")]);
        assert!(rendered.contains("Metric"));
        assert!(rendered.contains("Tables"));
    }

    #[test]
    fn test_daily_usage_table() {
        let days = vec![DailyUsage {
            date: "2024-05-01".to_string(),
            provider: "openrouter".to_string(),
            model: "openai/gpt-4o".to_string(),
            total_requests: 3,
            input_tokens: 100,
            output_tokens: 20,
            total_cost: 1.5,
        }];
        let rendered = daily_usage_table(&days);
        assert!(rendered.contains("2024-05-01"));
        assert!(rendered.contains("120"));
        assert!(rendered.contains("$1.50"));
    }

    #[test]
    fn test_models_table() {
        use crate::llm::Provider;
        use crate::llm::pricing::ModelPricing;

        let models = vec![
            ModelInfo {
                id: "openai/gpt-4o".to_string(),
                name: "GPT-4o".to_string(),
                description: String::new(),
                provider: Provider::OpenRouter,
                pricing: Some(ModelPricing::per_million(5.0, 15.0)),
            },
            ModelInfo {
                id: "llama3.2:latest".to_string(),
                name: "llama3.2:latest".to_string(),
                description: String::new(),
                provider: Provider::Ollama,
                pricing: None,
            },
        ];
        let rendered = models_table(&models);
        assert!(rendered.contains("openai/gpt-4o"));
        assert!(rendered.contains("$15.00"));
        assert!(rendered.contains("Free"));
    }
}
