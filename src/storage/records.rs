//! Rows persisted in the store

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Embedding and metadata for one user table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEmbedding {
    pub table_name: String,
    pub description: String,
    pub columns: Vec<String>,
    pub column_types: Vec<String>,
    pub sample_data: String,
    #[serde(skip)]
    pub vector: Vec<f32>,
    pub last_updated: DateTime<Utc>,
    pub access_count: u32,
    pub last_accessed: Option<DateTime<Utc>>,
}

/// A learned association between a query and the tables it used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPattern {
    /// Set by the store on insert
    pub id: i64,
    pub query_text: String,
    pub tables: Vec<String>,
    #[serde(skip)]
    pub vector: Vec<f32>,
    pub success_weight: f64,
    pub use_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueryPattern {
    pub fn new(query_text: &str, tables: Vec<String>, vector: Vec<f32>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            query_text: query_text.to_string(),
            tables,
            vector,
            success_weight: 1.0,
            use_count: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One chat call as billed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub session_id: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub request_time: DateTime<Utc>,
    pub user_message: Option<String>,
    pub ai_response: Option<String>,
    pub system_prompt: Option<String>,
}

impl UsageRecord {
    /// UTC calendar date the call belongs to
    pub fn date(&self) -> NaiveDate {
        self.request_time.date_naive()
    }
}

/// Roll-up of all calls for one (date, provider, model)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: String,
    pub provider: String,
    pub model: String,
    pub total_requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost: f64,
}

/// Token and cost totals over some span
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

impl UsageTotals {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &UsageTotals) {
        self.requests += other.requests;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost += other.cost;
    }
}

/// Format a calendar date the way the store keys days
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Totals for one provider and model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub model: String,
    pub totals: UsageTotals,
}
