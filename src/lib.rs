//! # sqlterm-ai - Query-context engine for an AI-assisted SQL terminal
//!
//! Given a natural-language request against a database of unknown size,
//! decides which tables and relationships to show a language model.
//!
//! sqlterm-ai provides:
//! - A deterministic hashing embedder and a SQLite-backed schema index
//! - A relationship graph built from foreign keys and naming heuristics
//! - A multi-turn conversation orchestrator (discovery, schema analysis, SQL generation)
//! - Query-pattern and token-usage ledgers sharing the index store
//! - Chat clients for OpenRouter, Ollama and LM Studio

pub mod config;
pub mod conversation;
pub mod database;
pub mod embedding;
pub mod graph;
pub mod index;
pub mod ledger;
pub mod llm;
pub mod storage;
pub mod tasks;
pub mod ui;

#[cfg(test)]
pub(crate) mod testkit;

use std::time::Duration;

// Re-exports for convenient access
pub use config::AiConfig;
pub use conversation::{ConversationContext, ConversationPhase, Orchestrator};
pub use database::{Database, SqliteDatabase, TableSchema};
pub use embedding::{Embedder, HashEmbedder};
pub use graph::RelationshipGraph;
pub use index::SchemaIndex;
pub use storage::SqliteStore;

/// Result type alias for sqlterm-ai operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sqlterm-ai operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("No database connection available")]
    NoDatabase,

    #[error("AI client not configured: {0}")]
    NotConfigured(String),

    #[error("Chat request failed: {0}")]
    Chat(String),

    #[error("Chat request timed out after {}s", .0.as_secs())]
    ChatTimeout(Duration),

    #[error("No response choices returned")]
    EmptyResponse,

    #[error("Conversation made no progress after {turns} turns")]
    InsufficientProgress { turns: usize },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Remote failures the user can retry, possibly with a simpler request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Chat(_) | Error::ChatTimeout(_) | Error::EmptyResponse)
    }
}
