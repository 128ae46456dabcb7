//! Query-Pattern Ledger
//!
//! Append-only record of queries and the tables in play when they were
//! asked. Patterns are kept for inspection; nothing ranks on them yet.

use std::sync::Arc;
use tracing::debug;
use crate::Result;
use crate::embedding::Embedder;
use crate::storage::{QueryPattern, SqliteStore};

#[derive(Clone)]
pub struct PatternLedger {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
}

impl PatternLedger {
    pub fn new(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Embed `query` and append it with its tables. Returns the row id.
    pub fn record(&self, query: &str, tables: &[String]) -> Result<i64> {
        let pattern = QueryPattern::new(query, tables.to_vec(), self.embedder.embed(query));
        let id = self.store.insert_query_pattern(&pattern)?;
        debug!("Recorded query pattern {} ({} tables)", id, tables.len());
        Ok(id)
    }

    /// Latest patterns, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<QueryPattern>> {
        self.store.recent_query_patterns(limit)
    }

    pub fn count(&self) -> Result<usize> {
        self.store.count_query_patterns()
    }
}
