//! Schema Index - per-table embeddings with similarity search
//!
//! Keeps one [`TableEmbedding`] per user table and answers "which tables
//! look relevant to this text" with a human-readable reason per hit.

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::Result;
use crate::database::{Database, Row, TableSchema, sample_query};
use crate::embedding::{Embedder, cosine_similarity};
use crate::storage::{SqliteStore, TableEmbedding};

/// Rows pulled per table for the sample text
const SAMPLE_ROWS: usize = 3;

const FREQUENT_ACCESS_THRESHOLD: u32 = 10;
const HIGH_SIMILARITY: f32 = 0.7;
const MODERATE_SIMILARITY: f32 = 0.5;

/// Why a table showed up in search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RelevanceReason {
    TableNameMentioned,
    ColumnMentioned(String),
    FrequentlyAccessed,
    RecentlyUsed,
    HighSimilarity,
    ModerateSimilarity,
    LowSimilarity,
}

impl std::fmt::Display for RelevanceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelevanceReason::TableNameMentioned => write!(f, "table name mentioned in query"),
            RelevanceReason::ColumnMentioned(col) => write!(f, "column '{}' mentioned in query", col),
            RelevanceReason::FrequentlyAccessed => write!(f, "frequently accessed table"),
            RelevanceReason::RecentlyUsed => write!(f, "recently used table"),
            RelevanceReason::HighSimilarity => write!(f, "high semantic similarity"),
            RelevanceReason::ModerateSimilarity => write!(f, "moderate semantic similarity"),
            RelevanceReason::LowSimilarity => write!(f, "low semantic similarity"),
        }
    }
}

/// A ranked search hit
#[derive(Debug, Clone, Serialize)]
pub struct TableMatch {
    pub table: TableEmbedding,
    pub similarity: f32,
    pub reason: RelevanceReason,
}

/// Outcome of a full refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub indexed: Vec<String>,
    pub failed: Vec<String>,
}

/// Index statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub tables: usize,
    pub patterns: usize,
}

/// Schema index over one connection's store
#[derive(Clone)]
pub struct SchemaIndex {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
}

impl SchemaIndex {
    pub fn new(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Re-embed every table the database reports.
    ///
    /// Tables that cannot be described are logged and reported as failed;
    /// the rest are still indexed. Only a failure to list tables is fatal.
    pub async fn refresh(&self, db: &dyn Database) -> Result<RefreshReport> {
        let tables = db.list_tables().await?;
        let mut report = RefreshReport::default();

        for name in tables {
            match self.index_table(db, &name).await {
                Ok(_) => report.indexed.push(name),
                Err(e) => {
                    warn!("Failed to index table {}: {}", name, e);
                    report.failed.push(name);
                }
            }
        }

        info!(
            "Indexed {} tables ({} failed)",
            report.indexed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Describe, sample, embed and upsert a single table
    pub async fn index_table(&self, db: &dyn Database, name: &str) -> Result<TableEmbedding> {
        let schema = db.describe_table(name).await?;
        let description = table_description(&schema);

        let sample_data = match db.execute(&sample_query(name, SAMPLE_ROWS)).await {
            Ok(rows) => format_sample(&rows),
            Err(e) => {
                debug!("No sample rows for {}: {}", name, e);
                String::new()
            }
        };

        let record = TableEmbedding {
            table_name: name.to_string(),
            vector: self.embedder.embed(&description),
            description,
            columns: schema.column_names(),
            column_types: schema.column_types(),
            sample_data,
            last_updated: Utc::now(),
            access_count: 0,
            last_accessed: None,
        };

        self.store.upsert_table_embedding(&record)?;
        Ok(record)
    }

    /// Rank every indexed table against `query`.
    ///
    /// Sorted by similarity, highest first; equal scores keep index order.
    /// A `limit` of 0 returns everything.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<TableMatch>> {
        self.search_at(query, limit, Utc::now())
    }

    fn search_at(&self, query: &str, limit: usize, now: DateTime<Utc>) -> Result<Vec<TableMatch>> {
        let query_vector = self.embedder.embed(query);
        let query_lower = query.to_lowercase();

        let mut matches: Vec<TableMatch> = self
            .store
            .all_table_embeddings()?
            .into_iter()
            .map(|table| {
                let similarity = cosine_similarity(&query_vector, &table.vector);
                let reason = relevance_reason(&query_lower, &table, similarity, now);
                TableMatch { table, similarity, reason }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if limit > 0 {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    /// Mark tables as used
    pub fn record_access(&self, tables: &[String]) -> Result<()> {
        let now = Utc::now();
        for table in tables {
            if !self.store.record_table_access(table, now)? {
                debug!("Access recorded for unindexed table {}", table);
            }
        }
        Ok(())
    }

    /// Most recently used tables, newest first
    pub fn recently_accessed(&self, limit: usize) -> Result<Vec<String>> {
        self.store.recent_tables(limit)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            tables: self.store.count_table_embeddings()?,
            patterns: self.store.count_query_patterns()?,
        })
    }
}

fn relevance_reason(
    query_lower: &str,
    table: &TableEmbedding,
    similarity: f32,
    now: DateTime<Utc>,
) -> RelevanceReason {
    if query_lower.contains(&table.table_name.to_lowercase()) {
        return RelevanceReason::TableNameMentioned;
    }

    if let Some(col) = table
        .columns
        .iter()
        .find(|col| query_lower.contains(&col.to_lowercase()))
    {
        return RelevanceReason::ColumnMentioned(col.clone());
    }

    if table.access_count > FREQUENT_ACCESS_THRESHOLD {
        return RelevanceReason::FrequentlyAccessed;
    }

    if table
        .last_accessed
        .is_some_and(|at| now.signed_duration_since(at) < Duration::hours(24))
    {
        return RelevanceReason::RecentlyUsed;
    }

    if similarity > HIGH_SIMILARITY {
        RelevanceReason::HighSimilarity
    } else if similarity > MODERATE_SIMILARITY {
        RelevanceReason::ModerateSimilarity
    } else {
        RelevanceReason::LowSimilarity
    }
}

/// Text embedded for a table: its name, every column and every foreign key
pub fn table_description(schema: &TableSchema) -> String {
    let mut parts = vec![format!("Table: {}", schema.name)];

    for col in &schema.columns {
        parts.push(format!("Column: {} ({})", col.name, col.data_type));
    }
    for fk in &schema.foreign_keys {
        parts.push(format!(
            "Foreign key: {} references {}.{}",
            fk.column, fk.referenced_table, fk.referenced_column
        ));
    }

    parts.join(". ")
}

/// Sample rows as `a, b; c, d`
pub fn format_sample(rows: &[Row]) -> String {
    rows.iter()
        .map(|row| row.join(", "))
        .collect::<Vec<_>>()
        .join("; ")
}
