//! SQLite storage implementation

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use crate::{Error, Result};
use super::records::{DailyUsage, ProviderUsage, QueryPattern, TableEmbedding, UsageRecord, UsageTotals};
use super::schema;

/// SQLite-backed store for table embeddings, query patterns and usage rows.
///
/// The connection sits behind a mutex that is held for exactly one
/// statement or one transaction, so background writers and the interactive
/// path can share a single `Arc<SqliteStore>`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a store file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the store schema
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    // ========== Table Embedding Operations ==========

    /// Insert or refresh a table's embedding.
    ///
    /// Access statistics of an existing row are left untouched.
    pub fn upsert_table_embedding(&self, table: &TableEmbedding) -> Result<()> {
        let columns = serde_json::to_string(&table.columns)?;
        let column_types = serde_json::to_string(&table.column_types)?;

        self.conn()?.execute(
            r#"
            INSERT INTO table_embeddings
                (table_name, description, columns, column_types, sample_data, vector, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(table_name) DO UPDATE SET
                description = excluded.description,
                columns = excluded.columns,
                column_types = excluded.column_types,
                sample_data = excluded.sample_data,
                vector = excluded.vector,
                last_updated = excluded.last_updated
            "#,
            params![
                table.table_name,
                table.description,
                columns,
                column_types,
                table.sample_data,
                vector_to_blob(&table.vector),
                table.last_updated,
            ],
        )?;
        Ok(())
    }

    /// Get one table's embedding
    pub fn get_table_embedding(&self, table_name: &str) -> Result<Option<TableEmbedding>> {
        self.conn()?
            .query_row(
                "SELECT table_name, description, columns, column_types, sample_data, vector,
                        last_updated, access_count, last_accessed
                 FROM table_embeddings WHERE table_name = ?1",
                [table_name],
                row_to_table_embedding,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All table embeddings in insertion order
    pub fn all_table_embeddings(&self) -> Result<Vec<TableEmbedding>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT table_name, description, columns, column_types, sample_data, vector,
                    last_updated, access_count, last_accessed
             FROM table_embeddings ORDER BY id",
        )?;

        let tables = stmt
            .query_map([], row_to_table_embedding)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tables)
    }

    /// Bump a table's access count and stamp its access time.
    ///
    /// Single UPDATE, so concurrent callers never lose an increment.
    /// Returns false when the table is not indexed.
    pub fn record_table_access(&self, table_name: &str, at: DateTime<Utc>) -> Result<bool> {
        let updated = self.conn()?.execute(
            "UPDATE table_embeddings
             SET access_count = access_count + 1, last_accessed = ?2
             WHERE table_name = ?1",
            params![table_name, at],
        )?;
        Ok(updated > 0)
    }

    /// Most recently accessed tables, newest first
    pub fn recent_tables(&self, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT table_name FROM table_embeddings
             WHERE last_accessed IS NOT NULL
             ORDER BY last_accessed DESC, table_name
             LIMIT ?1",
        )?;

        let tables = stmt
            .query_map([limit as i64], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(tables)
    }

    /// Count indexed tables
    pub fn count_table_embeddings(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM table_embeddings")
    }

    // ========== Query Pattern Operations ==========

    /// Append a query pattern, returning its row id
    pub fn insert_query_pattern(&self, pattern: &QueryPattern) -> Result<i64> {
        let tables = serde_json::to_string(&pattern.tables)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO query_patterns
                (query_text, tables, vector, success_weight, use_count, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                pattern.query_text,
                tables,
                vector_to_blob(&pattern.vector),
                pattern.success_weight,
                pattern.use_count,
                pattern.created_at,
                pattern.updated_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Latest query patterns, newest first
    pub fn recent_query_patterns(&self, limit: usize) -> Result<Vec<QueryPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, query_text, tables, vector, success_weight, use_count, created_at, updated_at
             FROM query_patterns ORDER BY updated_at DESC, id DESC LIMIT ?1",
        )?;

        let patterns = stmt
            .query_map([limit as i64], |row| {
                let blob: Vec<u8> = row.get(3)?;
                Ok(QueryPattern {
                    id: row.get(0)?,
                    query_text: row.get(1)?,
                    tables: json_list(row, 2)?,
                    vector: blob_to_vector(&blob),
                    success_weight: row.get(4)?,
                    use_count: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(patterns)
    }

    /// Count query patterns
    pub fn count_query_patterns(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM query_patterns")
    }

    // ========== Usage Operations ==========

    /// Append a usage detail row
    pub fn insert_usage(&self, record: &UsageRecord) -> Result<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO usage_details
                (session_id, provider, model, input_tokens, output_tokens, cost,
                 request_time, request_date, user_message, ai_response, system_prompt)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.session_id,
                record.provider,
                record.model,
                record.input_tokens,
                record.output_tokens,
                record.cost,
                record.request_time,
                super::date_key(record.date()),
                record.user_message,
                record.ai_response,
                record.system_prompt,
            ],
        )?;
        Ok(())
    }

    /// Roll every detail row dated before `date` into daily_usage_stats and
    /// drop those rows. Returns the number of detail rows consumed.
    ///
    /// Aggregate and delete share one transaction, and daily rows are
    /// replaced rather than added to, so repeating the call is harmless.
    pub fn rollover_usage(&self, date: &str) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO daily_usage_stats
                (date, provider, model, total_requests, input_tokens, output_tokens, total_cost)
            SELECT request_date, provider, model,
                   COUNT(*), SUM(input_tokens), SUM(output_tokens), SUM(cost)
            FROM usage_details
            WHERE request_date < ?1
            GROUP BY request_date, provider, model
            "#,
            [date],
        )?;
        let consumed = tx.execute("DELETE FROM usage_details WHERE request_date < ?1", [date])?;

        tx.commit()?;
        Ok(consumed)
    }

    /// Whether any detail row is dated before `date`
    pub fn has_usage_before(&self, date: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT 1 FROM usage_details WHERE request_date < ?1 LIMIT 1",
                [date],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Per-day usage between two dates (inclusive), combining rolled-up
    /// days with detail rows not yet aggregated. Newest day first.
    pub fn daily_usage_between(&self, start: &str, end: &str) -> Result<Vec<DailyUsage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT date, provider, model, SUM(requests), SUM(inp), SUM(outp), SUM(cost)
            FROM (
                SELECT date, provider, model, total_requests AS requests,
                       input_tokens AS inp, output_tokens AS outp, total_cost AS cost
                FROM daily_usage_stats WHERE date BETWEEN ?1 AND ?2
                UNION ALL
                SELECT request_date, provider, model, 1, input_tokens, output_tokens, cost
                FROM usage_details WHERE request_date BETWEEN ?1 AND ?2
            )
            GROUP BY date, provider, model
            ORDER BY date DESC, provider, model
            "#,
        )?;

        let days = stmt
            .query_map([start, end], |row| {
                Ok(DailyUsage {
                    date: row.get(0)?,
                    provider: row.get(1)?,
                    model: row.get(2)?,
                    total_requests: row.get::<_, i64>(3)? as u64,
                    input_tokens: row.get::<_, i64>(4)? as u64,
                    output_tokens: row.get::<_, i64>(5)? as u64,
                    total_cost: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(days)
    }

    /// Usage per provider and model since `start` (inclusive), costliest first
    pub fn provider_usage_since(&self, start: &str) -> Result<Vec<ProviderUsage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT provider, model, SUM(requests), SUM(inp), SUM(outp), SUM(cost) AS spent
            FROM (
                SELECT provider, model, total_requests AS requests,
                       input_tokens AS inp, output_tokens AS outp, total_cost AS cost
                FROM daily_usage_stats WHERE date >= ?1
                UNION ALL
                SELECT provider, model, 1, input_tokens, output_tokens, cost
                FROM usage_details WHERE request_date >= ?1
            )
            GROUP BY provider, model
            ORDER BY spent DESC, provider, model
            "#,
        )?;

        let usage = stmt
            .query_map([start], |row| {
                Ok(ProviderUsage {
                    provider: row.get(0)?,
                    model: row.get(1)?,
                    totals: UsageTotals {
                        requests: row.get::<_, i64>(2)? as u64,
                        input_tokens: row.get::<_, i64>(3)? as u64,
                        output_tokens: row.get::<_, i64>(4)? as u64,
                        cost: row.get(5)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(usage)
    }

    /// Detail rows of one day in request order
    pub fn usage_details_for_date(&self, date: &str) -> Result<Vec<UsageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, provider, model, input_tokens, output_tokens, cost,
                    request_time, user_message, ai_response, system_prompt
             FROM usage_details WHERE request_date = ?1 ORDER BY request_time, id",
        )?;

        let records = stmt
            .query_map([date], |row| {
                Ok(UsageRecord {
                    session_id: row.get(0)?,
                    provider: row.get(1)?,
                    model: row.get(2)?,
                    input_tokens: row.get(3)?,
                    output_tokens: row.get(4)?,
                    cost: row.get(5)?,
                    request_time: row.get(6)?,
                    user_message: row.get(7)?,
                    ai_response: row.get(8)?,
                    system_prompt: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Count usage detail rows
    pub fn count_usage_details(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM usage_details")
    }

    /// Count daily roll-up rows
    pub fn count_daily_usage(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM daily_usage_stats")
    }

    // ========== Bulk Operations ==========

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            tables: self.count_table_embeddings()?,
            patterns: self.count_query_patterns()?,
            usage_details: self.count_usage_details()?,
            daily_rollups: self.count_daily_usage()?,
        })
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Helper to convert a row to a TableEmbedding
fn row_to_table_embedding(row: &rusqlite::Row) -> rusqlite::Result<TableEmbedding> {
    let blob: Vec<u8> = row.get(5)?;
    Ok(TableEmbedding {
        table_name: row.get(0)?,
        description: row.get(1)?,
        columns: json_list(row, 2)?,
        column_types: json_list(row, 3)?,
        sample_data: row.get(4)?,
        vector: blob_to_vector(&blob),
        last_updated: row.get(6)?,
        access_count: row.get(7)?,
        last_accessed: row.get(8)?,
    })
}

fn json_list(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Vectors are stored as little-endian f32 blobs
fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub tables: usize,
    pub patterns: usize,
    pub usage_details: usize,
    pub daily_rollups: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Store Statistics:")?;
        writeln!(f, "  Indexed tables: {}", self.tables)?;
        writeln!(f, "  Query patterns: {}", self.patterns)?;
        writeln!(f, "  Usage rows (pending): {}", self.usage_details)?;
        writeln!(f, "  Daily roll-ups: {}", self.daily_rollups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_table(name: &str) -> TableEmbedding {
        TableEmbedding {
            table_name: name.to_string(),
            description: format!("Table: {}", name),
            columns: vec!["id".to_string(), "name".to_string()],
            column_types: vec!["INTEGER".to_string(), "TEXT".to_string()],
            sample_data: String::new(),
            vector: vec![0.1, 0.2, 0.3, 0.4],
            last_updated: Utc::now(),
            access_count: 0,
            last_accessed: None,
        }
    }

    fn usage_at(time: DateTime<Utc>, input: u32, output: u32, cost: f64) -> UsageRecord {
        UsageRecord {
            session_id: "session_test".to_string(),
            provider: "openrouter".to_string(),
            model: "openai/gpt-4o".to_string(),
            input_tokens: input,
            output_tokens: output,
            cost,
            request_time: time,
            user_message: Some("hi".to_string()),
            ai_response: Some("hello".to_string()),
            system_prompt: None,
        }
    }

    #[test]
    fn test_table_embedding_crud() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_table_embedding(&sample_table("users")).unwrap();

        let retrieved = store.get_table_embedding("users").unwrap().unwrap();
        assert_eq!(retrieved.columns, vec!["id", "name"]);
        assert_eq!(retrieved.vector.len(), 4);
        assert!((retrieved.vector[0] - 0.1).abs() < 0.001);
        assert!(store.get_table_embedding("missing").unwrap().is_none());
    }

    #[test]
    fn test_upsert_preserves_access_stats() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_table_embedding(&sample_table("users")).unwrap();
        assert!(store.record_table_access("users", Utc::now()).unwrap());
        assert!(store.record_table_access("users", Utc::now()).unwrap());

        let mut refreshed = sample_table("users");
        refreshed.description = "Table: users. Column: email (TEXT)".to_string();
        store.upsert_table_embedding(&refreshed).unwrap();

        let retrieved = store.get_table_embedding("users").unwrap().unwrap();
        assert_eq!(retrieved.description, refreshed.description);
        assert_eq!(retrieved.access_count, 2);
        assert!(retrieved.last_accessed.is_some());
        assert_eq!(store.count_table_embeddings().unwrap(), 1);
    }

    #[test]
    fn test_record_access_unknown_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.record_table_access("ghost", Utc::now()).unwrap());
    }

    #[test]
    fn test_recent_tables_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        for name in ["a", "b", "c"] {
            store.upsert_table_embedding(&sample_table(name)).unwrap();
        }
        let base = Utc::now();
        store.record_table_access("b", base - Duration::minutes(5)).unwrap();
        store.record_table_access("c", base).unwrap();

        assert_eq!(store.recent_tables(10).unwrap(), vec!["c", "b"]);
        assert_eq!(store.recent_tables(1).unwrap(), vec!["c"]);
    }

    #[test]
    fn test_query_patterns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let pattern = QueryPattern::new("count orders", vec!["orders".to_string()], vec![1.0, 0.0]);
        let id = store.insert_query_pattern(&pattern).unwrap();
        assert!(id > 0);

        let patterns = store.recent_query_patterns(5).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].tables, vec!["orders"]);
        assert_eq!(patterns[0].use_count, 1);
        assert_eq!(store.count_query_patterns().unwrap(), 1);
    }

    #[test]
    fn test_rollover_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let day = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        store.insert_usage(&usage_at(day, 100, 50, 0.5)).unwrap();
        store.insert_usage(&usage_at(day + Duration::hours(2), 10, 5, 0.25)).unwrap();

        assert!(store.has_usage_before("2024-03-11").unwrap());
        assert_eq!(store.rollover_usage("2024-03-11").unwrap(), 2);
        let first = store.daily_usage_between("2024-03-10", "2024-03-10").unwrap();

        assert_eq!(store.rollover_usage("2024-03-11").unwrap(), 0);
        let second = store.daily_usage_between("2024-03-10", "2024-03-10").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].total_requests, 2);
        assert_eq!(first[0].input_tokens, 110);
        assert_eq!(first[0].output_tokens, 55);
        assert!((first[0].total_cost - 0.75).abs() < 1e-9);
        assert_eq!(store.count_usage_details().unwrap(), 0);
    }

    #[test]
    fn test_daily_usage_merges_pending_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let day = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        store.insert_usage(&usage_at(day, 100, 50, 0.5)).unwrap();
        store.rollover_usage("2024-03-11").unwrap();
        store.insert_usage(&usage_at(day + Duration::days(1), 1, 1, 0.01)).unwrap();

        let days = store.daily_usage_between("2024-03-01", "2024-03-31").unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, "2024-03-11");
        assert_eq!(days[1].date, "2024-03-10");

        let providers = store.provider_usage_since("2024-03-01").unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].totals.requests, 2);
        assert_eq!(providers[0].totals.total_tokens(), 152);
    }

    #[test]
    fn test_stats_display() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_table_embedding(&sample_table("users")).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.tables, 1);
        assert!(stats.to_string().contains("Indexed tables: 1"));
    }
}
