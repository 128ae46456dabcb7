//! Storage Layer - SQLite-backed persistence
//!
//! One store per database connection, holding:
//! - table_embeddings(table_name, description, columns, vector, access stats)
//! - query_patterns(query_text, tables, vector, success_weight, use_count)
//! - usage_details(session, provider, model, tokens, cost, request_time)
//! - daily_usage_stats(date, provider, model, totals)
//!
//! Stores live at `<config_dir>/sessions/<connection>/vectors.db`.

pub mod records;
pub mod schema;
pub mod sqlite;

pub use records::{
    DailyUsage, ProviderUsage, QueryPattern, TableEmbedding, UsageRecord, UsageTotals, date_key,
};
pub use sqlite::{SqliteStore, StoreStats};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use crate::Result;

const STORE_FILE: &str = "vectors.db";

/// Location of the store for a named connection
pub fn store_path(config_dir: &Path, connection: &str) -> PathBuf {
    config_dir
        .join("sessions")
        .join(sanitize_connection_name(connection))
        .join(STORE_FILE)
}

/// Pre-sessions location, `<config_dir>/vectors_<connection>.db`
pub fn legacy_store_path(config_dir: &Path, connection: &str) -> PathBuf {
    config_dir.join(format!("vectors_{}.db", sanitize_connection_name(connection)))
}

/// Open (creating if needed) the store for a connection.
///
/// A legacy store file is moved into the sessions layout first. If a
/// sessions store already exists the legacy file is discarded.
pub fn open_for_connection(config_dir: &Path, connection: &str) -> Result<SqliteStore> {
    let path = store_path(config_dir, connection);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    migrate_legacy_store(&legacy_store_path(config_dir, connection), &path)?;

    debug!("Opening store at {}", path.display());
    SqliteStore::open(&path)
}

fn migrate_legacy_store(legacy: &Path, target: &Path) -> Result<()> {
    if !legacy.exists() {
        return Ok(());
    }

    if target.exists() {
        info!("Removing legacy store {} (superseded by {})", legacy.display(), target.display());
        fs::remove_file(legacy)?;
    } else {
        info!("Migrating legacy store {} -> {}", legacy.display(), target.display());
        if fs::rename(legacy, target).is_err() {
            fs::copy(legacy, target)?;
            fs::remove_file(legacy)?;
        }
    }
    Ok(())
}

fn sanitize_connection_name(connection: &str) -> String {
    connection
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_path_layout() {
        let dir = Path::new("/cfg");
        assert_eq!(store_path(dir, "prod"), PathBuf::from("/cfg/sessions/prod/vectors.db"));
        assert_eq!(legacy_store_path(dir, "prod"), PathBuf::from("/cfg/vectors_prod.db"));
        assert_eq!(store_path(dir, "a/b"), PathBuf::from("/cfg/sessions/a_b/vectors.db"));
    }

    #[test]
    fn test_legacy_store_is_moved() {
        let dir = tempdir().unwrap();
        let legacy = legacy_store_path(dir.path(), "shop");
        {
            let store = SqliteStore::open(&legacy).unwrap();
            store
                .insert_query_pattern(&QueryPattern::new("q", vec!["t".to_string()], vec![]))
                .unwrap();
        }

        let store = open_for_connection(dir.path(), "shop").unwrap();
        assert!(!legacy.exists());
        assert!(store_path(dir.path(), "shop").exists());
        assert_eq!(store.count_query_patterns().unwrap(), 1);
    }

    #[test]
    fn test_legacy_store_removed_when_target_exists() {
        let dir = tempdir().unwrap();
        drop(open_for_connection(dir.path(), "shop").unwrap());

        let legacy = legacy_store_path(dir.path(), "shop");
        fs::write(&legacy, b"stale").unwrap();

        let store = open_for_connection(dir.path(), "shop").unwrap();
        assert!(!legacy.exists());
        assert_eq!(store.count_query_patterns().unwrap(), 0);
    }
}
