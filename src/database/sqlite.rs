//! SQLite implementation of the database collaborator

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, types::ValueRef};
use crate::{Error, Result};
use super::{ColumnInfo, Database, ForeignKey, Row, TableSchema, quote_identifier};

/// A user database stored in a SQLite file
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Open a database file
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    /// Run one or more statements, e.g. to create fixtures
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        Ok(found.is_some())
    }

    fn read_columns(conn: &Connection, name: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", quote_identifier(name)))
            .map_err(db_error)?;

        // cid, name, type, notnull, dflt_value, pk
        let columns = stmt
            .query_map([], |row| {
                let column_name: String = row.get(1)?;
                let data_type: String = row.get(2)?;
                let not_null: i64 = row.get(3)?;
                let pk: i64 = row.get(5)?;
                let mut column = ColumnInfo::new(&column_name, &data_type, not_null == 0 && pk == 0);
                if pk > 0 {
                    column = column.with_key("PRI");
                }
                Ok(column)
            })
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;

        Ok(columns)
    }

    fn read_foreign_keys(conn: &Connection, name: &str) -> Result<Vec<ForeignKey>> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA foreign_key_list({})", quote_identifier(name)))
            .map_err(db_error)?;

        // id, seq, table, from, to, on_update, on_delete, match
        let raw: Vec<(String, String, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(2)?, row.get(3)?, row.get(4)?)))
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;

        let mut foreign_keys = Vec::with_capacity(raw.len());
        for (referenced_table, column, referenced_column) in raw {
            // A NULL target column means the parent's primary key
            let referenced_column = match referenced_column {
                Some(col) => col,
                None => Self::primary_key_of(conn, &referenced_table)?
                    .unwrap_or_else(|| "rowid".to_string()),
            };
            foreign_keys.push(ForeignKey::new(&column, &referenced_table, &referenced_column));
        }

        Ok(foreign_keys)
    }

    fn primary_key_of(conn: &Connection, table: &str) -> Result<Option<String>> {
        Ok(Self::read_columns(conn, table)?
            .into_iter()
            .find(|c| c.key.as_deref() == Some("PRI"))
            .map(|c| c.name))
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(db_error)?;

        let tables = stmt
            .query_map([], |row| row.get(0))
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(db_error)?;

        Ok(tables)
    }

    async fn describe_table(&self, name: &str) -> Result<TableSchema> {
        let conn = self.conn()?;
        if !Self::table_exists(&conn, name)? {
            return Err(Error::Database(format!("table '{}' does not exist", name)));
        }

        let mut columns = Self::read_columns(&conn, name)?;
        let foreign_keys = Self::read_foreign_keys(&conn, name)?;

        for column in columns.iter_mut() {
            if column.key.is_none() && foreign_keys.iter().any(|fk| fk.column == column.name) {
                column.key = Some("FK".to_string());
            }
        }

        Ok(TableSchema {
            name: name.to_string(),
            columns,
            foreign_keys,
        })
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(db_error)?;
        let column_count = stmt.column_count();

        let rows = stmt
            .query_map([], |row| {
                (0..column_count)
                    .map(|i| row.get_ref(i).map(render_value))
                    .collect::<rusqlite::Result<Row>>()
            })
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<Row>>>()
            .map_err(db_error)?;

        Ok(rows)
    }
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

fn db_error(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> SqliteDatabase {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.execute_batch(
            r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT);
            CREATE TABLE orders (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                total REAL
            );
            INSERT INTO users (id, name, email) VALUES (1, 'ada', NULL), (2, 'linus', 'l@x.org');
            "#,
        )
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_list_tables() {
        let db = shop();
        assert_eq!(db.list_tables().await.unwrap(), vec!["orders", "users"]);
    }

    #[tokio::test]
    async fn test_describe_table() {
        let db = shop();
        let orders = db.describe_table("orders").await.unwrap();

        assert_eq!(orders.column_names(), vec!["id", "user_id", "total"]);
        assert_eq!(orders.columns[0].key.as_deref(), Some("PRI"));
        assert_eq!(orders.columns[1].key.as_deref(), Some("FK"));
        assert!(!orders.columns[1].nullable);
        assert!(orders.columns[2].nullable);
        assert_eq!(orders.foreign_keys, vec![ForeignKey::new("user_id", "users", "id")]);
    }

    #[tokio::test]
    async fn test_describe_missing_table() {
        let db = shop();
        let err = db.describe_table("nope").await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn test_execute_renders_values() {
        let db = shop();
        let rows = db.execute("SELECT id, name, email FROM users ORDER BY id").await.unwrap();
        assert_eq!(rows, vec![
            vec!["1".to_string(), "ada".to_string(), "NULL".to_string()],
            vec!["2".to_string(), "linus".to_string(), "l@x.org".to_string()],
        ]);
    }
}
