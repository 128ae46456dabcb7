//! Database collaborator - the connection the engine reads schemas from
//!
//! The engine never runs user SQL itself. It only needs three things from
//! a connection: the table list, a table's columns and foreign keys, and a
//! handful of sample rows.

pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::Result;

/// A single result row, every value rendered as text
pub type Row = Vec<String>;

/// Column metadata as reported by the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    /// Key marker such as `PRI`, `UNI`, `FK`
    pub key: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: &str, data_type: &str, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable,
            key: None,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }
}

/// A foreign key from `column` to `referenced_table.referenced_column`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl ForeignKey {
    pub fn new(column: &str, referenced_table: &str, referenced_column: &str) -> Self {
        Self {
            column: column.to_string(),
            referenced_table: referenced_table.to_string(),
            referenced_column: referenced_column.to_string(),
        }
    }
}

/// Full description of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_types(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.data_type.clone()).collect()
    }

    /// First foreign key of this table that points at `table`
    pub fn foreign_key_to(&self, table: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.referenced_table == table)
    }
}

/// Read-only view of a live database connection
#[async_trait]
pub trait Database: Send + Sync {
    /// Names of all user tables
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns and foreign keys of one table
    async fn describe_table(&self, name: &str) -> Result<TableSchema>;

    /// Run a query and collect its rows as text
    async fn execute(&self, sql: &str) -> Result<Vec<Row>>;
}

/// Quote an identifier for use in generated SQL (`"a""b"` style)
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Sample-row query used when building table descriptions
pub fn sample_query(table: &str, limit: usize) -> String {
    format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("orders"), "\"orders\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_table_schema_helpers() {
        let schema = TableSchema::new("orders")
            .with_column(ColumnInfo::new("id", "INTEGER", false).with_key("PRI"))
            .with_column(ColumnInfo::new("user_id", "INTEGER", true))
            .with_foreign_key(ForeignKey::new("user_id", "users", "id"));

        assert_eq!(schema.column_names(), vec!["id", "user_id"]);
        assert_eq!(schema.column_types(), vec!["INTEGER", "INTEGER"]);
        assert_eq!(schema.foreign_key_to("users").map(|fk| fk.column.as_str()), Some("user_id"));
        assert!(schema.foreign_key_to("orders").is_none());
    }
}
