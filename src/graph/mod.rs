//! Relationship Graph - which tables relate to which
//!
//! Relations are derived on demand from the database: explicit foreign keys,
//! reverse foreign keys (found by describing every table), and the naming
//! heuristics in [`naming`]. Nothing is cached across calls.

pub mod naming;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use serde::Serialize;
use tracing::debug;
use crate::Result;
use crate::database::{Database, TableSchema};

/// How two tables are related
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelationKind {
    /// `from` has a foreign key to `to`
    ForeignKey,
    /// `to` has a foreign key to `from`
    ReferencedBy,
    SharedPrefix,
    SharedBaseWord,
    Junction,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::ForeignKey => "foreign_key",
            RelationKind::ReferencedBy => "referenced_by",
            RelationKind::SharedPrefix => "shared_prefix",
            RelationKind::SharedBaseWord => "shared_base_word",
            RelationKind::Junction => "junction",
        }
    }

    /// Backed by an actual constraint rather than a naming guess
    pub fn is_foreign_key(&self) -> bool {
        matches!(self, RelationKind::ForeignKey | RelationKind::ReferencedBy)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed relation between two tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
    /// Foreign key column, on whichever side holds it
    pub via_column: Option<String>,
}

impl Relation {
    fn new(from: &str, to: &str, kind: RelationKind, via_column: Option<&str>) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            via_column: via_column.map(str::to_string),
        }
    }
}

/// Per-call memo of describe results; `None` marks a failed describe
struct DescribeCache<'a> {
    db: &'a dyn Database,
    schemas: HashMap<String, Option<TableSchema>>,
}

impl<'a> DescribeCache<'a> {
    fn new(db: &'a dyn Database) -> Self {
        Self { db, schemas: HashMap::new() }
    }

    async fn get(&mut self, table: &str) -> Option<&TableSchema> {
        if !self.schemas.contains_key(table) {
            let schema = match self.db.describe_table(table).await {
                Ok(schema) => Some(schema),
                Err(e) => {
                    debug!("Skipping relations of {}: {}", table, e);
                    None
                }
            };
            self.schemas.insert(table.to_string(), schema);
        }
        self.schemas.get(table).and_then(Option::as_ref)
    }
}

/// Relationship discovery over a database connection
#[derive(Clone)]
pub struct RelationshipGraph {
    db: Arc<dyn Database>,
}

impl RelationshipGraph {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Related table names for each input table.
    ///
    /// Tables without any relation are left out of the map.
    pub async fn related_to(&self, tables: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
        let relations = self.relations(tables, true).await?;
        Ok(relations
            .into_iter()
            .map(|(table, rels)| (table, rels.into_iter().map(|r| r.to).collect()))
            .collect())
    }

    /// Typed relations of a single table
    pub async fn relations_for(&self, table: &str) -> Result<Vec<Relation>> {
        let mut relations = self.relations(&[table.to_string()], true).await?;
        Ok(relations.remove(table).unwrap_or_default())
    }

    /// Foreign-key relations (both directions) for every table
    pub async fn relationship_map(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let all_tables = self.db.list_tables().await?;
        let relations = self.relations(&all_tables, false).await?;
        Ok(relations
            .into_iter()
            .map(|(table, rels)| (table, rels.into_iter().map(|r| r.to).collect()))
            .collect())
    }

    /// Tables related to the seeds, best connected first.
    ///
    /// A candidate scores 1 for its first seed and 2 more for every further
    /// seed relating to it. Seeds themselves are never returned.
    pub async fn ranked_related_for(&self, seeds: &[String], max: usize) -> Result<Vec<String>> {
        let related = self.related_to(seeds).await?;

        let mut scores: HashMap<String, u32> = HashMap::new();
        for candidates in related.values() {
            for candidate in candidates {
                if seeds.contains(candidate) {
                    continue;
                }
                scores
                    .entry(candidate.clone())
                    .and_modify(|score| *score += 2)
                    .or_insert(1);
            }
        }

        let mut ranked: Vec<(String, u32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(ranked.into_iter().take(max).map(|(name, _)| name).collect())
    }

    async fn relations(
        &self,
        tables: &[String],
        with_naming: bool,
    ) -> Result<BTreeMap<String, Vec<Relation>>> {
        let all_tables = self.db.list_tables().await?;
        let mut cache = DescribeCache::new(self.db.as_ref());
        let mut result = BTreeMap::new();

        for table in tables {
            let mut relations: Vec<Relation> = Vec::new();

            if let Some(schema) = cache.get(table).await {
                for fk in &schema.foreign_keys {
                    relations.push(Relation::new(
                        table,
                        &fk.referenced_table,
                        RelationKind::ForeignKey,
                        Some(&fk.column),
                    ));
                }
            }

            for other in all_tables.iter().filter(|t| *t != table) {
                if let Some(schema) = cache.get(other).await {
                    if let Some(fk) = schema.foreign_key_to(table) {
                        relations.push(Relation::new(
                            table,
                            other,
                            RelationKind::ReferencedBy,
                            Some(&fk.column),
                        ));
                    }
                }
            }

            if with_naming {
                for candidate in all_tables.iter().filter(|t| *t != table) {
                    if let Some(kind) = naming::naming_relation(table, candidate) {
                        relations.push(Relation::new(table, candidate, kind, None));
                    }
                }
            }

            let relations = dedup_relations(table, relations);
            if !relations.is_empty() {
                result.insert(table.clone(), relations);
            }
        }

        Ok(result)
    }
}

/// Keep the first relation per target and drop self-relations
fn dedup_relations(table: &str, relations: Vec<Relation>) -> Vec<Relation> {
    let mut seen: Vec<String> = Vec::new();
    relations
        .into_iter()
        .filter(|rel| {
            if rel.to == table || seen.contains(&rel.to) {
                false
            } else {
                seen.push(rel.to.clone());
                true
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{ColumnInfo, ForeignKey};
    use crate::testkit::{self, MemoryDatabase};

    fn names(tables: &[&str]) -> Vec<String> {
        tables.iter().map(|t| t.to_string()).collect()
    }

    fn graph(db: MemoryDatabase) -> RelationshipGraph {
        RelationshipGraph::new(Arc::new(db))
    }

    fn table(name: &str) -> TableSchema {
        TableSchema::new(name).with_column(ColumnInfo::new("id", "INTEGER", false).with_key("PRI"))
    }

    #[tokio::test]
    async fn test_fk_discovery_both_directions() {
        let graph = graph(testkit::shop_database());

        let from_orders = graph.related_to(&names(&["orders"])).await.unwrap();
        assert_eq!(from_orders.get("orders"), Some(&names(&["users"])));
        assert_eq!(from_orders.len(), 1);

        let from_users = graph.related_to(&names(&["users"])).await.unwrap();
        assert_eq!(from_users.get("users"), Some(&names(&["orders"])));
    }

    #[tokio::test]
    async fn test_fk_symmetry_across_schema() {
        let db = MemoryDatabase::new()
            .with_table(table("customers"))
            .with_table(table("products"))
            .with_table(
                table("line_items")
                    .with_foreign_key(ForeignKey::new("customer_id", "customers", "id"))
                    .with_foreign_key(ForeignKey::new("product_id", "products", "id")),
            );
        let graph = graph(db);

        for (a, b) in [("line_items", "customers"), ("line_items", "products")] {
            let forward = graph.related_to(&names(&[a])).await.unwrap();
            assert!(forward[a].contains(&b.to_string()));
            let backward = graph.related_to(&names(&[b])).await.unwrap();
            assert!(backward[b].contains(&a.to_string()));
        }
    }

    #[tokio::test]
    async fn test_never_related_to_self() {
        let db = MemoryDatabase::new().with_table(
            table("employees").with_foreign_key(ForeignKey::new("manager_id", "employees", "id")),
        );
        let related = graph(db).related_to(&names(&["employees"])).await.unwrap();
        assert!(related.is_empty());
    }

    #[tokio::test]
    async fn test_naming_relations_and_dedup() {
        let db = MemoryDatabase::new()
            .with_table(table("orders"))
            .with_table(
                table("order_items").with_foreign_key(ForeignKey::new("order_id", "orders", "id")),
            )
            .with_table(table("order_notes"))
            .with_table(table("users"));
        let graph = graph(db);

        let relations = graph.relations_for("orders").await.unwrap();
        let targets: Vec<(&str, RelationKind)> =
            relations.iter().map(|r| (r.to.as_str(), r.kind)).collect();

        // order_items is both an FK and a name match; the FK wins
        assert_eq!(targets, vec![
            ("order_items", RelationKind::ReferencedBy),
            ("order_notes", RelationKind::SharedBaseWord),
        ]);
        assert_eq!(relations[0].via_column.as_deref(), Some("order_id"));
    }

    #[tokio::test]
    async fn test_describe_failures_are_skipped() {
        let db = testkit::shop_database().with_broken_table("audit_log");
        let graph = graph(db);

        let related = graph.related_to(&names(&["orders", "audit_log"])).await.unwrap();
        assert_eq!(related.get("orders"), Some(&names(&["users"])));
        assert!(!related.contains_key("audit_log"));
    }

    #[tokio::test]
    async fn test_relationship_map_is_fk_only() {
        let db = testkit::shop_database().with_table(table("order_archive"));
        let map = graph(db).relationship_map().await.unwrap();

        assert_eq!(map.get("orders"), Some(&names(&["users"])));
        assert_eq!(map.get("users"), Some(&names(&["orders"])));
        assert!(!map.contains_key("order_archive"));
    }

    #[tokio::test]
    async fn test_ranked_related_scores_shared_targets() {
        let db = MemoryDatabase::new()
            .with_table(table("users"))
            .with_table(table("regions"))
            .with_table(
                table("invoices")
                    .with_foreign_key(ForeignKey::new("user_id", "users", "id"))
                    .with_foreign_key(ForeignKey::new("region_id", "regions", "id")),
            )
            .with_table(table("payments").with_foreign_key(ForeignKey::new("user_id", "users", "id")));
        let graph = graph(db);

        let ranked = graph
            .ranked_related_for(&names(&["invoices", "payments"]), 5)
            .await
            .unwrap();
        assert_eq!(ranked, names(&["users", "regions"]));

        let top = graph.ranked_related_for(&names(&["invoices", "payments"]), 1).await.unwrap();
        assert_eq!(top, names(&["users"]));
    }
}
