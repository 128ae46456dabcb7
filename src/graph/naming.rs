//! Name-based relationship heuristics
//!
//! Each heuristic is a pure predicate `(table, candidate) -> bool`. They are
//! tried in [`HEURISTICS`] order and the first hit names the relation kind.

use super::RelationKind;

/// Suffixes stripped (first match only) before taking a table's base word
const BASE_WORD_SUFFIXES: &[&str] = &["s", "es", "ies", "_table", "_data", "_info"];

/// Substrings that suggest a linking table
const JUNCTION_MARKERS: &[&str] = &["_", "2", "to", "has", "belongs"];

pub type Heuristic = fn(&str, &str) -> bool;

/// Naming heuristics in precedence order
pub const HEURISTICS: &[(RelationKind, Heuristic)] = &[
    (RelationKind::SharedPrefix, shares_prefix),
    (RelationKind::SharedBaseWord, shares_base_word),
    (RelationKind::Junction, is_junction),
];

/// First `_`-separated token, only for names that contain `_`
pub fn table_prefix(name: &str) -> Option<&str> {
    name.split_once('_').map(|(prefix, _)| prefix)
}

/// Main concept of a table name: `order_items` -> `order`, `users` -> `user`
pub fn base_word(name: &str) -> String {
    let mut lower = name.to_lowercase();
    if let Some(suffix) = BASE_WORD_SUFFIXES.iter().find(|s| lower.ends_with(*s)) {
        lower.truncate(lower.len() - suffix.len());
    }
    match lower.split_once('_') {
        Some((head, _)) => head.to_string(),
        None => lower,
    }
}

/// `user_profiles` and `user_settings` share the `user` prefix
pub fn shares_prefix(table: &str, candidate: &str) -> bool {
    match (table_prefix(table), table_prefix(candidate)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// `orders` and `order_items` share the base word `order`
pub fn shares_base_word(table: &str, candidate: &str) -> bool {
    let base = base_word(table);
    !base.is_empty() && base == base_word(candidate)
}

/// `users` and `role2user` look like a junction
pub fn is_junction(table: &str, candidate: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let table = table.to_lowercase();

    let mut base = base_word(&table);
    if base.is_empty() {
        base = table.clone();
    }

    let mentions_table = candidate.contains(&base) || candidate.contains(&table);
    mentions_table && JUNCTION_MARKERS.iter().any(|m| candidate.contains(m))
}

/// Kind of the first heuristic relating `table` to `candidate`, if any
pub fn naming_relation(table: &str, candidate: &str) -> Option<RelationKind> {
    HEURISTICS
        .iter()
        .find(|(_, predicate)| predicate(table, candidate))
        .map(|(kind, _)| *kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_prefix() {
        assert_eq!(table_prefix("user_profiles"), Some("user"));
        assert_eq!(table_prefix("users"), None);
    }

    #[test]
    fn test_base_word() {
        assert_eq!(base_word("users"), "user");
        assert_eq!(base_word("order_items"), "order");
        assert_eq!(base_word("Customer_Data"), "customer");
        assert_eq!(base_word("audit"), "audit");
        // only the first listed suffix that matches is stripped
        assert_eq!(base_word("categories"), "categorie");
    }

    #[test]
    fn test_shares_prefix() {
        assert!(shares_prefix("user_profiles", "user_settings"));
        assert!(!shares_prefix("users", "user_settings"));
        assert!(!shares_prefix("order_items", "user_settings"));
    }

    #[test]
    fn test_shares_base_word() {
        assert!(shares_base_word("orders", "order_items"));
        assert!(!shares_base_word("orders", "users"));
        assert!(!shares_base_word("s", "es"));
    }

    #[test]
    fn test_is_junction() {
        assert!(is_junction("users", "role2user"));
        assert!(is_junction("roles", "user_roles"));
        assert!(is_junction("users", "team_has_user"));
        assert!(!is_junction("users", "orders"));
        assert!(!is_junction("users", "superuser"));
    }

    #[test]
    fn test_naming_relation_precedence() {
        assert_eq!(naming_relation("user_profiles", "user_roles"), Some(RelationKind::SharedPrefix));
        assert_eq!(naming_relation("orders", "order_items"), Some(RelationKind::SharedBaseWord));
        assert_eq!(naming_relation("roles", "user_roles"), Some(RelationKind::Junction));
        assert_eq!(naming_relation("orders", "users"), None);
    }
}
