//! Reading table requests and SQL out of model replies

use std::sync::LazyLock;
use regex::Regex;

/// Phrases a model uses to ask for schemas, strictest first.
/// The list runs to the first period or line break.
static REQUEST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"I need detailed schema for:\s*([^.\n]+)",
        r"I need schema for related tables:\s*([^.\n]+)",
        r"Please provide schema for:\s*([^.\n]+)",
        r"Need table structure for:\s*([^.\n]+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static SQL_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)```sql[ \t]*\r?\n(.*?)```").ok());

const NAME_TRIM: &[char] = &['\'', '"', '`', '[', ']', '(', ')', '*'];

/// Table names requested by a reply; the first matching phrase wins
pub fn parse_table_requests(reply: &str) -> Vec<String> {
    REQUEST_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(reply))
        .and_then(|caps| caps.get(1))
        .map(|list| {
            list.as_str()
                .split(',')
                .map(clean_table_name)
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn clean_table_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(NAME_TRIM)
        .trim()
        .to_string()
}

/// Body of the first fenced ```sql block
pub fn extract_sql(reply: &str) -> Option<String> {
    let block = SQL_BLOCK.as_ref()?;
    block
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|sql| sql.as_str().trim().to_string())
        .filter(|sql| !sql.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_variants() {
        assert_eq!(
            parse_table_requests("I need detailed schema for: users, orders"),
            vec!["users", "orders"]
        );
        assert_eq!(
            parse_table_requests("Sure. I need schema for related tables: order_items. Thanks"),
            vec!["order_items"]
        );
        assert_eq!(parse_table_requests("Please provide schema for: payments"), vec!["payments"]);
        assert_eq!(parse_table_requests("Need table structure for: events\nmore"), vec!["events"]);
    }

    #[test]
    fn test_names_are_cleaned() {
        assert_eq!(
            parse_table_requests("'I need detailed schema for: [users], `orders`, \"items\", , '"),
            vec!["users", "orders", "items"]
        );
    }

    #[test]
    fn test_first_pattern_wins() {
        let reply = "Need table structure for: a\nI need detailed schema for: b";
        assert_eq!(parse_table_requests(reply), vec!["b"]);
    }

    #[test]
    fn test_no_request() {
        assert!(parse_table_requests("SELECT * FROM users;").is_empty());
        assert!(parse_table_requests("I need detailed schema for: ").is_empty());
    }

    #[test]
    fn test_extract_sql() {
        let reply = "Here you go:\n```sql\nSELECT u.name\nFROM users u;\n```\nand\n```sql\nSELECT 2;\n```";
        assert_eq!(extract_sql(reply).as_deref(), Some("SELECT u.name\nFROM users u;"));
        assert_eq!(extract_sql("```SQL\nselect 1\n```").as_deref(), Some("select 1"));
        assert!(extract_sql("```\nSELECT 1\n```").is_none());
        assert!(extract_sql("```sql\n\n```").is_none());
    }
}
