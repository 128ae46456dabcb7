//! System prompts for each conversation phase and for one-off questions

use regex::Regex;
use crate::database::TableSchema;
use crate::graph::naming::table_prefix;
use crate::index::TableMatch;
use super::ConversationContext;

/// Index hits shown during discovery
pub const DISCOVERY_RESULTS: usize = 10;
/// Table names listed when the index has nothing to offer
pub const FALLBACK_TABLE_LIMIT: usize = 15;
/// Search hits that also get their column list in a one-off prompt
const DETAILED_RESULTS: usize = 5;
const SAMPLE_SIMILARITY: f32 = 0.8;
/// Below this many tables the whole list fits in a prompt
const SHORT_TABLE_LIST: usize = 10;

const INTRO: &str = "You are an AI assistant helping with SQL queries and database operations. ";

const COMMON_ENTITIES: &[&str] = &[
    "user", "order", "product", "customer", "item", "account", "payment", "transaction", "log", "event",
];

/// Related tables to offer alongside the loaded schemas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedSection {
    pub groups: Vec<RelatedGroup>,
    /// Ranked suggestions not already listed in a group
    pub additional: Vec<String>,
}

impl RelatedSection {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.additional.is_empty()
    }
}

/// Tables related to one loaded table, each with a short note
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedGroup {
    pub source: String,
    pub related: Vec<(String, String)>,
}

pub fn discovery_prompt(ctx: &ConversationContext, all_tables: &[String], matches: &[TableMatch]) -> String {
    let mut prompt = String::from(INTRO);
    prompt.push_str(&format!("The user wants to: {}\n\n", ctx.original_query));

    if all_tables.is_empty() {
        prompt.push_str("No database connection available.\n");
    } else if !matches.is_empty() {
        prompt.push_str(&format!(
            "Database has {} tables total. Most relevant tables for this query:\n\n",
            all_tables.len()
        ));
        for (i, m) in matches.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. **{}** (relevance: {:.2}) - {}\n",
                i + 1,
                m.table.table_name,
                m.similarity,
                m.reason
            ));
        }
    } else {
        prompt.push_str(&format!("Available tables ({} total):\n", all_tables.len()));
        for table in all_tables.iter().take(FALLBACK_TABLE_LIMIT) {
            prompt.push_str(&format!("- {}\n", table));
        }
        if all_tables.len() > FALLBACK_TABLE_LIMIT {
            prompt.push_str(&format!("... and {} more tables\n", all_tables.len() - FALLBACK_TABLE_LIMIT));
        }
    }

    prompt.push_str("\nYour task:\n");
    prompt.push_str("1. Analyze the user's request and identify which tables you need detailed schema information for\n");
    prompt.push_str("2. Respond with: 'I need detailed schema for: [table1], [table2], [table3]' to request specific table structures\n");
    prompt.push_str("3. Be selective - only request tables that are directly relevant to the query\n");
    prompt.push_str("4. If you can answer with the information already provided, do so\n\n");
    prompt.push_str("Important: If you need table schemas, use EXACTLY this format:\n");
    prompt.push_str("'I need detailed schema for: table1, table2, table3'\n");
    prompt
}

pub fn schema_analysis_prompt(ctx: &ConversationContext, related: Option<&RelatedSection>) -> String {
    let mut prompt = String::from("You are an AI assistant helping with SQL queries. ");
    prompt.push_str(&format!("The user wants to: {}\n\n", ctx.original_query));
    prompt.push_str("You have requested detailed schema information. Here are the table structures:\n\n");

    for schema in ctx.loaded_tables.values() {
        prompt.push_str(&format!("## Table: {}\n", schema.name));
        prompt.push_str("Columns:\n");
        for column in &schema.columns {
            let key = column
                .key
                .as_deref()
                .filter(|k| !k.is_empty())
                .map(|k| format!(" [{}]", k))
                .unwrap_or_default();
            prompt.push_str(&format!(
                "- {} ({}) {}{}\n",
                column.name,
                column.data_type,
                nullability(column.nullable),
                key
            ));
        }
        write_foreign_keys(&mut prompt, schema, "Foreign Keys:");
        prompt.push('\n');
    }

    if let Some(section) = related.filter(|s| !s.is_empty()) {
        write_related_section(&mut prompt, section);
    }

    prompt.push_str("Your task:\n");
    prompt.push_str("1. Analyze the provided schemas and relationships\n");
    prompt.push_str("2. If you need information about related tables (via foreign keys), request them using: 'I need schema for related tables: [table1], [table2]'\n");
    prompt.push_str("3. If you have sufficient information, generate the SQL query\n");
    prompt.push_str("4. Include explanations for complex queries\n\n");
    prompt.push_str("Use ```sql blocks for any SQL queries you generate.\n");
    prompt
}

fn write_related_section(prompt: &mut String, section: &RelatedSection) {
    prompt.push_str("## Available Related Tables\n\n");
    prompt.push_str("The following tables are related to your loaded tables and might be useful:\n\n");

    for group in &section.groups {
        prompt.push_str(&format!("**{}** is related to:\n", group.source));
        for (table, note) in &group.related {
            prompt.push_str(&format!("- {} ({})\n", table, note));
        }
        prompt.push('\n');
    }

    if !section.additional.is_empty() {
        prompt.push_str("**Additional potentially relevant tables:**\n");
        for table in &section.additional {
            prompt.push_str(&format!("- {}\n", table));
        }
        prompt.push('\n');
    }

    prompt.push_str("You can request any of these tables by saying: 'I need schema for related tables: table1, table2'\n\n");
}

pub fn sql_generation_prompt(ctx: &ConversationContext) -> String {
    let mut prompt = String::from("You are an AI assistant specialized in SQL query generation. ");
    prompt.push_str(&format!("The user wants to: {}\n\n", ctx.original_query));
    prompt.push_str("You have complete schema information for the following tables:\n\n");

    for schema in ctx.loaded_tables.values() {
        prompt.push_str(&format!("## {}\n", schema.name));
        for column in &schema.columns {
            prompt.push_str(&format!(
                "- {} ({}) {}\n",
                column.name,
                column.data_type,
                nullability(column.nullable)
            ));
        }
        write_foreign_keys(&mut prompt, schema, "Relationships:");
        prompt.push('\n');
    }

    prompt.push_str("Generate the complete SQL query to fulfill the user's request.\n");
    prompt.push_str("Include:\n");
    prompt.push_str("- Proper JOINs based on the foreign key relationships shown above\n");
    prompt.push_str("- Appropriate WHERE clauses and conditions\n");
    prompt.push_str("- Comments explaining complex parts\n\n");
    prompt.push_str("Use a single ```sql block for your query.\n");
    prompt
}

fn nullability(nullable: bool) -> &'static str {
    if nullable { "NULL" } else { "NOT NULL" }
}

fn write_foreign_keys(prompt: &mut String, schema: &TableSchema, heading: &str) {
    if schema.foreign_keys.is_empty() {
        return;
    }
    prompt.push_str(&format!("{}\n", heading));
    for fk in &schema.foreign_keys {
        prompt.push_str(&format!("- {} → {}.{}\n", fk.column, fk.referenced_table, fk.referenced_column));
    }
}

/// Prompt used when no database is attached
pub fn no_database_prompt() -> String {
    let mut prompt = String::from(INTRO);
    prompt.push_str("No database connection available.\n\n");
    push_guidelines(&mut prompt);
    prompt
}

/// One-off prompt built from index search hits
pub fn vector_prompt(all_tables: &[String], matches: &[TableMatch]) -> String {
    let mut prompt = String::from(INTRO);
    prompt.push_str(&format!("You have access to a database with {} total tables. ", all_tables.len()));

    if matches.is_empty() {
        prompt.push_str("No highly relevant tables found for this query. ");
        push_short_table_list(&mut prompt, all_tables);
    } else {
        prompt.push_str("Most relevant tables for this query:\n\n");
        for (i, m) in matches.iter().enumerate() {
            let table = &m.table;
            prompt.push_str(&format!(
                "{}. **{}** (similarity: {:.2}) - {}\n",
                i + 1,
                table.table_name,
                m.similarity,
                m.reason
            ));

            if i < DETAILED_RESULTS && !table.columns.is_empty() {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(j, col)| match table.column_types.get(j) {
                        Some(ty) => format!("{} ({})", col, ty),
                        None => col.clone(),
                    })
                    .collect();
                prompt.push_str(&format!("   Columns: {}\n", columns.join(", ")));
            }

            if m.similarity > SAMPLE_SIMILARITY && !table.sample_data.is_empty() {
                prompt.push_str(&format!("   Sample data: {}\n", table.sample_data));
            }
            prompt.push('\n');
        }

        if all_tables.len() > matches.len() {
            prompt.push_str(&format!(
                "({} additional tables available but not shown for brevity)\n\n",
                all_tables.len() - matches.len()
            ));
        }
    }

    push_guidelines(&mut prompt);
    prompt
}

/// Why a table made the keyword shortlist, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeywordPriority {
    Common,
    Recent,
    Related,
    Mentioned,
}

impl KeywordPriority {
    pub fn label(&self) -> &'static str {
        match self {
            KeywordPriority::Mentioned => "mentioned in query",
            KeywordPriority::Related => "related table",
            KeywordPriority::Recent => "recently used",
            KeywordPriority::Common => "common table",
        }
    }
}

/// Tables named as whole words in the query, in table-list order
pub fn mentioned_tables(query: &str, all_tables: &[String]) -> Vec<String> {
    let query = query.to_lowercase();
    all_tables
        .iter()
        .filter(|table| {
            let pattern = format!(r"\b{}\b", regex::escape(&table.to_lowercase()));
            Regex::new(&pattern).map(|re| re.is_match(&query)).unwrap_or(false)
        })
        .cloned()
        .collect()
}

fn is_common_table_name(table: &str) -> bool {
    let lower = table.to_lowercase();
    COMMON_ENTITIES.iter().any(|entity| lower.contains(entity))
}

/// Shortlist for the keyword prompt: mentioned tables, tables sharing their
/// prefix, recently mentioned tables, then common entity names when the
/// list is still short
pub fn keyword_selection(
    query: &str,
    all_tables: &[String],
    recent: &[String],
    max: usize,
) -> Vec<(String, KeywordPriority)> {
    let mentioned = mentioned_tables(query, all_tables);
    let mut selected: Vec<(String, KeywordPriority)> = Vec::new();
    fn add(table: &str, priority: KeywordPriority, selected: &mut Vec<(String, KeywordPriority)>) {
        if !selected.iter().any(|(name, _)| name == table) {
            selected.push((table.to_string(), priority));
        }
    }

    for table in &mentioned {
        add(table, KeywordPriority::Mentioned, &mut selected);
    }

    for table in &mentioned {
        let Some(prefix) = table_prefix(table) else { continue };
        for candidate in all_tables {
            if table_prefix(candidate) == Some(prefix) && !mentioned.contains(candidate) {
                add(candidate, KeywordPriority::Related, &mut selected);
            }
        }
    }

    for table in recent {
        if all_tables.contains(table) {
            add(table, KeywordPriority::Recent, &mut selected);
        }
    }

    if selected.len() < DETAILED_RESULTS {
        for table in all_tables {
            if selected.len() >= max {
                break;
            }
            if is_common_table_name(table) {
                add(table, KeywordPriority::Common, &mut selected);
            }
        }
    }

    selected.sort_by(|a, b| b.1.cmp(&a.1));
    selected.truncate(max);
    selected
}

/// One-off prompt built from keyword matches, used when the index is unavailable
pub fn keyword_prompt(all_tables: &[String], selection: &[(String, KeywordPriority)]) -> String {
    let mut prompt = String::from(INTRO);

    if selection.is_empty() {
        prompt.push_str(&format!("You have access to a database with {} tables. ", all_tables.len()));
        push_short_table_list(&mut prompt, all_tables);
    } else {
        prompt.push_str(&format!("You have access to a database with {} total tables. ", all_tables.len()));
        prompt.push_str("Most relevant tables for this query:\n\n");
        for (table, priority) in selection {
            prompt.push_str(&format!("- {} ({})\n", table, priority.label()));
        }
        if all_tables.len() > selection.len() {
            prompt.push_str(&format!(
                "\n({} additional tables available but not shown for brevity)\n",
                all_tables.len() - selection.len()
            ));
        }
        prompt.push('\n');
    }

    push_guidelines(&mut prompt);
    prompt
}

fn push_short_table_list(prompt: &mut String, all_tables: &[String]) {
    if all_tables.len() <= SHORT_TABLE_LIST {
        prompt.push_str("Available tables:\n");
        for table in all_tables {
            prompt.push_str(&format!("- {}\n", table));
        }
    } else {
        prompt.push_str("Ask to list the tables to see all of them.\n");
    }
    prompt.push('\n');
}

fn push_guidelines(prompt: &mut String) {
    prompt.push_str("Guidelines:\n");
    prompt.push_str("- Generate accurate SQL queries based on user requests\n");
    prompt.push_str("- Explain your reasoning when helpful\n");
    prompt.push_str("- Suggest optimizations when appropriate\n");
    prompt.push_str("- Ask for clarification if the request is ambiguous\n");
    prompt.push_str("- Consider data types and constraints when generating queries\n\n");
    prompt.push_str("When generating SQL:\n");
    prompt.push_str("- Use ```sql code blocks for SQL queries\n");
    prompt.push_str("- Include comments for complex queries\n");
    prompt.push_str("- Validate against available tables and expected schema\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    fn names(tables: &[&str]) -> Vec<String> {
        tables.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_discovery_fallback_list_is_capped() {
        let ctx = ConversationContext::new("count rows");
        let tables: Vec<String> = (0..20).map(|i| format!("t{:02}", i)).collect();

        let prompt = discovery_prompt(&ctx, &tables, &[]);
        assert!(prompt.contains("The user wants to: count rows"));
        assert!(prompt.contains("Available tables (20 total):"));
        assert!(prompt.contains("- t14\n"));
        assert!(!prompt.contains("- t15\n"));
        assert!(prompt.contains("... and 5 more tables"));
        assert!(prompt.contains("'I need detailed schema for: table1, table2, table3'"));
    }

    #[test]
    fn test_discovery_without_database() {
        let ctx = ConversationContext::new("anything");
        assert!(discovery_prompt(&ctx, &[], &[]).contains("No database connection available."));
    }

    #[test]
    fn test_schema_analysis_lists_columns_in_name_order() {
        let mut ctx = ConversationContext::new("orders per user");
        ctx.add_loaded_table(testkit::users_schema());
        ctx.add_loaded_table(testkit::orders_schema());

        let prompt = schema_analysis_prompt(&ctx, None);
        let orders_at = prompt.find("## Table: orders").unwrap();
        let users_at = prompt.find("## Table: users").unwrap();
        assert!(orders_at < users_at);
        assert!(prompt.contains("- id (INTEGER) NOT NULL [PRI]\n"));
        assert!(prompt.contains("- name (TEXT) NULL\n"));
        assert!(prompt.contains("Foreign Keys:\n- user_id → users.id\n"));
        assert!(!prompt.contains("Available Related Tables"));
    }

    #[test]
    fn test_schema_analysis_related_section() {
        let mut ctx = ConversationContext::new("orders");
        ctx.add_loaded_table(testkit::orders_schema());
        let section = RelatedSection {
            groups: vec![RelatedGroup {
                source: "orders".to_string(),
                related: vec![("users".to_string(), "via foreign key user_id".to_string())],
            }],
            additional: names(&["payments"]),
        };

        let prompt = schema_analysis_prompt(&ctx, Some(&section));
        assert!(prompt.contains("**orders** is related to:\n- users (via foreign key user_id)\n"));
        assert!(prompt.contains("**Additional potentially relevant tables:**\n- payments\n"));
    }

    #[test]
    fn test_sql_generation_prompt() {
        let mut ctx = ConversationContext::new("orders per user");
        ctx.add_loaded_table(testkit::orders_schema());

        let prompt = sql_generation_prompt(&ctx);
        assert!(prompt.contains("## orders\n- id (INTEGER) NOT NULL\n"));
        assert!(prompt.contains("Relationships:\n- user_id → users.id\n"));
        assert!(prompt.contains("```sql"));
    }

    #[test]
    fn test_mentioned_tables_match_whole_words() {
        let tables = names(&["user", "users", "orders"]);
        assert_eq!(mentioned_tables("How many Users placed orders?", &tables), names(&["users", "orders"]));
        assert!(mentioned_tables("superusers", &tables).is_empty());
    }

    #[test]
    fn test_keyword_selection_priorities() {
        let tables = names(&["audit", "order_items", "order_notes", "orders", "settings", "user_accounts"]);
        let recent = names(&["settings", "dropped_table"]);

        let selection = keyword_selection("show order_items", &tables, &recent, 15);
        assert_eq!(selection, vec![
            ("order_items".to_string(), KeywordPriority::Mentioned),
            ("order_notes".to_string(), KeywordPriority::Related),
            ("settings".to_string(), KeywordPriority::Recent),
            ("orders".to_string(), KeywordPriority::Common),
            ("user_accounts".to_string(), KeywordPriority::Common),
        ]);

        let capped = keyword_selection("show order_items", &tables, &recent, 2);
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_keyword_prompt_labels() {
        let tables = names(&["orders", "users"]);
        let selection = vec![("orders".to_string(), KeywordPriority::Mentioned)];
        let prompt = keyword_prompt(&tables, &selection);
        assert!(prompt.contains("- orders (mentioned in query)"));
        assert!(prompt.contains("(1 additional tables available"));
        assert!(prompt.contains("Guidelines:"));
    }
}
