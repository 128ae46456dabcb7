use std::collections::{BTreeMap, VecDeque};
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::database::TableSchema;
use crate::llm::Provider;

/// Conversation phases, in the only order they may be visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    Discovery,
    SchemaAnalysis,
    SqlGeneration,
}

impl ConversationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationPhase::Discovery => "discovery",
            ConversationPhase::SchemaAnalysis => "schema_analysis",
            ConversationPhase::SqlGeneration => "sql_generation",
        }
    }
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One completed exchange with the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub user_message: String,
    pub system_prompt: String,
    pub response: String,
    /// Table names the reply asked for, as written by the model
    pub requested_tables: Vec<String>,
    pub phase: ConversationPhase,
    pub timestamp: DateTime<Utc>,
}

/// State carried across the turns of one natural-language request
#[derive(Debug, Clone, Serialize)]
pub struct ConversationContext {
    pub id: String,
    pub original_query: String,
    pub phase: ConversationPhase,
    /// Tables surfaced by index search during discovery
    pub discovered_tables: Vec<String>,
    /// Full schemas, keyed by table name. Never evicted.
    pub loaded_tables: BTreeMap<String, TableSchema>,
    pub requested_tables: Vec<String>,
    /// Foreign key targets of loaded tables
    pub related_tables: Vec<String>,
    pub history: Vec<ConversationTurn>,
    pub is_complete: bool,
    pub generated_sql: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(query: &str) -> Self {
        let now = Utc::now();
        let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(6).collect();

        Self {
            id: format!("{}_{}", now.format("%Y%m%d_%H%M%S"), suffix),
            original_query: query.to_string(),
            phase: ConversationPhase::Discovery,
            discovered_tables: Vec::new(),
            loaded_tables: BTreeMap::new(),
            requested_tables: Vec::new(),
            related_tables: Vec::new(),
            history: Vec::new(),
            is_complete: false,
            generated_sql: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_table_loaded(&self, table: &str) -> bool {
        self.loaded_tables.contains_key(table)
    }

    /// Loaded table names in name order
    pub fn loaded_table_names(&self) -> Vec<String> {
        self.loaded_tables.keys().cloned().collect()
    }

    /// Store a requested schema and remember its foreign key targets
    pub fn add_loaded_table(&mut self, schema: TableSchema) {
        for fk in &schema.foreign_keys {
            push_unique(&mut self.related_tables, &fk.referenced_table);
        }
        push_unique(&mut self.requested_tables, &schema.name);
        self.loaded_tables.insert(schema.name.clone(), schema);
        self.updated_at = Utc::now();
    }

    pub fn add_discovered(&mut self, tables: &[String]) {
        for table in tables {
            push_unique(&mut self.discovered_tables, table);
        }
    }

    /// Move to `phase` if it is later than the current one; never moves back
    pub fn advance_to(&mut self, phase: ConversationPhase) {
        if phase > self.phase {
            self.phase = phase;
            self.updated_at = Utc::now();
        }
    }

    /// Record a generated query and finish the conversation
    pub fn complete_with_sql(&mut self, sql: String) {
        self.advance_to(ConversationPhase::SqlGeneration);
        self.generated_sql = Some(sql);
        self.is_complete = true;
    }

    pub fn add_turn(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
        self.updated_at = Utc::now();
    }

    pub fn turn_count(&self) -> usize {
        self.history.len()
    }

    pub fn last_requested_tables(&self) -> &[String] {
        self.history
            .last()
            .map(|turn| turn.requested_tables.as_slice())
            .unwrap_or(&[])
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

/// Every chat exchange, successful or not part of a conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptEntry {
    pub timestamp: DateTime<Utc>,
    pub user_message: String,
    pub system_prompt: String,
    pub response: String,
    pub provider: Provider,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
}

pub const PROMPT_HISTORY_SIZE: usize = 100;

/// Ring buffer of the most recent exchanges
#[derive(Debug, Clone)]
pub struct PromptHistory {
    entries: VecDeque<PromptEntry>,
    capacity: usize,
}

impl Default for PromptHistory {
    fn default() -> Self {
        Self::with_capacity(PROMPT_HISTORY_SIZE)
    }
}

impl PromptHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(PROMPT_HISTORY_SIZE)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: PromptEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Oldest first
    pub fn entries(&self) -> impl Iterator<Item = &PromptEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn test_phase_order() {
        assert!(ConversationPhase::Discovery < ConversationPhase::SchemaAnalysis);
        assert!(ConversationPhase::SchemaAnalysis < ConversationPhase::SqlGeneration);
    }

    #[test]
    fn test_advance_never_moves_back() {
        let mut ctx = ConversationContext::new("q");
        ctx.advance_to(ConversationPhase::SchemaAnalysis);
        ctx.advance_to(ConversationPhase::Discovery);
        assert_eq!(ctx.phase, ConversationPhase::SchemaAnalysis);

        ctx.advance_to(ConversationPhase::SqlGeneration);
        assert_eq!(ctx.phase, ConversationPhase::SqlGeneration);
        assert!(!ctx.is_complete);

        ctx.complete_with_sql("SELECT 1".to_string());
        assert_eq!(ctx.phase, ConversationPhase::SqlGeneration);
        assert!(ctx.is_complete);
        assert_eq!(ctx.generated_sql.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_loaded_tables_track_relations() {
        let mut ctx = ConversationContext::new("q");
        ctx.add_loaded_table(testkit::orders_schema());
        ctx.add_loaded_table(testkit::orders_schema());

        assert!(ctx.has_table_loaded("orders"));
        assert_eq!(ctx.requested_tables, vec!["orders"]);
        assert_eq!(ctx.related_tables, vec!["users"]);
    }

    #[test]
    fn test_prompt_history_is_bounded() {
        let mut history = PromptHistory::with_capacity(2);
        for i in 0..3 {
            history.push(PromptEntry {
                timestamp: Utc::now(),
                user_message: format!("m{}", i),
                system_prompt: String::new(),
                response: String::new(),
                provider: Provider::Ollama,
                model: "llama3:8b".to_string(),
                input_tokens: 0,
                output_tokens: 0,
                cost: 0.0,
            });
        }

        let messages: Vec<&str> = history.entries().map(|e| e.user_message.as_str()).collect();
        assert_eq!(messages, vec!["m1", "m2"]);
    }
}
