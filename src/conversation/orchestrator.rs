//! Session-level AI assistant: multi-turn conversations that pull in table
//! schemas as the model asks for them, plus one-off questions.

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tracing::{debug, info, warn};
use crate::config::AiConfig;
use crate::database::Database;
use crate::embedding::{Embedder, HashEmbedder};
use crate::graph::RelationshipGraph;
use crate::index::{SchemaIndex, TableMatch};
use crate::ledger::{PatternLedger, UsageLedger};
use crate::llm::pricing::calculate_cost;
use crate::llm::{ChatClient, ChatRequest, ChatResponse, build_client};
use crate::storage::{SqliteStore, UsageRecord};
use crate::tasks::BackgroundTasks;
use crate::{Error, Result};
use super::context::{ConversationContext, ConversationPhase, ConversationTurn, PromptEntry, PromptHistory};
use super::parser::{extract_sql, parse_table_requests};
use super::prompts::{self, DISCOVERY_RESULTS, RelatedGroup, RelatedSection};

/// Tables kept in the session's recently-mentioned list
pub const MAX_RECENT_TABLES: usize = 10;
/// Ranked suggestions offered next to loaded schemas
const RELATED_SUGGESTIONS: usize = 5;
/// Recently accessed tables stored with a learned query
const PATTERN_TABLES: usize = 5;

const FIRST_FOLLOW_UP: &str =
    "Please analyze the provided table schemas and generate the SQL query for my original request.";
const NEXT_FOLLOW_UP: &str = "Please continue your analysis with the newly provided table schemas.";

/// Owns the session state of the AI assistant: the chat client, the
/// attached database and its store, the current conversation, the
/// recently mentioned tables and the prompt history.
pub struct Orchestrator {
    config: AiConfig,
    client: Option<Arc<dyn ChatClient>>,
    db: Option<Arc<dyn Database>>,
    index: Option<SchemaIndex>,
    graph: Option<RelationshipGraph>,
    patterns: Option<PatternLedger>,
    usage: Option<UsageLedger>,
    tasks: BackgroundTasks,
    timeout: Duration,
    session_id: String,
    conversation: Option<ConversationContext>,
    recent_tables: Vec<String>,
    history: PromptHistory,
}

impl Orchestrator {
    /// An orchestrator with no chat client and no database
    pub fn new(config: AiConfig) -> Self {
        Self {
            timeout: config.timeout(),
            config,
            client: None,
            db: None,
            index: None,
            graph: None,
            patterns: None,
            usage: None,
            tasks: BackgroundTasks::new(),
            session_id: new_session_id(),
            conversation: None,
            recent_tables: Vec::new(),
            history: PromptHistory::default(),
        }
    }

    /// Build the chat client the config names. A client that cannot be
    /// built leaves the orchestrator unconfigured rather than failing.
    pub fn from_config(config: AiConfig) -> Self {
        let client = match build_client(&config) {
            Ok(client) => Some(client),
            Err(e) => {
                debug!("Chat client unavailable: {}", e);
                None
            }
        };
        let mut orchestrator = Self::new(config);
        orchestrator.client = client;
        orchestrator
    }

    pub fn with_client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Attach a database. With a store, the schema index and both ledgers
    /// come online too. Any running conversation is dropped.
    pub fn connect(&mut self, db: Arc<dyn Database>, store: Option<Arc<SqliteStore>>) -> Result<()> {
        let (index, patterns, usage) = match store {
            Some(store) => {
                let embedder: Arc<dyn Embedder> =
                    Arc::new(HashEmbedder::with_dimension(self.config.embedding_dimension));
                let usage = UsageLedger::open(store.clone())?;
                let patterns = PatternLedger::new(store.clone(), embedder.clone());
                (Some(SchemaIndex::new(store, embedder)), Some(patterns), Some(usage))
            }
            None => (None, None, None),
        };

        self.graph = Some(RelationshipGraph::new(db.clone()));
        self.db = Some(db);
        self.index = index;
        self.patterns = patterns;
        self.usage = usage;
        self.conversation = None;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.db = None;
        self.graph = None;
        self.index = None;
        self.patterns = None;
        self.usage = None;
        self.conversation = None;
    }

    /// Re-index the attached database off the interactive path.
    /// Returns false when there is no database or store to index.
    pub fn refresh_index_in_background(&self) -> bool {
        let (Some(index), Some(db)) = (self.index.clone(), self.db.clone()) else {
            return false;
        };
        self.tasks.spawn("index refresh", async move {
            index.refresh(db.as_ref()).await.map(|_| ())
        });
        true
    }

    pub fn index(&self) -> Option<&SchemaIndex> {
        self.index.as_ref()
    }

    pub fn graph(&self) -> Option<&RelationshipGraph> {
        self.graph.as_ref()
    }

    pub fn patterns(&self) -> Option<&PatternLedger> {
        self.patterns.as_ref()
    }

    pub fn usage(&self) -> Option<&UsageLedger> {
        self.usage.as_ref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn prompt_history(&self) -> &PromptHistory {
        &self.history
    }

    /// Most recently mentioned first
    pub fn recent_tables(&self) -> &[String] {
        &self.recent_tables
    }

    /// Begin a new conversation, replacing any current one
    pub fn start_conversation(&mut self, query: &str) -> &ConversationContext {
        self.conversation.insert(ConversationContext::new(query))
    }

    pub fn current_conversation(&self) -> Option<&ConversationContext> {
        self.conversation.as_ref()
    }

    pub fn clear_conversation(&mut self) {
        self.conversation = None;
    }

    /// Send a message within the current conversation, starting one if needed.
    ///
    /// When the reply loads new schemas the orchestrator follows up on its
    /// own until the model stops asking for tables. A failed first call
    /// leaves the conversation exactly as it was; a failed follow-up returns
    /// the last good reply.
    pub async fn chat(&mut self, message: &str) -> Result<String> {
        let client = self.client.clone().ok_or_else(not_configured)?;
        let db = self.db.clone().ok_or(Error::NoDatabase)?;
        let all_tables = db.list_tables().await?;

        let mut ctx = self
            .conversation
            .clone()
            .unwrap_or_else(|| ConversationContext::new(message));
        let mut pending = message.to_string();
        let mut last_reply: Option<String> = None;

        loop {
            let phase_before = ctx.phase;
            let (system_prompt, discovered) = self.phase_prompt(&ctx, &all_tables).await;

            let response = match self.send(client.as_ref(), &system_prompt, &pending).await {
                Ok(response) => response,
                Err(e) => match last_reply {
                    Some(reply) => {
                        warn!("Follow-up turn failed, keeping the last reply: {}", e);
                        return Ok(reply);
                    }
                    None => return Err(e),
                },
            };

            ctx.add_discovered(&discovered);
            let requested = parse_table_requests(&response.content);
            let loaded = self.load_requested(db.as_ref(), &mut ctx, &requested, &all_tables).await;

            ctx.add_turn(ConversationTurn {
                user_message: pending.clone(),
                system_prompt: system_prompt.clone(),
                response: response.content.clone(),
                requested_tables: requested.clone(),
                phase: phase_before,
                timestamp: Utc::now(),
            });

            if !loaded.is_empty() {
                ctx.advance_to(ConversationPhase::SchemaAnalysis);
            } else if requested.is_empty() {
                if let Some(sql) = extract_sql(&response.content) {
                    ctx.complete_with_sql(sql);
                }
            }

            let first_turn = last_reply.is_none();
            self.record_exchange(client.as_ref(), &pending, &system_prompt, &response, &loaded, first_turn);
            self.conversation = Some(ctx.clone());

            if loaded.is_empty() {
                return Ok(response.content);
            }

            if ctx.turn_count() >= self.config.max_turns {
                warn!(
                    "Conversation {} still loading tables after {} turns, stopping",
                    ctx.id,
                    ctx.turn_count()
                );
                return Err(Error::InsufficientProgress { turns: ctx.turn_count() });
            }

            info!("Loaded schemas for {}, continuing", loaded.join(", "));
            pending = if phase_before == ConversationPhase::Discovery {
                FIRST_FOLLOW_UP.to_string()
            } else {
                NEXT_FOLLOW_UP.to_string()
            };
            last_reply = Some(response.content);
        }
    }

    /// Answer one message outside any conversation, with table context
    /// picked by the index or, failing that, by keyword matching
    pub async fn single_shot(&mut self, message: &str) -> Result<String> {
        let client = self.client.clone().ok_or_else(not_configured)?;
        let all_tables = match &self.db {
            Some(db) => db.list_tables().await?,
            None => Vec::new(),
        };

        let system_prompt = self.context_prompt(message, &all_tables);
        let response = self.send(client.as_ref(), &system_prompt, message).await?;
        self.record_exchange(client.as_ref(), message, &system_prompt, &response, &[], true);
        Ok(response.content)
    }

    /// System prompt for a one-off message
    pub fn context_prompt(&mut self, query: &str, all_tables: &[String]) -> String {
        if all_tables.is_empty() {
            return prompts::no_database_prompt();
        }

        if let Some(index) = &self.index {
            match index.search(query, self.config.max_tables) {
                Ok(matches) => {
                    let names: Vec<String> = matches.iter().map(|m| m.table.table_name.clone()).collect();
                    if let Err(e) = index.record_access(&names) {
                        warn!("Failed to record table access: {}", e);
                    }
                    return prompts::vector_prompt(all_tables, &matches);
                }
                Err(e) => warn!("Index search failed, falling back to keyword matching: {}", e),
            }
        }

        let selection =
            prompts::keyword_selection(query, all_tables, &self.recent_tables, self.config.max_tables);
        let mentioned = prompts::mentioned_tables(query, all_tables);
        self.remember_tables(&mentioned);
        prompts::keyword_prompt(all_tables, &selection)
    }

    /// Wait for background work (index refresh, pattern recording)
    pub async fn shutdown(&self) -> usize {
        self.tasks.shutdown().await
    }

    /// Prompt for the current phase plus any tables discovery surfaced.
    /// Reads only; nothing here touches the conversation.
    async fn phase_prompt(&self, ctx: &ConversationContext, all_tables: &[String]) -> (String, Vec<String>) {
        match ctx.phase {
            ConversationPhase::Discovery => {
                let matches = self.discovery_matches(&ctx.original_query, all_tables);
                let discovered = matches.iter().map(|m| m.table.table_name.clone()).collect();
                (prompts::discovery_prompt(ctx, all_tables, &matches), discovered)
            }
            ConversationPhase::SchemaAnalysis => {
                let related = self.related_section(ctx).await;
                (prompts::schema_analysis_prompt(ctx, related.as_ref()), Vec::new())
            }
            ConversationPhase::SqlGeneration => (prompts::sql_generation_prompt(ctx), Vec::new()),
        }
    }

    fn discovery_matches(&self, query: &str, all_tables: &[String]) -> Vec<TableMatch> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        if all_tables.is_empty() {
            return Vec::new();
        }
        match index.search(query, DISCOVERY_RESULTS) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Index search failed, listing tables instead: {}", e);
                Vec::new()
            }
        }
    }

    async fn related_section(&self, ctx: &ConversationContext) -> Option<RelatedSection> {
        let graph = self.graph.as_ref()?;
        let loaded = ctx.loaded_table_names();
        if loaded.is_empty() {
            return None;
        }

        let ranked = match graph.ranked_related_for(&loaded, RELATED_SUGGESTIONS).await {
            Ok(ranked) => ranked,
            Err(e) => {
                debug!("No related table suggestions: {}", e);
                return None;
            }
        };

        let mut section = RelatedSection::default();
        let mut shown: Vec<String> = Vec::new();

        for table in &loaded {
            let relations = match graph.relations_for(table).await {
                Ok(relations) => relations,
                Err(e) => {
                    debug!("Skipping relations of {}: {}", table, e);
                    continue;
                }
            };

            let related: Vec<(String, String)> = relations
                .into_iter()
                .filter(|r| !ctx.has_table_loaded(&r.to))
                .map(|r| {
                    let note = match (r.kind.is_foreign_key(), r.via_column.as_deref()) {
                        (true, Some(column)) => format!("via foreign key {}", column),
                        _ => "similar naming pattern".to_string(),
                    };
                    (r.to, note)
                })
                .collect();

            if related.is_empty() {
                continue;
            }
            shown.extend(related.iter().map(|(name, _)| name.clone()));
            section.groups.push(RelatedGroup { source: table.clone(), related });
        }

        section.additional = ranked
            .into_iter()
            .filter(|t| !shown.contains(t) && !ctx.has_table_loaded(t))
            .collect();

        (!section.is_empty()).then_some(section)
    }

    async fn send(&self, client: &dyn ChatClient, system_prompt: &str, message: &str) -> Result<ChatResponse> {
        let request = ChatRequest::new(&self.config.model, system_prompt, message)
            .with_sampling(self.config.temperature, self.config.max_tokens);

        debug!(
            "Sending chat request to {} ({} prompt chars)",
            client.provider(),
            system_prompt.len() + message.len()
        );
        match tokio::time::timeout(self.timeout, client.chat(&request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ChatTimeout(self.timeout)),
        }
    }

    /// Describe every requested table that exists and is not loaded yet.
    /// Returns the names actually loaded.
    async fn load_requested(
        &self,
        db: &dyn Database,
        ctx: &mut ConversationContext,
        requested: &[String],
        all_tables: &[String],
    ) -> Vec<String> {
        let mut loaded = Vec::new();

        for name in requested {
            let Some(table) = resolve_table(name, all_tables) else {
                debug!("Model asked for unknown table {}", name);
                continue;
            };
            if ctx.has_table_loaded(table) {
                continue;
            }

            match db.describe_table(table).await {
                Ok(schema) => {
                    ctx.add_loaded_table(schema);
                    loaded.push(table.to_string());
                }
                Err(e) => warn!("Failed to describe table {}: {}", table, e),
            }
        }

        loaded
    }

    /// Book-keeping after a successful call: prompt history, usage, access
    /// stats for tables the turn used, and (for user messages) a learned pattern
    fn record_exchange(
        &mut self,
        client: &dyn ChatClient,
        user_message: &str,
        system_prompt: &str,
        response: &ChatResponse,
        used_tables: &[String],
        learn: bool,
    ) {
        let provider = client.provider();
        let model = self.config.model.clone();
        let input_tokens = response.usage.prompt_tokens;
        let output_tokens = response.usage.completion_tokens;
        let cost = calculate_cost(provider, &model, input_tokens, output_tokens);

        self.history.push(PromptEntry {
            timestamp: Utc::now(),
            user_message: user_message.to_string(),
            system_prompt: system_prompt.to_string(),
            response: response.content.clone(),
            provider,
            model: model.clone(),
            input_tokens,
            output_tokens,
            cost,
        });

        if let Some(usage) = &self.usage {
            let record = UsageRecord {
                session_id: self.session_id.clone(),
                provider: provider.as_str().to_string(),
                model,
                input_tokens,
                output_tokens,
                cost,
                request_time: Utc::now(),
                user_message: Some(user_message.to_string()),
                ai_response: Some(response.content.clone()),
                system_prompt: Some(system_prompt.to_string()),
            };
            if let Err(e) = usage.record(&record) {
                warn!("Failed to record usage: {}", e);
            }
        }

        if !used_tables.is_empty() {
            self.remember_tables(used_tables);
            if let Some(index) = &self.index {
                if let Err(e) = index.record_access(used_tables) {
                    warn!("Failed to record table access: {}", e);
                }
            }
        }

        if learn {
            self.learn_from_query(user_message);
        }
    }

    /// Store the query with the recently accessed tables as a stand-in for
    /// the tables it actually used
    fn learn_from_query(&self, query: &str) {
        let (Some(index), Some(patterns)) = (self.index.clone(), self.patterns.clone()) else {
            return;
        };
        let query = query.to_string();

        self.tasks.spawn_blocking("pattern recording", move || {
            let recent = index.recently_accessed(PATTERN_TABLES)?;
            if !recent.is_empty() {
                patterns.record(&query, &recent)?;
            }
            Ok(())
        });
    }

    /// Move tables to the front of the recent list
    fn remember_tables(&mut self, tables: &[String]) {
        for table in tables {
            self.recent_tables.retain(|existing| existing != table);
            self.recent_tables.insert(0, table.clone());
        }
        self.recent_tables.truncate(MAX_RECENT_TABLES);
    }
}

fn new_session_id() -> String {
    format!("session_{}", uuid::Uuid::new_v4().simple())
}

fn not_configured() -> Error {
    Error::NotConfigured("no chat client configured, set a provider and model first".to_string())
}

/// Exact name first, then a case-insensitive match
fn resolve_table<'a>(name: &str, all_tables: &'a [String]) -> Option<&'a str> {
    all_tables
        .iter()
        .find(|t| t.as_str() == name)
        .or_else(|| all_tables.iter().find(|t| t.eq_ignore_ascii_case(name)))
        .map(String::as_str)
}
