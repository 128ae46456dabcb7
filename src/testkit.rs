//! In-memory fakes for the database and chat collaborators

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use crate::database::{ColumnInfo, Database, ForeignKey, Row, TableSchema, quote_identifier};
use crate::llm::{ChatClient, ChatRequest, ChatResponse, ModelInfo, Provider, TokenUsage};
use crate::{Error, Result};

pub fn users_schema() -> TableSchema {
    TableSchema::new("users")
        .with_column(ColumnInfo::new("id", "INTEGER", false).with_key("PRI"))
        .with_column(ColumnInfo::new("name", "TEXT", true))
        .with_column(ColumnInfo::new("email", "TEXT", true))
}

pub fn orders_schema() -> TableSchema {
    TableSchema::new("orders")
        .with_column(ColumnInfo::new("id", "INTEGER", false).with_key("PRI"))
        .with_column(ColumnInfo::new("user_id", "INTEGER", true).with_key("FK"))
        .with_column(ColumnInfo::new("total", "REAL", true))
        .with_foreign_key(ForeignKey::new("user_id", "users", "id"))
}

/// `users` and `orders`, one row of users
pub fn shop_database() -> MemoryDatabase {
    MemoryDatabase::new()
        .with_table(users_schema())
        .with_table(orders_schema())
        .with_rows("users", vec![vec![
            "1".to_string(),
            "ada".to_string(),
            "ada@example.com".to_string(),
        ]])
}

#[derive(Default)]
pub struct MemoryDatabase {
    tables: BTreeMap<String, TableSchema>,
    rows: BTreeMap<String, Vec<Row>>,
    broken: BTreeSet<String>,
    failing_execute: bool,
    describe_calls: AtomicUsize,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, schema: TableSchema) -> Self {
        self.tables.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_rows(mut self, table: &str, rows: Vec<Row>) -> Self {
        self.rows.insert(table.to_string(), rows);
        self
    }

    /// Listed, but every describe fails
    pub fn with_broken_table(mut self, table: &str) -> Self {
        self.broken.insert(table.to_string());
        self
    }

    pub fn with_failing_execute(mut self) -> Self {
        self.failing_execute = true;
        self
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self
            .tables
            .keys()
            .chain(self.broken.iter())
            .cloned()
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(table) {
            return Err(Error::Database(format!("cannot describe {}", table)));
        }
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| Error::Database(format!("table '{}' does not exist", table)))
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        if self.failing_execute {
            return Err(Error::Database("execute disabled".to_string()));
        }
        let rows = self
            .rows
            .iter()
            .find(|(table, _)| sql.contains(&quote_identifier(table)))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        Ok(rows)
    }
}

enum Step {
    Reply(String),
    Fail(String),
    Stall(Duration),
}

/// Chat client that plays back a queue of replies and records every request
pub struct ScriptedChat {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
    usage: TokenUsage,
}

impl ScriptedChat {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            usage: TokenUsage { prompt_tokens: 100, completion_tokens: 20 },
        }
    }

    pub fn reply(self, content: &str) -> Self {
        self.push(Step::Reply(content.to_string()))
    }

    pub fn fail(self, message: &str) -> Self {
        self.push(Step::Fail(message.to_string()))
    }

    /// Sleep for `delay` and then fail as exhausted
    pub fn stall(self, delay: Duration) -> Self {
        self.push(Step::Stall(delay))
    }

    fn push(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// System prompt of the nth request
    pub fn system_prompt(&self, n: usize) -> String {
        self.requests()[n].messages[0].content.clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    fn provider(&self) -> Provider {
        Provider::OpenRouter
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            Some(Step::Reply(content)) => Ok(ChatResponse {
                model: request.model.clone(),
                content,
                usage: self.usage,
            }),
            Some(Step::Fail(message)) => Err(Error::Chat(message)),
            Some(Step::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Err(Error::Chat("script exhausted".to_string()))
            }
            None => Err(Error::Chat("script exhausted".to_string())),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}
