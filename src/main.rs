//! sqlterm-ai CLI - AI query context for SQLite databases

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use sqlterm_ai::config::{self, AiConfig};
use sqlterm_ai::graph::RelationshipGraph;
use sqlterm_ai::llm;
use sqlterm_ai::ledger::{ExportFormat, UsageLedger};
use sqlterm_ai::storage::{self, SqliteStore};
use sqlterm_ai::ui::{self, Icons, Spinner};
use sqlterm_ai::{Database, Error, HashEmbedder, Orchestrator, SchemaIndex, SqliteDatabase};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sqlterm-ai")]
#[command(version)]
#[command(about = "AI query context for SQL terminals - pick the tables a model should see")]
#[command(long_about = r#"
sqlterm-ai decides which tables and relationships to show a language model
when you ask for a query in plain English:
  • Embedding index over every table's schema and sample rows
  • Relationship graph from foreign keys and naming conventions
  • Multi-turn conversations where the model asks for the schemas it needs
  • Token and cost accounting per provider and model

Example usage:
  sqlterm-ai --database shop.db index
  sqlterm-ai --database shop.db search "customer orders"
  sqlterm-ai --database shop.db ask "total revenue per customer last month"
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding ai.toml and per-connection stores
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// SQLite database to work against
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Connection name for the store (defaults to the database file stem)
    #[arg(short, long, global = true)]
    connection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed every table of the database into the schema index
    Index,

    /// Find tables relevant to a piece of text
    Search {
        /// Search text
        query: String,

        /// Maximum number of results (0 for all)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show how tables relate through foreign keys and naming
    Related {
        /// Tables to inspect
        #[arg(required = true)]
        tables: Vec<String>,
    },

    /// List recently accessed tables
    Recent {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Ask the model for SQL
    Ask {
        /// Natural-language request
        message: String,

        /// One request with a prebuilt context instead of a conversation
        #[arg(long)]
        single: bool,
    },

    /// List the models the configured provider offers
    Models,

    /// Token usage and cost
    Usage {
        /// Days to cover
        #[arg(long, default_value = "7")]
        days: u32,

        /// Print daily usage as json or csv instead of tables
        #[arg(long)]
        export: Option<ExportFormat>,
    },

    /// Show or change the AI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration
    Show,

    /// Set a key, e.g. `provider ollama` or `api_key.openrouter sk-...`
    Set { key: String, value: String },
}

/// A database with its connection name and store
struct Workspace {
    db: Arc<SqliteDatabase>,
    store: Arc<SqliteStore>,
    connection: String,
}

impl Workspace {
    fn open(cli: &Cli, config_dir: &Path) -> anyhow::Result<Self> {
        let Some(path) = cli.database.as_deref() else {
            anyhow::bail!("--database is required for this command");
        };
        let connection = cli.connection.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "default".to_string())
        });

        let db = Arc::new(SqliteDatabase::open(path)?);
        let store = Arc::new(storage::open_for_connection(config_dir, &connection)?);
        Ok(Self { db, store, connection })
    }

    fn index(&self, config: &AiConfig) -> SchemaIndex {
        let embedder = Arc::new(HashEmbedder::with_dimension(config.embedding_dimension));
        SchemaIndex::new(self.store.clone(), embedder)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_dir = cli.config_dir.clone().unwrap_or_else(config::default_config_dir);
    let config = config::load_config(&config_dir)?;

    match &cli.command {
        Commands::Index => {
            let ws = Workspace::open(&cli, &config_dir)?;
            let index = ws.index(&config);

            ui::header(&format!("Indexing connection '{}'", ws.connection));
            ui::status(Icons::DATABASE, "Store", &storage::store_path(&config_dir, &ws.connection).display().to_string());
            let spinner = Spinner::new("Embedding tables...");
            let report = index.refresh(ws.db.as_ref()).await?;
            let elapsed = spinner.elapsed();
            spinner.finish_and_clear();

            for table in &report.failed {
                ui::warn(&format!("Could not index {}", table));
            }
            ui::success(&format!("Indexed {} tables", report.indexed.len()));
            ui::timing(elapsed);

            let stats = ws.store.stats()?;
            println!("{}", stats);
        }

        Commands::Search { query, limit } => {
            let ws = Workspace::open(&cli, &config_dir)?;
            let index = ws.index(&config);

            if index.stats()?.tables == 0 {
                ui::warn("Index is empty; run `sqlterm-ai index` first");
                return Ok(());
            }

            println!("{} Searching for: '{}'", Icons::SEARCH, query);
            let hits = index.search(query, *limit)?;
            if hits.is_empty() {
                ui::error("No matching tables.");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    ui::search_hit(i + 1, hit);
                }
            }
        }

        Commands::Related { tables } => {
            let ws = Workspace::open(&cli, &config_dir)?;
            let db: Arc<dyn Database> = ws.db.clone();
            let graph = RelationshipGraph::new(db);

            for table in tables {
                ui::section(table);
                let relations = graph.relations_for(table).await?;
                if relations.is_empty() {
                    println!("  {}", ui::dim("no related tables"));
                }
                for rel in &relations {
                    ui::relation(rel);
                }
            }
        }

        Commands::Recent { limit } => {
            let ws = Workspace::open(&cli, &config_dir)?;
            let recent = ws.index(&config).recently_accessed(*limit)?;
            if recent.is_empty() {
                println!("{}", ui::dim("No tables accessed yet."));
            }
            for (i, table) in recent.iter().enumerate() {
                println!("{:>3}. {} {}", i + 1, Icons::TABLE, table);
            }
        }

        Commands::Ask { message, single } => {
            let ws = Workspace::open(&cli, &config_dir)?;
            let mut orchestrator = Orchestrator::from_config(config.clone());
            if !orchestrator.is_configured() {
                ui::error("AI is not configured. Try `sqlterm-ai config set provider ollama`.");
                return Ok(());
            }
            orchestrator.connect(ws.db.clone(), Some(ws.store.clone()))?;

            // First use of a connection indexes up front; later runs refresh alongside the chat
            if ws.store.count_table_embeddings()? == 0 {
                let spinner = Spinner::new("Indexing tables...");
                ws.index(&config).refresh(ws.db.as_ref()).await?;
                spinner.finish_and_clear();
            } else {
                orchestrator.refresh_index_in_background();
            }

            let spinner = Spinner::new("Thinking...");
            let started = Instant::now();
            let outcome = if *single {
                orchestrator.single_shot(message).await
            } else {
                orchestrator.chat(message).await
            };
            spinner.finish_and_clear();

            match outcome {
                Ok(reply) => {
                    ui::reply(&reply);
                    if let Some(ctx) = orchestrator.current_conversation() {
                        if let Some(sql) = &ctx.generated_sql {
                            ui::sql(sql);
                        }
                        ui::phase(ctx.phase);
                    }
                    ui::timing(started.elapsed());
                }
                Err(e) => report_chat_error(&e),
            }

            let pending = orchestrator.shutdown().await;
            tracing::debug!("Awaited {} background tasks", pending);
        }

        Commands::Models => {
            let client = llm::build_client(&config)?;
            let spinner = Spinner::new(&format!("Fetching models from {}...", client.provider().display_name()));
            let models = client.list_models().await;
            spinner.finish_and_clear();

            let models = models?;
            if models.is_empty() {
                println!("{}", ui::dim("No models reported."));
            } else {
                ui::header(&format!("{} models from {}", models.len(), client.provider().display_name()));
                println!("{}", ui::models_table(&models));
            }
        }

        Commands::Usage { days, export } => {
            let ws = Workspace::open(&cli, &config_dir)?;
            let ledger = UsageLedger::open(ws.store.clone())?;
            let end = Utc::now().date_naive();
            let start = end - Duration::days(i64::from((*days).max(1)) - 1);

            if let Some(format) = export {
                println!("{}", ledger.export(*format, start, end)?);
                return Ok(());
            }

            let summary = ledger.summary()?;
            let today_requests = summary.today.requests.to_string();
            let today_tokens = summary.today.total_tokens().to_string();
            let today_cost = format!("${:.4}", summary.today.cost);
            let week_requests = summary.last_7_days.requests.to_string();
            let week_cost = format!("${:.4}", summary.last_7_days.cost);

            ui::header("Token usage");
            println!(
                "{}",
                ui::stats_table(&[
                    ("Requests today", today_requests.as_str()),
                    ("Tokens today", today_tokens.as_str()),
                    ("Cost today", today_cost.as_str()),
                    ("Requests (7 days)", week_requests.as_str()),
                    ("Cost (7 days)", week_cost.as_str()),
                ])
            );

            let by_model = ledger.provider_model_stats(*days)?;
            if !by_model.is_empty() {
                ui::section(&format!("{} By provider and model", Icons::MONEY));
                println!("{}", ui::provider_usage_table(&by_model));
            }

            let daily = ledger.daily_stats(start, end)?;
            if !daily.is_empty() {
                ui::section(&format!("{} Daily", Icons::STATS));
                println!("{}", ui::daily_usage_table(&daily));
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                ui::status(
                    Icons::GEAR,
                    "Config file",
                    &config::config_path_in(&config_dir).display().to_string(),
                );
                println!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Set { key, value } => {
                let mut config = config;
                config.set(key, value)?;
                config::save_config(&config_dir, &config)?;
                ui::success(&format!("Set {}", key));
            }
        },
    }

    Ok(())
}

fn report_chat_error(e: &Error) {
    match e {
        Error::InsufficientProgress { turns } => {
            ui::warn(&format!(
                "The model kept asking for tables after {} turns. Try a more specific request.",
                turns
            ));
        }
        Error::ChatTimeout(after) => {
            ui::error(&format!(
                "The model did not answer within {}s. Try again or raise timeout_secs.",
                after.as_secs()
            ));
        }
        e if e.is_retryable() => ui::error(&format!("{}. Please try again.", e)),
        e => ui::error(&e.to_string()),
    }
}
