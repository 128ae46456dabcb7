//! Conversation Orchestrator
//!
//! Drives one natural-language request through discovery, schema analysis
//! and SQL generation. The model asks for table schemas with fixed phrases;
//! the orchestrator loads what it asked for and keeps the exchange going
//! until the model stops asking or the turn ceiling is hit.

pub mod context;
pub mod orchestrator;
pub mod parser;
pub mod prompts;

pub use context::{ConversationContext, ConversationPhase, ConversationTurn, PromptEntry, PromptHistory};
pub use orchestrator::Orchestrator;
pub use parser::{extract_sql, parse_table_requests};
