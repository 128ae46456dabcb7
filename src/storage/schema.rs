//! Store schema definitions

/// SQL to create the table_embeddings table
/// One row per user table; columns and column_types hold JSON arrays
pub const CREATE_TABLE_EMBEDDINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS table_embeddings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT UNIQUE NOT NULL,
    description TEXT NOT NULL,
    columns TEXT NOT NULL,
    column_types TEXT NOT NULL,
    sample_data TEXT NOT NULL DEFAULT '',
    vector BLOB NOT NULL,
    last_updated TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed TEXT
)
"#;

/// SQL to create the query_patterns table
pub const CREATE_QUERY_PATTERNS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS query_patterns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_text TEXT NOT NULL,
    tables TEXT NOT NULL,
    vector BLOB NOT NULL,
    success_weight REAL NOT NULL DEFAULT 1.0,
    use_count INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create the usage_details table
/// Holds per-call rows until their day is rolled up
pub const CREATE_USAGE_DETAILS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS usage_details (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    input_tokens INTEGER NOT NULL,
    output_tokens INTEGER NOT NULL,
    cost REAL NOT NULL,
    request_time TEXT NOT NULL,
    request_date TEXT NOT NULL,
    user_message TEXT,
    ai_response TEXT,
    system_prompt TEXT
)
"#;

/// SQL to create the daily_usage_stats table
pub const CREATE_DAILY_USAGE_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_usage_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    total_requests INTEGER NOT NULL,
    input_tokens INTEGER NOT NULL,
    output_tokens INTEGER NOT NULL,
    total_cost REAL NOT NULL,
    UNIQUE(date, provider, model)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_table_embeddings_last_accessed ON table_embeddings(last_accessed DESC)",
    "CREATE INDEX IF NOT EXISTS idx_table_embeddings_access_count ON table_embeddings(access_count DESC)",
    "CREATE INDEX IF NOT EXISTS idx_query_patterns_updated ON query_patterns(updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_usage_details_date ON usage_details(request_date)",
    "CREATE INDEX IF NOT EXISTS idx_usage_details_session ON usage_details(session_id)",
    "CREATE INDEX IF NOT EXISTS idx_daily_stats_date ON daily_usage_stats(date DESC)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_TABLE_EMBEDDINGS_TABLE,
        CREATE_QUERY_PATTERNS_TABLE,
        CREATE_USAGE_DETAILS_TABLE,
        CREATE_DAILY_USAGE_STATS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
