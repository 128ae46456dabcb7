pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    describe_relation, dim, error, header, info, muted, phase, relation, reply, search_hit, section,
    sql, status, success, summary_row, timing, warn,
};
pub use progress::Spinner;
pub use table::{TableBuilder, daily_usage_table, models_table, provider_usage_table, stats_table};
pub use theme::{Role, Theme, paint, theme};
