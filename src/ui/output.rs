use std::time::Duration;
use indicatif::HumanDuration;
use crate::conversation::ConversationPhase;
use crate::graph::{Relation, RelationKind};
use crate::index::TableMatch;
use crate::ui::Icons;
use crate::ui::theme::{Role, paint};

pub fn header(text: &str) {
    println!("{} {}", Icons::BRAIN, paint(text, Role::Header));
}

/// `<icon> label: value`, label dimmed
pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, paint(label, Role::Dim), value);
}

pub fn success(message: &str) {
    println!("{} {}", Icons::CHECK, paint(message, Role::Success));
}

/// Errors and warnings go to stderr so piped output stays clean
pub fn error(message: &str) {
    eprintln!("{} {}", Icons::CROSS, paint(message, Role::Error));
}

pub fn warn(message: &str) {
    eprintln!("{} {}", Icons::WARN, paint(message, Role::Warn));
}

pub fn info(label: &str, value: &str) {
    status(&paint(Icons::INFO, Role::Info), label, value);
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", paint(title, Role::Header));
}

pub fn dim(text: &str) -> String {
    paint(text, Role::Dim)
}

pub fn muted(text: &str) -> String {
    paint(text, Role::Muted)
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", dim(label), value);
}

pub fn timing(elapsed: Duration) {
    println!("{} {}", dim(Icons::CLOCK), HumanDuration(elapsed));
}

/// `  1. orders (0.83) - table name mentioned in query`
pub fn search_hit(rank: usize, hit: &TableMatch) {
    println!(
        "{:>3}. {} {} {}",
        rank,
        paint(&hit.table.table_name, Role::Name),
        muted(&format!("({:.2})", hit.similarity)),
        dim(&format!("- {}", hit.reason))
    );
}

pub fn relation(rel: &Relation) {
    println!(
        "  {} {} {}",
        Icons::LINK,
        paint(&rel.to, Role::Name),
        muted(&describe_relation(rel))
    );
}

/// Human wording for how two tables are related
pub fn describe_relation(rel: &Relation) -> String {
    let column = rel.via_column.as_deref().unwrap_or("?");
    match rel.kind {
        RelationKind::ForeignKey => format!("{}.{} references it", rel.from, column),
        RelationKind::ReferencedBy => format!("references {} via {}", rel.from, column),
        RelationKind::SharedPrefix => "shares a name prefix".to_string(),
        RelationKind::SharedBaseWord => "shares a base word".to_string(),
        RelationKind::Junction => "looks like a junction table".to_string(),
    }
}

pub fn phase(phase: ConversationPhase) {
    println!(
        "{} {}",
        paint(Icons::GEAR, Role::Info),
        paint(&phase.as_str().replace('_', " "), Role::Header)
    );
}

pub fn reply(text: &str) {
    println!();
    println!("{}", text);
}

pub fn sql(sql: &str) {
    println!();
    println!("{} {}", Icons::SPARKLE, paint("Generated SQL", Role::Success));
    for line in sql.lines() {
        println!("  {}", paint(line, Role::Sql));
    }
}
