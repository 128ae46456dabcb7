//! Ledgers sharing the connection store
//!
//! - [`patterns`]: which tables past queries touched
//! - [`usage`]: token and cost accounting with daily roll-ups

pub mod patterns;
pub mod usage;

pub use patterns::PatternLedger;
pub use usage::{ExportFormat, UsageLedger, UsageSummary};
