//! Usage Ledger - token and cost accounting
//!
//! Each chat call lands in `usage_details`. The first write dated on a new
//! day rolls every earlier day into `daily_usage_stats` and deletes those
//! detail rows, so the detail table only ever holds about a day of calls.

use std::str::FromStr;
use std::sync::Arc;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;
use crate::{Error, Result};
use crate::storage::{DailyUsage, ProviderUsage, SqliteStore, UsageRecord, UsageTotals, date_key};

/// Export file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(Error::InvalidValue(format!("unsupported export format: {}", s))),
        }
    }
}

/// Today's totals alongside the trailing week
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub today: UsageTotals,
    pub last_7_days: UsageTotals,
}

#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<SqliteStore>,
}

impl UsageLedger {
    /// Wrap a store, rolling over any days before today
    pub fn open(store: Arc<SqliteStore>) -> Result<Self> {
        let ledger = Self { store };
        ledger.rollover(Utc::now().date_naive())?;
        Ok(ledger)
    }

    /// Append a call, rolling over earlier days if this is a new day
    pub fn record(&self, record: &UsageRecord) -> Result<()> {
        self.store.insert_usage(record)?;
        self.rollover(record.date())?;
        Ok(())
    }

    /// Aggregate and truncate every detail row dated before `date`.
    /// Safe to repeat. Returns the number of detail rows consumed.
    pub fn rollover(&self, date: NaiveDate) -> Result<usize> {
        let key = date_key(date);
        if !self.store.has_usage_before(&key)? {
            return Ok(0);
        }

        let consumed = self.store.rollover_usage(&key)?;
        info!("Rolled {} usage rows before {} into daily stats", consumed, key);
        Ok(consumed)
    }

    /// Totals for the current UTC day
    pub fn today(&self) -> Result<UsageTotals> {
        let today = date_key(Utc::now().date_naive());
        Ok(totals(&self.store.daily_usage_between(&today, &today)?))
    }

    /// Per-day, per-model usage between two dates (inclusive), newest first
    pub fn daily_stats(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyUsage>> {
        self.store.daily_usage_between(&date_key(start), &date_key(end))
    }

    pub fn summary(&self) -> Result<UsageSummary> {
        self.summary_for(Utc::now().date_naive())
    }

    fn summary_for(&self, today: NaiveDate) -> Result<UsageSummary> {
        let week = self.daily_stats(today - Duration::days(6), today)?;
        let today_key = date_key(today);

        let today_rows: Vec<DailyUsage> = week.iter().filter(|d| d.date == today_key).cloned().collect();
        Ok(UsageSummary {
            today: totals(&today_rows),
            last_7_days: totals(&week),
        })
    }

    /// Usage per provider and model over the last `days` days
    pub fn provider_model_stats(&self, days: u32) -> Result<Vec<ProviderUsage>> {
        let since = Utc::now().date_naive() - Duration::days(i64::from(days.max(1)) - 1);
        self.store.provider_usage_since(&date_key(since))
    }

    /// Render daily usage between two dates as JSON or CSV
    pub fn export(&self, format: ExportFormat, start: NaiveDate, end: NaiveDate) -> Result<String> {
        let days = self.daily_stats(start, end)?;
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&days)?),
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                for day in &days {
                    writer.serialize(day)?;
                }
                let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
                String::from_utf8(bytes).map_err(|e| Error::InvalidValue(e.to_string()))
            }
        }
    }
}

fn totals(days: &[DailyUsage]) -> UsageTotals {
    let mut sum = UsageTotals::default();
    for day in days {
        sum.add(&UsageTotals {
            requests: day.total_requests,
            input_tokens: day.input_tokens,
            output_tokens: day.output_tokens,
            cost: day.total_cost,
        });
    }
    sum
}
