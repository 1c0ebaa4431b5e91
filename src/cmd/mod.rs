pub mod create;
pub mod dividends;
pub mod events;
pub mod gains;
pub mod import;
pub mod positions;
pub mod schema;
pub mod sync;
pub mod value;

use anyhow::Context as _;
use invest_ledger::core::{JsonFileEventLog, LedgerConfig, TransactionProcessor};
use invest_ledger::ingest::BatchSummary;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// Per-invocation settings shared by every command
#[derive(Debug)]
pub struct Context {
    pub ledger: PathBuf,
    pub config: LedgerConfig,
}

impl Context {
    pub fn open_log(&self) -> anyhow::Result<JsonFileEventLog> {
        JsonFileEventLog::open(&self.ledger)
            .with_context(|| format!("cannot open ledger {}", self.ledger.display()))
    }

    pub fn processor(&self) -> anyhow::Result<TransactionProcessor<JsonFileEventLog>> {
        Ok(TransactionProcessor::new(
            self.open_log()?,
            self.config.processor.clone(),
        ))
    }
}

#[derive(Debug, Clone, Tabled)]
struct IssueRow {
    #[tabled(rename = "Row")]
    row: usize,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Problem")]
    message: String,
}

pub fn print_batch(summary: &BatchSummary) {
    println!("Recorded:   {}", summary.succeeded);
    println!("Duplicates: {}", summary.duplicates);
    println!("Skipped:    {}", summary.skipped);
    println!("Failed:     {}", summary.failed);
    println!(
        "Completed:  {}",
        if summary.completed { "yes" } else { "no" }
    );

    if summary.issues.is_empty() {
        return;
    }
    let rows: Vec<IssueRow> = summary
        .issues
        .iter()
        .map(|issue| IssueRow {
            row: issue.row,
            key: issue.key.clone().unwrap_or_default(),
            message: issue.message.clone(),
        })
        .collect();
    println!();
    print_table(rows);
}

pub fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

pub fn format_signed(amount: Decimal) -> String {
    if amount > Decimal::ZERO {
        format!("+{:.2}", amount)
    } else {
        format!("{:.2}", amount)
    }
}

pub fn format_quantity(qty: Decimal) -> String {
    let s = format!("{:.8}", qty);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

pub fn format_optional(amount: Option<Decimal>) -> String {
    amount.map(format_amount).unwrap_or_else(|| "-".to_string())
}
