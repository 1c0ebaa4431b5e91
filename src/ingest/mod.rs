//! Adapters that turn external records into processor commands

pub mod broker;
pub mod csv_import;
pub mod fields;
pub mod idempotency;
pub mod orders_file;

pub use self::broker::{
    BrokerClient, BrokerError, BrokerOrder, BrokerSync, OrderSide, SyncError, SyncReport,
};
pub use self::csv_import::{CsvError, CsvImporter, CsvTransactionRow, RowError};
pub use self::fields::CsvField;
pub use self::orders_file::JsonOrdersFile;

use crate::core::{Outcome, Rejection};
use serde::Serialize;

/// Problem with one row of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    /// 1-based data row (header excluded) or position in the fetched batch
    pub row: usize,
    pub key: Option<String>,
    pub message: String,
}

/// Counts for one ingestion run.
///
/// Every row lands in exactly one of `succeeded`, `duplicates`, `skipped`
/// (could not be parsed into a command) or `failed` (rejected by the
/// processor).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Every row was attempted and none failed for a storage reason, so the
    /// source can be discarded
    pub completed: bool,
    pub issues: Vec<RowIssue>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.duplicates + self.skipped + self.failed
    }

    pub(crate) fn skip(&mut self, row: usize, message: impl Into<String>) {
        let message = message.into();
        log::warn!("row {} skipped: {}", row, message);
        self.skipped += 1;
        self.issues.push(RowIssue {
            row,
            key: None,
            message,
        });
    }

    /// Count a processor result. Returns false when the failure was not the
    /// row's fault (storage or persistent conflict).
    pub(crate) fn record(
        &mut self,
        row: usize,
        key: &str,
        result: Result<Outcome, Rejection>,
    ) -> bool {
        match result {
            Ok(Outcome::Recorded(_)) => {
                self.succeeded += 1;
                true
            }
            Ok(Outcome::Duplicate(_)) => {
                self.duplicates += 1;
                true
            }
            Err(rejection) => {
                let recoverable = rejection.is_validation();
                if recoverable {
                    log::warn!("row {} ({}) rejected: {}", row, key, rejection);
                } else {
                    log::error!("row {} ({}) failed: {}", row, key, rejection);
                }
                self.failed += 1;
                self.issues.push(RowIssue {
                    row,
                    key: Some(key.to_string()),
                    message: rejection.to_string(),
                });
                recoverable
            }
        }
    }
}
