//! Stable keys for imported rows that carry no external id.
//!
//! The key hashes the row's semantic content, so re-importing the same file
//! yields the same keys. Identical rows within one file (two equal buys on
//! the same day) are told apart by their occurrence index.

use crate::core::TransactionKind;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

pub const DERIVED_KEY_PREFIX: &str = "csv:";

/// Content of a row that identifies it for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowFingerprint {
    pub owner: String,
    pub symbol: String,
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub quantity: String,
    pub amount: String,
}

impl RowFingerprint {
    pub fn new(
        owner: &str,
        symbol: &str,
        kind: TransactionKind,
        date: NaiveDate,
        quantity: Decimal,
        amount: Decimal,
    ) -> Self {
        RowFingerprint {
            owner: owner.to_string(),
            symbol: symbol.trim().to_uppercase(),
            kind,
            date,
            quantity: normalize_decimal(quantity),
            amount: normalize_decimal(amount),
        }
    }

    /// Key for the `occurrence`-th (0-based) row with this fingerprint
    pub fn key(&self, occurrence: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.owner.as_bytes());
        hasher.update(b"|");
        hasher.update(self.symbol.as_bytes());
        hasher.update(b"|");
        hasher.update(self.kind.display().as_bytes());
        hasher.update(b"|");
        hasher.update(self.date.format("%Y-%m-%d").to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.quantity.as_bytes());
        hasher.update(b"|");
        hasher.update(self.amount.as_bytes());
        hasher.update(b"|");
        hasher.update(occurrence.to_string().as_bytes());

        format!("{}{}", DERIVED_KEY_PREFIX, hex::encode(hasher.finalize()))
    }
}

/// "10", "10.0" and "10.00" hash alike
fn normalize_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}
