//! Brokerage CSV exports

use super::fields::{canonical_headers, parse_date, parse_decimal, ColumnMap, CsvField};
use super::idempotency::RowFingerprint;
use super::BatchSummary;
use crate::core::{
    EventLog, InvestmentKind, TransactionCommand, TransactionKind, TransactionProcessor,
};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use ledger_derive::CsvFields;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

/// One data row, after its columns were matched to these fields by name or
/// alias
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, CsvFields)]
pub struct CsvTransactionRow {
    /// Ticker symbol of the instrument
    #[csv(alias = "symbol", alias = "ticker symbol", alias = "instrument", alias = "security")]
    pub ticker: String,
    /// buy, sell, dividend, dividend_reinvestment, transfer_in or transfer_out
    #[csv(alias = "type", alias = "side", alias = "transaction type", alias = "activity")]
    pub action: String,
    /// Trade date (YYYY-MM-DD, MM/DD/YYYY, DD.MM.YYYY or RFC 3339)
    #[csv(alias = "trade date", alias = "transaction date", alias = "activity date")]
    pub date: String,
    /// Units traded
    #[csv(alias = "shares", alias = "no. of shares", alias = "units", alias = "qty")]
    pub quantity: Option<String>,
    /// Price per unit; total / quantity when omitted
    #[csv(alias = "unit price", alias = "share price", alias = "price per share")]
    pub price: Option<String>,
    /// ISO currency code; the configured default when omitted
    #[csv(alias = "ccy", alias = "currency code")]
    pub currency: Option<String>,
    /// Gross amount before fees; quantity x price when omitted
    #[csv(alias = "amount", alias = "total amount", alias = "gross amount", alias = "value")]
    pub total: Option<String>,
    /// Fees and commissions
    #[csv(alias = "fees", alias = "commission", alias = "commissions")]
    pub fee: Option<String>,
    /// Broker transaction id; derived from the row content when omitted
    #[csv(alias = "transaction id", alias = "order id", alias = "reference", alias = "id")]
    pub external_id: Option<String>,
    /// Instrument name used when the investment is first created
    #[csv(alias = "security name", alias = "instrument name", alias = "description")]
    pub name: Option<String>,
    /// stock, etf, mutual_fund, crypto, bond, real_estate or other
    #[csv(alias = "investment type", alias = "security type", alias = "asset class")]
    pub asset_type: Option<String>,
    /// Free-form notes
    #[csv(alias = "memo", alias = "comment")]
    pub notes: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),
    #[error("cannot read CSV header: {0}")]
    Header(#[source] csv::Error),
}

/// Why a row could not become a command
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("malformed row: {0}")]
    Malformed(#[from] csv::Error),
    #[error("missing ticker")]
    MissingTicker,
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("unknown investment type '{0}'")]
    UnknownInvestmentType(String),
    #[error("invalid date '{0}'")]
    InvalidDate(String),
    #[error("invalid {field}: {message}")]
    InvalidNumber { field: &'static str, message: String },
    #[error("{0} requires a quantity")]
    MissingQuantity(&'static str),
    #[error("no total, and no quantity and price to derive it from")]
    MissingAmount,
}

/// Map an action label to a transaction kind
pub fn parse_action(raw: &str) -> Option<TransactionKind> {
    let normalized: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let kind = match normalized.as_str() {
        "buy" | "bought" | "purchase" | "b" => TransactionKind::Buy,
        "sell" | "sold" | "sale" | "s" => TransactionKind::Sell,
        "dividend" | "div" | "cashdividend" => TransactionKind::Dividend,
        "dividendreinvestment" | "reinvestment" | "reinvest" | "drip" => {
            TransactionKind::DividendReinvestment
        }
        "transferin" | "deliveredin" | "receive" => TransactionKind::TransferIn,
        "transferout" | "deliveredout" | "deliver" => TransactionKind::TransferOut,
        _ => return None,
    };
    Some(kind)
}

fn number(raw: &Option<String>, field: &'static str) -> Result<Option<Decimal>, RowError> {
    match raw {
        Some(value) => parse_decimal(value)
            .map(|v| v.map(|d| d.abs()))
            .map_err(|message| RowError::InvalidNumber { field, message }),
        None => Ok(None),
    }
}

/// Reads CSV exports into commands for one owner
pub struct CsvImporter<'a, L> {
    processor: &'a TransactionProcessor<L>,
    owner: String,
    default_currency: String,
    date_format: Option<String>,
}

impl<'a, L: EventLog> CsvImporter<'a, L> {
    pub fn new(
        processor: &'a TransactionProcessor<L>,
        owner: &str,
        default_currency: &str,
    ) -> Self {
        CsvImporter {
            processor,
            owner: owner.to_string(),
            default_currency: default_currency.trim().to_uppercase(),
            date_format: None,
        }
    }

    pub fn with_date_format(mut self, format: Option<String>) -> Self {
        self.date_format = format;
        self
    }

    /// Import every row of `reader`.
    ///
    /// Rows that cannot be parsed are skipped and counted. Only an unusable
    /// header aborts the import.
    pub fn import<R: Read>(&self, reader: R) -> Result<BatchSummary, CsvError> {
        let mut rows: Vec<_> = self
            .read_commands(reader)?
            .into_iter()
            .enumerate()
            .map(|(index, row)| (index + 1, row))
            .collect();
        // apply oldest first, so newest-first exports still see each buy
        // before the sell that closes it
        let dates: Vec<NaiveDate> = rows
            .iter()
            .filter_map(|(_, row)| row.as_ref().ok().map(|c| c.date))
            .collect();
        if dates.first() > dates.last() {
            rows.reverse();
        }
        rows.sort_by_key(|(_, row)| row.as_ref().ok().map(|c| c.date));

        let mut summary = BatchSummary {
            completed: true,
            ..BatchSummary::default()
        };
        for (row_number, row) in rows {
            match row {
                Ok(command) => {
                    let key = command.external_key.clone();
                    let result = self.processor.handle(&command);
                    if !summary.record(row_number, &key, result) {
                        summary.completed = false;
                    }
                }
                Err(err) => summary.skip(row_number, err.to_string()),
            }
        }

        log::info!(
            "imported CSV for {}: {} recorded, {} duplicate, {} skipped, {} failed",
            self.owner,
            summary.succeeded,
            summary.duplicates,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    /// Parse every data row into a command without applying anything
    pub fn read_commands<R: Read>(
        &self,
        reader: R,
    ) -> Result<Vec<Result<TransactionCommand, RowError>>, CsvError> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);
        let fields = CsvTransactionRow::csv_fields();
        let headers = rdr.headers().map_err(CsvError::Header)?.clone();
        let columns = ColumnMap::resolve(&headers, fields).map_err(CsvError::MissingColumns)?;
        let canonical = canonical_headers(fields);

        let mut occurrences: HashMap<RowFingerprint, usize> = HashMap::new();
        let mut commands = Vec::new();
        for record in rdr.records() {
            let command = record
                .map_err(RowError::from)
                .and_then(|record| self.parse_record(&record, &columns, &canonical))
                .map(|(mut command, fingerprint)| {
                    if let Some(fingerprint) = fingerprint {
                        let seen = occurrences.entry(fingerprint.clone()).or_insert(0);
                        command.external_key = fingerprint.key(*seen);
                        *seen += 1;
                    }
                    command
                });
            commands.push(command);
        }
        Ok(commands)
    }

    fn parse_record(
        &self,
        record: &StringRecord,
        columns: &ColumnMap,
        canonical: &StringRecord,
    ) -> Result<(TransactionCommand, Option<RowFingerprint>), RowError> {
        let row: CsvTransactionRow = columns
            .canonical(record, CsvTransactionRow::csv_fields())
            .deserialize(Some(canonical))?;
        self.to_command(row)
    }

    fn to_command(
        &self,
        row: CsvTransactionRow,
    ) -> Result<(TransactionCommand, Option<RowFingerprint>), RowError> {
        if row.ticker.trim().is_empty() {
            return Err(RowError::MissingTicker);
        }
        let kind = parse_action(&row.action)
            .ok_or_else(|| RowError::UnknownAction(row.action.clone()))?;
        let date: NaiveDate = parse_date(&row.date, self.date_format.as_deref())
            .ok_or_else(|| RowError::InvalidDate(row.date.clone()))?;
        let investment_kind = match row.asset_type.as_deref() {
            Some(raw) => Some(
                InvestmentKind::parse(raw)
                    .ok_or_else(|| RowError::UnknownInvestmentType(raw.to_string()))?,
            ),
            None => None,
        };

        let quantity = number(&row.quantity, "quantity")?;
        let price = number(&row.price, "price")?;
        let total = number(&row.total, "total")?;
        let fee = number(&row.fee, "fee")?.unwrap_or(Decimal::ZERO);

        let quantity = match (kind, quantity) {
            (TransactionKind::Dividend | TransactionKind::DividendReinvestment, q) => {
                q.unwrap_or(Decimal::ZERO)
            }
            (_, Some(q)) => q,
            (_, None) => return Err(RowError::MissingQuantity(kind.display())),
        };
        let amount = match (total, price) {
            (Some(total), _) => total,
            (None, Some(price)) => {
                quantity
                    .checked_mul(price)
                    .ok_or_else(|| RowError::InvalidNumber {
                        field: "total",
                        message: format!("{} x {} is out of range", quantity, price),
                    })?
            }
            // transfers move units, not money
            (None, None)
                if matches!(kind, TransactionKind::TransferIn | TransactionKind::TransferOut) =>
            {
                Decimal::ZERO
            }
            (None, None) => return Err(RowError::MissingAmount),
        };
        let unit_price = match price {
            Some(price) => price,
            None if !quantity.is_zero() => {
                amount
                    .checked_div(quantity)
                    .ok_or_else(|| RowError::InvalidNumber {
                        field: "price",
                        message: format!("{} / {} is out of range", amount, quantity),
                    })?
            }
            None => Decimal::ZERO,
        };

        let symbol = row.ticker.trim().to_uppercase();
        let currency = row
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.default_currency.clone());

        let external_id = row
            .external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let fingerprint = match external_id {
            Some(_) => None,
            None => Some(RowFingerprint::new(
                &self.owner,
                &symbol,
                kind,
                date,
                quantity,
                amount,
            )),
        };

        let command = TransactionCommand {
            owner: self.owner.clone(),
            symbol,
            name: row.name.filter(|n| !n.trim().is_empty()),
            investment_kind,
            external_key: external_id.unwrap_or_default(),
            kind,
            quantity,
            unit_price,
            amount,
            fee,
            currency,
            date,
            notes: row.notes,
        };
        Ok((command, fingerprint))
    }
}
