use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one investment lineage.
///
/// Lineage ids are derived from the owner, the normalized symbol and a
/// lineage counter, so two writers racing to create the same position target
/// the same stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct InvestmentId(String);

impl InvestmentId {
    pub fn new(id: impl Into<String>) -> Self {
        InvestmentId(id.into())
    }

    /// `owner:SYMBOL:n`, with `:` inside the owner or symbol escaped so that
    /// exchange-prefixed tickers cannot collide with another owner's stream
    pub fn lineage(owner: &str, symbol: &str, lineage: u32) -> Self {
        InvestmentId(format!(
            "{}:{}:{}",
            escape_component(owner),
            escape_component(&normalize_symbol(symbol)),
            lineage
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvestmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

fn escape_component(s: &str) -> String {
    s.replace('%', "%25").replace(':', "%3A")
}

/// Kind of instrument an investment holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentKind {
    #[default]
    Stock,
    Etf,
    MutualFund,
    Crypto,
    Bond,
    RealEstate,
    Other,
}

impl InvestmentKind {
    pub fn parse(s: &str) -> Option<InvestmentKind> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "stock" | "stocks" | "equity" | "share" | "shares" => Some(InvestmentKind::Stock),
            "etf" | "etfs" => Some(InvestmentKind::Etf),
            "mutualfund" | "fund" => Some(InvestmentKind::MutualFund),
            "crypto" | "cryptocurrency" => Some(InvestmentKind::Crypto),
            "bond" | "bonds" | "fixedincome" => Some(InvestmentKind::Bond),
            "realestate" | "reit" | "property" => Some(InvestmentKind::RealEstate),
            "other" => Some(InvestmentKind::Other),
            _ => None,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            InvestmentKind::Stock => "Stock",
            InvestmentKind::Etf => "ETF",
            InvestmentKind::MutualFund => "Mutual Fund",
            InvestmentKind::Crypto => "Crypto",
            InvestmentKind::Bond => "Bond",
            InvestmentKind::RealEstate => "Real Estate",
            InvestmentKind::Other => "Other",
        }
    }
}

/// Kind of a recorded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Buy,
    Sell,
    /// Cash dividend, no change in quantity
    Dividend,
    DividendReinvestment,
    TransferIn,
    TransferOut,
}

impl TransactionKind {
    pub fn is_dividend(self) -> bool {
        matches!(
            self,
            TransactionKind::Dividend | TransactionKind::DividendReinvestment
        )
    }

    /// Kinds that take units out of the position
    pub fn reduces_quantity(self) -> bool {
        matches!(self, TransactionKind::Sell | TransactionKind::TransferOut)
    }

    pub fn display(self) -> &'static str {
        match self {
            TransactionKind::Buy => "Buy",
            TransactionKind::Sell => "Sell",
            TransactionKind::Dividend => "Dividend",
            TransactionKind::DividendReinvestment => "DividendReinvestment",
            TransactionKind::TransferIn => "TransferIn",
            TransactionKind::TransferOut => "TransferOut",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvestmentCreated {
    pub investment_id: InvestmentId,
    pub owner: String,
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InvestmentKind,
    pub currency: String,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[schemars(with = "f64")]
    pub initial_investment: Decimal,
    /// Units bought with the initial investment, if the position starts funded
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub initial_quantity: Option<Decimal>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransactionRecorded {
    pub investment_id: InvestmentId,
    /// External idempotency key (broker order id or derived CSV key)
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[schemars(with = "f64")]
    pub unit_price: Decimal,
    /// Gross amount before fees
    #[schemars(with = "f64")]
    pub amount: Decimal,
    #[schemars(with = "f64")]
    pub fees: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TransactionRecorded {
    /// Amount received for a sale after fees
    pub fn net_proceeds(&self) -> Decimal {
        self.amount - self.fees
    }

    /// Amount paid for an acquisition including fees
    pub fn total_cost(&self) -> Decimal {
        self.amount + self.fees
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValuationUpdated {
    pub investment_id: InvestmentId,
    #[schemars(with = "f64")]
    pub new_value: Decimal,
    pub valuation_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Immutable domain event of an investment stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    InvestmentCreated(InvestmentCreated),
    TransactionRecorded(TransactionRecorded),
    ValuationUpdated(ValuationUpdated),
}

impl LedgerEvent {
    pub fn investment_id(&self) -> &InvestmentId {
        match self {
            LedgerEvent::InvestmentCreated(e) => &e.investment_id,
            LedgerEvent::TransactionRecorded(e) => &e.investment_id,
            LedgerEvent::ValuationUpdated(e) => &e.investment_id,
        }
    }

    /// Business date of the event
    pub fn date(&self) -> NaiveDate {
        match self {
            LedgerEvent::InvestmentCreated(e) => e.start_date,
            LedgerEvent::TransactionRecorded(e) => e.date,
            LedgerEvent::ValuationUpdated(e) => e.valuation_date,
        }
    }

    pub fn as_transaction(&self) -> Option<&TransactionRecorded> {
        match self {
            LedgerEvent::TransactionRecorded(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn display_type(&self) -> &'static str {
        match self {
            LedgerEvent::InvestmentCreated(_) => "Created",
            LedgerEvent::TransactionRecorded(tx) => tx.kind.display(),
            LedgerEvent::ValuationUpdated(_) => "Valuation",
        }
    }
}

/// An event as stored in the log, with its position in the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecordedEvent {
    pub investment_id: InvestmentId,
    /// 1-based, gap-free position within the investment's stream
    pub sequence: u64,
    #[schemars(with = "String")]
    pub recorded_at: DateTime<Utc>,
    pub event: LedgerEvent,
}

/// Root of the JSON schema printed by `schema json-schema`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LedgerStream {
    pub events: Vec<RecordedEvent>,
}
