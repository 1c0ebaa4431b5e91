//! Dividend income per tax year, split into qualified and non-qualified

use crate::core::{
    project, read_owned_streams, DividendConfig, EventLog, EventLogError, InvestmentId,
    InvestmentState, RecordedEvent, TransactionKind, MAX_DIVIDEND_DAYS,
};
use crate::tax::TaxYear;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

/// What a qualification policy gets to see about one dividend
#[derive(Debug, Clone, Copy)]
pub struct DividendContext<'a> {
    /// Investment state folded over its whole stream
    pub investment: &'a InvestmentState,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub kind: TransactionKind,
}

/// Decides whether a dividend is taxed at the qualified rate
pub trait QualificationPolicy {
    fn is_qualified(&self, dividend: &DividendContext<'_>) -> bool;
}

/// Qualified when the position was held for at least `min_holding_days`
/// within `window_days` either side of the dividend date.
///
/// Positions carry a single acquisition date, so a top-up bought inside the
/// window inherits the holding period of the original lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldingPeriodPolicy {
    pub min_holding_days: i64,
    pub window_days: i64,
}

impl Default for HoldingPeriodPolicy {
    fn default() -> Self {
        HoldingPeriodPolicy::from(&DividendConfig::default())
    }
}

impl From<&DividendConfig> for HoldingPeriodPolicy {
    fn from(config: &DividendConfig) -> Self {
        HoldingPeriodPolicy {
            min_holding_days: config.min_holding_days,
            window_days: config.window_days,
        }
    }
}

impl HoldingPeriodPolicy {
    /// Days the position was held inside the window around `date`
    pub fn days_held_in_window(&self, investment: &InvestmentState, date: NaiveDate) -> i64 {
        let Some(acquired) = investment.acquisition_date else {
            return 0;
        };
        let window = Duration::days(self.window_days.clamp(0, MAX_DIVIDEND_DAYS));
        let window_start = date.checked_sub_signed(window).unwrap_or(NaiveDate::MIN);
        let window_end = date.checked_add_signed(window).unwrap_or(NaiveDate::MAX);

        let start = acquired.max(window_start);
        let end = investment
            .liquidation
            .as_ref()
            .map_or(window_end, |l| l.date)
            .min(window_end);
        (end - start).num_days().max(0)
    }
}

impl QualificationPolicy for HoldingPeriodPolicy {
    fn is_qualified(&self, dividend: &DividendContext<'_>) -> bool {
        self.days_held_in_window(dividend.investment, dividend.date) >= self.min_holding_days
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendEntry {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub qualified: bool,
}

/// Dividends of one investment within the year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendLine {
    pub investment_id: InvestmentId,
    pub symbol: String,
    pub name: String,
    pub entries: Vec<DividendEntry>,
    pub total: Decimal,
    pub qualified: Decimal,
    pub non_qualified: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendReport {
    pub owner: String,
    pub tax_year: TaxYear,
    pub lines: Vec<DividendLine>,
    pub total: Decimal,
    pub qualified: Decimal,
    pub non_qualified: Decimal,
}

/// Dividend report for every investment `owner` received dividends on in
/// `tax_year`
pub fn compute_for_year<L, P>(
    log: &L,
    owner: &str,
    tax_year: TaxYear,
    policy: &P,
) -> Result<DividendReport, EventLogError>
where
    L: EventLog + ?Sized,
    P: QualificationPolicy + ?Sized,
{
    let streams = read_owned_streams(log, owner)?;
    Ok(dividends_from_streams(owner, &streams, tax_year, policy))
}

pub fn dividends_from_streams<P: QualificationPolicy + ?Sized>(
    owner: &str,
    streams: &[Vec<RecordedEvent>],
    tax_year: TaxYear,
    policy: &P,
) -> DividendReport {
    let mut report = DividendReport {
        owner: owner.to_string(),
        tax_year,
        lines: Vec::new(),
        total: Decimal::ZERO,
        qualified: Decimal::ZERO,
        non_qualified: Decimal::ZERO,
    };

    for stream in streams {
        let investment = project(stream);
        let entries: Vec<DividendEntry> = stream
            .iter()
            .filter_map(|recorded| recorded.event.as_transaction())
            .filter(|tx| tx.kind.is_dividend() && tax_year.contains(tx.date))
            .map(|tx| {
                let qualified = policy.is_qualified(&DividendContext {
                    investment: &investment,
                    date: tx.date,
                    amount: tx.amount,
                    kind: tx.kind,
                });
                DividendEntry {
                    transaction_id: tx.transaction_id.clone(),
                    date: tx.date,
                    kind: tx.kind,
                    amount: tx.amount,
                    qualified,
                }
            })
            .collect();

        if entries.is_empty() {
            continue;
        }
        let Some(investment_id) = investment.investment_id.clone() else {
            log::warn!("dividend stream without a creation event skipped");
            continue;
        };

        let total: Decimal = entries.iter().map(|e| e.amount).sum();
        let qualified: Decimal = entries
            .iter()
            .filter(|e| e.qualified)
            .map(|e| e.amount)
            .sum();
        report.total += total;
        report.qualified += qualified;
        report.non_qualified += total - qualified;
        report.lines.push(DividendLine {
            investment_id,
            symbol: investment.symbol.clone(),
            name: investment.name.clone(),
            entries,
            total,
            qualified,
            non_qualified: total - qualified,
        });
    }

    report.lines.sort_by(|a, b| a.investment_id.cmp(&b.investment_id));
    report
}
