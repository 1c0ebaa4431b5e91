//! Realized capital gains per tax year

use crate::core::{
    read_owned_streams, EventLog, EventLogError, InvestmentId, InvestmentState, RecordedEvent,
    TransactionKind,
};
use crate::tax::TaxYear;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Days a position may be held and still count as short-term
pub const SHORT_TERM_MAX_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingPeriod {
    ShortTerm,
    LongTerm,
}

impl HoldingPeriod {
    pub fn from_days(days: i64) -> Self {
        if days <= SHORT_TERM_MAX_DAYS {
            HoldingPeriod::ShortTerm
        } else {
            HoldingPeriod::LongTerm
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            HoldingPeriod::ShortTerm => "Short",
            HoldingPeriod::LongTerm => "Long",
        }
    }
}

/// One sale within the tax year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GainLossLine {
    pub investment_id: InvestmentId,
    pub symbol: String,
    pub name: String,
    pub transaction_id: String,
    pub sale_date: NaiveDate,
    pub acquisition_date: NaiveDate,
    pub holding_days: i64,
    pub quantity: Decimal,
    /// Quantity times the running average cost just before the sale
    pub cost_basis: Decimal,
    /// Quantity times unit price, less fees
    pub proceeds: Decimal,
    pub gain: Decimal,
    pub period: HoldingPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GainLossReport {
    pub owner: String,
    pub tax_year: TaxYear,
    pub lines: Vec<GainLossLine>,
    pub short_term_gains: Decimal,
    /// Magnitude of short-term losses (never negative)
    pub short_term_losses: Decimal,
    pub long_term_gains: Decimal,
    /// Magnitude of long-term losses (never negative)
    pub long_term_losses: Decimal,
}

impl GainLossReport {
    fn new(owner: &str, tax_year: TaxYear) -> Self {
        GainLossReport {
            owner: owner.to_string(),
            tax_year,
            lines: Vec::new(),
            short_term_gains: Decimal::ZERO,
            short_term_losses: Decimal::ZERO,
            long_term_gains: Decimal::ZERO,
            long_term_losses: Decimal::ZERO,
        }
    }

    fn add(&mut self, line: GainLossLine) {
        let (gains, losses) = match line.period {
            HoldingPeriod::ShortTerm => (&mut self.short_term_gains, &mut self.short_term_losses),
            HoldingPeriod::LongTerm => (&mut self.long_term_gains, &mut self.long_term_losses),
        };
        if line.gain >= Decimal::ZERO {
            *gains += line.gain;
        } else {
            *losses += -line.gain;
        }
        self.lines.push(line);
    }

    pub fn net_short_term(&self) -> Decimal {
        self.short_term_gains - self.short_term_losses
    }

    pub fn net_long_term(&self) -> Decimal {
        self.long_term_gains - self.long_term_losses
    }

    pub fn net(&self) -> Decimal {
        self.net_short_term() + self.net_long_term()
    }

    pub fn total_proceeds(&self) -> Decimal {
        self.lines.iter().map(|l| l.proceeds).sum()
    }

    pub fn total_cost_basis(&self) -> Decimal {
        self.lines.iter().map(|l| l.cost_basis).sum()
    }
}

/// Gain/loss report for every sale `owner` made in `tax_year`
pub fn compute_for_year<L: EventLog + ?Sized>(
    log: &L,
    owner: &str,
    tax_year: TaxYear,
) -> Result<GainLossReport, EventLogError> {
    let streams = read_owned_streams(log, owner)?;
    Ok(gains_from_streams(owner, &streams, tax_year))
}

/// Replays each stream in sequence order, pricing every sale against the
/// state folded up to the event before it.
pub fn gains_from_streams(
    owner: &str,
    streams: &[Vec<RecordedEvent>],
    tax_year: TaxYear,
) -> GainLossReport {
    let mut report = GainLossReport::new(owner, tax_year);

    for stream in streams {
        let mut state = InvestmentState::default();
        for recorded in stream {
            if let Some(tx) = recorded.event.as_transaction() {
                if tx.kind == TransactionKind::Sell && tax_year.contains(tx.date) {
                    let acquisition_date = state.acquisition_date.unwrap_or(tx.date);
                    let holding_days = (tx.date - acquisition_date).num_days();
                    let cost_basis = tx.quantity * state.average_cost;
                    let proceeds = tx.quantity * tx.unit_price - tx.fees;
                    report.add(GainLossLine {
                        investment_id: recorded.investment_id.clone(),
                        symbol: state.symbol.clone(),
                        name: state.name.clone(),
                        transaction_id: tx.transaction_id.clone(),
                        sale_date: tx.date,
                        acquisition_date,
                        holding_days,
                        quantity: tx.quantity,
                        cost_basis,
                        proceeds,
                        gain: proceeds - cost_basis,
                        period: HoldingPeriod::from_days(holding_days),
                    });
                }
            }
            state.apply(recorded);
        }
    }

    report.lines.sort_by(|a, b| {
        a.sale_date
            .cmp(&b.sale_date)
            .then_with(|| a.investment_id.cmp(&b.investment_id))
    });
    log::debug!(
        "{} sales for {} in {}",
        report.lines.len(),
        owner,
        tax_year
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::tests::{date, StreamBuilder};
    use crate::core::{InMemoryEventLog, TransactionKind::*};
    use rust_decimal_macros::dec;

    fn stream(n: u32) -> StreamBuilder {
        StreamBuilder::new(InvestmentId::lineage("alice", "AAPL", n), "2022-01-10")
    }

    #[test]
    fn long_term_gain_on_full_liquidation() {
        let events = stream(1)
            .tx(Buy, "2022-01-10", dec!(10), dec!(100), dec!(0))
            .tx(Sell, "2023-06-01", dec!(10), dec!(150), dec!(5))
            .build();

        let report = gains_from_streams("alice", &[events], TaxYear(2023));

        assert_eq!(report.lines.len(), 1);
        let line = &report.lines[0];
        assert_eq!(line.cost_basis, dec!(1000));
        assert_eq!(line.proceeds, dec!(1495));
        assert_eq!(line.gain, dec!(495));
        assert_eq!(line.period, HoldingPeriod::LongTerm);
        assert_eq!(report.long_term_gains, dec!(495));
        assert_eq!(report.short_term_gains, dec!(0));
        assert_eq!(report.net(), dec!(495));
    }

    #[test]
    fn holding_period_boundary() {
        assert_eq!(HoldingPeriod::from_days(365), HoldingPeriod::ShortTerm);
        assert_eq!(HoldingPeriod::from_days(366), HoldingPeriod::LongTerm);

        let events = stream(1)
            .tx(Buy, "2022-01-10", dec!(2), dec!(100), dec!(0))
            .tx(Sell, "2023-01-10", dec!(1), dec!(90), dec!(0))
            .tx(Sell, "2023-01-11", dec!(1), dec!(90), dec!(0))
            .build();

        let report = gains_from_streams("alice", &[events], TaxYear(2023));
        assert_eq!(report.lines[0].holding_days, 365);
        assert_eq!(report.lines[0].period, HoldingPeriod::ShortTerm);
        assert_eq!(report.lines[1].holding_days, 366);
        assert_eq!(report.lines[1].period, HoldingPeriod::LongTerm);
        assert_eq!(report.short_term_losses, dec!(10));
        assert_eq!(report.long_term_losses, dec!(10));
        assert_eq!(report.net(), dec!(-20));
    }

    #[test]
    fn cost_uses_average_before_each_sale() {
        let events = stream(1)
            .tx(Buy, "2023-01-10", dec!(10), dec!(100), dec!(0))
            .tx(Sell, "2023-02-01", dec!(5), dec!(120), dec!(0))
            .tx(Buy, "2023-03-01", dec!(5), dec!(200), dec!(0))
            .tx(Sell, "2023-04-01", dec!(5), dec!(180), dec!(0))
            .build();

        let report = gains_from_streams("alice", &[events], TaxYear(2023));
        assert_eq!(report.lines[0].cost_basis, dec!(500));
        // 5 @ 100 + 5 @ 200 averages to 150
        assert_eq!(report.lines[1].cost_basis, dec!(750));
        assert_eq!(report.short_term_gains, dec!(100) + dec!(150));
    }

    #[test]
    fn sales_outside_year_ignored() {
        let events = stream(1)
            .tx(Buy, "2022-01-10", dec!(10), dec!(100), dec!(0))
            .tx(Sell, "2022-12-31", dec!(5), dec!(150), dec!(0))
            .tx(Sell, "2024-01-01", dec!(5), dec!(150), dec!(0))
            .build();

        let report = gains_from_streams("alice", &[events], TaxYear(2023));
        assert!(report.lines.is_empty());
        assert_eq!(report.net(), dec!(0));
    }

    #[test]
    fn reads_only_owner_streams_from_log() {
        let log = InMemoryEventLog::new();
        let events = stream(1)
            .tx(Buy, "2023-01-10", dec!(1), dec!(100), dec!(0))
            .tx(Sell, "2023-02-10", dec!(1), dec!(110), dec!(0))
            .build();
        for (version, recorded) in events.iter().enumerate() {
            log.append(&recorded.investment_id, version as u64, recorded.event.clone())
                .unwrap();
        }

        let alice = compute_for_year(&log, "alice", TaxYear(2023)).unwrap();
        assert_eq!(alice.lines.len(), 1);
        assert_eq!(alice.lines[0].sale_date, date("2023-02-10"));

        let bob = compute_for_year(&log, "bob", TaxYear(2023)).unwrap();
        assert!(bob.lines.is_empty());
    }
}
