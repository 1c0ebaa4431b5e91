use super::events::{
    InvestmentCreated, InvestmentId, InvestmentKind, LedgerEvent, RecordedEvent,
    TransactionKind, TransactionRecorded, ValuationUpdated,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    #[default]
    Active,
    Sold,
}

/// Terminal facts of a fully liquidated position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Liquidation {
    pub date: NaiveDate,
    pub unit_price: Decimal,
    pub proceeds: Decimal,
}

/// Current state of one investment, folded from its event stream
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InvestmentState {
    pub investment_id: Option<InvestmentId>,
    pub owner: String,
    pub symbol: String,
    pub name: String,
    pub kind: InvestmentKind,
    pub currency: String,
    pub institution: Option<String>,
    pub account_number: Option<String>,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    /// Capital committed without units attached (unfunded creation)
    pub invested_capital: Decimal,
    pub total_fees: Decimal,
    pub total_dividends: Decimal,
    pub realized_gain: Decimal,
    pub status: PositionStatus,
    pub acquisition_date: Option<NaiveDate>,
    pub liquidation: Option<Liquidation>,
    pub market_value: Option<Decimal>,
    pub valuation_date: Option<NaiveDate>,
    /// External keys applied to this stream, mapped to their sequence number
    #[serde(skip)]
    pub applied_keys: HashMap<String, u64>,
    /// Sequence number of the last folded event
    pub version: u64,
}

impl InvestmentState {
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    /// Held units at average cost, plus capital committed without units
    pub fn cost_basis(&self) -> Decimal {
        self.quantity
            .saturating_mul(self.average_cost)
            .saturating_add(self.invested_capital)
    }

    pub fn unrealized_gain(&self) -> Option<Decimal> {
        self.market_value.map(|value| value - self.cost_basis())
    }

    pub fn has_applied(&self, key: &str) -> bool {
        self.applied_keys.contains_key(key)
    }

    /// Whether folding `tx` next stays within decimal range
    pub fn can_fold(&self, tx: &TransactionRecorded) -> bool {
        let mut trial = self.clone();
        trial.apply_transaction(tx).is_some()
    }

    /// Fold one recorded event into the state.
    ///
    /// Never fails: an event sequence the processor would have rejected is
    /// reported as an invariant violation and saturated. An event whose
    /// arithmetic overflows is left unapplied.
    pub fn apply(&mut self, recorded: &RecordedEvent) {
        if recorded.sequence != self.version + 1 {
            log::error!(
                "invariant violation: {} expected sequence {} but folded {}",
                recorded.investment_id,
                self.version + 1,
                recorded.sequence
            );
            debug_assert!(false, "event sequence gap in {}", recorded.investment_id);
        }
        self.version = recorded.sequence;

        let folded = match &recorded.event {
            LedgerEvent::InvestmentCreated(created) => self.apply_created(created),
            LedgerEvent::TransactionRecorded(tx) => {
                self.applied_keys
                    .insert(tx.transaction_id.clone(), recorded.sequence);
                self.apply_transaction(tx)
            }
            LedgerEvent::ValuationUpdated(valuation) => {
                self.apply_valuation(valuation);
                Some(())
            }
        };
        if folded.is_none() {
            log::error!(
                "invariant violation: {} #{} overflows decimal range, left unapplied",
                recorded.investment_id,
                recorded.sequence
            );
            debug_assert!(false, "decimal overflow in {}", recorded.investment_id);
        }
    }

    fn apply_created(&mut self, created: &InvestmentCreated) -> Option<()> {
        self.investment_id = Some(created.investment_id.clone());
        self.owner = created.owner.clone();
        self.symbol = created.symbol.clone();
        self.name = created.name.clone();
        self.kind = created.kind;
        self.currency = created.currency.clone();
        self.institution = created.institution.clone();
        self.account_number = created.account_number.clone();
        self.status = PositionStatus::Active;
        self.acquisition_date = Some(created.start_date);

        match created.initial_quantity {
            Some(qty) if qty > Decimal::ZERO => {
                self.average_cost = created.initial_investment.checked_div(qty)?;
                self.quantity = qty;
            }
            _ => {
                self.quantity = Decimal::ZERO;
                self.invested_capital = created.initial_investment;
            }
        }
        Some(())
    }

    /// Fold a transaction, committing nothing when any step overflows
    fn apply_transaction(&mut self, tx: &TransactionRecorded) -> Option<()> {
        let total_fees = self.total_fees.checked_add(tx.fees)?;
        match tx.kind {
            TransactionKind::Buy => {
                let cost = tx.amount.checked_add(tx.fees)?;
                self.add_units(tx.quantity, cost, tx.date)?;
            }
            TransactionKind::DividendReinvestment => {
                let total_dividends = self.total_dividends.checked_add(tx.amount)?;
                if tx.quantity > Decimal::ZERO {
                    let cost = tx.amount.checked_add(tx.fees)?;
                    self.add_units(tx.quantity, cost, tx.date)?;
                }
                self.total_dividends = total_dividends;
            }
            TransactionKind::Dividend => {
                self.total_dividends = self.total_dividends.checked_add(tx.amount)?;
            }
            TransactionKind::Sell => {
                let sold = tx.quantity.min(self.quantity);
                let basis = sold.checked_mul(self.average_cost)?;
                let proceeds = tx.amount.checked_sub(tx.fees)?;
                let realized_gain = self
                    .realized_gain
                    .checked_add(proceeds.checked_sub(basis)?)?;
                self.remove_units(tx.quantity, tx);
                self.realized_gain = realized_gain;
                if self.quantity.is_zero() {
                    self.status = PositionStatus::Sold;
                    self.liquidation = Some(Liquidation {
                        date: tx.date,
                        unit_price: tx.unit_price,
                        proceeds,
                    });
                }
            }
            TransactionKind::TransferIn => {
                self.quantity = self.quantity.checked_add(tx.quantity)?;
            }
            TransactionKind::TransferOut => {
                self.remove_units(tx.quantity, tx);
            }
        }
        self.total_fees = total_fees;
        Some(())
    }

    fn add_units(&mut self, quantity: Decimal, cost: Decimal, date: NaiveDate) -> Option<()> {
        let new_quantity = self.quantity.checked_add(quantity)?;
        if !new_quantity.is_zero() {
            let held_cost = self.quantity.checked_mul(self.average_cost)?;
            self.average_cost = held_cost.checked_add(cost)?.checked_div(new_quantity)?;
        }
        self.quantity = new_quantity;
        self.acquisition_date = Some(match self.acquisition_date {
            Some(existing) => existing.min(date),
            None => date,
        });
        Some(())
    }

    /// Remove units, saturating at zero when more are removed than held
    fn remove_units(&mut self, quantity: Decimal, tx: &TransactionRecorded) {
        if quantity > self.quantity {
            log::error!(
                "invariant violation: {} removes {} units of {} but only {} held",
                tx.transaction_id,
                quantity,
                tx.investment_id,
                self.quantity
            );
            debug_assert!(false, "quantity would go negative in {}", tx.investment_id);
            self.quantity = Decimal::ZERO;
            return;
        }
        self.quantity -= quantity;
    }

    fn apply_valuation(&mut self, valuation: &ValuationUpdated) {
        self.market_value = Some(valuation.new_value);
        self.valuation_date = Some(valuation.valuation_date);
    }
}

/// Fold an ordered event sequence into investment state
pub fn project<'a, I>(events: I) -> InvestmentState
where
    I: IntoIterator<Item = &'a RecordedEvent>,
{
    let mut state = InvestmentState::default();
    for event in events {
        state.apply(event);
    }
    state
}
