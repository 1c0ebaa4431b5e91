use super::aggregate::InvestmentState;
use super::cache::ProjectionCache;
use super::config::ProcessorConfig;
use super::events::{
    normalize_symbol, InvestmentCreated, InvestmentId, InvestmentKind, LedgerEvent,
    RecordedEvent, TransactionKind, TransactionRecorded, ValuationUpdated,
};
use super::log::{EventLog, EventLogError};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// One normalized external transaction, ready to be applied
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionCommand {
    pub owner: String,
    pub symbol: String,
    /// Display name used if this command creates the investment
    pub name: Option<String>,
    pub investment_kind: Option<InvestmentKind>,
    /// Broker order id, or a key derived from the row content
    pub external_key: String,
    pub kind: TransactionKind,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Gross amount before fees
    pub amount: Decimal,
    pub fee: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

/// Explicit creation of a manually tracked investment
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInvestment {
    pub owner: String,
    pub symbol: String,
    pub name: String,
    pub kind: InvestmentKind,
    pub currency: String,
    pub institution: Option<String>,
    pub account_number: Option<String>,
    pub initial_investment: Decimal,
    pub initial_quantity: Option<Decimal>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Result of a successfully handled command
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A new event was appended
    Recorded(RecordedEvent),
    /// The external key was already applied; this is the earlier event
    Duplicate(RecordedEvent),
}

impl Outcome {
    pub fn event(&self) -> &RecordedEvent {
        match self {
            Outcome::Recorded(e) | Outcome::Duplicate(e) => e,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Outcome::Duplicate(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("owner is required")]
    MissingOwner,
    #[error("symbol is required")]
    MissingSymbol,
    #[error("external key is required")]
    MissingExternalKey,
    #[error("{kind:?} requires a positive quantity, got {quantity}")]
    InvalidQuantity {
        kind: TransactionKind,
        quantity: Decimal,
    },
    #[error("{field} must not be negative, got {value}")]
    NegativeAmount { field: &'static str, value: Decimal },
    #[error("dividend amount must be positive, got {0}")]
    InvalidDividend(Decimal),
    #[error("insufficient quantity: held {held}, requested {requested}")]
    InsufficientQuantity { held: Decimal, requested: Decimal },
    #[error("currency {found} does not match investment currency {expected}")]
    CurrencyMismatch { expected: String, found: String },
    #[error("investment not found: {0}")]
    UnknownInvestment(InvestmentId),
    #[error("investment {0} belongs to another owner")]
    NotOwner(InvestmentId),
    #[error("an active position already exists: {0}")]
    PositionExists(InvestmentId),
    #[error("amounts exceed the representable decimal range")]
    Overflow,
    #[error("concurrency conflict on {investment_id} persisted after {attempts} attempts")]
    Conflict {
        investment_id: InvestmentId,
        attempts: u32,
    },
    #[error(transparent)]
    Storage(EventLogError),
}

impl From<EventLogError> for Rejection {
    fn from(err: EventLogError) -> Self {
        Rejection::Storage(err)
    }
}

impl Rejection {
    /// Whether the command itself was invalid, as opposed to the ledger
    /// failing to store it
    pub fn is_validation(&self) -> bool {
        !matches!(self, Rejection::Conflict { .. } | Rejection::Storage(_))
    }
}

/// Validates commands against folded investment state and appends the
/// resulting events.
pub struct TransactionProcessor<L> {
    log: L,
    cache: ProjectionCache,
    config: ProcessorConfig,
}

impl<L: EventLog> TransactionProcessor<L> {
    pub fn new(log: L, config: ProcessorConfig) -> Self {
        TransactionProcessor {
            log,
            cache: ProjectionCache::new(),
            config,
        }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Apply one external transaction.
    ///
    /// Appends exactly one `TransactionRecorded` on success (preceded by an
    /// `InvestmentCreated` when the symbol has no active lineage), and nothing
    /// on rejection or duplicate.
    pub fn handle(&self, command: &TransactionCommand) -> Result<Outcome, Rejection> {
        validate_command(command)?;
        self.with_retries(|| self.try_handle(command))
    }

    /// Append an explicit `InvestmentCreated` for a new lineage
    pub fn create_investment(&self, request: &CreateInvestment) -> Result<RecordedEvent, Rejection> {
        if request.owner.trim().is_empty() {
            return Err(Rejection::MissingOwner);
        }
        if request.symbol.trim().is_empty() {
            return Err(Rejection::MissingSymbol);
        }
        if request.initial_investment < Decimal::ZERO {
            return Err(Rejection::NegativeAmount {
                field: "initial_investment",
                value: request.initial_investment,
            });
        }
        if let Some(qty) = request.initial_quantity {
            if qty < Decimal::ZERO {
                return Err(Rejection::NegativeAmount {
                    field: "initial_quantity",
                    value: qty,
                });
            }
            if qty > Decimal::ZERO && request.initial_investment.checked_div(qty).is_none() {
                return Err(Rejection::Overflow);
            }
        }

        self.with_retries(|| {
            let lineages = self.lineages(&request.owner, &request.symbol)?;
            if let Some(active) = lineages.iter().rev().find(|s| s.is_active()) {
                if let Some(id) = &active.investment_id {
                    return Err(Rejection::PositionExists(id.clone()));
                }
            }
            let investment_id =
                InvestmentId::lineage(&request.owner, &request.symbol, lineages.len() as u32 + 1);
            let event = LedgerEvent::InvestmentCreated(InvestmentCreated {
                investment_id: investment_id.clone(),
                owner: request.owner.clone(),
                symbol: normalize_symbol(&request.symbol),
                name: request.name.clone(),
                kind: request.kind,
                currency: request.currency.trim().to_uppercase(),
                institution: request.institution.clone(),
                account_number: request.account_number.clone(),
                initial_investment: request.initial_investment,
                initial_quantity: request.initial_quantity,
                start_date: request.start_date,
                end_date: request.end_date,
                description: request.description.clone(),
            });
            let recorded = self.log.append(&investment_id, 0, event)?;
            log::info!("created investment {}", investment_id);
            Ok(recorded)
        })
    }

    /// Append a `ValuationUpdated` for an existing investment
    pub fn record_valuation(
        &self,
        owner: &str,
        investment_id: &InvestmentId,
        new_value: Decimal,
        valuation_date: NaiveDate,
        notes: Option<String>,
    ) -> Result<RecordedEvent, Rejection> {
        if new_value < Decimal::ZERO {
            return Err(Rejection::NegativeAmount {
                field: "new_value",
                value: new_value,
            });
        }
        self.with_retries(|| {
            let state = self.cache.load(&self.log, investment_id)?;
            if state.version == 0 {
                return Err(Rejection::UnknownInvestment(investment_id.clone()));
            }
            if state.owner != owner {
                return Err(Rejection::NotOwner(investment_id.clone()));
            }
            let event = LedgerEvent::ValuationUpdated(ValuationUpdated {
                investment_id: investment_id.clone(),
                new_value,
                valuation_date,
                notes: notes.clone(),
            });
            Ok(self.log.append(investment_id, state.version, event)?)
        })
    }

    /// Current state of every lineage owned by `owner`
    pub fn positions(&self, owner: &str) -> Result<Vec<InvestmentState>, EventLogError> {
        let mut positions = Vec::new();
        for id in self.log.investment_ids()? {
            let state = self.cache.load(&self.log, &id)?;
            if state.owner == owner {
                positions.push(state);
            }
        }
        Ok(positions)
    }

    pub fn state(&self, investment_id: &InvestmentId) -> Result<InvestmentState, EventLogError> {
        self.cache.load(&self.log, investment_id)
    }

    fn with_retries<T>(
        &self,
        mut attempt: impl FnMut() -> Result<T, Rejection>,
    ) -> Result<T, Rejection> {
        let max_attempts = self.config.max_append_retries.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt() {
                Err(Rejection::Storage(EventLogError::ConcurrencyConflict {
                    investment_id,
                    expected,
                    actual,
                })) => {
                    if attempts >= max_attempts {
                        log::warn!(
                            "giving up on {} after {} conflicting appends",
                            investment_id,
                            attempts
                        );
                        return Err(Rejection::Conflict {
                            investment_id,
                            attempts,
                        });
                    }
                    log::debug!(
                        "conflict on {} (expected {}, found {}), retrying",
                        investment_id,
                        expected,
                        actual
                    );
                }
                other => return other,
            }
        }
    }

    /// All lineages of (owner, symbol), oldest first
    fn lineages(&self, owner: &str, symbol: &str) -> Result<Vec<InvestmentState>, Rejection> {
        let mut lineages = Vec::new();
        for lineage in 1.. {
            let id = InvestmentId::lineage(owner, symbol, lineage);
            let state = self.cache.load(&self.log, &id)?;
            if state.version == 0 {
                break;
            }
            if state.owner != owner || state.symbol != normalize_symbol(symbol) {
                return Err(Rejection::NotOwner(id));
            }
            lineages.push(state);
        }
        Ok(lineages)
    }

    fn try_handle(&self, command: &TransactionCommand) -> Result<Outcome, Rejection> {
        let lineages = self.lineages(&command.owner, &command.symbol)?;

        for state in &lineages {
            if let Some(&sequence) = state.applied_keys.get(&command.external_key) {
                if let Some(id) = &state.investment_id {
                    let prior = self.prior_event(id, sequence)?;
                    log::debug!(
                        "duplicate key {} already applied to {} #{}",
                        command.external_key,
                        id,
                        sequence
                    );
                    return Ok(Outcome::Duplicate(prior));
                }
            }
        }

        let active = match lineages.last() {
            Some(state) if state.is_active() => Some(state.clone()),
            _ if command.kind.reduces_quantity() => {
                return Err(Rejection::InsufficientQuantity {
                    held: Decimal::ZERO,
                    requested: command.quantity,
                })
            }
            _ => None,
        };
        let target = match active {
            Some(state) => state,
            None => {
                let lineage = lineages.len() as u32 + 1;
                let provisional = InvestmentId::lineage(&command.owner, &command.symbol, lineage);
                if !InvestmentState::default().can_fold(&transaction(&provisional, command)) {
                    return Err(Rejection::Overflow);
                }
                self.create_implicit(command, lineage)?
            }
        };

        let investment_id = target
            .investment_id
            .clone()
            .ok_or_else(|| Rejection::UnknownInvestment(InvestmentId::new(&command.symbol)))?;
        let tx = transaction(&investment_id, command);
        validate_against(&target, command, &tx)?;
        let event = LedgerEvent::TransactionRecorded(tx);
        let recorded = self.log.append(&investment_id, target.version, event)?;
        log::info!(
            "recorded {} {} {} @ {} on {} ({})",
            command.kind.display(),
            command.quantity,
            command.symbol,
            command.unit_price,
            investment_id,
            command.external_key
        );
        Ok(Outcome::Recorded(recorded))
    }

    fn create_implicit(
        &self,
        command: &TransactionCommand,
        lineage: u32,
    ) -> Result<InvestmentState, Rejection> {
        let investment_id = InvestmentId::lineage(&command.owner, &command.symbol, lineage);
        let symbol = normalize_symbol(&command.symbol);
        let event = LedgerEvent::InvestmentCreated(InvestmentCreated {
            investment_id: investment_id.clone(),
            owner: command.owner.clone(),
            name: command.name.clone().unwrap_or_else(|| symbol.clone()),
            symbol,
            kind: command.investment_kind.unwrap_or_default(),
            currency: command.currency.trim().to_uppercase(),
            institution: None,
            account_number: None,
            initial_investment: Decimal::ZERO,
            initial_quantity: None,
            start_date: command.date,
            end_date: None,
            description: None,
        });
        self.log.append(&investment_id, 0, event)?;
        log::info!(
            "created investment {} from {}",
            investment_id,
            command.external_key
        );
        Ok(self.cache.load(&self.log, &investment_id)?)
    }

    fn prior_event(&self, id: &InvestmentId, sequence: u64) -> Result<RecordedEvent, Rejection> {
        self.log
            .read_from(id, sequence - 1)?
            .into_iter()
            .next()
            .ok_or_else(|| Rejection::UnknownInvestment(id.clone()))
    }
}

fn validate_command(command: &TransactionCommand) -> Result<(), Rejection> {
    if command.owner.trim().is_empty() {
        return Err(Rejection::MissingOwner);
    }
    if command.symbol.trim().is_empty() {
        return Err(Rejection::MissingSymbol);
    }
    if command.external_key.trim().is_empty() {
        return Err(Rejection::MissingExternalKey);
    }
    for (field, value) in [
        ("quantity", command.quantity),
        ("unit_price", command.unit_price),
        ("amount", command.amount),
        ("fee", command.fee),
    ] {
        if value < Decimal::ZERO {
            return Err(Rejection::NegativeAmount { field, value });
        }
    }
    if command.quantity.checked_mul(command.unit_price).is_none()
        || command.amount.checked_add(command.fee).is_none()
    {
        return Err(Rejection::Overflow);
    }
    match command.kind {
        TransactionKind::Buy
        | TransactionKind::Sell
        | TransactionKind::TransferIn
        | TransactionKind::TransferOut => {
            if command.quantity <= Decimal::ZERO {
                return Err(Rejection::InvalidQuantity {
                    kind: command.kind,
                    quantity: command.quantity,
                });
            }
        }
        TransactionKind::Dividend | TransactionKind::DividendReinvestment => {
            if command.amount <= Decimal::ZERO {
                return Err(Rejection::InvalidDividend(command.amount));
            }
        }
    }
    Ok(())
}

fn transaction(investment_id: &InvestmentId, command: &TransactionCommand) -> TransactionRecorded {
    TransactionRecorded {
        investment_id: investment_id.clone(),
        transaction_id: command.external_key.clone(),
        kind: command.kind,
        quantity: command.quantity,
        unit_price: command.unit_price,
        amount: command.amount,
        fees: command.fee,
        currency: command.currency.trim().to_uppercase(),
        date: command.date,
        notes: command.notes.clone(),
    }
}

fn validate_against(
    state: &InvestmentState,
    command: &TransactionCommand,
    tx: &TransactionRecorded,
) -> Result<(), Rejection> {
    if !state.currency.eq_ignore_ascii_case(command.currency.trim()) {
        return Err(Rejection::CurrencyMismatch {
            expected: state.currency.clone(),
            found: command.currency.clone(),
        });
    }
    if command.kind.reduces_quantity() && command.quantity > state.quantity {
        return Err(Rejection::InsufficientQuantity {
            held: state.quantity,
            requested: command.quantity,
        });
    }
    if !state.can_fold(tx) {
        return Err(Rejection::Overflow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::{project, PositionStatus};
    use crate::core::log::InMemoryEventLog;
    use rust_decimal_macros::dec;

    fn processor() -> TransactionProcessor<InMemoryEventLog> {
        TransactionProcessor::new(InMemoryEventLog::new(), ProcessorConfig::default())
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn command(
        key: &str,
        kind: TransactionKind,
        quantity: Decimal,
        price: Decimal,
        fee: Decimal,
        on: &str,
    ) -> TransactionCommand {
        TransactionCommand {
            owner: "alice".to_string(),
            symbol: "AAPL".to_string(),
            name: Some("Apple Inc".to_string()),
            investment_kind: Some(InvestmentKind::Stock),
            external_key: key.to_string(),
            kind,
            quantity,
            unit_price: price,
            amount: quantity * price,
            fee,
            currency: "USD".to_string(),
            date: date(on),
            notes: None,
        }
    }

    fn buy(key: &str, quantity: Decimal, price: Decimal, on: &str) -> TransactionCommand {
        command(key, TransactionKind::Buy, quantity, price, dec!(0), on)
    }

    fn sell(key: &str, quantity: Decimal, price: Decimal, fee: Decimal, on: &str) -> TransactionCommand {
        command(key, TransactionKind::Sell, quantity, price, fee, on)
    }

    fn lineage(n: u32) -> InvestmentId {
        InvestmentId::lineage("alice", "AAPL", n)
    }

    #[test]
    fn first_buy_creates_investment_implicitly() {
        let processor = processor();
        let outcome = processor
            .handle(&buy("o-1", dec!(10), dec!(100), "2023-01-01"))
            .unwrap();

        assert!(!outcome.is_duplicate());
        assert_eq!(outcome.event().sequence, 2);
        let events = processor.log().read_all(&lineage(1)).unwrap();
        assert!(matches!(events[0].event, LedgerEvent::InvestmentCreated(_)));
        let state = project(&events);
        assert_eq!(state.name, "Apple Inc");
        assert_eq!(state.quantity, dec!(10));
    }

    #[test]
    fn duplicate_key_appends_nothing() {
        let processor = processor();
        let first = processor
            .handle(&buy("o-1", dec!(10), dec!(100), "2023-01-01"))
            .unwrap();
        let before = processor.state(&lineage(1)).unwrap();

        let second = processor
            .handle(&buy("o-1", dec!(10), dec!(100), "2023-01-01"))
            .unwrap();

        assert!(second.is_duplicate());
        assert_eq!(second.event(), first.event());
        assert_eq!(processor.log().version(&lineage(1)).unwrap(), 2);
        assert_eq!(processor.state(&lineage(1)).unwrap(), before);
    }

    #[test]
    fn oversell_rejected_without_event() {
        let processor = processor();
        processor
            .handle(&buy("o-1", dec!(10), dec!(100), "2023-01-01"))
            .unwrap();

        let err = processor
            .handle(&sell("o-2", dec!(15), dec!(100), dec!(0), "2023-02-01"))
            .unwrap_err();

        assert!(matches!(
            err,
            Rejection::InsufficientQuantity { held, requested }
                if held == dec!(10) && requested == dec!(15)
        ));
        assert_eq!(processor.log().version(&lineage(1)).unwrap(), 2);
    }

    #[test]
    fn sell_without_position_creates_nothing() {
        let processor = processor();
        let err = processor
            .handle(&sell("o-1", dec!(1), dec!(100), dec!(0), "2023-02-01"))
            .unwrap_err();
        assert!(matches!(err, Rejection::InsufficientQuantity { .. }));
        assert!(processor.log().investment_ids().unwrap().is_empty());
    }

    #[test]
    fn full_liquidation_then_new_lineage() {
        let processor = processor();
        processor
            .handle(&buy("o-1", dec!(10), dec!(100), "2023-01-01"))
            .unwrap();
        processor
            .handle(&sell("o-2", dec!(10), dec!(150), dec!(5), "2023-06-01"))
            .unwrap();

        let sold = processor.state(&lineage(1)).unwrap();
        assert_eq!(sold.status, PositionStatus::Sold);
        assert_eq!(sold.liquidation.as_ref().unwrap().proceeds, dec!(1495));

        processor
            .handle(&buy("o-3", dec!(2), dec!(170), "2023-09-01"))
            .unwrap();
        let reopened = processor.state(&lineage(2)).unwrap();
        assert_eq!(reopened.quantity, dec!(2));
        assert_eq!(reopened.acquisition_date, Some(date("2023-09-01")));
        assert_eq!(
            processor.state(&lineage(1)).unwrap().status,
            PositionStatus::Sold
        );
    }

    #[test]
    fn duplicate_detected_across_lineages() {
        let processor = processor();
        processor
            .handle(&buy("o-1", dec!(10), dec!(100), "2023-01-01"))
            .unwrap();
        processor
            .handle(&sell("o-2", dec!(10), dec!(150), dec!(0), "2023-06-01"))
            .unwrap();

        let replay = processor
            .handle(&buy("o-1", dec!(10), dec!(100), "2023-01-01"))
            .unwrap();
        assert!(replay.is_duplicate());
        assert_eq!(processor.log().version(&lineage(2)).unwrap(), 0);
    }

    #[test]
    fn invalid_commands_rejected() {
        let processor = processor();

        let mut no_owner = buy("o-1", dec!(1), dec!(1), "2023-01-01");
        no_owner.owner = " ".to_string();
        assert!(matches!(
            processor.handle(&no_owner),
            Err(Rejection::MissingOwner)
        ));

        assert!(matches!(
            processor.handle(&buy("o-2", dec!(0), dec!(1), "2023-01-01")),
            Err(Rejection::InvalidQuantity { .. })
        ));

        let mut negative_fee = buy("o-3", dec!(1), dec!(1), "2023-01-01");
        negative_fee.fee = dec!(-1);
        assert!(matches!(
            processor.handle(&negative_fee),
            Err(Rejection::NegativeAmount { field: "fee", .. })
        ));

        assert!(processor.log().investment_ids().unwrap().is_empty());
    }

    #[test]
    fn currency_must_match_investment() {
        let processor = processor();
        processor
            .handle(&buy("o-1", dec!(1), dec!(100), "2023-01-01"))
            .unwrap();

        let mut eur = buy("o-2", dec!(1), dec!(100), "2023-01-02");
        eur.currency = "EUR".to_string();
        let err = processor.handle(&eur).unwrap_err();
        assert!(matches!(err, Rejection::CurrencyMismatch { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn explicit_creation_and_valuation() {
        let processor = processor();
        let created = processor
            .create_investment(&CreateInvestment {
                owner: "alice".to_string(),
                symbol: "aapl".to_string(),
                name: "Apple".to_string(),
                kind: InvestmentKind::Stock,
                currency: "usd".to_string(),
                institution: Some("Fidelity".to_string()),
                account_number: Some("X-1".to_string()),
                initial_investment: dec!(1000),
                initial_quantity: Some(dec!(10)),
                start_date: date("2022-01-01"),
                end_date: None,
                description: None,
            })
            .unwrap();
        assert_eq!(created.investment_id, lineage(1));

        processor
            .record_valuation("alice", &lineage(1), dec!(1800), date("2023-12-31"), None)
            .unwrap();
        let state = processor.state(&lineage(1)).unwrap();
        assert_eq!(state.average_cost, dec!(100));
        assert_eq!(state.unrealized_gain(), Some(dec!(800)));
        assert_eq!(state.currency, "USD");

        assert!(matches!(
            processor.record_valuation("bob", &lineage(1), dec!(1), date("2024-01-01"), None),
            Err(Rejection::NotOwner(_))
        ));
        assert!(matches!(
            processor.record_valuation("alice", &lineage(9), dec!(1), date("2024-01-01"), None),
            Err(Rejection::UnknownInvestment(_))
        ));
    }

    #[test]
    fn explicit_creation_refuses_second_active_lineage() {
        let processor = processor();
        processor
            .handle(&buy("o-1", dec!(1), dec!(100), "2023-01-01"))
            .unwrap();

        let err = processor
            .create_investment(&CreateInvestment {
                owner: "alice".to_string(),
                symbol: "AAPL".to_string(),
                name: "Apple".to_string(),
                kind: InvestmentKind::Stock,
                currency: "USD".to_string(),
                institution: None,
                account_number: None,
                initial_investment: Decimal::ZERO,
                initial_quantity: None,
                start_date: date("2023-02-01"),
                end_date: None,
                description: None,
            })
            .unwrap_err();
        assert!(matches!(err, Rejection::PositionExists(id) if id == lineage(1)));
    }

    #[test]
    fn overflowing_buy_rejected_and_stream_stays_usable() {
        let processor = processor();
        let huge = dec!(50000000000000000000000000000);
        processor
            .handle(&buy("o-1", huge, dec!(1), "2023-01-01"))
            .unwrap();

        let err = processor
            .handle(&buy("o-2", huge, dec!(1), "2023-01-02"))
            .unwrap_err();
        assert!(matches!(err, Rejection::Overflow));
        assert!(err.is_validation());
        assert_eq!(processor.log().version(&lineage(1)).unwrap(), 2);

        processor
            .handle(&buy("o-3", dec!(1), dec!(1), "2023-01-03"))
            .unwrap();
        let state = processor.state(&lineage(1)).unwrap();
        assert_eq!(state.quantity, huge + dec!(1));
        assert_eq!(state.version, 3);
    }

    #[test]
    fn overflowing_price_rejected_before_creation() {
        let processor = processor();
        let mut cmd = buy("o-1", dec!(2), dec!(1), "2023-01-01");
        cmd.unit_price = Decimal::MAX;
        assert!(matches!(processor.handle(&cmd), Err(Rejection::Overflow)));
        assert!(processor.log().investment_ids().unwrap().is_empty());
    }

    #[test]
    fn colon_in_owner_cannot_reach_another_position() {
        let processor = processor();
        let mut prefixed = buy("o-1", dec!(10), dec!(100), "2023-01-01");
        prefixed.symbol = "LON:VOD".to_string();
        processor.handle(&prefixed).unwrap();

        let mut intruder = sell("o-2", dec!(10), dec!(100), dec!(0), "2023-02-01");
        intruder.owner = "alice:LON".to_string();
        intruder.symbol = "VOD".to_string();
        assert!(matches!(
            processor.handle(&intruder),
            Err(Rejection::InsufficientQuantity { .. })
        ));

        let owned = processor.positions("alice").unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].symbol, "LON:VOD");
        assert_eq!(owned[0].quantity, dec!(10));
        assert_eq!(owned[0].status, PositionStatus::Active);
    }

    #[test]
    fn positions_filtered_by_owner() {
        let processor = processor();
        processor
            .handle(&buy("o-1", dec!(1), dec!(100), "2023-01-01"))
            .unwrap();
        let mut bob = buy("o-1", dec!(1), dec!(100), "2023-01-01");
        bob.owner = "bob".to_string();
        processor.handle(&bob).unwrap();

        let positions = processor.positions("alice").unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].owner, "alice");
    }
}
