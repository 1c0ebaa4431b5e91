//! Incremental sync of filled broker orders

use super::BatchSummary;
use crate::core::{
    CheckpointStore, EventLog, EventLogError, SyncConfig, TransactionCommand, TransactionKind,
    TransactionProcessor,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A filled order as reported by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(alias = "quantity")]
    pub filled_qty: Decimal,
    #[serde(alias = "price")]
    pub filled_avg_price: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(alias = "executed_at")]
    pub filled_at: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Worth retrying: timeouts, rate limits, unavailable upstream
    #[error("transient broker error: {0}")]
    Transient(String),
    #[error("broker error: {0}")]
    Permanent(String),
}

impl BrokerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Transient(_))
    }
}

pub trait BrokerClient: Send + Sync {
    /// Filled orders at or after `since`, or every filled order when `None`
    fn fetch_filled_orders_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<BrokerOrder>, BrokerError>;

    /// Broker name for logging
    fn broker_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("owner is required for broker sync")]
    MissingOwner,
    #[error("fetching orders for {connection} failed after {attempts} attempts: {source}")]
    FetchFailed {
        connection: String,
        attempts: u32,
        #[source]
        source: BrokerError,
    },
    #[error("checkpoint store failed: {0}")]
    Checkpoint(#[from] EventLogError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub connection: String,
    pub since: Option<DateTime<Utc>>,
    pub fetched: usize,
    pub summary: BatchSummary,
    /// New checkpoint, or `None` when the batch was incomplete and the
    /// checkpoint was left alone
    pub checkpoint: Option<DateTime<Utc>>,
}

/// Pulls filled orders for a broker connection into the ledger
pub struct BrokerSync<'a, L, C: ?Sized> {
    processor: &'a TransactionProcessor<L>,
    checkpoints: &'a C,
    config: SyncConfig,
    default_currency: String,
}

impl<'a, L, C> BrokerSync<'a, L, C>
where
    L: EventLog,
    C: CheckpointStore + ?Sized,
{
    pub fn new(
        processor: &'a TransactionProcessor<L>,
        checkpoints: &'a C,
        config: SyncConfig,
        default_currency: &str,
    ) -> Self {
        BrokerSync {
            processor,
            checkpoints,
            config,
            default_currency: default_currency.trim().to_uppercase(),
        }
    }

    /// Fetch orders since the connection's checkpoint and apply each one.
    ///
    /// The checkpoint moves to the fetch start time only after every order
    /// was attempted. A failed fetch leaves it untouched, so the next run
    /// asks for the same window again.
    pub fn run<B: BrokerClient + ?Sized>(
        &self,
        client: &B,
        owner: &str,
        connection: &str,
    ) -> Result<SyncReport, SyncError> {
        if owner.trim().is_empty() {
            return Err(SyncError::MissingOwner);
        }
        let since = self.checkpoints.last_sync(connection)?;
        let started_at = Utc::now();
        let orders = self.fetch_with_retry(client, connection, since)?;
        log::info!(
            "fetched {} orders from {} for {} since {:?}",
            orders.len(),
            client.broker_name(),
            connection,
            since
        );

        let mut summary = BatchSummary {
            completed: true,
            ..BatchSummary::default()
        };
        for (index, order) in orders.iter().enumerate() {
            let row = index + 1;
            match self.to_command(order, owner) {
                Ok(command) => {
                    let result = self.processor.handle(&command);
                    if !summary.record(row, &command.external_key, result) {
                        summary.completed = false;
                    }
                }
                Err(reason) => summary.skip(row, format!("order {}: {}", order.id, reason)),
            }
        }

        let checkpoint = if summary.completed {
            self.checkpoints.set_last_sync(connection, started_at)?;
            Some(started_at)
        } else {
            log::warn!(
                "sync of {} incomplete, checkpoint left at {:?}",
                connection,
                since
            );
            None
        };

        Ok(SyncReport {
            connection: connection.to_string(),
            since,
            fetched: orders.len(),
            summary,
            checkpoint,
        })
    }

    fn fetch_with_retry<B: BrokerClient + ?Sized>(
        &self,
        client: &B,
        connection: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<BrokerOrder>, SyncError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match client.fetch_filled_orders_since(since) {
                Ok(orders) => return Ok(orders),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.config.backoff(attempt);
                    log::warn!(
                        "{} fetch attempt {}/{} failed: {}, retrying in {:?}",
                        client.broker_name(),
                        attempt,
                        max_attempts,
                        err,
                        delay
                    );
                    thread::sleep(delay);
                }
                Err(err) => {
                    log::error!("{} fetch failed: {}", client.broker_name(), err);
                    return Err(SyncError::FetchFailed {
                        connection: connection.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }

    fn to_command(&self, order: &BrokerOrder, owner: &str) -> Result<TransactionCommand, &'static str> {
        if order.id.trim().is_empty() {
            return Err("missing order id");
        }
        if order.symbol.trim().is_empty() {
            return Err("missing symbol");
        }
        let kind = match order.side {
            OrderSide::Buy => TransactionKind::Buy,
            OrderSide::Sell => TransactionKind::Sell,
        };
        let amount = order
            .filled_qty
            .checked_mul(order.filled_avg_price)
            .ok_or("amount overflows")?;
        let currency = order
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.default_currency.clone());
        Ok(TransactionCommand {
            owner: owner.to_string(),
            symbol: order.symbol.trim().to_uppercase(),
            name: order.name.clone(),
            investment_kind: None,
            external_key: order.id.trim().to_string(),
            kind,
            quantity: order.filled_qty,
            unit_price: order.filled_avg_price,
            amount,
            fee: order.fee,
            currency,
            date: order.filled_at.date_naive(),
            notes: None,
        })
    }
}
