use super::events::{InvestmentId, LedgerEvent, RecordedEvent};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("concurrency conflict on {investment_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        investment_id: InvestmentId,
        expected: u64,
        actual: u64,
    },
    #[error("event for {event_stream} cannot be appended to stream {stream}")]
    StreamMismatch {
        stream: InvestmentId,
        event_stream: InvestmentId,
    },
    #[error("ledger file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event log lock poisoned")]
    Poisoned,
}

/// Append-only store of per-investment event streams.
///
/// Appends use optimistic concurrency: the caller passes the stream version it
/// folded its decision from, and the append fails with
/// [`EventLogError::ConcurrencyConflict`] if another writer got there first.
pub trait EventLog: Send + Sync {
    /// Append one event, returning it with its assigned sequence number
    fn append(
        &self,
        investment_id: &InvestmentId,
        expected_version: u64,
        event: LedgerEvent,
    ) -> Result<RecordedEvent, EventLogError>;

    /// Every event of the stream in sequence order. Unknown streams are empty.
    fn read_all(&self, investment_id: &InvestmentId) -> Result<Vec<RecordedEvent>, EventLogError>;

    /// Events with a sequence number greater than `after`
    fn read_from(
        &self,
        investment_id: &InvestmentId,
        after: u64,
    ) -> Result<Vec<RecordedEvent>, EventLogError> {
        let mut events = self.read_all(investment_id)?;
        events.retain(|e| e.sequence > after);
        Ok(events)
    }

    /// Sequence number of the stream tail, 0 for an unknown stream
    fn version(&self, investment_id: &InvestmentId) -> Result<u64, EventLogError>;

    fn investment_ids(&self) -> Result<Vec<InvestmentId>, EventLogError>;
}

impl<L: EventLog + ?Sized> EventLog for &L {
    fn append(
        &self,
        investment_id: &InvestmentId,
        expected_version: u64,
        event: LedgerEvent,
    ) -> Result<RecordedEvent, EventLogError> {
        (**self).append(investment_id, expected_version, event)
    }

    fn read_all(&self, investment_id: &InvestmentId) -> Result<Vec<RecordedEvent>, EventLogError> {
        (**self).read_all(investment_id)
    }

    fn read_from(
        &self,
        investment_id: &InvestmentId,
        after: u64,
    ) -> Result<Vec<RecordedEvent>, EventLogError> {
        (**self).read_from(investment_id, after)
    }

    fn version(&self, investment_id: &InvestmentId) -> Result<u64, EventLogError> {
        (**self).version(investment_id)
    }

    fn investment_ids(&self) -> Result<Vec<InvestmentId>, EventLogError> {
        (**self).investment_ids()
    }
}

impl<L: EventLog + ?Sized> EventLog for Arc<L> {
    fn append(
        &self,
        investment_id: &InvestmentId,
        expected_version: u64,
        event: LedgerEvent,
    ) -> Result<RecordedEvent, EventLogError> {
        (**self).append(investment_id, expected_version, event)
    }

    fn read_all(&self, investment_id: &InvestmentId) -> Result<Vec<RecordedEvent>, EventLogError> {
        (**self).read_all(investment_id)
    }

    fn read_from(
        &self,
        investment_id: &InvestmentId,
        after: u64,
    ) -> Result<Vec<RecordedEvent>, EventLogError> {
        (**self).read_from(investment_id, after)
    }

    fn version(&self, investment_id: &InvestmentId) -> Result<u64, EventLogError> {
        (**self).version(investment_id)
    }

    fn investment_ids(&self) -> Result<Vec<InvestmentId>, EventLogError> {
        (**self).investment_ids()
    }
}

/// Checks an append against the current stream and builds the stored event
pub(crate) fn prepare_append(
    stream: &[RecordedEvent],
    investment_id: &InvestmentId,
    expected_version: u64,
    event: LedgerEvent,
) -> Result<RecordedEvent, EventLogError> {
    if event.investment_id() != investment_id {
        return Err(EventLogError::StreamMismatch {
            stream: investment_id.clone(),
            event_stream: event.investment_id().clone(),
        });
    }
    let actual = stream.len() as u64;
    if actual != expected_version {
        return Err(EventLogError::ConcurrencyConflict {
            investment_id: investment_id.clone(),
            expected: expected_version,
            actual,
        });
    }
    Ok(RecordedEvent {
        investment_id: investment_id.clone(),
        sequence: actual + 1,
        recorded_at: Utc::now(),
        event,
    })
}

/// Thread-safe in-memory event log
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    streams: RwLock<BTreeMap<InvestmentId, Vec<RecordedEvent>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(
        &self,
        investment_id: &InvestmentId,
        expected_version: u64,
        event: LedgerEvent,
    ) -> Result<RecordedEvent, EventLogError> {
        let mut streams = self.streams.write().map_err(|_| EventLogError::Poisoned)?;
        let stream = streams.entry(investment_id.clone()).or_default();
        let recorded = prepare_append(stream, investment_id, expected_version, event)?;
        stream.push(recorded.clone());
        log::debug!(
            "appended {} #{} ({})",
            investment_id,
            recorded.sequence,
            recorded.event.display_type()
        );
        Ok(recorded)
    }

    fn read_all(&self, investment_id: &InvestmentId) -> Result<Vec<RecordedEvent>, EventLogError> {
        let streams = self.streams.read().map_err(|_| EventLogError::Poisoned)?;
        Ok(streams.get(investment_id).cloned().unwrap_or_default())
    }

    fn read_from(
        &self,
        investment_id: &InvestmentId,
        after: u64,
    ) -> Result<Vec<RecordedEvent>, EventLogError> {
        let streams = self.streams.read().map_err(|_| EventLogError::Poisoned)?;
        Ok(streams
            .get(investment_id)
            .map(|stream| {
                let skip = (after as usize).min(stream.len());
                stream[skip..].to_vec()
            })
            .unwrap_or_default())
    }

    fn version(&self, investment_id: &InvestmentId) -> Result<u64, EventLogError> {
        let streams = self.streams.read().map_err(|_| EventLogError::Poisoned)?;
        Ok(streams.get(investment_id).map_or(0, |s| s.len() as u64))
    }

    fn investment_ids(&self) -> Result<Vec<InvestmentId>, EventLogError> {
        let streams = self.streams.read().map_err(|_| EventLogError::Poisoned)?;
        Ok(streams
            .iter()
            .filter(|(_, stream)| !stream.is_empty())
            .map(|(id, _)| id.clone())
            .collect())
    }
}

/// Per-connection broker sync checkpoints
pub trait CheckpointStore: Send + Sync {
    fn last_sync(&self, connection: &str) -> Result<Option<DateTime<Utc>>, EventLogError>;

    fn set_last_sync(&self, connection: &str, at: DateTime<Utc>) -> Result<(), EventLogError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCheckpoints {
    checkpoints: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl CheckpointStore for InMemoryCheckpoints {
    fn last_sync(&self, connection: &str) -> Result<Option<DateTime<Utc>>, EventLogError> {
        let checkpoints = self.checkpoints.read().map_err(|_| EventLogError::Poisoned)?;
        Ok(checkpoints.get(connection).copied())
    }

    fn set_last_sync(&self, connection: &str, at: DateTime<Utc>) -> Result<(), EventLogError> {
        let mut checkpoints = self.checkpoints.write().map_err(|_| EventLogError::Poisoned)?;
        checkpoints.insert(connection.to_string(), at);
        Ok(())
    }
}

/// Reads every stream whose creation event belongs to `owner`.
///
/// Each stream is copied at read time, so callers see a consistent snapshot
/// per investment while writers continue appending.
pub fn read_owned_streams<L: EventLog + ?Sized>(
    log: &L,
    owner: &str,
) -> Result<Vec<Vec<RecordedEvent>>, EventLogError> {
    let mut streams = Vec::new();
    for id in log.investment_ids()? {
        let events = log.read_all(&id)?;
        let owned = matches!(
            events.first().map(|e| &e.event),
            Some(LedgerEvent::InvestmentCreated(created)) if created.owner == owner
        );
        if owned {
            streams.push(events);
        }
    }
    Ok(streams)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::ValuationUpdated;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn valuation(id: &InvestmentId, value: rust_decimal::Decimal) -> LedgerEvent {
        LedgerEvent::ValuationUpdated(ValuationUpdated {
            investment_id: id.clone(),
            new_value: value,
            valuation_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            notes: None,
        })
    }

    #[test]
    fn append_assigns_increasing_sequences() {
        let log = InMemoryEventLog::new();
        let id = InvestmentId::new("alice:AAPL:1");

        let first = log.append(&id, 0, valuation(&id, dec!(1))).unwrap();
        let second = log.append(&id, 1, valuation(&id, dec!(2))).unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(log.version(&id).unwrap(), 2);
        assert_eq!(log.read_all(&id).unwrap().len(), 2);
    }

    #[test]
    fn stale_version_conflicts() {
        let log = InMemoryEventLog::new();
        let id = InvestmentId::new("alice:AAPL:1");
        log.append(&id, 0, valuation(&id, dec!(1))).unwrap();

        let err = log.append(&id, 0, valuation(&id, dec!(2))).unwrap_err();
        assert!(matches!(
            err,
            EventLogError::ConcurrencyConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
        assert_eq!(log.version(&id).unwrap(), 1);
    }

    #[test]
    fn streams_are_independent() {
        let log = InMemoryEventLog::new();
        let a = InvestmentId::new("alice:AAPL:1");
        let b = InvestmentId::new("alice:MSFT:1");

        log.append(&a, 0, valuation(&a, dec!(1))).unwrap();
        log.append(&b, 0, valuation(&b, dec!(1))).unwrap();

        assert_eq!(log.version(&a).unwrap(), 1);
        assert_eq!(log.version(&b).unwrap(), 1);
        assert_eq!(log.investment_ids().unwrap(), vec![a, b]);
    }

    #[test]
    fn event_must_target_its_stream() {
        let log = InMemoryEventLog::new();
        let a = InvestmentId::new("alice:AAPL:1");
        let b = InvestmentId::new("alice:MSFT:1");

        let err = log.append(&a, 0, valuation(&b, dec!(1))).unwrap_err();
        assert!(matches!(err, EventLogError::StreamMismatch { .. }));
    }

    #[test]
    fn unknown_stream_reads_empty() {
        let log = InMemoryEventLog::new();
        let id = InvestmentId::new("nobody:X:1");
        assert!(log.read_all(&id).unwrap().is_empty());
        assert_eq!(log.version(&id).unwrap(), 0);
    }

    #[test]
    fn read_from_skips_folded_events() {
        let log = InMemoryEventLog::new();
        let id = InvestmentId::new("alice:AAPL:1");
        for version in 0..3 {
            log.append(&id, version, valuation(&id, dec!(1))).unwrap();
        }

        let tail = log.read_from(&id, 2).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].sequence, 3);
        assert!(log.read_from(&id, 10).unwrap().is_empty());
    }

    #[test]
    fn checkpoints_round_trip() {
        let store = InMemoryCheckpoints::default();
        assert_eq!(store.last_sync("broker").unwrap(), None);
        let at = Utc::now();
        store.set_last_sync("broker", at).unwrap();
        assert_eq!(store.last_sync("broker").unwrap(), Some(at));
    }
}
