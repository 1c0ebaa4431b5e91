use super::events::{InvestmentId, LedgerEvent, RecordedEvent};
use super::log::{prepare_append, CheckpointStore, EventLog, EventLogError};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// On-disk layout of the ledger file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerFile {
    #[serde(default)]
    pub streams: BTreeMap<InvestmentId, Vec<RecordedEvent>>,
    #[serde(default)]
    pub checkpoints: BTreeMap<String, DateTime<Utc>>,
}

/// Event log and checkpoint store persisted to a single JSON file.
///
/// Every mutation holds an exclusive lock on a `.lock` sibling, re-reads the
/// file, applies the change and rewrites it through a temporary file and a
/// rename. Other processes working on the same ledger are therefore seen
/// before each append, and a crash leaves either the previous or the new
/// ledger on disk.
#[derive(Debug)]
pub struct JsonFileEventLog {
    path: PathBuf,
    ledger: Mutex<LedgerFile>,
}

impl JsonFileEventLog {
    /// Open the ledger at `path`, starting empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventLogError> {
        let path = path.as_ref().to_path_buf();
        let ledger = load(&path)?;
        if path.exists() {
            log::debug!(
                "opened ledger {} with {} streams",
                path.display(),
                ledger.streams.len()
            );
        } else {
            log::info!("creating new ledger at {}", path.display());
        }
        Ok(JsonFileEventLog {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    /// Apply `mutate` to the on-disk ledger under the file lock and persist it
    fn write<T>(
        &self,
        mutate: impl FnOnce(&mut LedgerFile) -> Result<T, EventLogError>,
    ) -> Result<T, EventLogError> {
        let mut cached = self.ledger.lock().map_err(|_| EventLogError::Poisoned)?;
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.path.with_extension("json.lock"))?;
        lock.lock_exclusive()?;

        let mut ledger = load(&self.path)?;
        let value = match mutate(&mut ledger) {
            Ok(value) => value,
            Err(err) => {
                *cached = ledger;
                return Err(err);
            }
        };
        self.persist(&ledger)?;
        *cached = ledger;
        // dropping the handle releases the lock
        drop(lock);
        Ok(value)
    }

    fn persist(&self, ledger: &LedgerFile) -> Result<(), EventLogError> {
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", std::process::id()));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, ledger)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn load(path: &Path) -> Result<LedgerFile, EventLogError> {
    if !path.exists() {
        return Ok(LedgerFile::default());
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

impl EventLog for JsonFileEventLog {
    fn append(
        &self,
        investment_id: &InvestmentId,
        expected_version: u64,
        event: LedgerEvent,
    ) -> Result<RecordedEvent, EventLogError> {
        let recorded = self.write(|ledger| {
            let stream = ledger.streams.get(investment_id).map_or(&[][..], |s| &s[..]);
            let recorded = prepare_append(stream, investment_id, expected_version, event)?;
            ledger
                .streams
                .entry(investment_id.clone())
                .or_default()
                .push(recorded.clone());
            Ok(recorded)
        })?;
        log::debug!(
            "appended {} #{} ({})",
            investment_id,
            recorded.sequence,
            recorded.event.display_type()
        );
        Ok(recorded)
    }

    fn read_all(&self, investment_id: &InvestmentId) -> Result<Vec<RecordedEvent>, EventLogError> {
        let ledger = self.ledger.lock().map_err(|_| EventLogError::Poisoned)?;
        Ok(ledger.streams.get(investment_id).cloned().unwrap_or_default())
    }

    fn version(&self, investment_id: &InvestmentId) -> Result<u64, EventLogError> {
        let ledger = self.ledger.lock().map_err(|_| EventLogError::Poisoned)?;
        Ok(ledger
            .streams
            .get(investment_id)
            .map_or(0, |s| s.len() as u64))
    }

    fn investment_ids(&self) -> Result<Vec<InvestmentId>, EventLogError> {
        let ledger = self.ledger.lock().map_err(|_| EventLogError::Poisoned)?;
        Ok(ledger.streams.keys().cloned().collect())
    }
}

impl CheckpointStore for JsonFileEventLog {
    fn last_sync(&self, connection: &str) -> Result<Option<DateTime<Utc>>, EventLogError> {
        let ledger = self.ledger.lock().map_err(|_| EventLogError::Poisoned)?;
        Ok(ledger.checkpoints.get(connection).copied())
    }

    fn set_last_sync(&self, connection: &str, at: DateTime<Utc>) -> Result<(), EventLogError> {
        self.write(|ledger| {
            ledger.checkpoints.insert(connection.to_string(), at);
            Ok(())
        })
    }
}
