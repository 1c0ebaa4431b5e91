pub mod aggregate;
pub mod cache;
pub mod config;
pub mod events;
pub mod log;
pub mod processor;
pub mod store;

// Flat public surface for domain types and functions.
pub use aggregate::{project, InvestmentState, Liquidation, PositionStatus};
pub use cache::ProjectionCache;
pub use config::{
    ConfigError, CsvConfig, DividendConfig, LedgerConfig, ProcessorConfig, SyncConfig,
    MAX_DIVIDEND_DAYS,
};
pub use events::{
    normalize_symbol, InvestmentCreated, InvestmentId, InvestmentKind, LedgerEvent, LedgerStream,
    RecordedEvent, TransactionKind, TransactionRecorded, ValuationUpdated,
};
pub use log::{
    read_owned_streams, CheckpointStore, EventLog, EventLogError, InMemoryCheckpoints,
    InMemoryEventLog,
};
pub use processor::{CreateInvestment, Outcome, Rejection, TransactionCommand, TransactionProcessor};
pub use store::{JsonFileEventLog, LedgerFile};
