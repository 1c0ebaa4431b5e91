//! Event-sourced investment ledger.
//!
//! Every change to an investment is an immutable event in a per-investment
//! stream. Current positions are folds over those streams, ingestion adapters
//! turn CSV exports and broker orders into idempotent commands, and the tax
//! reports replay the log for a calendar year.

pub mod core;
pub mod ingest;
pub mod tax;
