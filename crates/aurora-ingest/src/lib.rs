//! Processor pipeline and ingestion state machine.
//!
//! This crate is the heart of the ingestion system. It provides:
//! - [`ChangeCache`] — per-ledger folding of entry changes
//! - State-entry and history-table processors, composed into ordered groups
//! - [`ProcessorRunner`] — the two-phase per-ledger projection
//! - [`IngestionSystem`] — the cursor-driven outer state machine
//! - State verification against archive snapshots

pub mod cache;
pub mod error;
pub mod processors;
pub mod runner;
pub mod system;
pub mod verify;

pub use cache::ChangeCache;
pub use error::{IngestError, IngestResult};
pub use processors::{ChangeStats, EntryStats, TransactionStats, MAX_BATCH_SIZE};
pub use runner::{IngestionSource, ProcessorRunner, RunnerConfig, MAX_SUPPORTED_PROTOCOL_VERSION};
pub use system::{
    IngestionMetrics, IngestionSystem, StressTestReport, SystemConfig, TickOutcome,
    CURRENT_INGEST_VERSION,
};
pub use verify::{verify_state, VerificationReport};
