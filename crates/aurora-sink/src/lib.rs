//! Ingestion-sink abstraction for the aurora ledger-ingestion core.
//!
//! The sink is the relational store the ingestion pipeline projects ledgers
//! into. This crate provides:
//! - Row types for every projected table
//! - [`BatchInsertBuilder`] for accumulating history-table rows
//! - The [`IngestionSink`] trait: transactions, cursor key-value store, and
//!   per-entity insert/update/remove operations
//! - [`InMemorySink`] — a transactional in-memory implementation for tests
//!   and embedding

pub mod batch;
pub mod error;
pub mod memory;
pub mod rows;
pub mod traits;

pub use batch::BatchInsertBuilder;
pub use error::{SinkError, SinkResult};
pub use memory::InMemorySink;
pub use rows::{
    AccountDataRow, AccountRow, AccountSignerRow, AssetStatRow, ClaimableBalanceRow, EffectRow,
    LedgerRow, OfferRow, OperationRow, ParticipantRow, TradeRow, TransactionRow, TrustlineRow,
};
pub use traits::{
    IngestionSink, INGEST_VERSION_KEY, LAST_LEDGER_KEY, OFFER_COMPACTION_SEQUENCE_KEY,
    STATE_INVALID_KEY,
};
