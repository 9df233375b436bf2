//! Per-ledger projection processors.
//!
//! A change processor folds state-entry transitions into the sink's balance
//! sheet tables; a transaction processor appends to the history tables.
//! Both buffer work in memory and flush it on `commit` (or earlier, when a
//! batch fills up). Processors never hold a reference to the sink; it is
//! passed into every call.

use std::fmt::Display;
use std::sync::{Arc, Mutex};

use aurora_sink::IngestionSink;
use aurora_types::{Change, ChangeKind, LedgerTransaction};

use crate::error::{IngestError, IngestResult};

pub mod account_data;
pub mod accounts;
pub mod asset_stats;
pub mod claimable_balances;
pub mod effects;
pub mod ledgers;
pub mod offers;
pub mod operations;
pub mod participants;
pub mod signers;
pub mod stats;
pub mod trades;
pub mod transactions;
pub mod trustlines;

pub use stats::{ChangeStats, EntryStats, SharedChangeStats, SharedTransactionStats, TransactionStats};

/// Upper bound on rows buffered before a mid-stream flush.
pub const MAX_BATCH_SIZE: usize = 100_000;

/// Projects state-entry changes.
pub trait ChangeProcessor {
    fn process_change(&mut self, sink: &mut dyn IngestionSink, change: &Change)
        -> IngestResult<()>;

    /// Flush all buffered work.
    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()>;
}

/// Projects applied transactions.
pub trait TransactionProcessor {
    fn process_transaction(
        &mut self,
        sink: &mut dyn IngestionSink,
        tx: &LedgerTransaction,
    ) -> IngestResult<()>;

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()>;
}

/// Ordered composition of change processors. Order matters only for stats,
/// which sits first to observe the unfiltered stream.
pub struct ChangeProcessorGroup {
    processors: Vec<Box<dyn ChangeProcessor>>,
}

impl ChangeProcessorGroup {
    pub fn new(processors: Vec<Box<dyn ChangeProcessor>>) -> Self {
        Self { processors }
    }

    pub fn process_change(
        &mut self,
        sink: &mut dyn IngestionSink,
        change: &Change,
    ) -> IngestResult<()> {
        for processor in &mut self.processors {
            processor.process_change(sink, change)?;
        }
        Ok(())
    }

    pub fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        for processor in &mut self.processors {
            processor.commit(sink)?;
        }
        Ok(())
    }
}

/// Ordered composition of transaction processors.
pub struct TransactionProcessorGroup {
    processors: Vec<Box<dyn TransactionProcessor>>,
}

impl TransactionProcessorGroup {
    pub fn new(processors: Vec<Box<dyn TransactionProcessor>>) -> Self {
        Self { processors }
    }

    pub fn process_transaction(
        &mut self,
        sink: &mut dyn IngestionSink,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        for processor in &mut self.processors {
            processor.process_transaction(sink, tx)?;
        }
        Ok(())
    }

    pub fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        for processor in &mut self.processors {
            processor.commit(sink)?;
        }
        Ok(())
    }
}

/// Returns a state error unless exactly one row was affected.
pub(crate) fn expect_one_row(
    rows_affected: u64,
    action: &str,
    entity: &str,
    id: impl Display,
) -> IngestResult<()> {
    if rows_affected != 1 {
        return Err(IngestError::State(format!(
            "{rows_affected} rows affected when {action} {entity} {id}"
        )));
    }
    Ok(())
}

/// Filter shorthand used by every state processor.
pub(crate) fn is_kind(change: &Change, kind: ChangeKind) -> bool {
    change.kind() == kind
}

/// Shared handle used to read stats out of a running group.
pub(crate) fn shared<T: Default>() -> Arc<Mutex<T>> {
    Arc::new(Mutex::new(T::default()))
}
