use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use aurora_sink::IngestionSink;
use aurora_types::{Change, ChangeKind, LedgerTransaction};

use crate::error::IngestResult;
use crate::processors::{ChangeProcessor, TransactionProcessor};

/// Per-kind counters of the change stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryStats {
    pub created: u64,
    pub updated: u64,
    pub removed: u64,
}

/// Counters over one change-group run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeStats {
    counts: BTreeMap<ChangeKind, EntryStats>,
}

impl ChangeStats {
    pub fn record(&mut self, change: &Change) {
        let entry = self.counts.entry(change.kind()).or_default();
        if change.is_creation() {
            entry.created += 1;
        } else if change.is_removal() {
            entry.removed += 1;
        } else {
            entry.updated += 1;
        }
    }

    pub fn for_kind(&self, kind: ChangeKind) -> EntryStats {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    pub fn total_changes(&self) -> u64 {
        self.counts
            .values()
            .map(|e| e.created + e.updated + e.removed)
            .sum()
    }
}

/// Counters over one transaction-group run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub transactions: u64,
    pub successful: u64,
    pub failed: u64,
    pub operations: u64,
}

pub type SharedChangeStats = Arc<Mutex<ChangeStats>>;
pub type SharedTransactionStats = Arc<Mutex<TransactionStats>>;

/// First processor in the change group; observes the unfiltered stream.
pub struct StatsChangeProcessor {
    stats: SharedChangeStats,
}

impl StatsChangeProcessor {
    pub fn new(stats: SharedChangeStats) -> Self {
        Self { stats }
    }
}

impl ChangeProcessor for StatsChangeProcessor {
    fn process_change(
        &mut self,
        _sink: &mut dyn IngestionSink,
        change: &Change,
    ) -> IngestResult<()> {
        self.stats.lock().expect("lock poisoned").record(change);
        Ok(())
    }

    fn commit(&mut self, _sink: &mut dyn IngestionSink) -> IngestResult<()> {
        Ok(())
    }
}

/// First processor in the transaction group.
pub struct StatsTransactionProcessor {
    stats: SharedTransactionStats,
}

impl StatsTransactionProcessor {
    pub fn new(stats: SharedTransactionStats) -> Self {
        Self { stats }
    }
}

impl TransactionProcessor for StatsTransactionProcessor {
    fn process_transaction(
        &mut self,
        _sink: &mut dyn IngestionSink,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        let mut stats = self.stats.lock().expect("lock poisoned");
        stats.transactions += 1;
        if tx.result.successful {
            stats.successful += 1;
        } else {
            stats.failed += 1;
        }
        stats.operations += tx.envelope.operations.len() as u64;
        Ok(())
    }

    fn commit(&mut self, _sink: &mut dyn IngestionSink) -> IngestResult<()> {
        Ok(())
    }
}
