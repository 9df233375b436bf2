//! The ingestion state machine.
//!
//! The system owns a backend, an archive and a sink and decides what to do
//! next from the persisted cursors alone:
//!
//! | state             | guard                                   | action                     |
//! |-------------------|-----------------------------------------|----------------------------|
//! | uninitialized     | `last_ledger == 0 && ingest_version == 0` | bootstrap from checkpoint |
//! | running current   | version matches, `last_ledger > 0`      | follow live ledgers        |
//! | version mismatch  | version differs                         | rebuild state from archive |
//! | invalid           | `state_invalid == true`                 | block until operator rebuild |
//!
//! Every ledger is projected inside a single sink transaction together with
//! the `last_ledger` advance, so a ledger is either fully ingested or not
//! at all.

use std::sync::Arc;
use std::time::Duration;

use aurora_archive::{ArchiveError, HistoryArchive};
use aurora_backend::{DatabaseBackend, InMemoryCoreStore, LedgerBackend};
use aurora_sink::IngestionSink;
use aurora_types::{
    is_checkpoint, Change, LedgerCloseMeta, LedgerEntry, LedgerEntryData, LedgerRange,
    LedgerTransaction, Operation, AccountEntry, GENESIS_SEQUENCE, LEDGERS_PER_CHECKPOINT,
};
use tracing::{debug, error, info, warn};

use crate::error::{IngestError, IngestResult};
use crate::runner::{ProcessorRunner, RunnerConfig};
use crate::verify;

/// Version of the projection schema. Bumping it makes every running
/// instance rebuild its state tables from an archive snapshot.
pub const CURRENT_INGEST_VERSION: i32 = 11;

const STRESS_TEST_MAX_TRANSACTIONS: usize = 1_000;
const STRESS_TEST_MAX_CHANGES: usize = 4_000;

/// Static configuration of an ingestion system.
#[derive(Clone, Debug)]
pub struct SystemConfig {
    pub network_passphrase: String,
    /// Verify state every N-th checkpoint (64 checkpoints ≈ six hours).
    pub checkpoint_verification_frequency: u32,
    /// Sleep between polls while waiting for the next ledger to close.
    pub poll_interval: Duration,
}

impl SystemConfig {
    pub fn new(network_passphrase: &str) -> Self {
        Self {
            network_passphrase: network_passphrase.to_string(),
            checkpoint_verification_frequency: 64,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// What one turn of the state machine did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// First start: state built from the latest checkpoint snapshot.
    Bootstrapped(u32),
    /// Projection schema changed: state rebuilt from a checkpoint snapshot.
    RebuiltState(u32),
    /// One live ledger fully projected.
    Ingested(u32),
    /// The next ledger has not closed yet.
    WaitingForLedger(u32),
    /// State is invalid; ingestion refuses to run until an operator
    /// triggers a rebuild.
    Blocked,
}

/// Plain counters surfaced to operators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestionMetrics {
    pub ledgers_ingested: u64,
    pub state_verifications: u64,
    pub state_verification_failures: u64,
}

/// Result summary of a stress-test run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StressTestReport {
    pub transactions: usize,
    pub changes_per_transaction: usize,
    pub accounts_created: u64,
}

/// The top-level ingestion state machine.
pub struct IngestionSystem<B, A, S> {
    config: SystemConfig,
    runner_config: RunnerConfig,
    backend: B,
    archive: A,
    sink: S,
    metrics: IngestionMetrics,
}

impl<B, A, S> IngestionSystem<B, A, S>
where
    B: LedgerBackend,
    A: HistoryArchive,
    S: IngestionSink,
{
    pub fn new(config: SystemConfig, backend: B, archive: A, sink: S) -> Self {
        let runner_config = RunnerConfig {
            network_passphrase: config.network_passphrase.clone(),
            importer_version: CURRENT_INGEST_VERSION,
        };
        Self {
            config,
            runner_config,
            backend,
            archive,
            sink,
            metrics: IngestionMetrics::default(),
        }
    }

    pub fn metrics(&self) -> IngestionMetrics {
        self.metrics
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Run one turn of the state machine.
    pub fn tick(&mut self) -> IngestResult<TickOutcome> {
        if self.sink.state_invalid()? {
            warn!("state is invalid, waiting for operator-triggered rebuild");
            return Ok(TickOutcome::Blocked);
        }

        let last = self.sink.last_ingested_ledger()?;
        let version = self.sink.ingest_version()?;

        if last == 0 && version == 0 {
            return self.bootstrap();
        }
        if version != CURRENT_INGEST_VERSION {
            return self.rebuild();
        }
        self.ingest_next_ledger(last)
    }

    /// Run the state machine until an error surfaces.
    pub fn run(&mut self) -> IngestResult<()> {
        loop {
            match self.tick()? {
                TickOutcome::WaitingForLedger(_) | TickOutcome::Blocked => {
                    std::thread::sleep(self.config.poll_interval)
                }
                _ => {}
            }
        }
    }

    fn bootstrap(&mut self) -> IngestResult<TickOutcome> {
        let checkpoint = self.archive.root_state()?.current_ledger;
        info!(checkpoint, "empty store, bootstrapping state from the latest checkpoint");
        // The range starts at the checkpoint itself so bucket-list
        // validation can read its header; live follow resumes right after.
        self.backend
            .prepare_range(LedgerRange::unbounded(checkpoint))?;
        self.build_state_at(checkpoint, false)?;
        Ok(TickOutcome::Bootstrapped(checkpoint))
    }

    fn rebuild(&mut self) -> IngestResult<TickOutcome> {
        let checkpoint = self.archive.root_state()?.current_ledger;
        info!(checkpoint, "ingestion version mismatch, rebuilding state");
        self.backend
            .prepare_range(LedgerRange::unbounded(checkpoint))?;
        self.build_state_at(checkpoint, true)?;
        Ok(TickOutcome::RebuiltState(checkpoint))
    }

    fn build_state_at(&mut self, checkpoint: u32, truncate: bool) -> IngestResult<()> {
        self.sink.begin()?;
        let result: IngestResult<()> = (|| {
            if truncate {
                self.sink.truncate_state_tables()?;
            }
            let mut runner = ProcessorRunner {
                config: &self.runner_config,
                archive: &self.archive,
                backend: &mut self.backend,
                sink: &mut self.sink,
            };
            runner.run_history_archive_ingestion(checkpoint)?;
            self.sink.update_last_ingested_ledger(checkpoint)?;
            self.sink.update_ingest_version(CURRENT_INGEST_VERSION)?;
            self.sink.update_state_invalid(false)?;
            Ok(())
        })();
        self.finish_transaction(result)
    }

    fn ingest_next_ledger(&mut self, last: u32) -> IngestResult<TickOutcome> {
        let next = last + 1;
        let range = LedgerRange::unbounded(next);
        if !self.backend.is_prepared(range)? {
            self.backend.prepare_range(range)?;
        }
        if self.backend.get_ledger(next)?.is_none() {
            return Ok(TickOutcome::WaitingForLedger(next));
        }

        self.sink.begin()?;
        let result: IngestResult<()> = (|| {
            let mut runner = ProcessorRunner {
                config: &self.runner_config,
                archive: &self.archive,
                backend: &mut self.backend,
                sink: &mut self.sink,
            };
            runner.run_all_processors_on_ledger(next)?;
            self.sink.update_last_ingested_ledger(next)?;
            Ok(())
        })();
        self.finish_transaction(result)?;

        self.metrics.ledgers_ingested += 1;
        debug!(sequence = next, "ledger ingested");

        if is_checkpoint(next) && self.verification_due(next) {
            self.verify_state_at(next)?;
        }
        Ok(TickOutcome::Ingested(next))
    }

    /// Commit on success; roll back on failure. A state error additionally
    /// flags the store invalid (outside the doomed transaction).
    fn finish_transaction<T>(&mut self, result: IngestResult<T>) -> IngestResult<T> {
        match result {
            Ok(value) => {
                self.sink.commit()?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.sink.rollback();
                if matches!(err, IngestError::State(_)) {
                    error!(error = %err, "state inconsistency detected, marking state invalid");
                    let _ = self.sink.update_state_invalid(true);
                }
                Err(err)
            }
        }
    }

    fn verification_due(&self, checkpoint_sequence: u32) -> bool {
        let index = (checkpoint_sequence + 1) / LEDGERS_PER_CHECKPOINT;
        index % self.config.checkpoint_verification_frequency == 0
    }

    fn verify_state_at(&mut self, checkpoint: u32) -> IngestResult<()> {
        let report = match verify::verify_state(&self.sink, &self.archive, checkpoint) {
            // The archive may not have published this checkpoint yet.
            Err(IngestError::Archive(ArchiveError::CheckpointNotFound(_))) => {
                debug!(checkpoint, "archive snapshot not yet published, skipping verification");
                return Ok(());
            }
            other => other?,
        };

        self.metrics.state_verifications += 1;
        if report.consistent() {
            info!(
                checkpoint,
                entries = report.entries_compared,
                "state verification passed"
            );
        } else {
            self.metrics.state_verification_failures += 1;
            error!(
                checkpoint,
                mismatches = report.mismatches.len(),
                "state verification failed"
            );
            self.sink.update_state_invalid(true)?;
        }
        Ok(())
    }

    /// Operator tool: ingest `[from, to]` into a clean store, optionally
    /// verifying the final state against the archive snapshot at `to`.
    pub fn verify_range(&mut self, from: u32, to: u32, verify_state: bool) -> IngestResult<()> {
        if from != GENESIS_SEQUENCE && !is_checkpoint(from) {
            return Err(IngestError::FromNotCheckpoint);
        }
        if verify_state && !is_checkpoint(to) {
            return Err(IngestError::ToNotCheckpoint);
        }
        if to < from {
            return Err(IngestError::InvalidRange { from, to });
        }
        let last = self.sink.last_ingested_ledger()?;
        if last != 0 {
            return Err(IngestError::StoreNotEmpty(last));
        }

        // Genesis is synthesized; the stream starts at ledger 2 at the
        // earliest.
        let stream_from = from.max(2);
        if to >= stream_from {
            self.backend
                .prepare_range(LedgerRange::bounded(stream_from, to))?;
        }

        // State at `from` comes from the archive snapshot; every later
        // ledger is projected in full, one transaction each.
        self.sink.begin()?;
        let result: IngestResult<()> = (|| {
            let mut runner = ProcessorRunner {
                config: &self.runner_config,
                archive: &self.archive,
                backend: &mut self.backend,
                sink: &mut self.sink,
            };
            runner.run_history_archive_ingestion(from)?;
            self.sink.update_last_ingested_ledger(from)?;
            self.sink.update_ingest_version(CURRENT_INGEST_VERSION)?;
            Ok(())
        })();
        self.finish_transaction(result)?;

        for sequence in (from + 1)..=to {
            self.sink.begin()?;
            let result: IngestResult<()> = (|| {
                let mut runner = ProcessorRunner {
                    config: &self.runner_config,
                    archive: &self.archive,
                    backend: &mut self.backend,
                    sink: &mut self.sink,
                };
                runner.run_all_processors_on_ledger(sequence)?;
                self.sink.update_last_ingested_ledger(sequence)?;
                Ok(())
            })();
            self.finish_transaction(result)?;
        }

        if verify_state {
            let report = verify::verify_state(&self.sink, &self.archive, to)?;
            self.metrics.state_verifications += 1;
            if !report.consistent() {
                self.metrics.state_verification_failures += 1;
                self.sink.update_state_invalid(true)?;
                return Err(IngestError::State(format!(
                    "state verification at checkpoint {to} found {} mismatches",
                    report.mismatches.len()
                )));
            }
        }
        info!(from, to, "range ingested");
        Ok(())
    }

    /// Operator tool: project a synthesized ledger with
    /// `transactions * changes_per_transaction` account creations and check
    /// the row counts add up.
    pub fn stress_test(
        &mut self,
        transactions: usize,
        changes_per_transaction: usize,
    ) -> IngestResult<StressTestReport> {
        if transactions == 0 || transactions > STRESS_TEST_MAX_TRANSACTIONS {
            return Err(IngestError::StressTestParameter {
                name: "transactions",
                max: STRESS_TEST_MAX_TRANSACTIONS,
                got: transactions,
            });
        }
        if changes_per_transaction == 0 || changes_per_transaction > STRESS_TEST_MAX_CHANGES {
            return Err(IngestError::StressTestParameter {
                name: "changes",
                max: STRESS_TEST_MAX_CHANGES,
                got: changes_per_transaction,
            });
        }
        let last = self.sink.last_ingested_ledger()?;
        if last != 0 {
            return Err(IngestError::StoreNotEmpty(last));
        }

        let sequence = GENESIS_SEQUENCE + 1;
        let store = InMemoryCoreStore::new();
        store.insert(synthesize_stress_ledger(
            sequence,
            transactions,
            changes_per_transaction,
        ));
        let mut backend = DatabaseBackend::new(Arc::new(store));

        self.sink.begin()?;
        let result: IngestResult<()> = (|| {
            let mut runner = ProcessorRunner {
                config: &self.runner_config,
                archive: &self.archive,
                backend: &mut backend,
                sink: &mut self.sink,
            };
            runner.run_all_processors_on_ledger(sequence)?;
            self.sink.update_last_ingested_ledger(sequence)?;
            Ok(())
        })();
        self.finish_transaction(result)?;

        let accounts_created = self.sink.accounts()?.len() as u64;
        let expected = (transactions * changes_per_transaction) as u64;
        if accounts_created != expected {
            return Err(IngestError::State(format!(
                "expected {expected} accounts after stress ledger, found {accounts_created}"
            )));
        }
        info!(transactions, changes_per_transaction, "stress test passed");
        Ok(StressTestReport {
            transactions,
            changes_per_transaction,
            accounts_created,
        })
    }

    /// Operator tool: ingest the synthesized genesis state into a clean
    /// store.
    pub fn build_genesis_state(&mut self) -> IngestResult<()> {
        let last = self.sink.last_ingested_ledger()?;
        if last != 0 {
            return Err(IngestError::StoreNotEmpty(last));
        }
        self.sink.begin()?;
        let result: IngestResult<()> = (|| {
            let mut runner = ProcessorRunner {
                config: &self.runner_config,
                archive: &self.archive,
                backend: &mut self.backend,
                sink: &mut self.sink,
            };
            runner.run_history_archive_ingestion(GENESIS_SEQUENCE)?;
            self.sink.update_last_ingested_ledger(GENESIS_SEQUENCE)?;
            self.sink.update_ingest_version(CURRENT_INGEST_VERSION)?;
            Ok(())
        })();
        self.finish_transaction(result)
    }

    /// Operator tool: force a state rebuild on the next turn by zeroing the
    /// ingestion version. Also clears the invalid flag so the rebuild can
    /// actually run.
    pub fn trigger_state_rebuild(&mut self) -> IngestResult<()> {
        self.sink.update_ingest_version(0)?;
        self.sink.update_state_invalid(false)?;
        info!("triggered state rebuild");
        Ok(())
    }
}

/// One ledger holding `transactions` transactions with
/// `changes_per_transaction` unique account creations each.
fn synthesize_stress_ledger(
    sequence: u32,
    transactions: usize,
    changes_per_transaction: usize,
) -> LedgerCloseMeta {
    let mut meta = LedgerCloseMeta::empty(sequence);
    for tx_index in 0..transactions {
        let source = format!("GSTRESS{tx_index:04}");
        let mut operations = Vec::with_capacity(changes_per_transaction);
        let mut changes = Vec::with_capacity(changes_per_transaction);
        for change_index in 0..changes_per_transaction {
            let account_id = format!("GSTRESS{tx_index:04}C{change_index:04}");
            operations.push(Operation::create_account(&source, &account_id, 100));
            changes.push(Change::create(LedgerEntry::new(
                sequence,
                LedgerEntryData::Account(AccountEntry::new(&account_id, 100)),
            )));
        }
        meta.transactions.push(LedgerTransaction::new(
            tx_index as u32 + 1,
            &source,
            operations,
            changes,
        ));
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_archive::InMemoryArchive;
    use aurora_sink::InMemorySink;
    use aurora_types::AccountEntry;

    const PASSPHRASE: &str = "Test Network ; September 2015";

    fn test_config() -> SystemConfig {
        SystemConfig {
            network_passphrase: PASSPHRASE.into(),
            checkpoint_verification_frequency: 1,
            poll_interval: Duration::from_millis(1),
        }
    }

    fn account(id: &str, balance: i64, ledger: u32) -> LedgerEntry {
        LedgerEntry::new(ledger, LedgerEntryData::Account(AccountEntry::new(id, balance)))
    }

    /// Ledger whose header carries the archive's bucket-list hash for its
    /// checkpoint, so bootstrap validation passes.
    fn checkpoint_meta(archive: &InMemoryArchive, checkpoint: u32) -> LedgerCloseMeta {
        let mut meta = LedgerCloseMeta::empty(checkpoint);
        meta.header.bucket_list_hash = archive.bucket_list_hash(checkpoint).unwrap();
        meta
    }

    fn ledger_with_new_account(sequence: u32, id: &str) -> LedgerCloseMeta {
        let mut meta = LedgerCloseMeta::empty(sequence);
        meta.transactions.push(LedgerTransaction::new(
            1,
            "GA",
            vec![Operation::create_account("GA", id, 500)],
            vec![Change::create(account(id, 500, sequence))],
        ));
        meta
    }

    type TestSystem =
        IngestionSystem<DatabaseBackend, std::sync::Arc<InMemoryArchive>, InMemorySink>;

    fn system_over(
        archive: std::sync::Arc<InMemoryArchive>,
        store: std::sync::Arc<InMemoryCoreStore>,
    ) -> TestSystem {
        IngestionSystem::new(
            test_config(),
            DatabaseBackend::new(store),
            archive,
            InMemorySink::new(),
        )
    }

    // -----------------------------------------------------------------------
    // Bootstrap and live follow
    // -----------------------------------------------------------------------

    #[test]
    fn bootstrap_then_follow_live_ledgers() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        archive
            .add_checkpoint(63, vec![account("GA", 100, 63), account("GB", 50, 63)])
            .unwrap();

        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        store.insert(checkpoint_meta(&archive, 63));
        store.insert(ledger_with_new_account(64, "GC"));
        store.insert(LedgerCloseMeta::empty(65));
        store.insert(LedgerCloseMeta::empty(66));

        let mut system = system_over(archive, store);

        assert_eq!(system.tick().unwrap(), TickOutcome::Bootstrapped(63));
        assert_eq!(system.sink().last_ingested_ledger().unwrap(), 63);
        assert_eq!(system.sink().ingest_version().unwrap(), CURRENT_INGEST_VERSION);
        assert_eq!(system.sink().accounts().unwrap().len(), 2);

        assert_eq!(system.tick().unwrap(), TickOutcome::Ingested(64));
        assert_eq!(system.sink().accounts().unwrap().len(), 3);
        assert_eq!(system.sink().transactions().unwrap().len(), 1);
        assert_eq!(system.sink().ledgers().unwrap().len(), 1);

        assert_eq!(system.tick().unwrap(), TickOutcome::Ingested(65));
        assert_eq!(system.tick().unwrap(), TickOutcome::Ingested(66));
        assert_eq!(system.tick().unwrap(), TickOutcome::WaitingForLedger(67));
        assert_eq!(system.metrics().ledgers_ingested, 3);
    }

    #[test]
    fn last_ledger_is_monotonic_across_ticks() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        archive.add_checkpoint(63, vec![]).unwrap();
        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        store.insert(checkpoint_meta(&archive, 63));
        store.insert(LedgerCloseMeta::empty(64));
        store.insert(LedgerCloseMeta::empty(65));

        let mut system = system_over(archive, store);
        let mut seen = Vec::new();
        loop {
            match system.tick().unwrap() {
                TickOutcome::WaitingForLedger(_) => break,
                _ => seen.push(system.sink().last_ingested_ledger().unwrap()),
            }
        }
        assert_eq!(seen, vec![63, 64, 65]);
    }

    // -----------------------------------------------------------------------
    // Rebuild paths
    // -----------------------------------------------------------------------

    fn rebuild_fixture() -> TestSystem {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        archive
            .add_checkpoint(127, vec![account("GA", 900, 127)])
            .unwrap();
        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        store.insert(checkpoint_meta(&archive, 127));
        store.insert(LedgerCloseMeta::empty(128));
        system_over(archive, store)
    }

    #[test]
    fn version_mismatch_rebuilds_state() {
        let mut system = rebuild_fixture();
        // Stale projection from an older schema version.
        system
            .sink_mut()
            .insert_accounts(vec![aurora_sink::AccountRow::from_entry(
                &AccountEntry::new("GSTALE", 1),
                60,
            )])
            .unwrap();
        system.sink_mut().update_last_ingested_ledger(63).unwrap();
        system
            .sink_mut()
            .update_ingest_version(CURRENT_INGEST_VERSION - 1)
            .unwrap();

        assert_eq!(system.tick().unwrap(), TickOutcome::RebuiltState(127));
        let accounts = system.sink().accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_id, "GA");
        assert_eq!(system.sink().last_ingested_ledger().unwrap(), 127);
        assert_eq!(system.sink().ingest_version().unwrap(), CURRENT_INGEST_VERSION);
    }

    #[test]
    fn invalid_state_blocks_until_operator_rebuild() {
        let mut system = rebuild_fixture();
        system.sink_mut().update_last_ingested_ledger(63).unwrap();
        system
            .sink_mut()
            .update_ingest_version(CURRENT_INGEST_VERSION)
            .unwrap();
        system.sink_mut().update_state_invalid(true).unwrap();

        assert_eq!(system.tick().unwrap(), TickOutcome::Blocked);
        assert_eq!(system.tick().unwrap(), TickOutcome::Blocked);

        system.trigger_state_rebuild().unwrap();
        assert_eq!(system.tick().unwrap(), TickOutcome::RebuiltState(127));
        assert!(!system.sink().state_invalid().unwrap());
    }

    // -----------------------------------------------------------------------
    // Periodic state verification
    // -----------------------------------------------------------------------

    #[test]
    fn divergent_checkpoint_marks_state_invalid() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        archive.add_checkpoint(63, vec![account("GA", 100, 63)]).unwrap();
        // The archive's next snapshot disagrees with what replaying the
        // (empty) ledgers produces.
        archive.add_checkpoint(127, vec![account("GA", 999, 63)]).unwrap();

        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        store.insert(checkpoint_meta(&archive, 63));
        for sequence in 64..=127 {
            store.insert(LedgerCloseMeta::empty(sequence));
        }

        let mut system = system_over(archive, store);
        assert_eq!(system.tick().unwrap(), TickOutcome::Bootstrapped(63));
        for sequence in 64..=127 {
            assert_eq!(system.tick().unwrap(), TickOutcome::Ingested(sequence));
        }

        assert!(system.sink().state_invalid().unwrap());
        assert_eq!(system.metrics().state_verification_failures, 1);
        assert_eq!(system.tick().unwrap(), TickOutcome::Blocked);
    }

    #[test]
    fn consistent_checkpoint_passes_verification() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        archive.add_checkpoint(63, vec![account("GA", 100, 63)]).unwrap();
        archive.add_checkpoint(127, vec![account("GA", 100, 63)]).unwrap();

        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        store.insert(checkpoint_meta(&archive, 63));
        for sequence in 64..=127 {
            store.insert(LedgerCloseMeta::empty(sequence));
        }

        let mut system = system_over(archive, store);
        system.tick().unwrap();
        for _ in 64..=127 {
            system.tick().unwrap();
        }

        assert!(!system.sink().state_invalid().unwrap());
        assert_eq!(system.metrics().state_verifications, 1);
        assert_eq!(system.metrics().state_verification_failures, 0);
    }

    // -----------------------------------------------------------------------
    // verify-range
    // -----------------------------------------------------------------------

    #[test]
    fn verify_range_ingests_whole_window() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        archive
            .add_checkpoint(63, vec![account("GA", 100, 63), account("GB", 50, 63)])
            .unwrap();
        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        store.insert(checkpoint_meta(&archive, 63));
        for sequence in 64..=70 {
            store.insert(LedgerCloseMeta::empty(sequence));
        }

        let mut system = system_over(archive, store);
        system.verify_range(63, 70, false).unwrap();

        assert_eq!(system.sink().last_ingested_ledger().unwrap(), 70);
        assert_eq!(system.sink().accounts().unwrap().len(), 2);
        // One history row per replayed ledger after the checkpoint.
        assert_eq!(system.sink().ledgers().unwrap().len(), 7);
    }

    #[test]
    fn verify_range_with_state_verification() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        archive.add_checkpoint(63, vec![account("GA", 100, 63)]).unwrap();
        archive.add_checkpoint(127, vec![account("GA", 100, 63)]).unwrap();
        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        store.insert(checkpoint_meta(&archive, 63));
        for sequence in 64..=127 {
            store.insert(LedgerCloseMeta::empty(sequence));
        }

        let mut system = system_over(archive, store);
        system.verify_range(63, 127, true).unwrap();
        assert_eq!(system.metrics().state_verifications, 1);
        assert_eq!(system.metrics().state_verification_failures, 0);
    }

    #[test]
    fn reingesting_the_same_range_is_deterministic() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        archive
            .add_checkpoint(63, vec![account("GA", 100, 63), account("GB", 50, 63)])
            .unwrap();
        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        store.insert(checkpoint_meta(&archive, 63));
        store.insert(ledger_with_new_account(64, "GC"));
        store.insert(LedgerCloseMeta::empty(65));
        store.insert(LedgerCloseMeta::empty(66));

        let mut dumps = Vec::new();
        for _ in 0..2 {
            let mut system = system_over(std::sync::Arc::clone(&archive), std::sync::Arc::clone(&store));
            system.verify_range(63, 66, false).unwrap();
            dumps.push((
                system.sink().accounts().unwrap(),
                system.sink().ledgers().unwrap(),
                system.sink().transactions().unwrap(),
                system.sink().operations().unwrap(),
                system.sink().effects().unwrap(),
                system.sink().participants().unwrap(),
            ));
        }
        assert_eq!(dumps[0], dumps[1]);
    }

    #[test]
    fn verify_range_rejects_misuse_before_side_effects() {
        let mut system = rebuild_fixture();

        assert!(matches!(
            system.verify_range(64, 70, false),
            Err(IngestError::FromNotCheckpoint)
        ));
        assert!(matches!(
            system.verify_range(63, 70, true),
            Err(IngestError::ToNotCheckpoint)
        ));
        assert!(matches!(
            system.verify_range(127, 100, false),
            Err(IngestError::InvalidRange { .. })
        ));
        assert_eq!(system.sink().last_ingested_ledger().unwrap(), 0);

        system.sink_mut().update_last_ingested_ledger(10).unwrap();
        assert!(matches!(
            system.verify_range(63, 127, false),
            Err(IngestError::StoreNotEmpty(10))
        ));
    }

    // -----------------------------------------------------------------------
    // Stress test and genesis
    // -----------------------------------------------------------------------

    #[test]
    fn stress_test_projects_every_synthesized_change() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        let mut system = system_over(archive, store);

        let report = system.stress_test(3, 5).unwrap();
        assert_eq!(report.accounts_created, 15);
        assert_eq!(system.sink().accounts().unwrap().len(), 15);
        assert_eq!(system.sink().transactions().unwrap().len(), 3);
        assert_eq!(system.sink().operations().unwrap().len(), 15);
        assert_eq!(system.sink().last_ingested_ledger().unwrap(), 2);
    }

    #[test]
    fn stress_test_rejects_bad_parameters() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        let mut system = system_over(archive, store);

        assert!(matches!(
            system.stress_test(0, 5),
            Err(IngestError::StressTestParameter { name: "transactions", .. })
        ));
        assert!(matches!(
            system.stress_test(3, 4_001),
            Err(IngestError::StressTestParameter { name: "changes", .. })
        ));
    }

    #[test]
    fn genesis_state_contains_only_the_root_account() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        let mut system = system_over(archive, store);

        system.build_genesis_state().unwrap();
        let accounts = system.sink().accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(
            accounts[0].account_id,
            aurora_archive::root_account_id(PASSPHRASE)
        );
        assert!(system.sink().offers(true).unwrap().is_empty());
        assert!(system.sink().trustlines().unwrap().is_empty());
        assert!(system.sink().claimable_balances().unwrap().is_empty());
        assert_eq!(system.sink().last_ingested_ledger().unwrap(), 1);

        // A second run refuses the non-empty store.
        assert!(matches!(
            system.build_genesis_state(),
            Err(IngestError::StoreNotEmpty(1))
        ));
    }

    // -----------------------------------------------------------------------
    // Transaction discipline
    // -----------------------------------------------------------------------

    #[test]
    fn failed_ledger_rolls_back_and_flags_state() {
        let archive = std::sync::Arc::new(InMemoryArchive::new());
        archive.add_checkpoint(63, vec![account("GA", 100, 63)]).unwrap();
        let store = std::sync::Arc::new(InMemoryCoreStore::new());
        store.insert(checkpoint_meta(&archive, 63));
        // Ledger 64 updates an account that does not exist in the projection.
        let mut meta = LedgerCloseMeta::empty(64);
        meta.transactions.push(LedgerTransaction::new(
            1,
            "GA",
            vec![],
            vec![Change::update(account("GHOST", 1, 63), account("GHOST", 2, 64))],
        ));
        store.insert(meta);

        let mut system = system_over(archive, store);
        system.tick().unwrap();

        let err = system.tick().unwrap_err();
        assert!(matches!(err, IngestError::State(_)));
        // The partial ledger was rolled back and the store flagged.
        assert_eq!(system.sink().last_ingested_ledger().unwrap(), 63);
        assert!(system.sink().state_invalid().unwrap());
        assert!(!system.sink().in_transaction());
        assert_eq!(system.tick().unwrap(), TickOutcome::Blocked);
    }
}
