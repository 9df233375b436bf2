//! Two-phase per-ledger projection.
//!
//! The runner owns no state of its own; it borrows the backend, archive and
//! sink, builds the processor groups for one operation, and streams either
//! an archive snapshot or a live ledger through them.

use std::sync::Arc;

use aurora_archive::{ChangeReader, GenesisStateReader, HistoryArchive};
use aurora_backend::LedgerBackend;
use aurora_sink::IngestionSink;
use aurora_types::{LedgerCloseMeta, LedgerHeader, GENESIS_SEQUENCE};
use tracing::info;

use crate::error::{IngestError, IngestResult};
use crate::processors::account_data::AccountDataProcessor;
use crate::processors::accounts::AccountsProcessor;
use crate::processors::asset_stats::AssetStatsProcessor;
use crate::processors::claimable_balances::ClaimableBalancesProcessor;
use crate::processors::effects::EffectsProcessor;
use crate::processors::ledgers::LedgersProcessor;
use crate::processors::offers::OffersProcessor;
use crate::processors::operations::OperationsProcessor;
use crate::processors::participants::ParticipantsProcessor;
use crate::processors::signers::SignersProcessor;
use crate::processors::stats::{StatsChangeProcessor, StatsTransactionProcessor};
use crate::processors::trades::TradesProcessor;
use crate::processors::transactions::TransactionsProcessor;
use crate::processors::trustlines::TrustLinesProcessor;
use crate::processors::{
    shared, ChangeProcessorGroup, ChangeStats, TransactionProcessorGroup, TransactionStats,
};

/// Highest validator protocol version this build understands.
pub const MAX_SUPPORTED_PROTOCOL_VERSION: u32 = 15;

/// Where a change stream originates. Live-ledger streams enable
/// upsert-by-id semantics in the derived-table processors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestionSource {
    HistoryArchive,
    Ledger,
}

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub network_passphrase: String,
    /// Stamped into every `history_ledgers` row.
    pub importer_version: i32,
}

/// Executes processor groups against one backend/archive/sink triple.
pub struct ProcessorRunner<'a> {
    pub config: &'a RunnerConfig,
    pub archive: &'a dyn HistoryArchive,
    pub backend: &'a mut dyn LedgerBackend,
    pub sink: &'a mut dyn IngestionSink,
}

impl<'a> ProcessorRunner<'a> {
    fn build_change_group(
        &self,
        source: IngestionSource,
        sequence: u32,
        stats: crate::processors::SharedChangeStats,
    ) -> ChangeProcessorGroup {
        let use_ledger_cache = source == IngestionSource::Ledger;
        ChangeProcessorGroup::new(vec![
            Box::new(StatsChangeProcessor::new(stats)),
            Box::new(AccountDataProcessor::new(sequence)),
            Box::new(AccountsProcessor::new(sequence)),
            Box::new(OffersProcessor::new(sequence)),
            Box::new(AssetStatsProcessor::new(use_ledger_cache)),
            Box::new(SignersProcessor::new(use_ledger_cache)),
            Box::new(TrustLinesProcessor::new(sequence)),
            Box::new(ClaimableBalancesProcessor::new(sequence)),
        ])
    }

    fn build_transaction_group(
        &self,
        header: LedgerHeader,
        stats: crate::processors::SharedTransactionStats,
    ) -> TransactionProcessorGroup {
        let sequence = header.sequence;
        TransactionProcessorGroup::new(vec![
            Box::new(StatsTransactionProcessor::new(stats)),
            Box::new(EffectsProcessor::new(sequence)),
            Box::new(LedgersProcessor::new(
                header.clone(),
                self.config.importer_version,
            )),
            Box::new(OperationsProcessor::new(sequence)),
            Box::new(TradesProcessor::new(header)),
            Box::new(ParticipantsProcessor::new(sequence)),
            Box::new(TransactionsProcessor::new(sequence)),
        ])
    }

    fn get_ledger(&mut self, sequence: u32) -> IngestResult<LedgerCloseMeta> {
        self.backend
            .get_ledger(sequence)?
            .ok_or(IngestError::LedgerNotFound(sequence))
    }

    /// Fails fatally when the ledger was closed by a newer protocol than
    /// this build supports.
    pub fn check_protocol_supported(&mut self, sequence: u32) -> IngestResult<()> {
        let meta = self.get_ledger(sequence)?;
        let observed = meta.protocol_version();
        if observed > MAX_SUPPORTED_PROTOCOL_VERSION {
            return Err(IngestError::ProtocolNotSupported {
                observed,
                supported: MAX_SUPPORTED_PROTOCOL_VERSION,
            });
        }
        Ok(())
    }

    /// The bucket-list hash published by the archive must match the one in
    /// the backend's ledger header. Anything else means one of the two
    /// sources cannot be trusted, so nothing is mutated.
    fn validate_bucket_list(&mut self, checkpoint: u32) -> IngestResult<()> {
        let archive_hash = self.archive.bucket_list_hash(checkpoint)?;
        let meta = self.get_ledger(checkpoint)?;
        let header_hash = meta.bucket_list_hash();
        if archive_hash != header_hash {
            return Err(IngestError::BucketListMismatch {
                archive: hex::encode(archive_hash),
                header: hex::encode(header_hash),
            });
        }
        Ok(())
    }

    /// Bootstrap the balance-sheet state from the snapshot at `checkpoint`.
    /// Checkpoint 1 is genesis and reads the synthetic root-account stream.
    pub fn run_history_archive_ingestion(&mut self, checkpoint: u32) -> IngestResult<ChangeStats> {
        let stats = shared::<ChangeStats>();
        let mut group =
            self.build_change_group(IngestionSource::HistoryArchive, checkpoint, Arc::clone(&stats));

        let mut reader: Box<dyn ChangeReader> = if checkpoint == GENESIS_SEQUENCE {
            Box::new(GenesisStateReader::new(&self.config.network_passphrase))
        } else {
            self.check_protocol_supported(checkpoint)?;
            self.validate_bucket_list(checkpoint)?;
            self.archive.open_snapshot(checkpoint)?
        };

        info!(ledger = checkpoint, "processing entries from history archive snapshot");
        while let Some(change) = reader.next_change()? {
            group.process_change(self.sink, &change)?;
        }
        group.commit(self.sink)?;

        let snapshot = stats.lock().expect("lock poisoned").clone();
        Ok(snapshot)
    }

    /// Run the change group over one live ledger.
    pub fn run_change_processors_on_ledger(&mut self, sequence: u32) -> IngestResult<ChangeStats> {
        let meta = self.get_ledger(sequence)?;
        let stats = shared::<ChangeStats>();
        let mut group =
            self.build_change_group(IngestionSource::Ledger, sequence, Arc::clone(&stats));
        for change in meta.changes() {
            group.process_change(self.sink, change)?;
        }
        group.commit(self.sink)?;

        let snapshot = stats.lock().expect("lock poisoned").clone();
        Ok(snapshot)
    }

    /// Run the transaction group over one live ledger.
    pub fn run_transaction_processors_on_ledger(
        &mut self,
        sequence: u32,
    ) -> IngestResult<TransactionStats> {
        let meta = self.get_ledger(sequence)?;
        self.check_protocol_supported(sequence)?;

        let stats = shared::<TransactionStats>();
        let mut group = self.build_transaction_group(meta.header.clone(), Arc::clone(&stats));
        for tx in &meta.transactions {
            group.process_transaction(self.sink, tx)?;
        }
        group.commit(self.sink)?;

        let snapshot = *stats.lock().expect("lock poisoned");
        Ok(snapshot)
    }

    /// Full projection of one ledger: changes first, then history.
    pub fn run_all_processors_on_ledger(
        &mut self,
        sequence: u32,
    ) -> IngestResult<(ChangeStats, TransactionStats)> {
        self.check_protocol_supported(sequence)?;
        let change_stats = self.run_change_processors_on_ledger(sequence)?;
        let tx_stats = self.run_transaction_processors_on_ledger(sequence)?;
        Ok((change_stats, tx_stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_archive::{root_account_id, InMemoryArchive};
    use aurora_backend::{DatabaseBackend, InMemoryCoreStore};
    use aurora_sink::{IngestionSink, InMemorySink};
    use aurora_types::{
        AccountEntry, Asset, Change, ChangeKind, LedgerEntry, LedgerEntryData, LedgerTransaction,
        OfferEntry, Operation, TrustlineEntry,
    };
    use std::sync::Arc as StdArc;

    const PASSPHRASE: &str = "Test Network ; September 2015";

    fn config() -> RunnerConfig {
        RunnerConfig {
            network_passphrase: PASSPHRASE.into(),
            importer_version: 11,
        }
    }

    fn account(id: &str, balance: i64, ledger: u32) -> LedgerEntry {
        LedgerEntry::new(ledger, LedgerEntryData::Account(AccountEntry::new(id, balance)))
    }

    fn trustline(account: &str, balance: i64, ledger: u32) -> LedgerEntry {
        LedgerEntry::new(
            ledger,
            LedgerEntryData::Trustline(TrustlineEntry {
                account_id: account.into(),
                asset: Asset::credit("USD", "GI"),
                balance,
                limit: 1_000,
                flags: 1,
            }),
        )
    }

    fn offer(id: i64, ledger: u32) -> LedgerEntry {
        LedgerEntry::new(
            ledger,
            LedgerEntryData::Offer(OfferEntry {
                seller_id: "GA".into(),
                offer_id: id,
                selling: Asset::Native,
                buying: Asset::credit("USD", "GI"),
                amount: 100,
                price_n: 1,
                price_d: 2,
                flags: 0,
            }),
        )
    }

    /// Store seeded with a checkpoint-63 ledger whose header carries the
    /// archive's bucket-list hash.
    fn checkpoint_fixture(
        entries: Vec<LedgerEntry>,
    ) -> (StdArc<InMemoryArchive>, StdArc<InMemoryCoreStore>) {
        let archive = InMemoryArchive::new();
        archive.add_checkpoint(63, entries).unwrap();
        let store = InMemoryCoreStore::new();
        let mut meta = aurora_types::LedgerCloseMeta::empty(63);
        meta.header.bucket_list_hash = archive.bucket_list_hash(63).unwrap();
        store.insert(meta);
        (StdArc::new(archive), StdArc::new(store))
    }

    #[test]
    fn genesis_ingestion_creates_exactly_the_root_account() {
        let archive = InMemoryArchive::new();
        let store: StdArc<InMemoryCoreStore> = StdArc::new(InMemoryCoreStore::new());
        let mut backend = DatabaseBackend::new(store);
        let mut sink = InMemorySink::new();
        let config = config();

        let stats = {
            let mut runner = ProcessorRunner {
                config: &config,
                archive: &archive,
                backend: &mut backend,
                sink: &mut sink,
            };
            runner.run_history_archive_ingestion(1).unwrap()
        };

        let accounts = sink.accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_id, root_account_id(PASSPHRASE));
        assert!(sink.offers(true).unwrap().is_empty());
        assert!(sink.trustlines().unwrap().is_empty());
        assert!(sink.claimable_balances().unwrap().is_empty());
        assert_eq!(stats.for_kind(ChangeKind::Account).created, 1);
    }

    #[test]
    fn archive_ingestion_projects_the_snapshot() {
        let (archive, store) = checkpoint_fixture(vec![
            account("GA", 100, 63),
            account("GB", 50, 63),
            trustline("GA", 25, 63),
            offer(7, 63),
        ]);
        let mut backend = DatabaseBackend::new(store);
        let mut sink = InMemorySink::new();
        let config = config();

        let stats = {
            let mut runner = ProcessorRunner {
                config: &config,
                archive: archive.as_ref(),
                backend: &mut backend,
                sink: &mut sink,
            };
            runner.run_history_archive_ingestion(63).unwrap()
        };

        assert_eq!(sink.accounts().unwrap().len(), 2);
        assert_eq!(sink.trustlines().unwrap().len(), 1);
        assert_eq!(sink.offers(false).unwrap().len(), 1);
        // Derived tables: one asset stat, master signers for both accounts.
        assert_eq!(sink.asset_stats().unwrap().len(), 1);
        assert_eq!(sink.account_signers().unwrap().len(), 2);
        assert_eq!(stats.total_changes(), 4);
    }

    #[test]
    fn bucket_list_mismatch_aborts_before_mutation() {
        let (archive, store) = checkpoint_fixture(vec![account("GA", 100, 63)]);
        archive.override_bucket_list_hash(63, [0xee; 32]);
        let mut backend = DatabaseBackend::new(store);
        let mut sink = InMemorySink::new();
        let config = config();

        let err = {
            let mut runner = ProcessorRunner {
                config: &config,
                archive: archive.as_ref(),
                backend: &mut backend,
                sink: &mut sink,
            };
            runner.run_history_archive_ingestion(63).unwrap_err()
        };
        assert!(matches!(err, IngestError::BucketListMismatch { .. }));
        assert!(sink.accounts().unwrap().is_empty());
    }

    #[test]
    fn unsupported_protocol_is_fatal_with_operator_message() {
        let store = InMemoryCoreStore::new();
        let mut meta = aurora_types::LedgerCloseMeta::empty(64);
        meta.header.protocol_version = 200;
        store.insert(meta);
        let mut backend = DatabaseBackend::new(StdArc::new(store));
        let mut sink = InMemorySink::new();
        let archive = InMemoryArchive::new();
        let config = config();

        let err = {
            let mut runner = ProcessorRunner {
                config: &config,
                archive: &archive,
                backend: &mut backend,
                sink: &mut sink,
            };
            runner.run_all_processors_on_ledger(64).unwrap_err()
        };
        assert_eq!(
            err.to_string(),
            "This aurora version does not support protocol version 200. \
             The latest supported protocol version is 15. \
             Please upgrade to the latest aurora version."
        );
    }

    #[test]
    fn run_all_projects_changes_and_history() {
        let store = InMemoryCoreStore::new();
        let mut meta = aurora_types::LedgerCloseMeta::empty(64);
        meta.transactions.push(LedgerTransaction::new(
            1,
            "GA",
            vec![Operation::create_account("GA", "GNEW", 500)],
            vec![Change::create(account("GNEW", 500, 64))],
        ));
        store.insert(meta);
        let mut backend = DatabaseBackend::new(StdArc::new(store));
        let mut sink = InMemorySink::new();
        let archive = InMemoryArchive::new();
        let config = config();

        let (change_stats, tx_stats) = {
            let mut runner = ProcessorRunner {
                config: &config,
                archive: &archive,
                backend: &mut backend,
                sink: &mut sink,
            };
            runner.run_all_processors_on_ledger(64).unwrap()
        };

        assert_eq!(change_stats.for_kind(ChangeKind::Account).created, 1);
        assert_eq!(tx_stats.transactions, 1);
        assert_eq!(tx_stats.operations, 1);

        assert_eq!(sink.accounts().unwrap().len(), 1);
        assert_eq!(sink.transactions().unwrap().len(), 1);
        assert_eq!(sink.operations().unwrap().len(), 1);
        assert_eq!(sink.ledgers().unwrap().len(), 1);
        assert_eq!(sink.effects().unwrap().len(), 2);
        assert_eq!(sink.participants().unwrap().len(), 2);
    }

    #[test]
    fn missing_ledger_is_reported() {
        let mut backend = DatabaseBackend::new(StdArc::new(InMemoryCoreStore::new()));
        let mut sink = InMemorySink::new();
        let archive = InMemoryArchive::new();
        let config = config();

        let err = {
            let mut runner = ProcessorRunner {
                config: &config,
                archive: &archive,
                backend: &mut backend,
                sink: &mut sink,
            };
            runner.run_transaction_processors_on_ledger(64).unwrap_err()
        };
        assert!(matches!(err, IngestError::LedgerNotFound(64)));
    }
}
