use aurora_sink::{IngestionSink, LedgerRow};
use aurora_types::{LedgerHeader, LedgerTransaction};

use crate::error::IngestResult;
use crate::processors::{expect_one_row, TransactionProcessor};

/// Writes the per-ledger summary row into `history_ledgers`.
pub struct LedgersProcessor {
    header: LedgerHeader,
    importer_version: i32,
    transaction_count: u32,
    operation_count: u32,
    successful: u32,
    failed: u32,
}

impl LedgersProcessor {
    pub fn new(header: LedgerHeader, importer_version: i32) -> Self {
        Self {
            header,
            importer_version,
            transaction_count: 0,
            operation_count: 0,
            successful: 0,
            failed: 0,
        }
    }
}

impl TransactionProcessor for LedgersProcessor {
    fn process_transaction(
        &mut self,
        _sink: &mut dyn IngestionSink,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        self.transaction_count += 1;
        self.operation_count += tx.envelope.operations.len() as u32;
        if tx.result.successful {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        Ok(())
    }

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        let row = LedgerRow {
            sequence: self.header.sequence,
            ledger_hash: hex::encode(self.header.hash()),
            previous_ledger_hash: hex::encode(self.header.previous_ledger_hash),
            transaction_count: self.transaction_count,
            operation_count: self.operation_count,
            successful_transaction_count: self.successful,
            failed_transaction_count: self.failed,
            closed_at: self.header.close_time,
            protocol_version: self.header.protocol_version,
            importer_version: self.importer_version,
        };
        let sequence = row.sequence;
        let inserted = sink.insert_ledgers(vec![row])?;
        expect_one_row(inserted, "inserting", "ledger", sequence)
    }
}
