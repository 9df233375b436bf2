use aurora_sink::{BatchInsertBuilder, IngestionSink, TransactionRow};
use aurora_types::LedgerTransaction;

use crate::error::IngestResult;
use crate::processors::{TransactionProcessor, MAX_BATCH_SIZE};

/// Appends applied transactions to the `history_transactions` table.
pub struct TransactionsProcessor {
    sequence: u32,
    batch: BatchInsertBuilder<TransactionRow>,
}

impl TransactionsProcessor {
    pub fn new(sequence: u32) -> Self {
        Self {
            sequence,
            batch: BatchInsertBuilder::new(MAX_BATCH_SIZE),
        }
    }
}

impl TransactionProcessor for TransactionsProcessor {
    fn process_transaction(
        &mut self,
        sink: &mut dyn IngestionSink,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        self.batch.add(TransactionRow {
            ledger_sequence: self.sequence,
            application_order: tx.application_order,
            transaction_hash: hex::encode(tx.hash),
            source_account: tx.envelope.source_account.clone(),
            fee_charged: tx.result.fee_charged,
            operation_count: tx.envelope.operations.len() as u32,
            successful: tx.result.successful,
            memo: tx.envelope.memo.clone(),
        });
        if let Some(batch) = self.batch.take_batch_if_full() {
            sink.insert_transactions(batch)?;
        }
        Ok(())
    }

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        let batch = self.batch.take_all();
        if !batch.is_empty() {
            sink.insert_transactions(batch)?;
        }
        Ok(())
    }
}
