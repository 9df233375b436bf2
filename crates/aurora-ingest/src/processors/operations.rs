use aurora_sink::{BatchInsertBuilder, IngestionSink, OperationRow};
use aurora_types::LedgerTransaction;

use crate::error::IngestResult;
use crate::processors::{TransactionProcessor, MAX_BATCH_SIZE};

/// Appends operations to the `history_operations` table.
pub struct OperationsProcessor {
    sequence: u32,
    batch: BatchInsertBuilder<OperationRow>,
}

impl OperationsProcessor {
    pub fn new(sequence: u32) -> Self {
        Self {
            sequence,
            batch: BatchInsertBuilder::new(MAX_BATCH_SIZE),
        }
    }
}

impl TransactionProcessor for OperationsProcessor {
    fn process_transaction(
        &mut self,
        sink: &mut dyn IngestionSink,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        for (index, operation) in tx.envelope.operations.iter().enumerate() {
            self.batch.add(OperationRow {
                ledger_sequence: self.sequence,
                application_order: tx.application_order,
                operation_index: index as u32 + 1,
                kind: operation.kind.name().to_string(),
                source_account: operation.source_account.clone(),
                details: operation.details.clone(),
            });
            if let Some(batch) = self.batch.take_batch_if_full() {
                sink.insert_operations(batch)?;
            }
        }
        Ok(())
    }

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        let batch = self.batch.take_all();
        if !batch.is_empty() {
            sink.insert_operations(batch)?;
        }
        Ok(())
    }
}
