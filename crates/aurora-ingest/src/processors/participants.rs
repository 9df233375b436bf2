use std::collections::BTreeSet;

use aurora_sink::{BatchInsertBuilder, IngestionSink, ParticipantRow};
use aurora_types::LedgerTransaction;

use crate::error::IngestResult;
use crate::processors::{TransactionProcessor, MAX_BATCH_SIZE};

const PARTICIPANT_DETAIL_KEYS: &[&str] = &["account", "to", "from", "destination"];

/// Every account touched by a transaction.
fn participants(tx: &LedgerTransaction) -> BTreeSet<String> {
    let mut accounts = BTreeSet::new();
    accounts.insert(tx.envelope.source_account.clone());
    for operation in &tx.envelope.operations {
        accounts.insert(operation.source_account.clone());
        for key in PARTICIPANT_DETAIL_KEYS {
            if let Some(account) = operation.details.get(key).and_then(|v| v.as_str()) {
                accounts.insert(account.to_string());
            }
        }
        if let Some(trade) = &operation.trade {
            accounts.insert(trade.base_account.clone());
            accounts.insert(trade.counter_account.clone());
        }
    }
    accounts
}

/// Appends transaction participants to `history_transaction_participants`.
pub struct ParticipantsProcessor {
    sequence: u32,
    batch: BatchInsertBuilder<ParticipantRow>,
}

impl ParticipantsProcessor {
    pub fn new(sequence: u32) -> Self {
        Self {
            sequence,
            batch: BatchInsertBuilder::new(MAX_BATCH_SIZE),
        }
    }
}

impl TransactionProcessor for ParticipantsProcessor {
    fn process_transaction(
        &mut self,
        sink: &mut dyn IngestionSink,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        for account_id in participants(tx) {
            self.batch.add(ParticipantRow {
                ledger_sequence: self.sequence,
                application_order: tx.application_order,
                account_id,
            });
            if let Some(batch) = self.batch.take_batch_if_full() {
                sink.insert_participants(batch)?;
            }
        }
        Ok(())
    }

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        let batch = self.batch.take_all();
        if !batch.is_empty() {
            sink.insert_participants(batch)?;
        }
        Ok(())
    }
}
