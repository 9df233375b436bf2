use aurora_sink::{BatchInsertBuilder, EffectRow, IngestionSink};
use aurora_types::{LedgerTransaction, Operation, OperationKind};
use serde_json::json;

use crate::error::IngestResult;
use crate::processors::{TransactionProcessor, MAX_BATCH_SIZE};

fn detail_str(operation: &Operation, key: &str) -> Option<String> {
    operation
        .details
        .get(key)
        .and_then(|value| value.as_str())
        .map(str::to_string)
}

fn detail_i64(operation: &Operation, key: &str) -> Option<i64> {
    operation.details.get(key).and_then(|value| value.as_i64())
}

/// Effects an operation had on accounts, as `(account, kind, details)`.
fn effects_for_operation(operation: &Operation) -> Vec<(String, &'static str, serde_json::Value)> {
    let source = operation.source_account.clone();
    match operation.kind {
        OperationKind::CreateAccount => {
            let account = detail_str(operation, "account").unwrap_or_else(|| source.clone());
            let balance = detail_i64(operation, "starting_balance").unwrap_or(0);
            vec![
                (account, "account_created", json!({ "starting_balance": balance })),
                (source, "account_debited", json!({ "amount": balance })),
            ]
        }
        OperationKind::Payment => {
            let from = detail_str(operation, "from").unwrap_or_else(|| source.clone());
            let to = detail_str(operation, "to").unwrap_or_else(|| source.clone());
            let amount = detail_i64(operation, "amount").unwrap_or(0);
            vec![
                (to, "account_credited", json!({ "amount": amount })),
                (from, "account_debited", json!({ "amount": amount })),
            ]
        }
        OperationKind::ManageOffer => match &operation.trade {
            Some(trade) => vec![
                (
                    trade.base_account.clone(),
                    "trade",
                    json!({
                        "sold": trade.base_amount,
                        "bought": trade.counter_amount,
                        "counterparty": trade.counter_account,
                    }),
                ),
                (
                    trade.counter_account.clone(),
                    "trade",
                    json!({
                        "sold": trade.counter_amount,
                        "bought": trade.base_amount,
                        "counterparty": trade.base_account,
                    }),
                ),
            ],
            None => Vec::new(),
        },
        OperationKind::ChangeTrust => {
            let kind = if detail_i64(operation, "limit") == Some(0) {
                "trustline_removed"
            } else {
                "trustline_updated"
            };
            vec![(source, kind, operation.details.clone())]
        }
        OperationKind::ManageData => {
            vec![(source, "data_updated", operation.details.clone())]
        }
        OperationKind::CreateClaimableBalance => {
            vec![(source, "claimable_balance_created", operation.details.clone())]
        }
        OperationKind::ClaimClaimableBalance => {
            vec![(source, "claimable_balance_claimed", operation.details.clone())]
        }
        OperationKind::SetOptions => Vec::new(),
    }
}

/// Derives account-level effects and appends them to `history_effects`.
pub struct EffectsProcessor {
    sequence: u32,
    batch: BatchInsertBuilder<EffectRow>,
}

impl EffectsProcessor {
    pub fn new(sequence: u32) -> Self {
        Self {
            sequence,
            batch: BatchInsertBuilder::new(MAX_BATCH_SIZE),
        }
    }
}

impl TransactionProcessor for EffectsProcessor {
    fn process_transaction(
        &mut self,
        sink: &mut dyn IngestionSink,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        // Failed transactions charge a fee but have no effects.
        if !tx.result.successful {
            return Ok(());
        }
        for (op_index, operation) in tx.envelope.operations.iter().enumerate() {
            for (effect_order, (account, kind, details)) in
                effects_for_operation(operation).into_iter().enumerate()
            {
                self.batch.add(EffectRow {
                    ledger_sequence: self.sequence,
                    application_order: tx.application_order,
                    operation_index: op_index as u32 + 1,
                    effect_order: effect_order as u32 + 1,
                    account,
                    kind: kind.to_string(),
                    details,
                });
                if let Some(batch) = self.batch.take_batch_if_full() {
                    sink.insert_effects(batch)?;
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        let batch = self.batch.take_all();
        if !batch.is_empty() {
            sink.insert_effects(batch)?;
        }
        Ok(())
    }
}
