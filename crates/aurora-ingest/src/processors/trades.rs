use aurora_sink::{BatchInsertBuilder, IngestionSink, TradeRow};
use aurora_types::{LedgerHeader, LedgerTransaction};

use crate::error::IngestResult;
use crate::processors::{TransactionProcessor, MAX_BATCH_SIZE};

/// Appends executed trades to the `history_trades` table.
pub struct TradesProcessor {
    header: LedgerHeader,
    batch: BatchInsertBuilder<TradeRow>,
}

impl TradesProcessor {
    pub fn new(header: LedgerHeader) -> Self {
        Self {
            header,
            batch: BatchInsertBuilder::new(MAX_BATCH_SIZE),
        }
    }
}

impl TransactionProcessor for TradesProcessor {
    fn process_transaction(
        &mut self,
        sink: &mut dyn IngestionSink,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        if !tx.result.successful {
            return Ok(());
        }
        for (op_index, operation) in tx.envelope.operations.iter().enumerate() {
            if let Some(trade) = &operation.trade {
                self.batch.add(TradeRow {
                    ledger_sequence: self.header.sequence,
                    application_order: tx.application_order,
                    operation_index: op_index as u32 + 1,
                    base_account: trade.base_account.clone(),
                    counter_account: trade.counter_account.clone(),
                    base_asset: trade.base_asset.clone(),
                    counter_asset: trade.counter_asset.clone(),
                    base_amount: trade.base_amount,
                    counter_amount: trade.counter_amount,
                    price_n: trade.price_n,
                    price_d: trade.price_d,
                    ledger_closed_at: self.header.close_time,
                });
                if let Some(batch) = self.batch.take_batch_if_full() {
                    sink.insert_trades(batch)?;
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        let batch = self.batch.take_all();
        if !batch.is_empty() {
            sink.insert_trades(batch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_sink::InMemorySink;
    use aurora_types::{Asset, Operation, OperationKind, Trade};

    #[test]
    fn trades_carry_ledger_close_time() {
        let mut sink = InMemorySink::new();
        let mut header = LedgerHeader::new(64, 15);
        header.close_time = 1_600_000_000;
        let mut processor = TradesProcessor::new(header);

        let operation = Operation {
            kind: OperationKind::ManageOffer,
            source_account: "GA".into(),
            details: serde_json::json!({}),
            trade: Some(Trade {
                base_account: "GA".into(),
                counter_account: "GB".into(),
                base_asset: Asset::Native,
                counter_asset: Asset::credit("USD", "GI"),
                base_amount: 100,
                counter_amount: 25,
                price_n: 1,
                price_d: 4,
            }),
        };
        let tx = LedgerTransaction::new(3, "GA", vec![operation], vec![]);
        processor.process_transaction(&mut sink, &tx).unwrap();
        processor.commit(&mut sink).unwrap();

        let rows = sink.trades().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ledger_sequence, 64);
        assert_eq!(rows[0].ledger_closed_at, 1_600_000_000);
        assert_eq!(rows[0].counter_account, "GB");
    }
}
