use aurora_sink::{BatchInsertBuilder, ClaimableBalanceRow, IngestionSink};
use aurora_types::{Change, ChangeKind, ClaimableBalanceEntry, LedgerEntry, LedgerEntryData};

use crate::cache::ChangeCache;
use crate::error::IngestResult;
use crate::processors::{expect_one_row, is_kind, ChangeProcessor, MAX_BATCH_SIZE};

fn balance_entry(entry: &LedgerEntry) -> Option<&ClaimableBalanceEntry> {
    match &entry.data {
        LedgerEntryData::ClaimableBalance(balance) => Some(balance),
        _ => None,
    }
}

/// Projects claimable balance entries into the `claimable_balances` table.
pub struct ClaimableBalancesProcessor {
    sequence: u32,
    cache: ChangeCache,
}

impl ClaimableBalancesProcessor {
    pub fn new(sequence: u32) -> Self {
        Self {
            sequence,
            cache: ChangeCache::new(),
        }
    }

    fn flush(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        let mut batch = BatchInsertBuilder::new(MAX_BATCH_SIZE);
        for change in self.cache.take_changes() {
            match (&change.pre, &change.post) {
                (None, Some(post)) => {
                    if let Some(balance) = balance_entry(post) {
                        batch.add(ClaimableBalanceRow::from_entry(
                            balance,
                            post.last_modified_ledger,
                        ));
                    }
                }
                (Some(pre), None) => {
                    if let Some(balance) = balance_entry(pre) {
                        let affected =
                            sink.remove_claimable_balance(&balance.balance_id, self.sequence)?;
                        expect_one_row(affected, "removing", "claimable balance", &balance.balance_id)?;
                    }
                }
                (_, Some(post)) => {
                    if let Some(balance) = balance_entry(post) {
                        let row =
                            ClaimableBalanceRow::from_entry(balance, post.last_modified_ledger);
                        let id = row.balance_id.clone();
                        let affected = sink.update_claimable_balance(row)?;
                        expect_one_row(affected, "updating", "claimable balance", id)?;
                    }
                }
                (None, None) => unreachable!("cache never yields empty changes"),
            }
        }
        if !batch.is_empty() {
            sink.insert_claimable_balances(batch.take_all())?;
        }
        Ok(())
    }
}

impl ChangeProcessor for ClaimableBalancesProcessor {
    fn process_change(
        &mut self,
        sink: &mut dyn IngestionSink,
        change: &Change,
    ) -> IngestResult<()> {
        if !is_kind(change, ChangeKind::ClaimableBalance) {
            return Ok(());
        }
        self.cache.add_change(change.clone())?;
        if self.cache.len() > MAX_BATCH_SIZE {
            self.flush(sink)?;
        }
        Ok(())
    }

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        self.flush(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_sink::InMemorySink;
    use aurora_types::Asset;

    fn balance(id: &str, amount: i64, ledger: u32) -> LedgerEntry {
        LedgerEntry::new(
            ledger,
            LedgerEntryData::ClaimableBalance(ClaimableBalanceEntry {
                balance_id: id.into(),
                asset: Asset::credit("USD", "GI"),
                amount,
                sponsor: "GS".into(),
                claimants: vec!["GC".into()],
            }),
        )
    }

    #[test]
    fn claim_removes_the_row() {
        let mut sink = InMemorySink::new();
        let mut processor = ClaimableBalancesProcessor::new(5);
        processor
            .process_change(&mut sink, &Change::create(balance("b1", 100, 5)))
            .unwrap();
        processor.commit(&mut sink).unwrap();
        assert_eq!(sink.claimable_balances().unwrap().len(), 1);

        let mut processor = ClaimableBalancesProcessor::new(9);
        processor
            .process_change(&mut sink, &Change::remove(balance("b1", 100, 5)))
            .unwrap();
        processor.commit(&mut sink).unwrap();
        assert!(sink.claimable_balances().unwrap().is_empty());
    }
}
