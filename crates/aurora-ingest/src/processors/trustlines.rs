use aurora_sink::{BatchInsertBuilder, IngestionSink, TrustlineRow};
use aurora_types::{Change, ChangeKind, LedgerEntry, LedgerEntryData, TrustlineEntry};

use crate::cache::ChangeCache;
use crate::error::IngestResult;
use crate::processors::{expect_one_row, is_kind, ChangeProcessor, MAX_BATCH_SIZE};

pub(crate) fn trustline_entry(entry: &LedgerEntry) -> Option<&TrustlineEntry> {
    match &entry.data {
        LedgerEntryData::Trustline(trustline) => Some(trustline),
        _ => None,
    }
}

/// Projects trustline entries into the `trust_lines` table.
pub struct TrustLinesProcessor {
    sequence: u32,
    cache: ChangeCache,
}

impl TrustLinesProcessor {
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
                    if let Some(trustline) = trustline_entry(post) {
                        batch.add(TrustlineRow::from_entry(trustline, post.last_modified_ledger));
                    }
                }
                (Some(pre), None) => {
                    if let Some(trustline) = trustline_entry(pre) {
                        let affected = sink.remove_trustline(
                            &trustline.account_id,
                            &trustline.asset,
                            self.sequence,
                        )?;
                        expect_one_row(
                            affected,
                            "removing",
                            "trustline",
                            format!("{}/{}", trustline.account_id, trustline.asset),
                        )?;
                    }
                }
                (_, Some(post)) => {
                    if let Some(trustline) = trustline_entry(post) {
                        let row = TrustlineRow::from_entry(trustline, post.last_modified_ledger);
                        let id = format!("{}/{}", row.account_id, row.asset);
                        let affected = sink.update_trustline(row)?;
                        expect_one_row(affected, "updating", "trustline", id)?;
                    }
                }
                (None, None) => unreachable!("cache never yields empty changes"),
            }
        }
        if !batch.is_empty() {
            sink.insert_trustlines(batch.take_all())?;
        }
        Ok(())
    }
}

impl ChangeProcessor for TrustLinesProcessor {
    fn process_change(
        &mut self,
        sink: &mut dyn IngestionSink,
        change: &Change,
    ) -> IngestResult<()> {
        if !is_kind(change, ChangeKind::Trustline) {
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

    fn trustline(account: &str, code: &str, balance: i64, ledger: u32) -> LedgerEntry {
        LedgerEntry::new(
            ledger,
            LedgerEntryData::Trustline(TrustlineEntry {
                account_id: account.into(),
                asset: Asset::credit(code, "GI"),
                balance,
                limit: 1_000,
                flags: 1,
            }),
        )
    }

    #[test]
    fn update_replaces_balance() {
        let mut sink = InMemorySink::new();
        let mut processor = TrustLinesProcessor::new(5);
        processor
            .process_change(&mut sink, &Change::create(trustline("GA", "USD", 10, 5)))
            .unwrap();
        processor.commit(&mut sink).unwrap();

        let mut processor = TrustLinesProcessor::new(6);
        processor
            .process_change(
                &mut sink,
                &Change::update(trustline("GA", "USD", 10, 5), trustline("GA", "USD", 70, 6)),
            )
            .unwrap();
        processor.commit(&mut sink).unwrap();

        let rows = sink.trustlines().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].balance, 70);
    }
}
