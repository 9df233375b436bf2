use aurora_sink::{AccountDataRow, BatchInsertBuilder, IngestionSink};
use aurora_types::{AccountDataEntry, Change, ChangeKind, LedgerEntry, LedgerEntryData};

use crate::cache::ChangeCache;
use crate::error::IngestResult;
use crate::processors::{expect_one_row, is_kind, ChangeProcessor, MAX_BATCH_SIZE};

fn data_entry(entry: &LedgerEntry) -> Option<&AccountDataEntry> {
    match &entry.data {
        LedgerEntryData::AccountData(data) => Some(data),
        _ => None,
    }
}

/// Projects account data entries into the `accounts_data` table.
pub struct AccountDataProcessor {
    sequence: u32,
    cache: ChangeCache,
}

impl AccountDataProcessor {
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
                    if let Some(data) = data_entry(post) {
                        batch.add(AccountDataRow::from_entry(data, post.last_modified_ledger));
                    }
                }
                (Some(pre), None) => {
                    if let Some(data) = data_entry(pre) {
                        let affected =
                            sink.remove_account_data(&data.account_id, &data.name, self.sequence)?;
                        expect_one_row(
                            affected,
                            "removing",
                            "account data",
                            format!("{}/{}", data.account_id, data.name),
                        )?;
                    }
                }
                (_, Some(post)) => {
                    if let Some(data) = data_entry(post) {
                        let row = AccountDataRow::from_entry(data, post.last_modified_ledger);
                        let id = format!("{}/{}", row.account_id, row.name);
                        let affected = sink.update_account_data(row)?;
                        expect_one_row(affected, "updating", "account data", id)?;
                    }
                }
                (None, None) => unreachable!("cache never yields empty changes"),
            }
        }
        if !batch.is_empty() {
            sink.insert_account_data(batch.take_all())?;
        }
        Ok(())
    }
}

impl ChangeProcessor for AccountDataProcessor {
    fn process_change(
        &mut self,
        sink: &mut dyn IngestionSink,
        change: &Change,
    ) -> IngestResult<()> {
        if !is_kind(change, ChangeKind::AccountData) {
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

    fn data(account: &str, name: &str, value: &[u8], ledger: u32) -> LedgerEntry {
        LedgerEntry::new(
            ledger,
            LedgerEntryData::AccountData(AccountDataEntry {
                account_id: account.into(),
                name: name.into(),
                value: value.to_vec(),
            }),
        )
    }

    #[test]
    fn keyed_by_account_and_name() {
        let mut sink = InMemorySink::new();
        let mut processor = AccountDataProcessor::new(5);
        processor
            .process_change(&mut sink, &Change::create(data("GA", "color", b"red", 5)))
            .unwrap();
        processor
            .process_change(&mut sink, &Change::create(data("GA", "shape", b"round", 5)))
            .unwrap();
        processor.commit(&mut sink).unwrap();
        assert_eq!(sink.account_data().unwrap().len(), 2);

        let mut processor = AccountDataProcessor::new(6);
        processor
            .process_change(&mut sink, &Change::remove(data("GA", "color", b"red", 5)))
            .unwrap();
        processor.commit(&mut sink).unwrap();
        let rows = sink.account_data().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "shape");
    }
}
