use aurora_sink::{AccountRow, BatchInsertBuilder, IngestionSink};
use aurora_types::{AccountEntry, Change, ChangeKind, LedgerEntry, LedgerEntryData};

use crate::cache::ChangeCache;
use crate::error::IngestResult;
use crate::processors::{expect_one_row, is_kind, ChangeProcessor, MAX_BATCH_SIZE};

pub(crate) fn account_entry(entry: &LedgerEntry) -> Option<&AccountEntry> {
    match &entry.data {
        LedgerEntryData::Account(account) => Some(account),
        _ => None,
    }
}

/// Projects account entries into the `accounts` table.
pub struct AccountsProcessor {
    sequence: u32,
    cache: ChangeCache,
}

impl AccountsProcessor {
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
                    if let Some(account) = account_entry(post) {
                        batch.add(AccountRow::from_entry(account, post.last_modified_ledger));
                    }
                }
                (Some(pre), None) => {
                    if let Some(account) = account_entry(pre) {
                        let affected = sink.remove_account(&account.account_id, self.sequence)?;
                        expect_one_row(affected, "removing", "account", &account.account_id)?;
                    }
                }
                (_, Some(post)) => {
                    if let Some(account) = account_entry(post) {
                        let row = AccountRow::from_entry(account, post.last_modified_ledger);
                        let id = row.account_id.clone();
                        let affected = sink.update_account(row)?;
                        expect_one_row(affected, "updating", "account", &id)?;
                    }
                }
                (None, None) => unreachable!("cache never yields empty changes"),
            }
        }
        if !batch.is_empty() {
            sink.insert_accounts(batch.take_all())?;
        }
        Ok(())
    }
}

impl ChangeProcessor for AccountsProcessor {
    fn process_change(
        &mut self,
        sink: &mut dyn IngestionSink,
        change: &Change,
    ) -> IngestResult<()> {
        if !is_kind(change, ChangeKind::Account) {
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
