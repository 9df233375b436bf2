use aurora_sink::{AccountSignerRow, BatchInsertBuilder, IngestionSink};
use aurora_types::{AccountEntry, Change, ChangeKind};

use crate::cache::ChangeCache;
use crate::error::IngestResult;
use crate::processors::accounts::account_entry;
use crate::processors::{expect_one_row, is_kind, ChangeProcessor, MAX_BATCH_SIZE};

/// The effective signer set of an account: the master key (when its weight
/// is non-zero) plus the explicit signers.
fn signer_rows(account: &AccountEntry) -> Vec<AccountSignerRow> {
    let mut rows = Vec::with_capacity(account.signers.len() + 1);
    if account.master_weight > 0 {
        rows.push(AccountSignerRow {
            account_id: account.account_id.clone(),
            signer: account.account_id.clone(),
            weight: account.master_weight,
        });
    }
    for signer in &account.signers {
        rows.push(AccountSignerRow {
            account_id: account.account_id.clone(),
            signer: signer.key.clone(),
            weight: signer.weight,
        });
    }
    rows
}

/// Projects account signer sets into the `accounts_signers` table.
///
/// With `use_ledger_cache` (live-ledger source) the processor folds changes
/// and diffs each account's pre/post signer set. Without it (archive
/// snapshot source) the stream is creations only and rows are batch
/// inserted directly.
pub struct SignersProcessor {
    use_ledger_cache: bool,
    cache: ChangeCache,
    batch: BatchInsertBuilder<AccountSignerRow>,
}

impl SignersProcessor {
    pub fn new(use_ledger_cache: bool) -> Self {
        Self {
            use_ledger_cache,
            cache: ChangeCache::new(),
            batch: BatchInsertBuilder::new(MAX_BATCH_SIZE),
        }
    }

    fn flush_cache(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        for change in self.cache.take_changes() {
            let pre_rows = change
                .pre
                .as_ref()
                .and_then(account_entry)
                .map(signer_rows)
                .unwrap_or_default();
            let post_rows = change
                .post
                .as_ref()
                .and_then(account_entry)
                .map(signer_rows)
                .unwrap_or_default();

            for pre_row in &pre_rows {
                let surviving = post_rows
                    .iter()
                    .find(|row| row.signer == pre_row.signer)
                    .filter(|row| row.weight == pre_row.weight);
                if surviving.is_none() {
                    let affected =
                        sink.remove_account_signer(&pre_row.account_id, &pre_row.signer)?;
                    expect_one_row(affected, "removing", "account signer", &pre_row.signer)?;
                }
            }
            for post_row in post_rows {
                let unchanged = pre_rows
                    .iter()
                    .any(|row| row.signer == post_row.signer && row.weight == post_row.weight);
                if !unchanged {
                    self.batch.add(post_row);
                }
            }
        }
        Ok(())
    }
}

impl ChangeProcessor for SignersProcessor {
    fn process_change(
        &mut self,
        sink: &mut dyn IngestionSink,
        change: &Change,
    ) -> IngestResult<()> {
        if !is_kind(change, ChangeKind::Account) {
            return Ok(());
        }

        if self.use_ledger_cache {
            self.cache.add_change(change.clone())?;
            if self.cache.len() > MAX_BATCH_SIZE {
                self.flush_cache(sink)?;
            }
        } else if let Some(post) = &change.post {
            if let Some(account) = account_entry(post) {
                for row in signer_rows(account) {
                    self.batch.add(row);
                }
            }
        }

        if let Some(batch) = self.batch.take_batch_if_full() {
            sink.insert_account_signers(batch)?;
        }
        Ok(())
    }

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        if self.use_ledger_cache {
            self.flush_cache(sink)?;
        }
        let batch = self.batch.take_all();
        if !batch.is_empty() {
            sink.insert_account_signers(batch)?;
        }
        Ok(())
    }
}
