use std::collections::BTreeMap;

use aurora_sink::{AssetStatRow, IngestionSink};
use aurora_types::{Asset, Change, ChangeKind};

use crate::cache::ChangeCache;
use crate::error::{IngestError, IngestResult};
use crate::processors::trustlines::trustline_entry;
use crate::processors::{expect_one_row, is_kind, ChangeProcessor, MAX_BATCH_SIZE};

#[derive(Clone, Copy, Default)]
struct StatDelta {
    balance: i64,
    accounts: i64,
}

/// Maintains per-asset aggregates (`exp_asset_stats`) from trustline changes.
///
/// Archive source (`use_ledger_cache == false`) sees a creations-only stream
/// and inserts fresh aggregate rows. Ledger source reads the existing
/// aggregate back and applies the delta as an upsert, removing the row when
/// its last trustline goes away.
pub struct AssetStatsProcessor {
    use_ledger_cache: bool,
    cache: ChangeCache,
}

impl AssetStatsProcessor {
    pub fn new(use_ledger_cache: bool) -> Self {
        Self {
            use_ledger_cache,
            cache: ChangeCache::new(),
        }
    }

    fn deltas(&mut self) -> BTreeMap<Asset, StatDelta> {
        let mut deltas: BTreeMap<Asset, StatDelta> = BTreeMap::new();
        for change in self.cache.take_changes() {
            let pre = change.pre.as_ref().and_then(trustline_entry);
            let post = change.post.as_ref().and_then(trustline_entry);
            match (pre, post) {
                (None, Some(post)) => {
                    let delta = deltas.entry(post.asset.clone()).or_default();
                    delta.balance += post.balance;
                    delta.accounts += 1;
                }
                (Some(pre), None) => {
                    let delta = deltas.entry(pre.asset.clone()).or_default();
                    delta.balance -= pre.balance;
                    delta.accounts -= 1;
                }
                (Some(pre), Some(post)) => {
                    let delta = deltas.entry(post.asset.clone()).or_default();
                    delta.balance += post.balance - pre.balance;
                }
                (None, None) => {}
            }
        }
        deltas
    }

    fn flush(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        let deltas = self.deltas();

        if !self.use_ledger_cache {
            let rows: Vec<AssetStatRow> = deltas
                .into_iter()
                .filter(|(_, delta)| delta.accounts > 0)
                .map(|(asset, delta)| AssetStatRow {
                    asset,
                    amount: delta.balance,
                    num_accounts: delta.accounts as u32,
                })
                .collect();
            if !rows.is_empty() {
                sink.insert_asset_stats(rows)?;
            }
            return Ok(());
        }

        for (asset, delta) in deltas {
            if delta.balance == 0 && delta.accounts == 0 {
                continue;
            }
            match sink.asset_stat(&asset)? {
                None => {
                    if delta.accounts <= 0 || delta.balance < 0 {
                        return Err(IngestError::State(format!(
                            "negative delta for missing asset stat {asset}"
                        )));
                    }
                    sink.insert_asset_stats(vec![AssetStatRow {
                        asset,
                        amount: delta.balance,
                        num_accounts: delta.accounts as u32,
                    }])?;
                }
                Some(existing) => {
                    let amount = existing.amount + delta.balance;
                    let num_accounts = i64::from(existing.num_accounts) + delta.accounts;
                    if amount < 0 || num_accounts < 0 {
                        return Err(IngestError::State(format!(
                            "asset stat {asset} would go negative: amount={amount} accounts={num_accounts}"
                        )));
                    }
                    if num_accounts == 0 {
                        let affected = sink.remove_asset_stat(&asset)?;
                        expect_one_row(affected, "removing", "asset stat", &asset)?;
                    } else {
                        let affected = sink.update_asset_stat(AssetStatRow {
                            asset: asset.clone(),
                            amount,
                            num_accounts: num_accounts as u32,
                        })?;
                        expect_one_row(affected, "updating", "asset stat", &asset)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl ChangeProcessor for AssetStatsProcessor {
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
