use std::collections::BTreeMap;

use aurora_types::Asset;

use crate::error::{SinkError, SinkResult};
use crate::rows::{
    AccountDataRow, AccountRow, AccountSignerRow, AssetStatRow, ClaimableBalanceRow, EffectRow,
    LedgerRow, OfferRow, OperationRow, ParticipantRow, TradeRow, TransactionRow, TrustlineRow,
};
use crate::traits::IngestionSink;

#[derive(Clone, Default)]
struct Tables {
    key_value: BTreeMap<String, String>,
    accounts: BTreeMap<String, AccountRow>,
    account_data: BTreeMap<(String, String), AccountDataRow>,
    offers: BTreeMap<i64, OfferRow>,
    trustlines: BTreeMap<(String, Asset), TrustlineRow>,
    claimable_balances: BTreeMap<String, ClaimableBalanceRow>,
    account_signers: BTreeMap<(String, String), AccountSignerRow>,
    asset_stats: BTreeMap<Asset, AssetStatRow>,
    ledgers: Vec<LedgerRow>,
    transactions: Vec<TransactionRow>,
    operations: Vec<OperationRow>,
    effects: Vec<EffectRow>,
    trades: Vec<TradeRow>,
    participants: Vec<ParticipantRow>,
}

/// Transactional in-memory ingestion sink.
///
/// `begin` snapshots every table; `rollback` restores the snapshot and
/// `commit` discards it. Row-level semantics mirror a relational store:
/// inserts reject live duplicates, updates and removals report how many rows
/// they touched, removals stamp `deleted_at` instead of deleting.
pub struct InMemorySink {
    tables: Tables,
    snapshot: Option<Tables>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self {
            tables: Tables::default(),
            snapshot: None,
        }
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert `row` into `map` under `key`, rejecting live duplicates.
/// A soft-deleted row under the same key is silently replaced.
fn insert_row<K: Ord + std::fmt::Debug, R>(
    map: &mut BTreeMap<K, R>,
    key: K,
    row: R,
    deleted_at: impl Fn(&R) -> Option<u32>,
    table: &'static str,
) -> SinkResult<()> {
    if let Some(existing) = map.get(&key) {
        if deleted_at(existing).is_none() {
            return Err(SinkError::DuplicateKey {
                table,
                key: format!("{key:?}"),
            });
        }
    }
    map.insert(key, row);
    Ok(())
}

/// Replace the live row under `key`. Returns the affected-row count.
fn update_row<K: Ord, R>(
    map: &mut BTreeMap<K, R>,
    key: K,
    row: R,
    deleted_at: impl Fn(&R) -> Option<u32>,
) -> u64 {
    match map.get_mut(&key) {
        Some(existing) if deleted_at(existing).is_none() => {
            *existing = row;
            1
        }
        _ => 0,
    }
}

/// Soft-delete the live row under `key`. Returns the affected-row count.
fn remove_row<K: Ord, R>(
    map: &mut BTreeMap<K, R>,
    key: &K,
    stamp: impl Fn(&mut R, u32),
    deleted_at: impl Fn(&R) -> Option<u32>,
    sequence: u32,
) -> u64 {
    match map.get_mut(key) {
        Some(existing) if deleted_at(existing).is_none() => {
            stamp(existing, sequence);
            1
        }
        _ => 0,
    }
}

impl IngestionSink for InMemorySink {
    fn begin(&mut self) -> SinkResult<()> {
        if self.snapshot.is_some() {
            return Err(SinkError::TransactionAlreadyOpen);
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> SinkResult<()> {
        self.snapshot.take().ok_or(SinkError::NoTransaction)?;
        Ok(())
    }

    fn rollback(&mut self) -> SinkResult<()> {
        let snapshot = self.snapshot.take().ok_or(SinkError::NoTransaction)?;
        self.tables = snapshot;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn get_key_value(&self, key: &str) -> SinkResult<Option<String>> {
        Ok(self.tables.key_value.get(key).cloned())
    }

    fn set_key_value(&mut self, key: &str, value: &str) -> SinkResult<()> {
        self.tables
            .key_value
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn insert_accounts(&mut self, rows: Vec<AccountRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        for row in rows {
            insert_row(
                &mut self.tables.accounts,
                row.account_id.clone(),
                row,
                |r| r.deleted_at,
                "accounts",
            )?;
        }
        Ok(count)
    }

    fn update_account(&mut self, row: AccountRow) -> SinkResult<u64> {
        let key = row.account_id.clone();
        Ok(update_row(&mut self.tables.accounts, key, row, |r| {
            r.deleted_at
        }))
    }

    fn remove_account(&mut self, account_id: &str, sequence: u32) -> SinkResult<u64> {
        Ok(remove_row(
            &mut self.tables.accounts,
            &account_id.to_string(),
            |r, s| r.deleted_at = Some(s),
            |r| r.deleted_at,
            sequence,
        ))
    }

    fn accounts(&self) -> SinkResult<Vec<AccountRow>> {
        Ok(self
            .tables
            .accounts
            .values()
            .filter(|r| r.deleted_at.is_none())
            .cloned()
            .collect())
    }

    fn insert_account_data(&mut self, rows: Vec<AccountDataRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        for row in rows {
            insert_row(
                &mut self.tables.account_data,
                (row.account_id.clone(), row.name.clone()),
                row,
                |r| r.deleted_at,
                "accounts_data",
            )?;
        }
        Ok(count)
    }

    fn update_account_data(&mut self, row: AccountDataRow) -> SinkResult<u64> {
        let key = (row.account_id.clone(), row.name.clone());
        Ok(update_row(&mut self.tables.account_data, key, row, |r| {
            r.deleted_at
        }))
    }

    fn remove_account_data(
        &mut self,
        account_id: &str,
        name: &str,
        sequence: u32,
    ) -> SinkResult<u64> {
        Ok(remove_row(
            &mut self.tables.account_data,
            &(account_id.to_string(), name.to_string()),
            |r, s| r.deleted_at = Some(s),
            |r| r.deleted_at,
            sequence,
        ))
    }

    fn account_data(&self) -> SinkResult<Vec<AccountDataRow>> {
        Ok(self
            .tables
            .account_data
            .values()
            .filter(|r| r.deleted_at.is_none())
            .cloned()
            .collect())
    }

    fn insert_offers(&mut self, rows: Vec<OfferRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        for row in rows {
            insert_row(
                &mut self.tables.offers,
                row.offer_id,
                row,
                |r| r.deleted_at,
                "offers",
            )?;
        }
        Ok(count)
    }

    fn update_offer(&mut self, row: OfferRow) -> SinkResult<u64> {
        let key = row.offer_id;
        Ok(update_row(&mut self.tables.offers, key, row, |r| {
            r.deleted_at
        }))
    }

    fn remove_offer(&mut self, offer_id: i64, sequence: u32) -> SinkResult<u64> {
        Ok(remove_row(
            &mut self.tables.offers,
            &offer_id,
            |r, s| r.deleted_at = Some(s),
            |r| r.deleted_at,
            sequence,
        ))
    }

    fn compact_offers(&mut self, cutoff: u32) -> SinkResult<u64> {
        let before = self.tables.offers.len();
        self.tables
            .offers
            .retain(|_, row| match row.deleted_at {
                Some(deleted_at) => deleted_at >= cutoff,
                None => true,
            });
        Ok((before - self.tables.offers.len()) as u64)
    }

    fn offers(&self, include_deleted: bool) -> SinkResult<Vec<OfferRow>> {
        Ok(self
            .tables
            .offers
            .values()
            .filter(|r| include_deleted || r.deleted_at.is_none())
            .cloned()
            .collect())
    }

    fn insert_trustlines(&mut self, rows: Vec<TrustlineRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        for row in rows {
            insert_row(
                &mut self.tables.trustlines,
                (row.account_id.clone(), row.asset.clone()),
                row,
                |r| r.deleted_at,
                "trust_lines",
            )?;
        }
        Ok(count)
    }

    fn update_trustline(&mut self, row: TrustlineRow) -> SinkResult<u64> {
        let key = (row.account_id.clone(), row.asset.clone());
        Ok(update_row(&mut self.tables.trustlines, key, row, |r| {
            r.deleted_at
        }))
    }

    fn remove_trustline(
        &mut self,
        account_id: &str,
        asset: &Asset,
        sequence: u32,
    ) -> SinkResult<u64> {
        Ok(remove_row(
            &mut self.tables.trustlines,
            &(account_id.to_string(), asset.clone()),
            |r, s| r.deleted_at = Some(s),
            |r| r.deleted_at,
            sequence,
        ))
    }

    fn trustlines(&self) -> SinkResult<Vec<TrustlineRow>> {
        Ok(self
            .tables
            .trustlines
            .values()
            .filter(|r| r.deleted_at.is_none())
            .cloned()
            .collect())
    }

    fn insert_claimable_balances(&mut self, rows: Vec<ClaimableBalanceRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        for row in rows {
            insert_row(
                &mut self.tables.claimable_balances,
                row.balance_id.clone(),
                row,
                |r| r.deleted_at,
                "claimable_balances",
            )?;
        }
        Ok(count)
    }

    fn update_claimable_balance(&mut self, row: ClaimableBalanceRow) -> SinkResult<u64> {
        let key = row.balance_id.clone();
        Ok(update_row(
            &mut self.tables.claimable_balances,
            key,
            row,
            |r| r.deleted_at,
        ))
    }

    fn remove_claimable_balance(&mut self, balance_id: &str, sequence: u32) -> SinkResult<u64> {
        Ok(remove_row(
            &mut self.tables.claimable_balances,
            &balance_id.to_string(),
            |r, s| r.deleted_at = Some(s),
            |r| r.deleted_at,
            sequence,
        ))
    }

    fn claimable_balances(&self) -> SinkResult<Vec<ClaimableBalanceRow>> {
        Ok(self
            .tables
            .claimable_balances
            .values()
            .filter(|r| r.deleted_at.is_none())
            .cloned()
            .collect())
    }

    fn insert_account_signers(&mut self, rows: Vec<AccountSignerRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        for row in rows {
            let key = (row.account_id.clone(), row.signer.clone());
            if self.tables.account_signers.contains_key(&key) {
                return Err(SinkError::DuplicateKey {
                    table: "accounts_signers",
                    key: format!("{key:?}"),
                });
            }
            self.tables.account_signers.insert(key, row);
        }
        Ok(count)
    }

    fn remove_account_signer(&mut self, account_id: &str, signer: &str) -> SinkResult<u64> {
        let key = (account_id.to_string(), signer.to_string());
        Ok(u64::from(self.tables.account_signers.remove(&key).is_some()))
    }

    fn account_signers(&self) -> SinkResult<Vec<AccountSignerRow>> {
        Ok(self.tables.account_signers.values().cloned().collect())
    }

    fn insert_asset_stats(&mut self, rows: Vec<AssetStatRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        for row in rows {
            if self.tables.asset_stats.contains_key(&row.asset) {
                return Err(SinkError::DuplicateKey {
                    table: "exp_asset_stats",
                    key: row.asset.to_string(),
                });
            }
            self.tables.asset_stats.insert(row.asset.clone(), row);
        }
        Ok(count)
    }

    fn update_asset_stat(&mut self, row: AssetStatRow) -> SinkResult<u64> {
        match self.tables.asset_stats.get_mut(&row.asset) {
            Some(existing) => {
                *existing = row;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn remove_asset_stat(&mut self, asset: &Asset) -> SinkResult<u64> {
        Ok(u64::from(self.tables.asset_stats.remove(asset).is_some()))
    }

    fn asset_stat(&self, asset: &Asset) -> SinkResult<Option<AssetStatRow>> {
        Ok(self.tables.asset_stats.get(asset).cloned())
    }

    fn asset_stats(&self) -> SinkResult<Vec<AssetStatRow>> {
        Ok(self.tables.asset_stats.values().cloned().collect())
    }

    fn truncate_state_tables(&mut self) -> SinkResult<()> {
        self.tables.accounts.clear();
        self.tables.account_data.clear();
        self.tables.offers.clear();
        self.tables.trustlines.clear();
        self.tables.claimable_balances.clear();
        self.tables.account_signers.clear();
        self.tables.asset_stats.clear();
        Ok(())
    }

    fn insert_ledgers(&mut self, rows: Vec<LedgerRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        self.tables.ledgers.extend(rows);
        Ok(count)
    }

    fn insert_transactions(&mut self, rows: Vec<TransactionRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        self.tables.transactions.extend(rows);
        Ok(count)
    }

    fn insert_operations(&mut self, rows: Vec<OperationRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        self.tables.operations.extend(rows);
        Ok(count)
    }

    fn insert_effects(&mut self, rows: Vec<EffectRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        self.tables.effects.extend(rows);
        Ok(count)
    }

    fn insert_trades(&mut self, rows: Vec<TradeRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        self.tables.trades.extend(rows);
        Ok(count)
    }

    fn insert_participants(&mut self, rows: Vec<ParticipantRow>) -> SinkResult<u64> {
        let count = rows.len() as u64;
        self.tables.participants.extend(rows);
        Ok(count)
    }

    fn ledgers(&self) -> SinkResult<Vec<LedgerRow>> {
        Ok(self.tables.ledgers.clone())
    }

    fn transactions(&self) -> SinkResult<Vec<TransactionRow>> {
        Ok(self.tables.transactions.clone())
    }

    fn operations(&self) -> SinkResult<Vec<OperationRow>> {
        Ok(self.tables.operations.clone())
    }

    fn effects(&self) -> SinkResult<Vec<EffectRow>> {
        Ok(self.tables.effects.clone())
    }

    fn trades(&self) -> SinkResult<Vec<TradeRow>> {
        Ok(self.tables.trades.clone())
    }

    fn participants(&self) -> SinkResult<Vec<ParticipantRow>> {
        Ok(self.tables.participants.clone())
    }
}
