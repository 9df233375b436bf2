use aurora_types::Asset;

use crate::error::{SinkError, SinkResult};
use crate::rows::{
    AccountDataRow, AccountRow, AccountSignerRow, AssetStatRow, ClaimableBalanceRow, EffectRow,
    LedgerRow, OfferRow, OperationRow, ParticipantRow, TradeRow, TransactionRow, TrustlineRow,
};

/// Cursor key: highest ledger fully projected.
pub const LAST_LEDGER_KEY: &str = "last_ledger";
/// Cursor key: projection schema version; a mismatch triggers a state rebuild.
pub const INGEST_VERSION_KEY: &str = "ingest_version";
/// Cursor key: set when state verification found the projection inconsistent.
pub const STATE_INVALID_KEY: &str = "state_invalid";
/// Cursor key: last sequence at which closed offers were pruned.
pub const OFFER_COMPACTION_SEQUENCE_KEY: &str = "offer_compaction_sequence";

/// Write boundary of the ingestion store.
///
/// State tables (accounts, account data, offers, trustlines, claimable
/// balances) support batch insert, keyed update and soft removal; removals
/// stamp the row with the removing ledger sequence. History tables are
/// append-only batch inserts. All mutations between `begin` and `commit` are
/// atomic; `rollback` discards them.
///
/// Update and remove operations return the number of affected rows so
/// callers can detect projection drift: anything other than exactly one row
/// means the store disagrees with the change stream.
pub trait IngestionSink: Send {
    // Transactions.
    fn begin(&mut self) -> SinkResult<()>;
    fn commit(&mut self) -> SinkResult<()>;
    fn rollback(&mut self) -> SinkResult<()>;
    fn in_transaction(&self) -> bool;

    // Cursor key-value store.
    fn get_key_value(&self, key: &str) -> SinkResult<Option<String>>;
    fn set_key_value(&mut self, key: &str, value: &str) -> SinkResult<()>;

    // Accounts.
    fn insert_accounts(&mut self, rows: Vec<AccountRow>) -> SinkResult<u64>;
    fn update_account(&mut self, row: AccountRow) -> SinkResult<u64>;
    fn remove_account(&mut self, account_id: &str, sequence: u32) -> SinkResult<u64>;
    fn accounts(&self) -> SinkResult<Vec<AccountRow>>;

    // Account data.
    fn insert_account_data(&mut self, rows: Vec<AccountDataRow>) -> SinkResult<u64>;
    fn update_account_data(&mut self, row: AccountDataRow) -> SinkResult<u64>;
    fn remove_account_data(&mut self, account_id: &str, name: &str, sequence: u32)
        -> SinkResult<u64>;
    fn account_data(&self) -> SinkResult<Vec<AccountDataRow>>;

    // Offers.
    fn insert_offers(&mut self, rows: Vec<OfferRow>) -> SinkResult<u64>;
    fn update_offer(&mut self, row: OfferRow) -> SinkResult<u64>;
    fn remove_offer(&mut self, offer_id: i64, sequence: u32) -> SinkResult<u64>;
    /// Physically delete offers soft-deleted strictly before `cutoff`.
    fn compact_offers(&mut self, cutoff: u32) -> SinkResult<u64>;
    fn offers(&self, include_deleted: bool) -> SinkResult<Vec<OfferRow>>;

    // Trustlines.
    fn insert_trustlines(&mut self, rows: Vec<TrustlineRow>) -> SinkResult<u64>;
    fn update_trustline(&mut self, row: TrustlineRow) -> SinkResult<u64>;
    fn remove_trustline(&mut self, account_id: &str, asset: &Asset, sequence: u32)
        -> SinkResult<u64>;
    fn trustlines(&self) -> SinkResult<Vec<TrustlineRow>>;

    // Claimable balances.
    fn insert_claimable_balances(&mut self, rows: Vec<ClaimableBalanceRow>) -> SinkResult<u64>;
    fn update_claimable_balance(&mut self, row: ClaimableBalanceRow) -> SinkResult<u64>;
    fn remove_claimable_balance(&mut self, balance_id: &str, sequence: u32) -> SinkResult<u64>;
    fn claimable_balances(&self) -> SinkResult<Vec<ClaimableBalanceRow>>;

    // Account signers.
    fn insert_account_signers(&mut self, rows: Vec<AccountSignerRow>) -> SinkResult<u64>;
    fn remove_account_signer(&mut self, account_id: &str, signer: &str) -> SinkResult<u64>;
    fn account_signers(&self) -> SinkResult<Vec<AccountSignerRow>>;

    // Asset stats.
    fn insert_asset_stats(&mut self, rows: Vec<AssetStatRow>) -> SinkResult<u64>;
    fn update_asset_stat(&mut self, row: AssetStatRow) -> SinkResult<u64>;
    fn remove_asset_stat(&mut self, asset: &Asset) -> SinkResult<u64>;
    fn asset_stat(&self, asset: &Asset) -> SinkResult<Option<AssetStatRow>>;
    fn asset_stats(&self) -> SinkResult<Vec<AssetStatRow>>;

    /// Drop every state-table row. Used before rebuilding state from a
    /// checkpoint snapshot. History tables and cursors are untouched.
    fn truncate_state_tables(&mut self) -> SinkResult<()>;

    // History tables, append-only.
    fn insert_ledgers(&mut self, rows: Vec<LedgerRow>) -> SinkResult<u64>;
    fn insert_transactions(&mut self, rows: Vec<TransactionRow>) -> SinkResult<u64>;
    fn insert_operations(&mut self, rows: Vec<OperationRow>) -> SinkResult<u64>;
    fn insert_effects(&mut self, rows: Vec<EffectRow>) -> SinkResult<u64>;
    fn insert_trades(&mut self, rows: Vec<TradeRow>) -> SinkResult<u64>;
    fn insert_participants(&mut self, rows: Vec<ParticipantRow>) -> SinkResult<u64>;

    fn ledgers(&self) -> SinkResult<Vec<LedgerRow>>;
    fn transactions(&self) -> SinkResult<Vec<TransactionRow>>;
    fn operations(&self) -> SinkResult<Vec<OperationRow>>;
    fn effects(&self) -> SinkResult<Vec<EffectRow>>;
    fn trades(&self) -> SinkResult<Vec<TradeRow>>;
    fn participants(&self) -> SinkResult<Vec<ParticipantRow>>;

    // Typed cursor helpers. Values travel as decimal strings so any
    // key-value store can hold them.

    fn last_ingested_ledger(&self) -> SinkResult<u32> {
        parse_u32_cursor(self.get_key_value(LAST_LEDGER_KEY)?, LAST_LEDGER_KEY)
    }

    fn update_last_ingested_ledger(&mut self, sequence: u32) -> SinkResult<()> {
        self.set_key_value(LAST_LEDGER_KEY, &sequence.to_string())
    }

    fn ingest_version(&self) -> SinkResult<i32> {
        match self.get_key_value(INGEST_VERSION_KEY)? {
            None => Ok(0),
            Some(v) => v.parse().map_err(|_| SinkError::MalformedCursor {
                key: INGEST_VERSION_KEY,
                value: v,
            }),
        }
    }

    fn update_ingest_version(&mut self, version: i32) -> SinkResult<()> {
        self.set_key_value(INGEST_VERSION_KEY, &version.to_string())
    }

    fn state_invalid(&self) -> SinkResult<bool> {
        match self.get_key_value(STATE_INVALID_KEY)? {
            None => Ok(false),
            Some(v) => v.parse().map_err(|_| SinkError::MalformedCursor {
                key: STATE_INVALID_KEY,
                value: v,
            }),
        }
    }

    fn update_state_invalid(&mut self, invalid: bool) -> SinkResult<()> {
        self.set_key_value(STATE_INVALID_KEY, if invalid { "true" } else { "false" })
    }

    fn offer_compaction_sequence(&self) -> SinkResult<u32> {
        parse_u32_cursor(
            self.get_key_value(OFFER_COMPACTION_SEQUENCE_KEY)?,
            OFFER_COMPACTION_SEQUENCE_KEY,
        )
    }

    fn update_offer_compaction_sequence(&mut self, sequence: u32) -> SinkResult<()> {
        self.set_key_value(OFFER_COMPACTION_SEQUENCE_KEY, &sequence.to_string())
    }
}

fn parse_u32_cursor(value: Option<String>, key: &'static str) -> SinkResult<u32> {
    match value {
        None => Ok(0),
        Some(v) => v
            .parse()
            .map_err(|_| SinkError::MalformedCursor { key, value: v }),
    }
}
