use aurora_types::{
    AccountDataEntry, AccountEntry, Asset, ClaimableBalanceEntry, OfferEntry, TrustlineEntry,
};
use serde::{Deserialize, Serialize};

/// Projected row of the `accounts` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    pub account_id: String,
    pub balance: i64,
    pub sequence: u64,
    pub num_subentries: u32,
    pub flags: u32,
    pub home_domain: String,
    pub master_weight: u32,
    pub last_modified_ledger: u32,
    pub deleted_at: Option<u32>,
}

impl AccountRow {
    pub fn from_entry(entry: &AccountEntry, last_modified_ledger: u32) -> Self {
        Self {
            account_id: entry.account_id.clone(),
            balance: entry.balance,
            sequence: entry.sequence,
            num_subentries: entry.num_subentries,
            flags: entry.flags,
            home_domain: entry.home_domain.clone(),
            master_weight: entry.master_weight,
            last_modified_ledger,
            deleted_at: None,
        }
    }
}

/// Projected row of the `accounts_data` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDataRow {
    pub account_id: String,
    pub name: String,
    pub value: Vec<u8>,
    pub last_modified_ledger: u32,
    pub deleted_at: Option<u32>,
}

impl AccountDataRow {
    pub fn from_entry(entry: &AccountDataEntry, last_modified_ledger: u32) -> Self {
        Self {
            account_id: entry.account_id.clone(),
            name: entry.name.clone(),
            value: entry.value.clone(),
            last_modified_ledger,
            deleted_at: None,
        }
    }
}

/// Projected row of the `offers` table.
///
/// Offers are soft-deleted: a removal stamps `deleted_at` and a periodic
/// compaction pass physically drops old graves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfferRow {
    pub seller_id: String,
    pub offer_id: i64,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price_n: i32,
    pub price_d: i32,
    pub price: f64,
    pub flags: u32,
    pub last_modified_ledger: u32,
    pub deleted_at: Option<u32>,
}

impl OfferRow {
    pub fn from_entry(entry: &OfferEntry, last_modified_ledger: u32) -> Self {
        Self {
            seller_id: entry.seller_id.clone(),
            offer_id: entry.offer_id,
            selling: entry.selling.clone(),
            buying: entry.buying.clone(),
            amount: entry.amount,
            price_n: entry.price_n,
            price_d: entry.price_d,
            price: f64::from(entry.price_n) / f64::from(entry.price_d),
            flags: entry.flags,
            last_modified_ledger,
            deleted_at: None,
        }
    }
}

/// Projected row of the `trust_lines` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustlineRow {
    pub account_id: String,
    pub asset: Asset,
    pub balance: i64,
    pub trust_limit: i64,
    pub flags: u32,
    pub last_modified_ledger: u32,
    pub deleted_at: Option<u32>,
}

impl TrustlineRow {
    pub fn from_entry(entry: &TrustlineEntry, last_modified_ledger: u32) -> Self {
        Self {
            account_id: entry.account_id.clone(),
            asset: entry.asset.clone(),
            balance: entry.balance,
            trust_limit: entry.limit,
            flags: entry.flags,
            last_modified_ledger,
            deleted_at: None,
        }
    }
}

/// Projected row of the `claimable_balances` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalanceRow {
    pub balance_id: String,
    pub asset: Asset,
    pub amount: i64,
    pub sponsor: String,
    pub claimants: Vec<String>,
    pub last_modified_ledger: u32,
    pub deleted_at: Option<u32>,
}

impl ClaimableBalanceRow {
    pub fn from_entry(entry: &ClaimableBalanceEntry, last_modified_ledger: u32) -> Self {
        Self {
            balance_id: entry.balance_id.clone(),
            asset: entry.asset.clone(),
            amount: entry.amount,
            sponsor: entry.sponsor.clone(),
            claimants: entry.claimants.clone(),
            last_modified_ledger,
            deleted_at: None,
        }
    }
}

/// Projected row of the `accounts_signers` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSignerRow {
    pub account_id: String,
    pub signer: String,
    pub weight: u32,
}

/// Projected row of the `exp_asset_stats` table, one per issued asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStatRow {
    pub asset: Asset,
    /// Sum of all trustline balances in this asset.
    pub amount: i64,
    /// Number of accounts holding a trustline to this asset.
    pub num_accounts: u32,
}

/// Projected row of the `history_ledgers` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub sequence: u32,
    pub ledger_hash: String,
    pub previous_ledger_hash: String,
    pub transaction_count: u32,
    pub operation_count: u32,
    pub successful_transaction_count: u32,
    pub failed_transaction_count: u32,
    pub closed_at: u64,
    pub protocol_version: u32,
    pub importer_version: i32,
}

/// Projected row of the `history_transactions` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub ledger_sequence: u32,
    pub application_order: u32,
    pub transaction_hash: String,
    pub source_account: String,
    pub fee_charged: i64,
    pub operation_count: u32,
    pub successful: bool,
    pub memo: Option<String>,
}

/// Projected row of the `history_operations` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationRow {
    pub ledger_sequence: u32,
    pub application_order: u32,
    pub operation_index: u32,
    pub kind: String,
    pub source_account: String,
    pub details: serde_json::Value,
}

/// Projected row of the `history_effects` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectRow {
    pub ledger_sequence: u32,
    pub application_order: u32,
    pub operation_index: u32,
    pub effect_order: u32,
    pub account: String,
    pub kind: String,
    pub details: serde_json::Value,
}

/// Projected row of the `history_trades` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub ledger_sequence: u32,
    pub application_order: u32,
    pub operation_index: u32,
    pub base_account: String,
    pub counter_account: String,
    pub base_asset: Asset,
    pub counter_asset: Asset,
    pub base_amount: i64,
    pub counter_amount: i64,
    pub price_n: i32,
    pub price_d: i32,
    pub ledger_closed_at: u64,
}

/// Projected row of the `history_transaction_participants` table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantRow {
    pub ledger_sequence: u32,
    pub application_order: u32,
    pub account_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_row_computes_price() {
        let entry = OfferEntry {
            seller_id: "GA".into(),
            offer_id: 7,
            selling: Asset::Native,
            buying: Asset::credit("USD", "GI"),
            amount: 1000,
            price_n: 1,
            price_d: 4,
            flags: 0,
        };
        let row = OfferRow::from_entry(&entry, 42);
        assert_eq!(row.price, 0.25);
        assert_eq!(row.last_modified_ledger, 42);
        assert!(row.deleted_at.is_none());
    }

    #[test]
    fn account_row_carries_entry_fields() {
        let mut entry = AccountEntry::new("GA", 500);
        entry.home_domain = "example.org".into();
        let row = AccountRow::from_entry(&entry, 9);
        assert_eq!(row.account_id, "GA");
        assert_eq!(row.balance, 500);
        assert_eq!(row.home_domain, "example.org");
        assert_eq!(row.last_modified_ledger, 9);
    }
}
