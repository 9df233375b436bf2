use serde::{Deserialize, Serialize};

/// An asset held or traded on the network.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// The native network asset.
    Native,
    /// An issued credit asset identified by code and issuer account.
    Credit { code: String, issuer: String },
}

impl Asset {
    pub fn credit(code: &str, issuer: &str) -> Self {
        Self::Credit {
            code: code.to_string(),
            issuer: issuer.to_string(),
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Credit { code, issuer } => write!(f, "{code}:{issuer}"),
        }
    }
}

/// A signer attached to an account entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signer {
    pub key: String,
    pub weight: u32,
}

/// Balance-sheet entry for one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: String,
    pub balance: i64,
    pub sequence: u64,
    pub num_subentries: u32,
    pub flags: u32,
    pub home_domain: String,
    pub master_weight: u32,
    pub signers: Vec<Signer>,
}

impl AccountEntry {
    /// A fresh account holding `balance` with default thresholds.
    pub fn new(account_id: &str, balance: i64) -> Self {
        Self {
            account_id: account_id.to_string(),
            balance,
            sequence: 0,
            num_subentries: 0,
            flags: 0,
            home_domain: String::new(),
            master_weight: 1,
            signers: Vec::new(),
        }
    }
}

/// Named data value attached to an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDataEntry {
    pub account_id: String,
    pub name: String,
    pub value: Vec<u8>,
}

/// An open offer on the decentralized exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEntry {
    pub seller_id: String,
    pub offer_id: i64,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price_n: i32,
    pub price_d: i32,
    pub flags: u32,
}

/// A trustline from an account to an issued asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustlineEntry {
    pub account_id: String,
    pub asset: Asset,
    pub balance: i64,
    pub limit: i64,
    pub flags: u32,
}

/// A claimable balance waiting for one of its claimants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalanceEntry {
    /// Hex-encoded balance identifier.
    pub balance_id: String,
    pub asset: Asset,
    pub amount: i64,
    pub sponsor: String,
    pub claimants: Vec<String>,
}

/// The typed payload of a ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryData {
    Account(AccountEntry),
    AccountData(AccountDataEntry),
    Offer(OfferEntry),
    Trustline(TrustlineEntry),
    ClaimableBalance(ClaimableBalanceEntry),
}

/// One entry of the balance-sheet state, stamped with the sequence of the
/// ledger that last modified it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub last_modified_ledger: u32,
    pub data: LedgerEntryData,
}

impl LedgerEntry {
    pub fn new(last_modified_ledger: u32, data: LedgerEntryData) -> Self {
        Self {
            last_modified_ledger,
            data,
        }
    }

    /// The identity of this entry, independent of its mutable fields.
    pub fn key(&self) -> LedgerKey {
        match &self.data {
            LedgerEntryData::Account(a) => LedgerKey::Account {
                account_id: a.account_id.clone(),
            },
            LedgerEntryData::AccountData(d) => LedgerKey::AccountData {
                account_id: d.account_id.clone(),
                name: d.name.clone(),
            },
            LedgerEntryData::Offer(o) => LedgerKey::Offer {
                seller_id: o.seller_id.clone(),
                offer_id: o.offer_id,
            },
            LedgerEntryData::Trustline(t) => LedgerKey::Trustline {
                account_id: t.account_id.clone(),
                asset: t.asset.clone(),
            },
            LedgerEntryData::ClaimableBalance(c) => LedgerKey::ClaimableBalance {
                balance_id: c.balance_id.clone(),
            },
        }
    }
}

/// Key identifying one ledger entry across its lifetime.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LedgerKey {
    Account { account_id: String },
    AccountData { account_id: String, name: String },
    Offer { seller_id: String, offer_id: i64 },
    Trustline { account_id: String, asset: Asset },
    ClaimableBalance { balance_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_key_identifies_account() {
        let e = LedgerEntry::new(5, LedgerEntryData::Account(AccountEntry::new("GA", 10)));
        assert_eq!(
            e.key(),
            LedgerKey::Account {
                account_id: "GA".into()
            }
        );
    }

    #[test]
    fn entry_key_ignores_mutable_fields() {
        let a = LedgerEntry::new(5, LedgerEntryData::Account(AccountEntry::new("GA", 10)));
        let b = LedgerEntry::new(9, LedgerEntryData::Account(AccountEntry::new("GA", 999)));
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn trustline_key_includes_asset() {
        let usd = LedgerEntry::new(
            1,
            LedgerEntryData::Trustline(TrustlineEntry {
                account_id: "GA".into(),
                asset: Asset::credit("USD", "GI"),
                balance: 0,
                limit: 100,
                flags: 1,
            }),
        );
        let eur = LedgerEntry::new(
            1,
            LedgerEntryData::Trustline(TrustlineEntry {
                account_id: "GA".into(),
                asset: Asset::credit("EUR", "GI"),
                balance: 0,
                limit: 100,
                flags: 1,
            }),
        );
        assert_ne!(usd.key(), eur.key());
    }

    #[test]
    fn asset_display() {
        assert_eq!(Asset::Native.to_string(), "native");
        assert_eq!(Asset::credit("USD", "GI").to_string(), "USD:GI");
    }
}
