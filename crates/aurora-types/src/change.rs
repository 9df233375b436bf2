use serde::{Deserialize, Serialize};

use crate::entry::{LedgerEntry, LedgerEntryData, LedgerKey};
use crate::error::TypeError;

/// Which state table a change targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Account,
    AccountData,
    Offer,
    Trustline,
    ClaimableBalance,
}

/// One transition of a ledger entry.
///
/// `pre == None` is a creation, `post == None` is a removal, both present is
/// an update. Both absent is meaningless and rejected at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub pre: Option<LedgerEntry>,
    pub post: Option<LedgerEntry>,
}

impl Change {
    pub fn new(pre: Option<LedgerEntry>, post: Option<LedgerEntry>) -> Result<Self, TypeError> {
        if pre.is_none() && post.is_none() {
            return Err(TypeError::EmptyChange);
        }
        if let (Some(p), Some(q)) = (&pre, &post) {
            if p.key() != q.key() {
                return Err(TypeError::KeyMismatch);
            }
        }
        Ok(Self { pre, post })
    }

    pub fn create(post: LedgerEntry) -> Self {
        Self {
            pre: None,
            post: Some(post),
        }
    }

    pub fn update(pre: LedgerEntry, post: LedgerEntry) -> Self {
        Self {
            pre: Some(pre),
            post: Some(post),
        }
    }

    pub fn remove(pre: LedgerEntry) -> Self {
        Self {
            pre: Some(pre),
            post: None,
        }
    }

    /// The entry this change applies to. Always derivable because at least
    /// one side is present.
    pub fn key(&self) -> LedgerKey {
        self.pre
            .as_ref()
            .or(self.post.as_ref())
            .expect("change with both sides empty")
            .key()
    }

    pub fn kind(&self) -> ChangeKind {
        let entry = self
            .pre
            .as_ref()
            .or(self.post.as_ref())
            .expect("change with both sides empty");
        match entry.data {
            LedgerEntryData::Account(_) => ChangeKind::Account,
            LedgerEntryData::AccountData(_) => ChangeKind::AccountData,
            LedgerEntryData::Offer(_) => ChangeKind::Offer,
            LedgerEntryData::Trustline(_) => ChangeKind::Trustline,
            LedgerEntryData::ClaimableBalance(_) => ChangeKind::ClaimableBalance,
        }
    }

    pub fn is_creation(&self) -> bool {
        self.pre.is_none() && self.post.is_some()
    }

    pub fn is_removal(&self) -> bool {
        self.pre.is_some() && self.post.is_none()
    }

    pub fn is_update(&self) -> bool {
        self.pre.is_some() && self.post.is_some()
    }
}
