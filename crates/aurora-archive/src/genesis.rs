use aurora_types::{AccountEntry, Change, LedgerEntry, LedgerEntryData, GENESIS_SEQUENCE};
use sha2::{Digest, Sha256};

use crate::error::ArchiveResult;
use crate::traits::ChangeReader;

/// Total native supply minted in the genesis ledger, in base units.
pub const TOTAL_NATIVE_SUPPLY: i64 = 100_000_000_000 * 10_000_000;

/// Derives the network's root account identifier from its passphrase.
///
/// Every network starts from a single master account whose key is a function
/// of the passphrase; downstream systems only need the derivation to be
/// stable, not to match a signing key.
pub fn root_account_id(network_passphrase: &str) -> String {
    let digest = Sha256::digest(network_passphrase.as_bytes());
    format!("G{}", hex::encode_upper(&digest[..16]))
}

/// Change stream for ledger 1.
///
/// The validator never streams genesis, so bootstrap from ledger 1 reads this
/// synthetic snapshot instead: a single creation of the root account holding
/// the entire native supply.
pub struct GenesisStateReader {
    root: Option<Change>,
}

impl GenesisStateReader {
    pub fn new(network_passphrase: &str) -> Self {
        let account = AccountEntry::new(&root_account_id(network_passphrase), TOTAL_NATIVE_SUPPLY);
        let entry = LedgerEntry::new(GENESIS_SEQUENCE, LedgerEntryData::Account(account));
        Self {
            root: Some(Change::create(entry)),
        }
    }
}

impl ChangeReader for GenesisStateReader {
    fn next_change(&mut self) -> ArchiveResult<Option<Change>> {
        Ok(self.root.take())
    }
}
