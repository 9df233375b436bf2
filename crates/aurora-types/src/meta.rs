use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::change::Change;

/// Protocol version stamped on synthesized ledgers.
pub const DEFAULT_PROTOCOL_VERSION: u32 = 15;

/// Header of one closed ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub sequence: u32,
    pub protocol_version: u32,
    pub previous_ledger_hash: [u8; 32],
    pub bucket_list_hash: [u8; 32],
    /// Close time as seconds since the Unix epoch.
    pub close_time: u64,
}

impl LedgerHeader {
    pub fn new(sequence: u32, protocol_version: u32) -> Self {
        Self {
            sequence,
            protocol_version,
            previous_ledger_hash: [0; 32],
            bucket_list_hash: [0; 32],
            close_time: 0,
        }
    }

    /// Deterministic hash of this header, used to chain ledgers together.
    pub fn hash(&self) -> [u8; 32] {
        let bytes = bincode::serialize(self).expect("header serialization cannot fail");
        let digest = Sha256::digest(&bytes);
        digest.into()
    }
}

/// The operations a transaction can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    CreateAccount,
    Payment,
    ManageOffer,
    ChangeTrust,
    ManageData,
    SetOptions,
    CreateClaimableBalance,
    ClaimClaimableBalance,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::CreateAccount => "create_account",
            OperationKind::Payment => "payment",
            OperationKind::ManageOffer => "manage_offer",
            OperationKind::ChangeTrust => "change_trust",
            OperationKind::ManageData => "manage_data",
            OperationKind::SetOptions => "set_options",
            OperationKind::CreateClaimableBalance => "create_claimable_balance",
            OperationKind::ClaimClaimableBalance => "claim_claimable_balance",
        }
    }
}

/// A trade executed while applying an offer operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub base_account: String,
    pub counter_account: String,
    pub base_asset: crate::entry::Asset,
    pub counter_asset: crate::entry::Asset,
    pub base_amount: i64,
    pub counter_amount: i64,
    pub price_n: i32,
    pub price_d: i32,
}

/// One operation inside a transaction envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    /// Effective source account (the transaction source unless overridden).
    pub source_account: String,
    /// Operation body rendered as a JSON document. Field names follow the
    /// operation kind: payments carry `from`/`to`/`amount`, account creation
    /// carries `account`/`starting_balance`, and so on.
    pub details: serde_json::Value,
    /// Trade produced by applying this operation, if any.
    pub trade: Option<Trade>,
}

impl Operation {
    pub fn create_account(source: &str, new_account: &str, starting_balance: i64) -> Self {
        Self {
            kind: OperationKind::CreateAccount,
            source_account: source.to_string(),
            details: serde_json::json!({
                "account": new_account,
                "starting_balance": starting_balance,
            }),
            trade: None,
        }
    }

    pub fn payment(from: &str, to: &str, amount: i64) -> Self {
        Self {
            kind: OperationKind::Payment,
            source_account: from.to_string(),
            details: serde_json::json!({
                "from": from,
                "to": to,
                "amount": amount,
            }),
            trade: None,
        }
    }
}

/// The signed request half of a transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub source_account: String,
    pub fee: u32,
    pub memo: Option<String>,
    pub operations: Vec<Operation>,
}

/// The outcome half of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub successful: bool,
    pub fee_charged: i64,
}

/// A transaction applied within one ledger, addressable by
/// `(ledger sequence, application order)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Transaction hash.
    pub hash: [u8; 32],
    /// 1-based position within the ledger.
    pub application_order: u32,
    pub envelope: TransactionEnvelope,
    pub result: TransactionResult,
    /// Ledger-entry transitions this transaction caused.
    pub changes: Vec<Change>,
}

impl LedgerTransaction {
    /// A successful transaction with the given operations and changes.
    pub fn new(
        application_order: u32,
        source_account: &str,
        operations: Vec<Operation>,
        changes: Vec<Change>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source_account.as_bytes());
        hasher.update(application_order.to_be_bytes());
        Self {
            hash: hasher.finalize().into(),
            application_order,
            envelope: TransactionEnvelope {
                source_account: source_account.to_string(),
                fee: 100 * operations.len().max(1) as u32,
                memo: None,
                operations,
            },
            result: TransactionResult {
                successful: true,
                fee_charged: 100,
            },
            changes,
        }
    }
}

/// Everything the validator emits about one closed ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerCloseMeta {
    pub header: LedgerHeader,
    pub transactions: Vec<LedgerTransaction>,
}

impl LedgerCloseMeta {
    /// A ledger with no transactions, at the current protocol version.
    pub fn empty(sequence: u32) -> Self {
        Self {
            header: LedgerHeader::new(sequence, DEFAULT_PROTOCOL_VERSION),
            transactions: Vec::new(),
        }
    }

    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    pub fn protocol_version(&self) -> u32 {
        self.header.protocol_version
    }

    pub fn bucket_list_hash(&self) -> [u8; 32] {
        self.header.bucket_list_hash
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn operation_count(&self) -> usize {
        self.transactions
            .iter()
            .map(|tx| tx.envelope.operations.len())
            .sum()
    }

    /// All ledger-entry changes in application order.
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.transactions.iter().flat_map(|tx| tx.changes.iter())
    }
}
