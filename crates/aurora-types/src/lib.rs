//! Foundation types for the aurora ledger-ingestion core.
//!
//! This crate provides the data model shared by every other aurora crate:
//! - Ledger sequence and checkpoint arithmetic
//! - [`LedgerRange`] — bounded and unbounded ingestion windows
//! - [`LedgerCloseMeta`] — the per-ledger record streamed by the validator
//! - [`LedgerEntry`] / [`LedgerKey`] — balance-sheet state entries
//! - [`Change`] — a pre/post transition of one ledger entry
//! - The length-prefixed frame codec used on the validator metadata pipe

pub mod change;
pub mod codec;
pub mod entry;
pub mod error;
pub mod meta;
pub mod range;
pub mod sequence;

pub use change::{Change, ChangeKind};
pub use codec::{read_framed, write_framed};
pub use entry::{
    AccountDataEntry, AccountEntry, Asset, ClaimableBalanceEntry, LedgerEntry, LedgerEntryData,
    LedgerKey, OfferEntry, Signer, TrustlineEntry,
};
pub use error::{CodecError, TypeError};
pub use meta::{
    LedgerCloseMeta, LedgerHeader, LedgerTransaction, Operation, OperationKind, Trade,
    TransactionEnvelope, TransactionResult, DEFAULT_PROTOCOL_VERSION,
};
pub use range::LedgerRange;
pub use sequence::{
    is_checkpoint, next_checkpoint, prev_checkpoint, round_down_to_first_replay,
    GENESIS_SEQUENCE, LEDGERS_PER_CHECKPOINT,
};
