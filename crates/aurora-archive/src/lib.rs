//! History-archive abstraction for the aurora ledger-ingestion core.
//!
//! The archive is the durable object store the network publishes checkpoint
//! state snapshots to. This crate provides:
//! - The [`HistoryArchive`] read boundary and the [`ChangeReader`] pull stream
//! - [`InMemoryArchive`] for tests and embedding
//! - [`GenesisStateReader`] synthesizing the ledger-1 state

pub mod error;
pub mod genesis;
pub mod memory;
pub mod traits;

pub use error::{ArchiveError, ArchiveResult};
pub use genesis::{root_account_id, GenesisStateReader, TOTAL_NATIVE_SUPPLY};
pub use memory::InMemoryArchive;
pub use traits::{ArchiveRootState, ChangeReader, HistoryArchive};
