//! Ledger backends for the aurora ledger-ingestion core.
//!
//! A backend presents a deterministic stream of closed ledgers behind the
//! [`LedgerBackend`] trait. Two implementations live here:
//! - [`CaptiveCoreBackend`] drives a validator subprocess and frames its
//!   metadata pipe through a read-ahead buffer
//! - [`DatabaseBackend`] reads ledgers the validator already persisted to
//!   its own store
//!
//! A third, the remote-captive HTTP client, lives in `aurora-remote`.

pub mod captive;
pub mod config;
pub mod database;
pub mod error;
pub mod runner;
pub mod traits;

pub use captive::{CaptiveConfig, CaptiveCoreBackend};
pub use config::generate_core_config;
pub use database::{CoreStore, DatabaseBackend, InMemoryCoreStore};
pub use error::{BackendError, BackendResult};
pub use runner::{CaptiveCoreRunner, CoreExit, CoreRunner, ExitFlag};
pub use traits::LedgerBackend;
