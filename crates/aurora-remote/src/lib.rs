//! Remote-captive HTTP shim.
//!
//! Decouples the lifetime of the captive validator subprocess from the main
//! ingestion process: a small server wraps one [`LedgerBackend`] behind HTTP
//! and the [`RemoteCaptiveBackend`] client re-exposes it as a
//! `LedgerBackend` on the other side.
//!
//! Endpoints:
//! - `POST /prepare-range` — start or poll a range preparation
//! - `GET /ledger/{sequence}` — fetch one ledger (base64 payload)
//! - `GET /latest-sequence` — latest sequence available in the backend
//!
//! [`LedgerBackend`]: aurora_backend::LedgerBackend

pub mod client;
pub mod messages;
pub mod server;

pub use client::RemoteCaptiveBackend;
pub use messages::{Base64Ledger, LatestLedgerSequenceResponse, LedgerResponse, PrepareRangeResponse};
pub use server::{build_router, RemoteCaptiveServer, ServerState};
