use aurora_archive::ArchiveError;
use aurora_backend::BackendError;
use aurora_sink::SinkError;
use thiserror::Error;

/// Errors produced by the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The projection disagrees with the change stream. The ingestion state
    /// is inconsistent and must be rebuilt before reads can be trusted.
    #[error("state error: {0}")]
    State(String),

    #[error(
        "This aurora version does not support protocol version {observed}. \
         The latest supported protocol version is {supported}. \
         Please upgrade to the latest aurora version."
    )]
    ProtocolNotSupported { observed: u32, supported: u32 },

    #[error(
        "bucket list hash of history archive and ledger header does not match: {archive} != {header}"
    )]
    BucketListMismatch { archive: String, header: String },

    #[error("ledger {0} does not exist in the backend")]
    LedgerNotFound(u32),

    #[error("invalid change sequence for {key}: {reason}")]
    InvalidChangeSequence { key: String, reason: &'static str },

    #[error("`from` must be a checkpoint ledger or 1")]
    FromNotCheckpoint,

    #[error("`to` must be a checkpoint ledger when verifying state")]
    ToNotCheckpoint,

    #[error("invalid range: from={from} to={to}")]
    InvalidRange { from: u32, to: u32 },

    #[error("cannot run on a non-empty store: last ingested ledger is {0}")]
    StoreNotEmpty(u32),

    #[error("stress test parameter {name} must be between 1 and {max}, got {got}")]
    StressTestParameter {
        name: &'static str,
        max: usize,
        got: usize,
    },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

pub type IngestResult<T> = Result<T, IngestError>;
