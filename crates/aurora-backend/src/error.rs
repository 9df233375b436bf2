use aurora_archive::ArchiveError;
use thiserror::Error;

/// Errors produced by ledger backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("session is closed, call prepare_range first")]
    Closed,

    #[error("requested ledger {requested} is behind the captive core stream (expected={expected})")]
    BehindStream { requested: u32, expected: u32 },

    #[error("unexpected ledger (expected={expected} actual={actual})")]
    UnexpectedLedger { expected: u32, actual: u32 },

    #[error("hcnet-core process exited with an error: {0}")]
    ChildExitedWithError(String),

    #[error("hcnet-core process exited without an error unexpectedly")]
    ChildExitedCleanly,

    #[error("sequence: {from} is greater than max available in history archives: {latest}")]
    AheadOfArchive { from: u32, latest: u32 },

    #[error("trying to start online mode too far (latest checkpoint={latest}), only two checkpoints in the future allowed")]
    TooFarAhead { latest: u32 },

    #[error("captive core is unable to start from ledger 1, start from ledger 2")]
    StartFromGenesis,

    #[error("hcnet-core config file path cannot be empty in an online mode")]
    MissingConfig,

    #[error("core runner already started")]
    AlreadyStarted,

    #[error("missing metadata pipe")]
    MissingMetaPipe,

    #[error("got EOF from subprocess")]
    UnexpectedEof,

    #[error("error decoding frame: {0}")]
    Framing(String),

    #[error("requested range [{from}, {to}] is not available, store has up to {latest}")]
    RangeNotAvailable { from: u32, to: u32, latest: u32 },

    #[error("captive core is not supported on this platform")]
    UnsupportedPlatform,

    #[error("remote captive core error: {0}")]
    Remote(String),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;
