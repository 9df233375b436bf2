use thiserror::Error;

/// Errors produced by archive operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    #[error("archive has no published checkpoints")]
    Empty,

    #[error("sequence {0} is not a checkpoint ledger")]
    NotACheckpoint(u32),

    #[error("checkpoint {0} is not present in the archive")]
    CheckpointNotFound(u32),

    #[error("ledger header {0} is not present in the archive")]
    HeaderNotFound(u32),

    #[error("archive I/O error: {0}")]
    Io(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
