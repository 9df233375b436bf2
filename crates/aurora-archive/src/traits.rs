use aurora_types::{Change, LedgerHeader};

use crate::error::ArchiveResult;

/// Root descriptor of a history archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchiveRootState {
    /// The most recent checkpoint ledger the archive has published.
    pub current_ledger: u32,
}

/// Pull stream of ledger-entry changes.
///
/// Archive snapshots are rendered as a stream of creations; live ledgers
/// render the full pre/post transitions. `next_change` returns `Ok(None)`
/// when the stream is exhausted.
pub trait ChangeReader: Send {
    fn next_change(&mut self) -> ArchiveResult<Option<Change>>;
}

/// Read boundary over the history archive.
///
/// Implementations must be cheap to query repeatedly: `root_state` is polled
/// during range preparation and `ledger_header` during online startup.
pub trait HistoryArchive: Send + Sync {
    /// The archive's root state, naming its latest published checkpoint.
    fn root_state(&self) -> ArchiveResult<ArchiveRootState>;

    /// Merkle root of the bucket list at `checkpoint`.
    fn bucket_list_hash(&self, checkpoint: u32) -> ArchiveResult<[u8; 32]>;

    /// Header of ledger `sequence`, if the archive has published it.
    fn ledger_header(&self, sequence: u32) -> ArchiveResult<LedgerHeader>;

    /// Open the full state snapshot taken at `checkpoint` as a change stream.
    fn open_snapshot(&self, checkpoint: u32) -> ArchiveResult<Box<dyn ChangeReader>>;
}

impl<T: HistoryArchive + ?Sized> HistoryArchive for std::sync::Arc<T> {
    fn root_state(&self) -> ArchiveResult<ArchiveRootState> {
        (**self).root_state()
    }

    fn bucket_list_hash(&self, checkpoint: u32) -> ArchiveResult<[u8; 32]> {
        (**self).bucket_list_hash(checkpoint)
    }

    fn ledger_header(&self, sequence: u32) -> ArchiveResult<LedgerHeader> {
        (**self).ledger_header(sequence)
    }

    fn open_snapshot(&self, checkpoint: u32) -> ArchiveResult<Box<dyn ChangeReader>> {
        (**self).open_snapshot(checkpoint)
    }
}
