use aurora_types::{LedgerCloseMeta, LedgerRange};

use crate::error::BackendResult;

/// A deterministic source of closed ledgers.
///
/// Callers prepare a range and then pull ledgers in strictly increasing
/// sequence order. At most one consumer per backend instance is supported;
/// the stream is not rewindable.
pub trait LedgerBackend: Send {
    /// Prepare the backend to serve `range`. For captive implementations this
    /// starts the validator subprocess and blocks until the first ledger is
    /// buffered or startup fails.
    fn prepare_range(&mut self, range: LedgerRange) -> BackendResult<()>;

    /// Returns `true` if a prior preparation already covers `range`.
    fn is_prepared(&mut self, range: LedgerRange) -> BackendResult<bool>;

    /// Fetch ledger `sequence`.
    ///
    /// Returns `Ok(None)` when the backend is non-blocking and the ledger has
    /// not been produced yet; the caller retries. Re-requesting the last
    /// returned sequence yields the cached record without advancing the
    /// stream. Requesting an earlier sequence is an error.
    fn get_ledger(&mut self, sequence: u32) -> BackendResult<Option<LedgerCloseMeta>>;

    /// Sequence of the latest ledger available in the backend. Not
    /// necessarily the latest ledger closed by the network.
    fn latest_sequence(&mut self) -> BackendResult<u32>;

    /// Tear down any running session. Idempotent.
    fn close(&mut self) -> BackendResult<()>;
}

impl<T: LedgerBackend + ?Sized> LedgerBackend for Box<T> {
    fn prepare_range(&mut self, range: LedgerRange) -> BackendResult<()> {
        (**self).prepare_range(range)
    }

    fn is_prepared(&mut self, range: LedgerRange) -> BackendResult<bool> {
        (**self).is_prepared(range)
    }

    fn get_ledger(&mut self, sequence: u32) -> BackendResult<Option<LedgerCloseMeta>> {
        (**self).get_ledger(sequence)
    }

    fn latest_sequence(&mut self) -> BackendResult<u32> {
        (**self).latest_sequence()
    }

    fn close(&mut self) -> BackendResult<()> {
        (**self).close()
    }
}
