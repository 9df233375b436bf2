use std::collections::BTreeMap;
use std::sync::RwLock;

use aurora_types::{is_checkpoint, Change, LedgerEntry, LedgerHeader};
use sha2::{Digest, Sha256};

use crate::error::{ArchiveError, ArchiveResult};
use crate::traits::{ArchiveRootState, ChangeReader, HistoryArchive};

/// In-memory history archive for tests and embedding.
///
/// Checkpoint snapshots and ledger headers are registered up front; the
/// bucket-list hash of a checkpoint is computed deterministically from its
/// snapshot contents unless explicitly overridden.
pub struct InMemoryArchive {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    snapshots: BTreeMap<u32, Vec<LedgerEntry>>,
    headers: BTreeMap<u32, LedgerHeader>,
    hash_overrides: BTreeMap<u32, [u8; 32]>,
    current_ledger: Option<u32>,
}

/// Hash of a snapshot's entries, order-independent over ledger keys.
pub(crate) fn snapshot_hash(entries: &[LedgerEntry]) -> [u8; 32] {
    let mut sorted: Vec<&LedgerEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.key());
    let mut hasher = Sha256::new();
    for entry in sorted {
        let bytes = bincode::serialize(entry).expect("entry serialization cannot fail");
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
    }
    hasher.finalize().into()
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register the snapshot published at `checkpoint` and derive its header's
    /// bucket-list hash from the snapshot contents.
    pub fn add_checkpoint(&self, checkpoint: u32, entries: Vec<LedgerEntry>) -> ArchiveResult<()> {
        if !is_checkpoint(checkpoint) {
            return Err(ArchiveError::NotACheckpoint(checkpoint));
        }
        let hash = snapshot_hash(&entries);
        let mut inner = self.inner.write().expect("lock poisoned");
        let header = inner
            .headers
            .entry(checkpoint)
            .or_insert_with(|| LedgerHeader::new(checkpoint, aurora_types::DEFAULT_PROTOCOL_VERSION));
        header.bucket_list_hash = hash;
        inner.snapshots.insert(checkpoint, entries);
        let current = inner.current_ledger.unwrap_or(0).max(checkpoint);
        inner.current_ledger = Some(current);
        Ok(())
    }

    /// Register the header of an arbitrary ledger (used by online startup to
    /// resolve `previous_ledger_hash`).
    pub fn add_header(&self, header: LedgerHeader) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.headers.insert(header.sequence, header);
    }

    /// Force the archive's advertised latest checkpoint.
    pub fn set_current_ledger(&self, sequence: u32) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.current_ledger = Some(sequence);
    }

    /// Override the bucket-list hash reported for `checkpoint`, detaching it
    /// from the snapshot contents. Used to exercise validation failures.
    pub fn override_bucket_list_hash(&self, checkpoint: u32, hash: [u8; 32]) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.hash_overrides.insert(checkpoint, hash);
    }
}

impl Default for InMemoryArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryArchive for InMemoryArchive {
    fn root_state(&self) -> ArchiveResult<ArchiveRootState> {
        let inner = self.inner.read().expect("lock poisoned");
        let current_ledger = inner.current_ledger.ok_or(ArchiveError::Empty)?;
        Ok(ArchiveRootState { current_ledger })
    }

    fn bucket_list_hash(&self, checkpoint: u32) -> ArchiveResult<[u8; 32]> {
        let inner = self.inner.read().expect("lock poisoned");
        if let Some(hash) = inner.hash_overrides.get(&checkpoint) {
            return Ok(*hash);
        }
        inner
            .snapshots
            .get(&checkpoint)
            .map(|entries| snapshot_hash(entries))
            .ok_or(ArchiveError::CheckpointNotFound(checkpoint))
    }

    fn ledger_header(&self, sequence: u32) -> ArchiveResult<LedgerHeader> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .headers
            .get(&sequence)
            .cloned()
            .ok_or(ArchiveError::HeaderNotFound(sequence))
    }

    fn open_snapshot(&self, checkpoint: u32) -> ArchiveResult<Box<dyn ChangeReader>> {
        let inner = self.inner.read().expect("lock poisoned");
        let entries = inner
            .snapshots
            .get(&checkpoint)
            .ok_or(ArchiveError::CheckpointNotFound(checkpoint))?
            .clone();
        Ok(Box::new(SnapshotReader {
            entries: entries.into_iter(),
        }))
    }
}

/// Streams a stored snapshot as a sequence of creations.
struct SnapshotReader {
    entries: std::vec::IntoIter<LedgerEntry>,
}

impl ChangeReader for SnapshotReader {
    fn next_change(&mut self) -> ArchiveResult<Option<Change>> {
        Ok(self.entries.next().map(Change::create))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_types::{AccountEntry, LedgerEntryData};

    fn account(id: &str, balance: i64) -> LedgerEntry {
        LedgerEntry::new(63, LedgerEntryData::Account(AccountEntry::new(id, balance)))
    }

    #[test]
    fn empty_archive_has_no_root() {
        let archive = InMemoryArchive::new();
        assert_eq!(archive.root_state(), Err(ArchiveError::Empty));
    }

    #[test]
    fn non_checkpoint_snapshot_rejected() {
        let archive = InMemoryArchive::new();
        assert_eq!(
            archive.add_checkpoint(64, vec![]),
            Err(ArchiveError::NotACheckpoint(64))
        );
    }

    #[test]
    fn current_ledger_tracks_latest_checkpoint() {
        let archive = InMemoryArchive::new();
        archive.add_checkpoint(63, vec![]).unwrap();
        archive.add_checkpoint(127, vec![]).unwrap();
        assert_eq!(archive.root_state().unwrap().current_ledger, 127);
    }

    #[test]
    fn snapshot_streams_creations() {
        let archive = InMemoryArchive::new();
        archive
            .add_checkpoint(63, vec![account("GA", 10), account("GB", 20)])
            .unwrap();

        let mut reader = archive.open_snapshot(63).unwrap();
        let mut seen = 0;
        while let Some(change) = reader.next_change().unwrap() {
            assert!(change.is_creation());
            seen += 1;
        }
        assert_eq!(seen, 2);
    }

    #[test]
    fn bucket_list_hash_matches_registered_header() {
        let archive = InMemoryArchive::new();
        archive.add_checkpoint(63, vec![account("GA", 10)]).unwrap();
        let header = archive.ledger_header(63).unwrap();
        assert_eq!(header.bucket_list_hash, archive.bucket_list_hash(63).unwrap());
    }

    #[test]
    fn hash_is_insensitive_to_entry_order() {
        let a = snapshot_hash(&[account("GA", 1), account("GB", 2)]);
        let b = snapshot_hash(&[account("GB", 2), account("GA", 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_is_sensitive_to_contents() {
        let a = snapshot_hash(&[account("GA", 1)]);
        let b = snapshot_hash(&[account("GA", 2)]);
        assert_ne!(a, b);
    }

    #[test]
    fn override_detaches_hash_from_snapshot() {
        let archive = InMemoryArchive::new();
        archive.add_checkpoint(63, vec![account("GA", 1)]).unwrap();
        archive.override_bucket_list_hash(63, [0xaa; 32]);
        assert_eq!(archive.bucket_list_hash(63).unwrap(), [0xaa; 32]);
    }

    #[test]
    fn missing_lookups_error() {
        let archive = InMemoryArchive::new();
        assert_eq!(
            archive.bucket_list_hash(63),
            Err(ArchiveError::CheckpointNotFound(63))
        );
        assert_eq!(
            archive.ledger_header(10).err(),
            Some(ArchiveError::HeaderNotFound(10))
        );
        assert!(archive.open_snapshot(63).is_err());
    }
}
