//! Database-backed ledger source.
//!
//! Reads ledgers the validator already persisted to its own store instead of
//! driving a subprocess. Kept at interface parity with the captive backend;
//! the store itself is behind the [`CoreStore`] seam.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use aurora_types::{LedgerCloseMeta, LedgerRange};

use crate::error::{BackendError, BackendResult};
use crate::traits::LedgerBackend;

/// Read boundary over the validator's own ledger store.
pub trait CoreStore: Send + Sync {
    /// Highest sequence present in the store, if any.
    fn latest_sequence(&self) -> BackendResult<Option<u32>>;

    /// The close record of `sequence`, if present.
    fn ledger(&self, sequence: u32) -> BackendResult<Option<LedgerCloseMeta>>;
}

/// In-memory [`CoreStore`] for tests and synthesized ledgers.
#[derive(Default)]
pub struct InMemoryCoreStore {
    ledgers: Mutex<BTreeMap<u32, LedgerCloseMeta>>,
}

impl InMemoryCoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, meta: LedgerCloseMeta) {
        self.ledgers
            .lock()
            .expect("lock poisoned")
            .insert(meta.sequence(), meta);
    }
}

impl CoreStore for InMemoryCoreStore {
    fn latest_sequence(&self) -> BackendResult<Option<u32>> {
        Ok(self
            .ledgers
            .lock()
            .expect("lock poisoned")
            .keys()
            .next_back()
            .copied())
    }

    fn ledger(&self, sequence: u32) -> BackendResult<Option<LedgerCloseMeta>> {
        Ok(self
            .ledgers
            .lock()
            .expect("lock poisoned")
            .get(&sequence)
            .cloned())
    }
}

/// Ledger backend over a [`CoreStore`].
pub struct DatabaseBackend {
    store: Arc<dyn CoreStore>,
    prepared: Option<LedgerRange>,
}

impl DatabaseBackend {
    pub fn new(store: Arc<dyn CoreStore>) -> Self {
        Self {
            store,
            prepared: None,
        }
    }
}

impl LedgerBackend for DatabaseBackend {
    fn prepare_range(&mut self, range: LedgerRange) -> BackendResult<()> {
        let latest = self.store.latest_sequence()?.unwrap_or(0);
        if range.from > latest {
            return Err(BackendError::RangeNotAvailable {
                from: range.from,
                to: if range.bounded { range.to } else { range.from },
                latest,
            });
        }
        self.prepared = Some(range);
        Ok(())
    }

    fn is_prepared(&mut self, range: LedgerRange) -> BackendResult<bool> {
        Ok(match self.prepared {
            None => false,
            Some(prepared) => {
                prepared.from <= range.from && (!range.bounded || prepared.contains(range.to))
            }
        })
    }

    fn get_ledger(&mut self, sequence: u32) -> BackendResult<Option<LedgerCloseMeta>> {
        self.store.ledger(sequence)
    }

    fn latest_sequence(&mut self) -> BackendResult<u32> {
        self.store.latest_sequence()?.ok_or(BackendError::Closed)
    }

    fn close(&mut self) -> BackendResult<()> {
        self.prepared = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(range: std::ops::RangeInclusive<u32>) -> Arc<InMemoryCoreStore> {
        let store = InMemoryCoreStore::new();
        for seq in range {
            store.insert(LedgerCloseMeta::empty(seq));
        }
        Arc::new(store)
    }

    #[test]
    fn serves_stored_ledgers() {
        let mut backend = DatabaseBackend::new(store_with(10..=20));
        backend.prepare_range(LedgerRange::bounded(10, 20)).unwrap();

        let meta = backend.get_ledger(15).unwrap().unwrap();
        assert_eq!(meta.sequence(), 15);
        assert!(backend.get_ledger(25).unwrap().is_none());
        assert_eq!(backend.latest_sequence().unwrap(), 20);
    }

    #[test]
    fn rejects_range_beyond_store() {
        let mut backend = DatabaseBackend::new(store_with(10..=20));
        let err = backend
            .prepare_range(LedgerRange::bounded(30, 40))
            .unwrap_err();
        assert!(matches!(err, BackendError::RangeNotAvailable { .. }));
    }

    #[test]
    fn is_prepared_respects_window() {
        let mut backend = DatabaseBackend::new(store_with(10..=20));
        assert!(!backend.is_prepared(LedgerRange::bounded(10, 15)).unwrap());

        backend.prepare_range(LedgerRange::bounded(10, 20)).unwrap();
        assert!(backend.is_prepared(LedgerRange::bounded(12, 18)).unwrap());
        assert!(!backend.is_prepared(LedgerRange::bounded(5, 18)).unwrap());

        backend.prepare_range(LedgerRange::unbounded(10)).unwrap();
        assert!(backend.is_prepared(LedgerRange::bounded(12, 9999)).unwrap());
    }

    #[test]
    fn close_forgets_preparation() {
        let mut backend = DatabaseBackend::new(store_with(10..=20));
        backend.prepare_range(LedgerRange::bounded(10, 20)).unwrap();
        backend.close().unwrap();
        assert!(!backend.is_prepared(LedgerRange::bounded(10, 20)).unwrap());
    }

    #[test]
    fn latest_sequence_on_empty_store_errors() {
        let mut backend = DatabaseBackend::new(Arc::new(InMemoryCoreStore::new()));
        assert!(matches!(
            backend.latest_sequence(),
            Err(BackendError::Closed)
        ));
    }
}
