use std::collections::HashMap;

use aurora_types::{Change, LedgerKey};

use crate::error::{IngestError, IngestResult};

/// Folds the changes of one ledger into a single net change per entry.
///
/// Folding keeps the first `pre` and the last `post` per ledger key. An
/// entry created and removed within the same ledger cancels out entirely,
/// and a remove-then-create collapses into an update, so the flush path
/// issues at most one store operation per touched entry.
///
/// Flush order is the order keys were first seen.
#[derive(Default)]
pub struct ChangeCache {
    order: Vec<LedgerKey>,
    entries: HashMap<LedgerKey, Change>,
}

impl ChangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold `change` into the cache.
    ///
    /// Transitions that cannot follow the current net state (create on top
    /// of a live entry, update or remove of a removed entry) are rejected as
    /// an inconsistent change stream.
    pub fn add_change(&mut self, change: Change) -> IngestResult<()> {
        let key = change.key();

        let Some(existing) = self.entries.get_mut(&key) else {
            self.order.push(key.clone());
            self.entries.insert(key, change);
            return Ok(());
        };

        if existing.is_removal() {
            // Only a re-creation can follow a removal; the pair nets out to
            // an update against the pre-removal entry.
            if !change.is_creation() {
                return Err(invalid(&key, "entry was already removed"));
            }
            existing.post = change.post;
            return Ok(());
        }

        // Existing is a creation or an update, i.e. the entry is live.
        if change.is_creation() {
            return Err(invalid(&key, "entry already exists"));
        }

        if change.is_removal() && existing.is_creation() {
            // Created and removed within the same ledger: nothing happened.
            self.entries.remove(&key);
            self.order.retain(|k| k != &key);
            return Ok(());
        }

        // Update or removal over a live entry: keep the first pre, take the
        // incoming post.
        existing.post = change.post;
        Ok(())
    }

    /// Drain the folded changes in first-seen order.
    pub fn take_changes(&mut self) -> Vec<Change> {
        let mut entries = std::mem::take(&mut self.entries);
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|key| entries.remove(&key))
            .collect()
    }
}

fn invalid(key: &LedgerKey, reason: &'static str) -> IngestError {
    IngestError::InvalidChangeSequence {
        key: format!("{key:?}"),
        reason,
    }
}
