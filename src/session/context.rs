//! Per-user session context: the last materialized aggregated view.
//!
//! Indices into the stored sequence are the addressing scheme carried by
//! action tokens. They are valid only until the next [`ContextStore::replace`]
//! for that user; a stale index resolves to `None` rather than panicking or
//! returning the wrong entry.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::journal::types::Entry;

/// Process-wide map from user id to their current entry sequence.
///
/// Held only in memory; a restart loses all contexts, which is fine because
/// the underlying records survive in the store. Per-user turns are serialized
/// by the transport loop, so the mutex only arbitrates between different
/// users' turns.
#[derive(Default)]
pub struct ContextStore {
    inner: Mutex<HashMap<i64, Vec<Entry>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the user's context with a freshly aggregated sequence. All
    /// previously issued indices for this user become stale.
    pub fn replace(&self, user_id: i64, entries: Vec<Entry>) {
        self.lock().insert(user_id, entries);
    }

    /// The user's current sequence; empty if none was ever materialized.
    pub fn get(&self, user_id: i64) -> Vec<Entry> {
        self.lock().get(&user_id).cloned().unwrap_or_default()
    }

    /// Resolve an index against the current sequence. Out-of-range or absent
    /// contexts fail closed with `None`.
    pub fn entry_at(&self, user_id: i64, index: usize) -> Option<Entry> {
        self.lock().get(&user_id)?.get(index).cloned()
    }

    /// Drop the entry at `index`, keeping the relative order of the rest, so
    /// displayed indices stay consistent after a delete without forcing a
    /// re-aggregation. Returns false if the index was already stale.
    pub fn remove_at(&self, user_id: i64, index: usize) -> bool {
        let mut inner = self.lock();
        match inner.get_mut(&user_id) {
            Some(entries) if index < entries.len() => {
                entries.remove(index);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self, user_id: i64) -> usize {
        self.lock().get(&user_id).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self, user_id: i64) -> bool {
        self.len(user_id) == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Vec<Entry>>> {
        // A poisoned lock only means a turn panicked while rendering; the map
        // itself is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
