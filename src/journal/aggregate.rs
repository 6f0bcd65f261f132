//! Cross-category aggregation and search.
//!
//! Builds the unified entry list backing the session context: all four
//! categories fetched for one user, optionally filtered by a case-folded
//! substring over every textual field, sorted newest first.

use crate::db::{Pool, StoreError};
use crate::journal::store;
use crate::journal::types::{Category, Entry};

/// Aggregate all of a user's records into one ordered entry list.
///
/// With a filter, a record survives only if any of its fields contains the
/// filter substring (case-folded). The result is sorted by creation timestamp
/// descending; equal timestamps order by category tag, then record id
/// descending, so the sequence is deterministic. Returns an empty vec (never
/// an error) when nothing matches.
pub fn aggregate(pool: &Pool, user_id: i64, filter: Option<&str>) -> Result<Vec<Entry>, StoreError> {
    let needle = filter.map(str::to_lowercase);

    let mut entries: Vec<Entry> = Vec::new();
    for category in Category::ALL {
        for record in store::list_records(pool, category, user_id)? {
            if let Some(ref needle) = needle {
                if !record.matches(needle) {
                    continue;
                }
            }
            entries.push(Entry::from(record));
        }
    }

    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.category.tag().cmp(b.category.tag()))
            .then_with(|| b.record_id.cmp(&a.record_id))
    });

    tracing::debug!(
        user_id,
        total = entries.len(),
        filtered = needle.is_some(),
        "aggregated journal entries"
    );
    Ok(entries)
}
