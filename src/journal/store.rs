//! Record store adapter — typed CRUD over the category tables and outcomes.
//!
//! Every operation is a single parameterized statement (the outcome write is
//! one transaction), issued through [`Pool::with`], which retries once on a
//! transient failure. Column lists are derived from the category's field
//! schema so the SQL always matches the collection order.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, ToSql};

use crate::db::{Pool, StoreError};
use crate::journal::types::{Category, Outcome, Record};

/// Insert a new record with a server-assigned creation timestamp. `values`
/// must be parallel to `category.fields()`. Returns the new record id.
pub fn create_record(
    pool: &Pool,
    user_id: i64,
    category: Category,
    values: &[String],
) -> Result<i64, StoreError> {
    debug_assert_eq!(values.len(), category.fields().len());

    let columns: Vec<&str> = category.fields().iter().map(|f| f.column).collect();
    let placeholders: Vec<String> = (3..3 + columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} (user_id, created_at, {}) VALUES (?1, ?2, {})",
        category.table(),
        columns.join(", "),
        placeholders.join(", "),
    );
    let now = Utc::now().to_rfc3339();

    pool.with(|conn| {
        let mut params: Vec<&dyn ToSql> = vec![&user_id, &now];
        params.extend(values.iter().map(|v| v as &dyn ToSql));
        conn.execute(&sql, params.as_slice())?;
        Ok(conn.last_insert_rowid())
    })
}

/// All records of one category owned by the user, newest first.
pub fn list_records(
    pool: &Pool,
    category: Category,
    user_id: i64,
) -> Result<Vec<Record>, StoreError> {
    let sql = format!(
        "SELECT id, user_id, created_at, has_outcome, {} FROM {} \
         WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        field_columns(category),
        category.table(),
    );

    pool.with(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id], |row| record_from_row(category, row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Fetch one record by id, or `None` if it no longer exists.
pub fn fetch_record(
    pool: &Pool,
    category: Category,
    id: i64,
) -> Result<Option<Record>, StoreError> {
    let sql = format!(
        "SELECT id, user_id, created_at, has_outcome, {} FROM {} WHERE id = ?1",
        field_columns(category),
        category.table(),
    );

    pool.with(|conn| {
        conn.query_row(&sql, params![id], |row| record_from_row(category, row))
            .optional()
    })
}

/// Move a record to a different creation timestamp.
pub fn update_created_at(
    pool: &Pool,
    category: Category,
    id: i64,
    when: DateTime<Utc>,
) -> Result<(), StoreError> {
    let sql = format!("UPDATE {} SET created_at = ?1 WHERE id = ?2", category.table());
    let ts = when.to_rfc3339();
    pool.with(|conn| {
        conn.execute(&sql, params![ts, id])?;
        Ok(())
    })
}

/// Delete a record. Its outcome rows are kept (append-only history).
pub fn delete_record(pool: &Pool, category: Category, id: i64) -> Result<(), StoreError> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", category.table());
    pool.with(|conn| {
        conn.execute(&sql, params![id])?;
        Ok(())
    })
}

/// Append an outcome note and set the referenced record's outcome flag.
///
/// Both writes run in one transaction so the flag can never disagree with the
/// presence of an outcome row. Returns the new outcome id.
pub fn add_outcome(
    pool: &Pool,
    user_id: i64,
    category: Category,
    reference_id: i64,
    text: &str,
) -> Result<i64, StoreError> {
    let flag_sql = format!("UPDATE {} SET has_outcome = 1 WHERE id = ?1", category.table());
    let now = Utc::now().to_rfc3339();

    pool.with(|conn| {
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO outcomes (user_id, category, reference_id, outcome_text, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, category.tag(), reference_id, text, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(&flag_sql, params![reference_id])?;
        tx.commit()?;
        Ok(id)
    })
}

/// The most recent outcome for a record, if any.
pub fn latest_outcome(
    pool: &Pool,
    category: Category,
    reference_id: i64,
) -> Result<Option<Outcome>, StoreError> {
    pool.with(|conn| {
        conn.query_row(
            "SELECT id, user_id, category, reference_id, outcome_text, created_at \
             FROM outcomes WHERE category = ?1 AND reference_id = ?2 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            params![category.tag(), reference_id],
            outcome_from_row,
        )
        .optional()
    })
}

/// The most recent outcome for a user's record, optionally scoped to one
/// category. The unscoped form exists for legacy callers that only know the
/// reference id.
pub fn latest_outcome_for_user(
    pool: &Pool,
    user_id: i64,
    reference_id: i64,
    category: Option<Category>,
) -> Result<Option<Outcome>, StoreError> {
    pool.with(|conn| match category {
        Some(cat) => conn
            .query_row(
                "SELECT id, user_id, category, reference_id, outcome_text, created_at \
                 FROM outcomes WHERE user_id = ?1 AND category = ?2 AND reference_id = ?3 \
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![user_id, cat.tag(), reference_id],
                outcome_from_row,
            )
            .optional(),
        None => conn
            .query_row(
                "SELECT id, user_id, category, reference_id, outcome_text, created_at \
                 FROM outcomes WHERE user_id = ?1 AND reference_id = ?2 \
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![user_id, reference_id],
                outcome_from_row,
            )
            .optional(),
    })
}

// ── Row mapping ───────────────────────────────────────────────────────────────

fn field_columns(category: Category) -> String {
    category
        .fields()
        .iter()
        .map(|f| f.column)
        .collect::<Vec<_>>()
        .join(", ")
}

fn record_from_row(category: Category, row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut values = Vec::with_capacity(category.fields().len());
    for i in 0..category.fields().len() {
        values.push(row.get::<_, String>(4 + i)?);
    }
    Ok(Record {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: parse_timestamp(row.get::<_, String>(2)?, 2)?,
        has_outcome: row.get(3)?,
        category,
        values,
    })
}

fn outcome_from_row(row: &Row<'_>) -> rusqlite::Result<Outcome> {
    let tag: String = row.get(2)?;
    Ok(Outcome {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category: tag.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        reference_id: row.get(3)?,
        text: row.get(4)?,
        created_at: parse_timestamp(row.get::<_, String>(5)?, 5)?,
    })
}

fn parse_timestamp(raw: String, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Used by tests to pin timestamps without going through the public update.
#[cfg(test)]
pub fn set_created_at_raw(conn: &rusqlite::Connection, category: Category, id: i64, ts: &str) {
    conn.execute(
        &format!("UPDATE {} SET created_at = ?1 WHERE id = ?2", category.table()),
        params![ts, id],
    )
    .unwrap();
}
