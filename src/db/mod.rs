pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, ErrorCode};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Failure modes of the store adapter.
///
/// A transient connectivity failure is retried exactly once on a freshly
/// opened connection; if the retry also fails the call surfaces as
/// [`StoreError::Unavailable`] and the caller's state is left untouched.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable after retry")]
    Unavailable(#[source] rusqlite::Error),
    #[error("query failed")]
    Sqlite(#[from] rusqlite::Error),
}

/// A bounded pool of SQLite connections.
///
/// Slots are picked round-robin; a busy slot queues callers on its mutex, so
/// concurrency never exceeds `max_connections` open handles.
pub struct Pool {
    path: PathBuf,
    slots: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl Pool {
    /// Open (or create) the journal database at the given path and build the
    /// pool. The first connection initializes schema and runs migrations.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create directory {}", parent.display())
                })?;
            }
        }

        let first = open_connection(&path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        schema::init_schema(&first).context("failed to initialize schema")?;
        migrations::run_migrations(&first).context("failed to run migrations")?;

        let mut slots = vec![Mutex::new(first)];
        for _ in 1..size.max(1) {
            slots.push(Mutex::new(open_connection(&path)?));
        }

        tracing::info!(path = %path.display(), connections = slots.len(), "database ready");
        Ok(Self {
            path,
            slots,
            next: AtomicUsize::new(0),
        })
    }

    /// Run `f` against a pooled connection, retrying once on a transient
    /// failure with a freshly opened connection.
    pub fn with<T>(
        &self,
        f: impl Fn(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        // A poisoned mutex only means another caller panicked mid-query; the
        // connection itself is still usable.
        let mut guard = self.slots[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match f(&mut guard) {
            Ok(val) => Ok(val),
            Err(err) if is_transient(&err) => {
                tracing::warn!(error = %err, "transient store failure, reopening connection");
                *guard = open_connection(&self.path).map_err(StoreError::Unavailable)?;
                f(&mut guard).map_err(StoreError::Unavailable)
            }
            Err(err) => Err(StoreError::Sqlite(err)),
        }
    }
}

/// Open a single connection for offline tooling (doctor, export). Does not
/// initialize schema.
pub fn open_database(path: &Path) -> Result<Connection> {
    open_connection(path).with_context(|| format!("failed to open database at {}", path.display()))
}

/// Open a single connection with the standard pragmas applied.
fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    // WAL for concurrent readers, busy timeout so writers queue instead of
    // failing immediately.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(conn)
}

fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::CannotOpen
            )
    )
}

/// Database health report, produced by [`check_health`].
pub struct HealthReport {
    pub schema_version: u32,
    pub spread_count: i64,
    pub dream_count: i64,
    pub premonition_count: i64,
    pub ritual_count: i64,
    pub outcome_count: i64,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

/// Run row counts and an integrity check against an open connection.
pub fn check_health(conn: &Connection) -> Result<HealthReport> {
    let count = |table: &str| -> rusqlite::Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
    };

    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;

    Ok(HealthReport {
        schema_version: migrations::get_schema_version(conn)?,
        spread_count: count("spreads")?,
        dream_count: count("dreams")?,
        premonition_count: count("premonitions")?,
        ritual_count: count("rituals")?,
        outcome_count: count("outcomes")?,
        integrity_ok: integrity == "ok",
        integrity_details: integrity,
    })
}

/// Open a single-slot in-memory pool for unit tests.
#[cfg(test)]
pub fn memory_pool() -> Pool {
    let conn = Connection::open_in_memory().expect("in-memory db");
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    schema::init_schema(&conn).unwrap();
    migrations::run_migrations(&conn).unwrap();
    Pool {
        path: PathBuf::from(":memory:"),
        slots: vec![Mutex::new(conn)],
        next: AtomicUsize::new(0),
    }
}
