//! SQL DDL for all grimoire tables.
//!
//! Defines the four category tables (`spreads`, `dreams`, `premonitions`,
//! `rituals`), the `outcomes` table, and `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for grimoire's tables.
const SCHEMA_SQL: &str = r#"
-- Divination spreads
CREATE TABLE IF NOT EXISTS spreads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    title TEXT NOT NULL,
    question TEXT NOT NULL,
    cards TEXT NOT NULL,
    interpretation TEXT NOT NULL,
    has_outcome INTEGER NOT NULL DEFAULT 0
);

-- Dreams
CREATE TABLE IF NOT EXISTS dreams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    title TEXT NOT NULL,
    dream_text TEXT NOT NULL,
    interpretation TEXT NOT NULL,
    has_outcome INTEGER NOT NULL DEFAULT 0
);

-- Premonitions
CREATE TABLE IF NOT EXISTS premonitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    title TEXT NOT NULL,
    premonition_text TEXT NOT NULL,
    interpretation TEXT NOT NULL,
    has_outcome INTEGER NOT NULL DEFAULT 0
);

-- Rituals
CREATE TABLE IF NOT EXISTS rituals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    title TEXT NOT NULL,
    purpose TEXT NOT NULL,
    tools TEXT NOT NULL,
    action TEXT NOT NULL,
    feelings TEXT NOT NULL,
    has_outcome INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_spreads_user ON spreads(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_dreams_user ON dreams(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_premonitions_user ON premonitions(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_rituals_user ON rituals(user_id, created_at);

-- Follow-up outcome notes, appended per record. reference_id is scoped to the
-- category's table; the (category, reference_id) pair identifies the record.
CREATE TABLE IF NOT EXISTS outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    category TEXT NOT NULL CHECK(category IN ('spread','dream','premonition','ritual')),
    reference_id INTEGER NOT NULL,
    outcome_text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_outcomes_user ON outcomes(user_id);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in ["spreads", "dreams", "premonitions", "rituals", "outcomes", "schema_meta"] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }

    #[test]
    fn outcome_category_is_constrained() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let err = conn.execute(
            "INSERT INTO outcomes (user_id, category, reference_id, outcome_text, created_at) \
             VALUES (1, 'nonsense', 1, 'x', '2026-01-01T00:00:00+00:00')",
            [],
        );
        assert!(err.is_err());
    }
}
