//! CLI `export` command — dump the whole journal as JSON to stdout.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::GrimoireConfig;
use crate::journal::types::{Category, Outcome, Record};

/// Export format — all records of every category plus the outcome history.
#[derive(Debug, Serialize)]
struct ExportData {
    records: Vec<Record>,
    outcomes: Vec<Outcome>,
}

/// Export every user's records and outcomes as JSON to stdout.
pub fn export(config: &GrimoireConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;

    let mut records = Vec::new();
    for category in Category::ALL {
        records.extend(fetch_category(&conn, category)?);
    }

    let mut stmt = conn.prepare(
        "SELECT id, user_id, category, reference_id, outcome_text, created_at \
         FROM outcomes ORDER BY created_at",
    )?;
    let outcomes: Vec<Outcome> = stmt
        .query_map([], |row| {
            let tag: String = row.get(2)?;
            Ok(Outcome {
                id: row.get(0)?,
                user_id: row.get(1)?,
                category: tag.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
                reference_id: row.get(3)?,
                text: row.get(4)?,
                created_at: parse_ts(row.get::<_, String>(5)?)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let data = ExportData { records, outcomes };

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!(
        "Exported {} records and {} outcomes.",
        data.records.len(),
        data.outcomes.len()
    );

    Ok(())
}

fn fetch_category(conn: &Connection, category: Category) -> Result<Vec<Record>> {
    let columns: Vec<&str> = category.fields().iter().map(|f| f.column).collect();
    let sql = format!(
        "SELECT id, user_id, created_at, has_outcome, {} FROM {} ORDER BY created_at",
        columns.join(", "),
        category.table(),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let mut values = Vec::with_capacity(category.fields().len());
            for i in 0..category.fields().len() {
                values.push(row.get::<_, String>(4 + i)?);
            }
            Ok(Record {
                id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: parse_ts(row.get::<_, String>(2)?)?,
                has_outcome: row.get(3)?,
                category,
                values,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn parse_ts(raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })
}
