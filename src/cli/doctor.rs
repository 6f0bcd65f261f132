//! CLI `doctor` command — run database diagnostics and print a health report.

use anyhow::{Context, Result};

use crate::config::GrimoireConfig;
use crate::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &GrimoireConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `grimoire serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;

    let report = db::check_health(&conn).context("failed to run health check")?;

    println!("Grimoire Health Report");
    println!("======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Row counts:");
    println!("  Spreads:         {}", report.spread_count);
    println!("  Dreams:          {}", report.dream_count);
    println!("  Premonitions:    {}", report.premonition_count);
    println!("  Rituals:         {}", report.ritual_count);
    println!("  Outcomes:        {}", report.outcome_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }

    if !report.integrity_ok {
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db ~/.grimoire/journal.db");
        println!("  2. Or export what is readable first: grimoire export > backup.json");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
