//! Database schema and migrations.
//!
//! The applied version lives in `PRAGMA user_version`. Each migration runs in
//! its own transaction together with the version bump.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Versioned migrations, in order. Version `n` is `MIGRATIONS[n - 1]`.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "sorted sets",
        // One row per (set, member); score is the insertion time in milliseconds
        "CREATE TABLE IF NOT EXISTS sorted_sets (
            set_key TEXT NOT NULL,
            member TEXT NOT NULL,
            score INTEGER NOT NULL,
            PRIMARY KEY (set_key, member)
        );
        CREATE INDEX IF NOT EXISTS idx_sorted_sets_rank ON sorted_sets (set_key, score, member);",
    ),
    (
        "runtime settings",
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    ),
];

/// Current schema version.
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    info!("Running migrations from version {} to {}", current, SCHEMA_VERSION);
    for (index, (name, sql)) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
        let version = index as i32 + 1;
        info!("Applying migration v{}: {}", version, name);

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }
    info!("Migrations complete");

    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
