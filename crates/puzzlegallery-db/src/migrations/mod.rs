//! Schema migrations.
//!
//! The schema version lives in SQLite's `user_version` pragma. Each step
//! below the stored version is skipped; the rest run in order, each in its
//! own transaction together with the version bump.

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("reading schema version: {0}")]
    Version(#[source] rusqlite::Error),

    #[error("migration {version} ({name}) failed: {source}")]
    Step {
        version: u32,
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

/// Schema steps, indexed from version 1.
const STEPS: &[(&str, &str)] = &[("images", include_str!("001_images.sql"))];

/// Bring the schema up to date, returning how many steps ran.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    let stored: u32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(MigrationError::Version)?;

    let mut applied = 0;
    for (version, &(name, sql)) in (1u32..).zip(STEPS) {
        if version <= stored {
            continue;
        }

        let step = |source| MigrationError::Step {
            version,
            name,
            source,
        };
        let tx = conn.unchecked_transaction().map_err(step)?;
        tx.execute_batch(sql).map_err(step)?;
        tx.execute_batch(&format!("PRAGMA user_version = {version}"))
            .map_err(step)?;
        tx.commit().map_err(step)?;

        tracing::info!(version, name, "applied migration");
        applied += 1;
    }

    Ok(applied)
}
