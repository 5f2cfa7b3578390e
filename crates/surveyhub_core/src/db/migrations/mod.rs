//! SQLite schema revision registry and executor.
//!
//! # Responsibility
//! - Register schema revisions in strictly increasing order.
//! - Apply pending revisions atomically.
//!
//! # Invariants
//! - Revision numbers are monotonic.
//! - The applied revision is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaRevision {
    version: u32,
    sql: &'static str,
}

const REVISIONS: &[SchemaRevision] = &[
    SchemaRevision {
        version: 1,
        sql: include_str!("0001_schema.sql"),
    },
    SchemaRevision {
        version: 2,
        sql: include_str!("0002_completion_guard.sql"),
    },
];

/// Returns the newest schema revision known by this binary.
pub fn latest_version() -> u32 {
    REVISIONS.last().map_or(0, |revision| revision.version)
}

/// Returns the revision currently recorded in the database.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Applies all pending schema revisions in one transaction.
///
/// Databases written by a newer binary are rejected rather than partially
/// interpreted.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current = schema_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }

    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for revision in REVISIONS.iter().filter(|r| r.version > current) {
        tx.execute_batch(revision.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", revision.version))?;
    }
    tx.commit()?;

    Ok(())
}
