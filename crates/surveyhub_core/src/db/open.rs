//! Connection bootstrap for the survey store.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Run schema migrations and seed the default administrator.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.
//! - Exactly one admin-role account exists after bootstrap of an empty store.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{Duration, Instant};

/// Username of the administrator seeded into an empty store.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
/// Password matching the seeded administrator's stored hash.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a SQLite database file, applies pending migrations and seeds the
/// default administrator when no admin account exists.
///
/// # Side effects
/// - Emits `store_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=store_open module=db status=start mode=file");
    let conn = Connection::open(path);
    finish_open(conn, "file", started_at)
}

/// Opens an in-memory SQLite database with the same bootstrap as [`open_db`].
///
/// Intended for tests and ephemeral tooling.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=store_open module=db status=start mode=memory");
    let conn = Connection::open_in_memory();
    finish_open(conn, "memory", started_at)
}

fn finish_open(
    conn: rusqlite::Result<Connection>,
    mode: &str,
    started_at: Instant,
) -> DbResult<Connection> {
    let mut conn = match conn {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
                started_at.elapsed().as_millis()
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(()) => {
            info!(
                "event=store_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    seed_default_admin(conn)?;
    Ok(())
}

/// Inserts the fixed default administrator when zero admin accounts exist.
fn seed_default_admin(conn: &Connection) -> DbResult<()> {
    let admin_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM Users WHERE role = 'admin';",
        [],
        |row| row.get(0),
    )?;
    if admin_count > 0 {
        return Ok(());
    }

    conn.execute(
        "INSERT INTO Users (username, password_hash, role) VALUES (?1, ?2, 'admin');",
        rusqlite::params![DEFAULT_ADMIN_USERNAME, hash_password(DEFAULT_ADMIN_PASSWORD)],
    )?;
    info!("event=seed_admin module=db status=ok username={DEFAULT_ADMIN_USERNAME}");
    Ok(())
}

fn hash_password(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::hash_password;

    #[test]
    fn hash_password_is_hex_sha256() {
        let hashed = hash_password("admin123");
        assert_eq!(hashed.len(), 64);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hashed, hash_password("admin123"));
        assert_ne!(hashed, hash_password("admin124"));
    }
}
