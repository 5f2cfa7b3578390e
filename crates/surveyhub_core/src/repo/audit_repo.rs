//! Audit trail repository: append-only writes and filtered reads.
//!
//! # Responsibility
//! - Append one immutable row per recorded mutation.
//! - Serve the review query with conjunctive filters.
//!
//! # Invariants
//! - No API updates or deletes existing rows.
//! - Old/new values are stored as JSON text.
//! - The only validation applied to a row is foreign-key existence of the
//!   actor.

use crate::model::audit::{AuditAction, AuditEntry, AuditFilter, AuditLogId, AuditPolicy};
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

/// Repository interface for the audit trail.
pub trait AuditRepository {
    /// Appends one row unconditionally. Callers inside mutating operations
    /// should prefer the policy-gated [`record_action`] hook.
    fn append(
        &self,
        actor: UserId,
        action: AuditAction,
        table: &str,
        record_id: Option<i64>,
        old_value: Option<&serde_json::Value>,
        new_value: Option<&serde_json::Value>,
    ) -> RepoResult<AuditLogId>;

    /// Returns entries matching the filter, newest first.
    fn query(&self, filter: &AuditFilter) -> RepoResult<Vec<AuditEntry>>;
}

/// SQLite-backed audit repository.
pub struct SqliteAuditRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["AuditLog", "Users"])?;
        Ok(Self { conn })
    }
}

impl AuditRepository for SqliteAuditRepository<'_> {
    fn append(
        &self,
        actor: UserId,
        action: AuditAction,
        table: &str,
        record_id: Option<i64>,
        old_value: Option<&serde_json::Value>,
        new_value: Option<&serde_json::Value>,
    ) -> RepoResult<AuditLogId> {
        insert_row(self.conn, actor, action, table, record_id, old_value, new_value)
    }

    fn query(&self, filter: &AuditFilter) -> RepoResult<Vec<AuditEntry>> {
        let mut sql = String::from(
            "SELECT a.log_id, u.username, a.action_type, a.table_name,
                    a.record_id, a.old_value, a.new_value, a.action_timestamp
             FROM AuditLog a
             INNER JOIN Users u ON u.user_id = a.user_id
             WHERE 1 = 1",
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(table) = filter.table.as_ref() {
            sql.push_str(" AND a.table_name = ?");
            bind_values.push(Value::Text(table.clone()));
        }
        if let Some(action) = filter.action {
            sql.push_str(" AND a.action_type = ?");
            bind_values.push(Value::Text(action.as_db().to_string()));
        }
        if let Some(username) = filter.username.as_ref() {
            sql.push_str(" AND u.username LIKE ?");
            bind_values.push(Value::Text(format!("%{username}%")));
        }
        if let Some(from) = filter.from {
            sql.push_str(" AND DATE(a.action_timestamp) >= ?");
            bind_values.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = filter.to {
            sql.push_str(" AND DATE(a.action_timestamp) <= ?");
            bind_values.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }
        if let Some(search) = filter.search.as_ref() {
            sql.push_str(
                " AND (a.old_value LIKE ? OR a.new_value LIKE ? OR u.username LIKE ?
                   OR a.table_name LIKE ? OR a.action_type LIKE ?)",
            );
            let term = format!("%{search}%");
            for _ in 0..5 {
                bind_values.push(Value::Text(term.clone()));
            }
        }

        sql.push_str(" ORDER BY a.action_timestamp DESC, a.log_id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let action_text: String = row.get("action_type")?;
            let action = AuditAction::parse(&action_text).ok_or_else(|| {
                crate::repo::RepoError::InvalidData(format!(
                    "invalid action `{action_text}` in AuditLog.action_type"
                ))
            })?;
            entries.push(AuditEntry {
                log_id: row.get("log_id")?,
                username: row.get("username")?,
                action,
                table_name: row.get("table_name")?,
                record_id: row.get("record_id")?,
                old_value: row.get("old_value")?,
                new_value: row.get("new_value")?,
                timestamp: row.get("action_timestamp")?,
            });
        }
        Ok(entries)
    }
}

/// Policy-gated audit hook called by every mutating repository operation.
///
/// A no-op when the policy excludes the (table, action) pair; otherwise
/// appends on the caller's connection so the row commits with the mutation
/// it describes.
pub(crate) fn record_action(
    conn: &Connection,
    policy: &AuditPolicy,
    actor: UserId,
    action: AuditAction,
    table: &'static str,
    record_id: Option<i64>,
    old_value: Option<&serde_json::Value>,
    new_value: Option<&serde_json::Value>,
) -> RepoResult<()> {
    if !policy.records(table, action) {
        return Ok(());
    }
    insert_row(conn, actor, action, table, record_id, old_value, new_value)?;
    Ok(())
}

fn insert_row(
    conn: &Connection,
    actor: UserId,
    action: AuditAction,
    table: &str,
    record_id: Option<i64>,
    old_value: Option<&serde_json::Value>,
    new_value: Option<&serde_json::Value>,
) -> RepoResult<AuditLogId> {
    let old_text = old_value.map(serde_json::Value::to_string);
    let new_text = new_value.map(serde_json::Value::to_string);
    conn.execute(
        "INSERT INTO AuditLog
            (user_id, action_type, table_name, record_id, old_value, new_value)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![actor, action.as_db(), table, record_id, old_text, new_text],
    )?;
    Ok(conn.last_insert_rowid())
}
