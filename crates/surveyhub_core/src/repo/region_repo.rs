//! Governorate and health-administration repository.
//!
//! # Responsibility
//! - Maintain the long-lived regional reference data.
//! - Enforce name uniqueness before insert instead of relying on the
//!   constraint error alone.
//!
//! # Invariants
//! - Governorate names are unique globally.
//! - Health administration names are unique within one governorate.

use crate::model::audit::{tables, AuditAction, AuditPolicy};
use crate::model::region::{Governorate, GovernorateId, HealthAdminId, HealthAdministration};
use crate::model::user::UserId;
use crate::repo::audit_repo::record_action;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection};
use serde_json::json;

/// Repository interface for regional reference data.
pub trait RegionRepository {
    /// Creates a governorate; names collide globally.
    fn add_governorate(
        &mut self,
        actor: UserId,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<GovernorateId>;

    /// Lists all governorates, name-ordered.
    fn list_governorates(&self) -> RepoResult<Vec<Governorate>>;

    /// Creates a health administration; duplicates are scoped by
    /// (name, governorate). Reports success only, no identifier.
    fn add_health_admin(
        &mut self,
        actor: UserId,
        name: &str,
        description: Option<&str>,
        governorate_id: GovernorateId,
    ) -> RepoResult<()>;

    /// Lists all health administrations, name-ordered.
    fn list_health_admins(&self) -> RepoResult<Vec<HealthAdministration>>;

    /// Resolves one health administration's display name.
    fn health_admin_name(&self, admin_id: HealthAdminId) -> RepoResult<Option<String>>;
}

/// SQLite-backed region repository.
pub struct SqliteRegionRepository<'conn> {
    conn: &'conn mut Connection,
    policy: AuditPolicy,
}

impl<'conn> SqliteRegionRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection with the
    /// standard audit policy.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        Self::with_policy(conn, AuditPolicy::standard())
    }

    pub fn with_policy(conn: &'conn mut Connection, policy: AuditPolicy) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["Governorates", "HealthAdministrations"])?;
        Ok(Self { conn, policy })
    }
}

impl RegionRepository for SqliteRegionRepository<'_> {
    fn add_governorate(
        &mut self,
        actor: UserId,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<GovernorateId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidData(
                "governorate name cannot be empty".to_string(),
            ));
        }

        let tx = self.conn.transaction()?;
        let taken: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM Governorates WHERE governorate_name = ?1);",
            [name],
            |row| row.get(0),
        )?;
        if taken == 1 {
            return Err(RepoError::Duplicate {
                entity: "governorate",
                detail: format!("name `{name}` already exists"),
            });
        }

        tx.execute(
            "INSERT INTO Governorates (governorate_name, description) VALUES (?1, ?2);",
            params![name, description],
        )?;
        let governorate_id = tx.last_insert_rowid();
        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Insert,
            tables::GOVERNORATES,
            Some(governorate_id),
            None,
            Some(&json!({ "governorate_name": name })),
        )?;
        tx.commit()?;
        Ok(governorate_id)
    }

    fn list_governorates(&self) -> RepoResult<Vec<Governorate>> {
        let mut stmt = self.conn.prepare(
            "SELECT governorate_id, governorate_name, description
             FROM Governorates
             ORDER BY governorate_name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut governorates = Vec::new();
        while let Some(row) = rows.next()? {
            governorates.push(Governorate {
                governorate_id: row.get("governorate_id")?,
                name: row.get("governorate_name")?,
                description: row.get("description")?,
            });
        }
        Ok(governorates)
    }

    fn add_health_admin(
        &mut self,
        actor: UserId,
        name: &str,
        description: Option<&str>,
        governorate_id: GovernorateId,
    ) -> RepoResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidData(
                "health administration name cannot be empty".to_string(),
            ));
        }

        let tx = self.conn.transaction()?;
        let taken: i64 = tx.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM HealthAdministrations
                WHERE admin_name = ?1 AND governorate_id = ?2
            );",
            params![name, governorate_id],
            |row| row.get(0),
        )?;
        if taken == 1 {
            return Err(RepoError::Duplicate {
                entity: "health administration",
                detail: format!("name `{name}` already exists in governorate {governorate_id}"),
            });
        }

        tx.execute(
            "INSERT INTO HealthAdministrations (admin_name, description, governorate_id)
             VALUES (?1, ?2, ?3);",
            params![name, description, governorate_id],
        )?;
        let admin_id = tx.last_insert_rowid();
        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Insert,
            tables::HEALTH_ADMINISTRATIONS,
            Some(admin_id),
            None,
            Some(&json!({ "admin_name": name, "governorate_id": governorate_id })),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list_health_admins(&self) -> RepoResult<Vec<HealthAdministration>> {
        let mut stmt = self.conn.prepare(
            "SELECT admin_id, admin_name, description, governorate_id
             FROM HealthAdministrations
             ORDER BY admin_name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut admins = Vec::new();
        while let Some(row) = rows.next()? {
            admins.push(HealthAdministration {
                admin_id: row.get("admin_id")?,
                name: row.get("admin_name")?,
                description: row.get("description")?,
                governorate_id: row.get("governorate_id")?,
            });
        }
        Ok(admins)
    }

    fn health_admin_name(&self, admin_id: HealthAdminId) -> RepoResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT admin_name FROM HealthAdministrations WHERE admin_id = ?1;")?;
        let mut rows = stmt.query([admin_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row.get(0)?));
        }
        Ok(None)
    }
}
