//! User account repository.
//!
//! # Responsibility
//! - Account CRUD with case-sensitive username uniqueness.
//! - Governorate-admin link maintenance.
//! - Before/after capture for the audit trail on account edits.
//!
//! # Invariants
//! - Uniqueness checks exclude the row being updated.
//! - The prior (username, role, assigned_region) tuple is captured inside
//!   the same transaction that mutates it.

use crate::model::audit::{tables, AuditAction, AuditPolicy};
use crate::model::region::{Governorate, GovernorateId, HealthAdminId};
use crate::model::user::{Role, User, UserAuditSnapshot, UserId};
use crate::repo::audit_repo::record_action;
use crate::repo::{ensure_connection_ready, is_constraint_violation, RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, Row, Transaction};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.@-]{2,63}$").expect("valid username regex"));

const USER_SELECT_SQL: &str = "SELECT
    user_id,
    username,
    password_hash,
    role,
    assigned_region,
    created_at,
    last_login
FROM Users";

/// Repository interface for account operations.
pub trait UserRepository {
    /// Creates an account. The password is already hashed by the caller.
    fn add_user(
        &mut self,
        actor: UserId,
        username: &str,
        password_hash: &str,
        role: Role,
        assigned_region: Option<HealthAdminId>,
    ) -> RepoResult<UserId>;

    /// Updates username/role/region, capturing the prior tuple for audit.
    fn update_user(
        &mut self,
        actor: UserId,
        user_id: UserId,
        username: &str,
        role: Role,
        assigned_region: Option<HealthAdminId>,
    ) -> RepoResult<()>;

    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    fn get_user_by_id(&self, user_id: UserId) -> RepoResult<Option<User>>;
    fn get_user_role(&self, user_id: UserId) -> RepoResult<Option<Role>>;

    /// Stamps the login timestamp with the storage engine's clock.
    fn update_last_login(&mut self, user_id: UserId) -> RepoResult<()>;

    /// Links a governorate-admin account to its governorate.
    fn add_governorate_admin(
        &mut self,
        actor: UserId,
        user_id: UserId,
        governorate_id: GovernorateId,
    ) -> RepoResult<()>;

    /// Resolves the governorate a governorate-admin is scoped to.
    fn governorate_for_admin(&self, user_id: UserId) -> RepoResult<Option<Governorate>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn mut Connection,
    policy: AuditPolicy,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection with the
    /// standard audit policy.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        Self::with_policy(conn, AuditPolicy::standard())
    }

    pub fn with_policy(conn: &'conn mut Connection, policy: AuditPolicy) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["Users", "GovernorateAdmins", "AuditLog"])?;
        Ok(Self { conn, policy })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn add_user(
        &mut self,
        actor: UserId,
        username: &str,
        password_hash: &str,
        role: Role,
        assigned_region: Option<HealthAdminId>,
    ) -> RepoResult<UserId> {
        validate_username(username)?;

        let tx = self.conn.transaction()?;
        if username_taken(&tx, username, None)? {
            return Err(RepoError::Duplicate {
                entity: "user",
                detail: format!("username `{username}` already exists"),
            });
        }

        tx.execute(
            "INSERT INTO Users (username, password_hash, role, assigned_region)
             VALUES (?1, ?2, ?3, ?4);",
            params![username, password_hash, role.as_db(), assigned_region],
        )?;
        let user_id = tx.last_insert_rowid();

        let snapshot = UserAuditSnapshot {
            username: username.to_string(),
            role,
            assigned_region,
        };
        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Insert,
            tables::USERS,
            Some(user_id),
            None,
            Some(&serde_json::to_value(&snapshot)?),
        )?;
        tx.commit()?;
        Ok(user_id)
    }

    fn update_user(
        &mut self,
        actor: UserId,
        user_id: UserId,
        username: &str,
        role: Role,
        assigned_region: Option<HealthAdminId>,
    ) -> RepoResult<()> {
        validate_username(username)?;

        let tx = self.conn.transaction()?;
        let old = load_audit_snapshot(&tx, user_id)?.ok_or(RepoError::NotFound {
            entity: "user",
            id: user_id,
        })?;

        if username_taken(&tx, username, Some(user_id))? {
            return Err(RepoError::Duplicate {
                entity: "user",
                detail: format!("username `{username}` already exists"),
            });
        }

        tx.execute(
            "UPDATE Users SET username = ?1, role = ?2, assigned_region = ?3
             WHERE user_id = ?4;",
            params![username, role.as_db(), assigned_region, user_id],
        )?;

        // The regional link is cleared when the updated role IS
        // governorate_admin. Product has not decided whether the trigger
        // should instead fire when the role ceases to be governorate_admin
        // (`role != Role::GovernorateAdmin`); keep the shipped behavior
        // until that decision lands.
        if role == Role::GovernorateAdmin {
            tx.execute(
                "DELETE FROM GovernorateAdmins WHERE user_id = ?1;",
                [user_id],
            )?;
        }

        let new = UserAuditSnapshot {
            username: username.to_string(),
            role,
            assigned_region,
        };
        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Update,
            tables::USERS,
            Some(user_id),
            Some(&serde_json::to_value(&old)?),
            Some(&serde_json::to_value(&new)?),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE username = ?1;"))?;
        let mut rows = stmt.query([username])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn get_user_by_id(&self, user_id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE user_id = ?1;"))?;
        let mut rows = stmt.query([user_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn get_user_role(&self, user_id: UserId) -> RepoResult<Option<Role>> {
        let mut stmt = self
            .conn
            .prepare("SELECT role FROM Users WHERE user_id = ?1;")?;
        let mut rows = stmt.query([user_id])?;
        if let Some(row) = rows.next()? {
            let role_text: String = row.get(0)?;
            let role = Role::parse(&role_text).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid role `{role_text}` in Users.role"))
            })?;
            return Ok(Some(role));
        }
        Ok(None)
    }

    fn update_last_login(&mut self, user_id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE Users SET last_login = CURRENT_TIMESTAMP WHERE user_id = ?1;",
            [user_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: user_id,
            });
        }
        Ok(())
    }

    fn add_governorate_admin(
        &mut self,
        actor: UserId,
        user_id: UserId,
        governorate_id: GovernorateId,
    ) -> RepoResult<()> {
        let tx = self.conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO GovernorateAdmins (user_id, governorate_id) VALUES (?1, ?2);",
            params![user_id, governorate_id],
        );
        if let Err(err) = inserted {
            if is_constraint_violation(&err) {
                return Err(RepoError::Duplicate {
                    entity: "governorate admin link",
                    detail: format!("user {user_id} is already linked to governorate {governorate_id}"),
                });
            }
            return Err(err.into());
        }

        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Insert,
            tables::USERS,
            Some(user_id),
            None,
            Some(&serde_json::json!({ "governorate_admin_of": governorate_id })),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn governorate_for_admin(&self, user_id: UserId) -> RepoResult<Option<Governorate>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.governorate_id, g.governorate_name, g.description
             FROM GovernorateAdmins ga
             INNER JOIN Governorates g ON g.governorate_id = ga.governorate_id
             WHERE ga.user_id = ?1;",
        )?;
        let mut rows = stmt.query([user_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(Governorate {
                governorate_id: row.get("governorate_id")?,
                name: row.get("governorate_name")?,
                description: row.get("description")?,
            }));
        }
        Ok(None)
    }
}

fn validate_username(username: &str) -> RepoResult<()> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(RepoError::InvalidData(format!(
            "username `{username}` must be 3-64 word characters"
        )))
    }
}

fn username_taken(
    tx: &Transaction<'_>,
    username: &str,
    exclude: Option<UserId>,
) -> RepoResult<bool> {
    let taken: i64 = match exclude {
        Some(user_id) => tx.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM Users WHERE username = ?1 AND user_id != ?2
            );",
            params![username, user_id],
            |row| row.get(0),
        )?,
        None => tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM Users WHERE username = ?1);",
            [username],
            |row| row.get(0),
        )?,
    };
    Ok(taken == 1)
}

fn load_audit_snapshot(
    tx: &Transaction<'_>,
    user_id: UserId,
) -> RepoResult<Option<UserAuditSnapshot>> {
    let mut stmt =
        tx.prepare("SELECT username, role, assigned_region FROM Users WHERE user_id = ?1;")?;
    let mut rows = stmt.query([user_id])?;
    if let Some(row) = rows.next()? {
        let role_text: String = row.get("role")?;
        let role = Role::parse(&role_text).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid role `{role_text}` in Users.role"))
        })?;
        return Ok(Some(UserAuditSnapshot {
            username: row.get("username")?,
            role,
            assigned_region: row.get("assigned_region")?,
        }));
    }
    Ok(None)
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in Users.role"))
    })?;
    Ok(User {
        user_id: row.get("user_id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        role,
        assigned_region: row.get("assigned_region")?,
        created_at: row.get("created_at")?,
        last_login: row.get("last_login")?,
    })
}
