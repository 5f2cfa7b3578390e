//! Authorization scoping queries.
//!
//! # Responsibility
//! - Derive which governorate a user belongs to from the region hierarchy.
//! - Serve the two independent survey-grant mechanisms: governorate links
//!   and explicit per-user grants.
//! - Replace the per-user grant set atomically after validation.
//!
//! # Invariants
//! - A user with no region mapping has an empty visible set.
//! - Grant replacement silently drops survey ids outside the user's
//!   governorate-linked set; the persisted subset is reported back.

use crate::model::audit::{tables, AuditAction, AuditPolicy};
use crate::model::region::GovernorateId;
use crate::model::survey::{Survey, SurveyId};
use crate::model::user::UserId;
use crate::repo::audit_repo::record_action;
use crate::repo::{ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use rusqlite::{params, Connection};
use serde_json::json;

/// (id, name) pair used by survey pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyListItem {
    pub survey_id: SurveyId,
    pub name: String,
}

/// Employee row scoped to a governorate, for oversight screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernorateEmployee {
    pub user_id: UserId,
    pub username: String,
    pub health_admin_name: String,
}

/// Repository interface for visibility derivation and grant maintenance.
pub trait AccessRepository {
    /// Resolves the governorate implied by the user's assigned region;
    /// `None` when the user has no region or the region maps to nothing.
    fn governorate_for_user(&self, user_id: UserId) -> RepoResult<Option<GovernorateId>>;

    /// Surveys linked to a governorate, newest first.
    fn governorate_surveys(&self, governorate_id: GovernorateId) -> RepoResult<Vec<Survey>>;

    /// Role-wide visibility: surveys linked to the user's derived
    /// governorate, name-ordered. Empty when the user is unscoped.
    fn allowed_surveys(&self, user_id: UserId) -> RepoResult<Vec<SurveyListItem>>;

    /// Explicit per-user grants, name-ordered. Independent of
    /// [`AccessRepository::allowed_surveys`].
    fn user_granted_surveys(&self, user_id: UserId) -> RepoResult<Vec<SurveyListItem>>;

    /// Validates each candidate against the user's governorate-linked
    /// surveys, then replaces the whole grant set atomically. Returns the
    /// ids actually persisted.
    fn replace_user_grants(
        &mut self,
        actor: UserId,
        user_id: UserId,
        survey_ids: &[SurveyId],
    ) -> RepoResult<Vec<SurveyId>>;

    /// Employees whose assigned region maps to the governorate.
    fn governorate_employees(
        &self,
        governorate_id: GovernorateId,
    ) -> RepoResult<Vec<GovernorateEmployee>>;
}

/// SQLite-backed access repository.
pub struct SqliteAccessRepository<'conn> {
    conn: &'conn mut Connection,
    policy: AuditPolicy,
}

impl<'conn> SqliteAccessRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection with the
    /// standard audit policy.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        Self::with_policy(conn, AuditPolicy::standard())
    }

    pub fn with_policy(conn: &'conn mut Connection, policy: AuditPolicy) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["Users", "HealthAdministrations", "SurveyGovernorate", "UserSurveys"],
        )?;
        Ok(Self { conn, policy })
    }
}

impl AccessRepository for SqliteAccessRepository<'_> {
    fn governorate_for_user(&self, user_id: UserId) -> RepoResult<Option<GovernorateId>> {
        governorate_for_user(self.conn, user_id)
    }

    fn governorate_surveys(&self, governorate_id: GovernorateId) -> RepoResult<Vec<Survey>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.survey_id, s.survey_name, s.created_by, s.created_at, s.is_active
             FROM Surveys s
             INNER JOIN SurveyGovernorate sg ON sg.survey_id = s.survey_id
             WHERE sg.governorate_id = ?1
             ORDER BY s.created_at DESC, s.survey_id DESC;",
        )?;
        let mut rows = stmt.query([governorate_id])?;
        let mut surveys = Vec::new();
        while let Some(row) = rows.next()? {
            surveys.push(Survey {
                survey_id: row.get("survey_id")?,
                name: row.get("survey_name")?,
                created_by: row.get("created_by")?,
                created_at: row.get("created_at")?,
                is_active: int_to_bool(row.get("is_active")?, "Surveys.is_active")?,
            });
        }
        Ok(surveys)
    }

    fn allowed_surveys(&self, user_id: UserId) -> RepoResult<Vec<SurveyListItem>> {
        let Some(governorate_id) = governorate_for_user(self.conn, user_id)? else {
            return Ok(Vec::new());
        };

        let mut stmt = self.conn.prepare(
            "SELECT s.survey_id, s.survey_name
             FROM Surveys s
             INNER JOIN SurveyGovernorate sg ON sg.survey_id = s.survey_id
             WHERE sg.governorate_id = ?1
             ORDER BY s.survey_name ASC;",
        )?;
        let items = collect_list_items(stmt.query([governorate_id])?);
        items
    }

    fn user_granted_surveys(&self, user_id: UserId) -> RepoResult<Vec<SurveyListItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.survey_id, s.survey_name
             FROM Surveys s
             INNER JOIN UserSurveys us ON us.survey_id = s.survey_id
             WHERE us.user_id = ?1
             ORDER BY s.survey_name ASC;",
        )?;
        let items = collect_list_items(stmt.query([user_id])?);
        items
    }

    fn replace_user_grants(
        &mut self,
        actor: UserId,
        user_id: UserId,
        survey_ids: &[SurveyId],
    ) -> RepoResult<Vec<SurveyId>> {
        let tx = self.conn.transaction()?;
        let governorate_id =
            governorate_for_user(&tx, user_id)?.ok_or(RepoError::NoRegionScope(user_id))?;

        let mut valid = Vec::new();
        {
            let mut check = tx.prepare(
                "SELECT EXISTS(
                    SELECT 1 FROM SurveyGovernorate
                    WHERE survey_id = ?1 AND governorate_id = ?2
                );",
            )?;
            for survey_id in survey_ids {
                let linked: i64 =
                    check.query_row(params![survey_id, governorate_id], |row| row.get(0))?;
                if linked == 1 && !valid.contains(survey_id) {
                    valid.push(*survey_id);
                }
            }
        }

        let old: Vec<SurveyId> = {
            let mut stmt =
                tx.prepare("SELECT survey_id FROM UserSurveys WHERE user_id = ?1 ORDER BY survey_id;")?;
            let mut rows = stmt.query([user_id])?;
            let mut ids = Vec::new();
            while let Some(row) = rows.next()? {
                ids.push(row.get(0)?);
            }
            ids
        };

        tx.execute("DELETE FROM UserSurveys WHERE user_id = ?1;", [user_id])?;
        {
            let mut insert =
                tx.prepare("INSERT INTO UserSurveys (user_id, survey_id) VALUES (?1, ?2);")?;
            for survey_id in &valid {
                insert.execute(params![user_id, survey_id])?;
            }
        }

        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Update,
            tables::USER_SURVEYS,
            Some(user_id),
            Some(&json!({ "survey_ids": old })),
            Some(&json!({ "survey_ids": valid })),
        )?;
        tx.commit()?;
        Ok(valid)
    }

    fn governorate_employees(
        &self,
        governorate_id: GovernorateId,
    ) -> RepoResult<Vec<GovernorateEmployee>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.user_id, u.username, ha.admin_name
             FROM Users u
             INNER JOIN HealthAdministrations ha ON ha.admin_id = u.assigned_region
             WHERE ha.governorate_id = ?1 AND u.role = 'employee'
             ORDER BY u.username ASC;",
        )?;
        let mut rows = stmt.query([governorate_id])?;
        let mut employees = Vec::new();
        while let Some(row) = rows.next()? {
            employees.push(GovernorateEmployee {
                user_id: row.get("user_id")?,
                username: row.get("username")?,
                health_admin_name: row.get("admin_name")?,
            });
        }
        Ok(employees)
    }
}

fn governorate_for_user(conn: &Connection, user_id: UserId) -> RepoResult<Option<GovernorateId>> {
    let mut stmt = conn.prepare(
        "SELECT ha.governorate_id
         FROM Users u
         INNER JOIN HealthAdministrations ha ON ha.admin_id = u.assigned_region
         WHERE u.user_id = ?1;",
    )?;
    let mut rows = stmt.query([user_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(row.get(0)?));
    }
    Ok(None)
}

fn collect_list_items(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<SurveyListItem>> {
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(SurveyListItem {
            survey_id: row.get(0)?,
            name: row.get(1)?,
        });
    }
    Ok(items)
}
