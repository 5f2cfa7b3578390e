//! Response and answer repository.
//!
//! # Responsibility
//! - Persist submissions and their per-field answers.
//! - Serve review reads joined across the region hierarchy.
//! - Evaluate the per-day completion predicate in the storage engine.
//!
//! # Invariants
//! - Answer values are text; absent input is stored as `""`, never NULL.
//! - An answer's field must belong to the response's survey.
//! - A second completed response for the same (user, survey, day) is
//!   rejected by the storage engine's unique index.

use crate::model::audit::{tables, AuditAction, AuditPolicy};
use crate::model::region::HealthAdminId;
use crate::model::response::{DetailId, Response, ResponseDetail, ResponseId, ResponseInfo};
use crate::model::survey::{decode_options, FieldId, FieldType, SurveyId};
use crate::model::user::UserId;
use crate::repo::audit_repo::record_action;
use crate::repo::{ensure_connection_ready, int_to_bool, is_unique_violation, RepoError, RepoResult};
use rusqlite::{params, Connection};
use serde_json::json;

/// Repository interface for submissions and answers.
pub trait ResponseRepository {
    /// Creates one response row and returns its id. A completed write that
    /// collides with an existing completed response for the same user,
    /// survey and calendar day is rejected.
    fn save_response(
        &mut self,
        survey_id: SurveyId,
        user_id: UserId,
        region_id: HealthAdminId,
        is_completed: bool,
    ) -> RepoResult<ResponseId>;

    /// Stores one answer; `None` is coerced to the empty string.
    fn save_response_detail(
        &mut self,
        response_id: ResponseId,
        field_id: FieldId,
        value: Option<&str>,
    ) -> RepoResult<()>;

    /// Returns the response's answers joined with field metadata, ordered
    /// by `field_order`.
    fn response_details(&self, response_id: ResponseId) -> RepoResult<Vec<ResponseDetail>>;

    /// Amends one stored answer in place.
    fn update_response_detail(
        &mut self,
        actor: UserId,
        detail_id: DetailId,
        new_value: &str,
    ) -> RepoResult<()>;

    /// Returns the response header joined across survey/user/region.
    fn response_info(&self, response_id: ResponseId) -> RepoResult<Option<ResponseInfo>>;

    /// Lists a survey's responses, newest first.
    fn responses_for_survey(&self, survey_id: SurveyId) -> RepoResult<Vec<Response>>;

    /// Pure predicate: has this user already completed this survey on the
    /// storage engine's current calendar date?
    fn has_completed_survey_today(
        &self,
        user_id: UserId,
        survey_id: SurveyId,
    ) -> RepoResult<bool>;
}

/// SQLite-backed response repository.
pub struct SqliteResponseRepository<'conn> {
    conn: &'conn mut Connection,
    policy: AuditPolicy,
}

impl<'conn> SqliteResponseRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection with the
    /// standard audit policy.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        Self::with_policy(conn, AuditPolicy::standard())
    }

    pub fn with_policy(conn: &'conn mut Connection, policy: AuditPolicy) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["Responses", "Response_Details", "Survey_Fields"])?;
        Ok(Self { conn, policy })
    }
}

impl ResponseRepository for SqliteResponseRepository<'_> {
    fn save_response(
        &mut self,
        survey_id: SurveyId,
        user_id: UserId,
        region_id: HealthAdminId,
        is_completed: bool,
    ) -> RepoResult<ResponseId> {
        let inserted = self.conn.execute(
            "INSERT INTO Responses (survey_id, user_id, region_id, is_completed)
             VALUES (?1, ?2, ?3, ?4);",
            params![survey_id, user_id, region_id, is_completed],
        );
        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(err) if is_completed && is_unique_violation(&err) => {
                Err(RepoError::CompletionConflict { user_id, survey_id })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn save_response_detail(
        &mut self,
        response_id: ResponseId,
        field_id: FieldId,
        value: Option<&str>,
    ) -> RepoResult<()> {
        let tx = self.conn.transaction()?;
        let belongs: i64 = tx.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM Responses r
                INNER JOIN Survey_Fields sf ON sf.survey_id = r.survey_id
                WHERE r.response_id = ?1 AND sf.field_id = ?2
            );",
            params![response_id, field_id],
            |row| row.get(0),
        )?;
        if belongs != 1 {
            return Err(RepoError::InvalidData(format!(
                "field {field_id} does not belong to the survey of response {response_id}"
            )));
        }

        tx.execute(
            "INSERT INTO Response_Details (response_id, field_id, answer_value)
             VALUES (?1, ?2, ?3);",
            params![response_id, field_id, value.unwrap_or("")],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn response_details(&self, response_id: ResponseId) -> RepoResult<Vec<ResponseDetail>> {
        let mut stmt = self.conn.prepare(
            "SELECT rd.detail_id, rd.field_id, sf.field_label, sf.field_type,
                    sf.field_options, rd.answer_value
             FROM Response_Details rd
             INNER JOIN Survey_Fields sf ON sf.field_id = rd.field_id
             WHERE rd.response_id = ?1
             ORDER BY sf.field_order ASC;",
        )?;
        let mut rows = stmt.query([response_id])?;
        let mut details = Vec::new();
        while let Some(row) = rows.next()? {
            let type_text: String = row.get("field_type")?;
            let field_type = FieldType::parse(&type_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid field type `{type_text}` in Survey_Fields.field_type"
                ))
            })?;
            let raw_options: Option<String> = row.get("field_options")?;
            details.push(ResponseDetail {
                detail_id: row.get("detail_id")?,
                field_id: row.get("field_id")?,
                field_label: row.get("field_label")?,
                field_type,
                field_options: decode_options(raw_options.as_deref())?,
                answer_value: row.get::<_, Option<String>>("answer_value")?.unwrap_or_default(),
            });
        }
        Ok(details)
    }

    fn update_response_detail(
        &mut self,
        actor: UserId,
        detail_id: DetailId,
        new_value: &str,
    ) -> RepoResult<()> {
        let tx = self.conn.transaction()?;
        let old_value: Option<String> = {
            let mut stmt =
                tx.prepare("SELECT answer_value FROM Response_Details WHERE detail_id = ?1;")?;
            let mut rows = stmt.query([detail_id])?;
            match rows.next()? {
                Some(row) => row.get(0)?,
                None => {
                    return Err(RepoError::NotFound {
                        entity: "response detail",
                        id: detail_id,
                    });
                }
            }
        };

        tx.execute(
            "UPDATE Response_Details SET answer_value = ?1 WHERE detail_id = ?2;",
            params![new_value, detail_id],
        )?;
        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Update,
            tables::RESPONSE_DETAILS,
            Some(detail_id),
            Some(&json!({ "answer_value": old_value })),
            Some(&json!({ "answer_value": new_value })),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn response_info(&self, response_id: ResponseId) -> RepoResult<Option<ResponseInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.response_id, s.survey_name, u.username, ha.admin_name,
                    g.governorate_name, r.submission_date
             FROM Responses r
             INNER JOIN Surveys s ON s.survey_id = r.survey_id
             INNER JOIN Users u ON u.user_id = r.user_id
             INNER JOIN HealthAdministrations ha ON ha.admin_id = r.region_id
             INNER JOIN Governorates g ON g.governorate_id = ha.governorate_id
             WHERE r.response_id = ?1;",
        )?;
        let mut rows = stmt.query([response_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(ResponseInfo {
                response_id: row.get("response_id")?,
                survey_name: row.get("survey_name")?,
                username: row.get("username")?,
                health_admin_name: row.get("admin_name")?,
                governorate_name: row.get("governorate_name")?,
                submitted_at: row.get("submission_date")?,
            }));
        }
        Ok(None)
    }

    fn responses_for_survey(&self, survey_id: SurveyId) -> RepoResult<Vec<Response>> {
        let mut stmt = self.conn.prepare(
            "SELECT response_id, survey_id, user_id, region_id, submission_date, is_completed
             FROM Responses
             WHERE survey_id = ?1
             ORDER BY submission_date DESC, response_id DESC;",
        )?;
        let mut rows = stmt.query([survey_id])?;
        let mut responses = Vec::new();
        while let Some(row) = rows.next()? {
            responses.push(Response {
                response_id: row.get("response_id")?,
                survey_id: row.get("survey_id")?,
                user_id: row.get("user_id")?,
                region_id: row.get("region_id")?,
                submitted_at: row.get("submission_date")?,
                is_completed: int_to_bool(row.get("is_completed")?, "Responses.is_completed")?,
            });
        }
        Ok(responses)
    }

    fn has_completed_survey_today(
        &self,
        user_id: UserId,
        survey_id: SurveyId,
    ) -> RepoResult<bool> {
        let completed: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM Responses
                WHERE user_id = ?1 AND survey_id = ?2 AND is_completed = 1
                  AND DATE(submission_date) = DATE('now')
            );",
            params![user_id, survey_id],
            |row| row.get(0),
        )?;
        Ok(completed == 1)
    }
}
