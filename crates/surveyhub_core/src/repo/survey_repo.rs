//! Survey and field-schema repository.
//!
//! # Responsibility
//! - Atomic survey authoring: header, governorate links and ordered fields
//!   commit together or not at all.
//! - Additive-only field edits; hard delete with full cascade.
//!
//! # Invariants
//! - `field_order` is assigned 1..N in input order at creation.
//! - Edits never remove or reorder fields; new fields append at
//!   max(existing order) + 1.
//! - Deleting a survey leaves no dependent row behind in any table.

use crate::model::audit::{tables, AuditAction, AuditPolicy};
use crate::model::region::GovernorateId;
use crate::model::survey::{
    decode_options, encode_options, FieldPatch, FieldSpec, Survey, SurveyField, SurveyId,
};
use crate::model::user::UserId;
use crate::repo::audit_repo::record_action;
use crate::repo::{ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use serde_json::json;

/// Repository interface for survey authoring and reads.
pub trait SurveyRepository {
    /// Creates a survey with its ordered fields and governorate links in one
    /// transaction. The field list must be non-empty.
    fn create_survey(
        &mut self,
        actor: UserId,
        name: &str,
        fields: &[FieldSpec],
        governorate_ids: &[GovernorateId],
    ) -> RepoResult<SurveyId>;

    /// Updates the survey header and applies additive-only field edits:
    /// patches with an id update that field in place, patches without an id
    /// append. Fields omitted from the list are left untouched.
    fn update_survey(
        &mut self,
        actor: UserId,
        survey_id: SurveyId,
        name: &str,
        is_active: bool,
        fields: &[FieldPatch],
    ) -> RepoResult<()>;

    /// Hard-deletes a survey, cascading over answers, responses, fields and
    /// grant links in dependency order.
    fn delete_survey(&mut self, actor: UserId, survey_id: SurveyId) -> RepoResult<()>;

    fn get_survey(&self, survey_id: SurveyId) -> RepoResult<Option<Survey>>;
    fn list_surveys(&self) -> RepoResult<Vec<Survey>>;

    /// Returns the survey's fields ordered by `field_order`.
    fn survey_fields(&self, survey_id: SurveyId) -> RepoResult<Vec<SurveyField>>;
}

/// SQLite-backed survey repository.
pub struct SqliteSurveyRepository<'conn> {
    conn: &'conn mut Connection,
    policy: AuditPolicy,
}

impl<'conn> SqliteSurveyRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection with the
    /// standard audit policy.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        Self::with_policy(conn, AuditPolicy::standard())
    }

    pub fn with_policy(conn: &'conn mut Connection, policy: AuditPolicy) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["Surveys", "Survey_Fields", "SurveyGovernorate", "UserSurveys"],
        )?;
        Ok(Self { conn, policy })
    }
}

impl SurveyRepository for SqliteSurveyRepository<'_> {
    fn create_survey(
        &mut self,
        actor: UserId,
        name: &str,
        fields: &[FieldSpec],
        governorate_ids: &[GovernorateId],
    ) -> RepoResult<SurveyId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidData(
                "survey name cannot be empty".to_string(),
            ));
        }
        if fields.is_empty() {
            return Err(RepoError::InvalidData(
                "survey must carry at least one field".to_string(),
            ));
        }
        for field in fields {
            validate_label(&field.label)?;
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO Surveys (survey_name, created_by) VALUES (?1, ?2);",
            params![name, actor],
        )?;
        let survey_id = tx.last_insert_rowid();

        {
            let mut link = tx.prepare(
                "INSERT INTO SurveyGovernorate (survey_id, governorate_id) VALUES (?1, ?2);",
            )?;
            for governorate_id in governorate_ids {
                link.execute(params![survey_id, governorate_id])?;
            }

            let mut insert_field = tx.prepare(
                "INSERT INTO Survey_Fields
                    (survey_id, field_type, field_label, field_options, is_required, field_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            )?;
            for (index, field) in fields.iter().enumerate() {
                insert_field.execute(params![
                    survey_id,
                    field.field_type.as_db(),
                    field.label,
                    encode_options(&field.options),
                    field.required,
                    index as i64 + 1,
                ])?;
            }
        }

        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Insert,
            tables::SURVEYS,
            Some(survey_id),
            None,
            Some(&json!({ "survey_name": name, "field_count": fields.len() })),
        )?;
        tx.commit()?;
        Ok(survey_id)
    }

    fn update_survey(
        &mut self,
        actor: UserId,
        survey_id: SurveyId,
        name: &str,
        is_active: bool,
        fields: &[FieldPatch],
    ) -> RepoResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidData(
                "survey name cannot be empty".to_string(),
            ));
        }
        for field in fields {
            validate_label(&field.label)?;
        }

        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE Surveys SET survey_name = ?1, is_active = ?2 WHERE survey_id = ?3;",
            params![name, is_active, survey_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "survey",
                id: survey_id,
            });
        }

        for field in fields {
            match field.field_id {
                Some(field_id) => {
                    let changed = tx.execute(
                        "UPDATE Survey_Fields
                         SET field_label = ?1, field_type = ?2, field_options = ?3,
                             is_required = ?4
                         WHERE field_id = ?5 AND survey_id = ?6;",
                        params![
                            field.label,
                            field.field_type.as_db(),
                            encode_options(&field.options),
                            field.required,
                            field_id,
                            survey_id,
                        ],
                    )?;
                    if changed == 0 {
                        return Err(RepoError::NotFound {
                            entity: "survey field",
                            id: field_id,
                        });
                    }
                }
                None => {
                    let max_order: i64 = tx.query_row(
                        "SELECT COALESCE(MAX(field_order), 0) FROM Survey_Fields
                         WHERE survey_id = ?1;",
                        [survey_id],
                        |row| row.get(0),
                    )?;
                    tx.execute(
                        "INSERT INTO Survey_Fields
                            (survey_id, field_label, field_type, field_options, is_required,
                             field_order)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                        params![
                            survey_id,
                            field.label,
                            field.field_type.as_db(),
                            encode_options(&field.options),
                            field.required,
                            max_order + 1,
                        ],
                    )?;
                }
            }
        }

        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Update,
            tables::SURVEYS,
            Some(survey_id),
            None,
            Some(&json!({ "survey_name": name, "is_active": is_active })),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_survey(&mut self, actor: UserId, survey_id: SurveyId) -> RepoResult<()> {
        let tx = self.conn.transaction()?;
        let old_name: Option<String> = {
            let mut stmt =
                tx.prepare("SELECT survey_name FROM Surveys WHERE survey_id = ?1;")?;
            let mut rows = stmt.query([survey_id])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };
        let old_name = old_name.ok_or(RepoError::NotFound {
            entity: "survey",
            id: survey_id,
        })?;

        // Dependency order; foreign_keys=ON makes any other order fail.
        tx.execute(
            "DELETE FROM Response_Details
             WHERE response_id IN (SELECT response_id FROM Responses WHERE survey_id = ?1);",
            [survey_id],
        )?;
        tx.execute("DELETE FROM Responses WHERE survey_id = ?1;", [survey_id])?;
        tx.execute("DELETE FROM Survey_Fields WHERE survey_id = ?1;", [survey_id])?;
        tx.execute("DELETE FROM UserSurveys WHERE survey_id = ?1;", [survey_id])?;
        tx.execute(
            "DELETE FROM SurveyGovernorate WHERE survey_id = ?1;",
            [survey_id],
        )?;
        tx.execute("DELETE FROM Surveys WHERE survey_id = ?1;", [survey_id])?;

        record_action(
            &tx,
            &self.policy,
            actor,
            AuditAction::Delete,
            tables::SURVEYS,
            Some(survey_id),
            Some(&json!({ "survey_name": old_name })),
            None,
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_survey(&self, survey_id: SurveyId) -> RepoResult<Option<Survey>> {
        let mut stmt = self.conn.prepare(
            "SELECT survey_id, survey_name, created_by, created_at, is_active
             FROM Surveys WHERE survey_id = ?1;",
        )?;
        let mut rows = stmt.query([survey_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_survey_row(row)?));
        }
        Ok(None)
    }

    fn list_surveys(&self) -> RepoResult<Vec<Survey>> {
        let mut stmt = self.conn.prepare(
            "SELECT survey_id, survey_name, created_by, created_at, is_active
             FROM Surveys ORDER BY created_at DESC, survey_id DESC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut surveys = Vec::new();
        while let Some(row) = rows.next()? {
            surveys.push(parse_survey_row(row)?);
        }
        Ok(surveys)
    }

    fn survey_fields(&self, survey_id: SurveyId) -> RepoResult<Vec<SurveyField>> {
        let mut stmt = self.conn.prepare(
            "SELECT field_id, survey_id, field_type, field_label, field_options,
                    is_required, field_order
             FROM Survey_Fields
             WHERE survey_id = ?1
             ORDER BY field_order ASC;",
        )?;
        let mut rows = stmt.query([survey_id])?;
        let mut fields = Vec::new();
        while let Some(row) = rows.next()? {
            let type_text: String = row.get("field_type")?;
            let field_type = crate::model::survey::FieldType::parse(&type_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid field type `{type_text}` in Survey_Fields.field_type"
                ))
            })?;
            let raw_options: Option<String> = row.get("field_options")?;
            fields.push(SurveyField {
                field_id: row.get("field_id")?,
                survey_id: row.get("survey_id")?,
                field_type,
                label: row.get("field_label")?,
                options: decode_options(raw_options.as_deref())?,
                required: int_to_bool(row.get("is_required")?, "Survey_Fields.is_required")?,
                order: row.get("field_order")?,
            });
        }
        Ok(fields)
    }
}

fn validate_label(label: &str) -> RepoResult<()> {
    if label.trim().is_empty() {
        return Err(RepoError::InvalidData(
            "field label cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn parse_survey_row(row: &Row<'_>) -> RepoResult<Survey> {
    Ok(Survey {
        survey_id: row.get("survey_id")?,
        name: row.get("survey_name")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        is_active: int_to_bool(row.get("is_active")?, "Surveys.is_active")?,
    })
}
