//! Snapshot source for the spreadsheet export adapter.
//!
//! # Responsibility
//! - Build one flattened record per response: base columns joined across
//!   the region hierarchy, plus one column per survey field.
//!
//! # Invariants
//! - The column set is deterministic: derived from the survey's field
//!   definitions in `field_order`, never from whichever answers happen to
//!   exist.
//! - A response with no stored answer for a field gets a blank cell.
//! - Rows are ordered newest first.

use crate::model::survey::SurveyId;
use crate::repo::{ensure_connection_ready, RepoResult};
use rusqlite::Connection;
use std::collections::HashMap;

/// Fixed columns preceding the per-field columns.
pub const BASE_COLUMNS: [&str; 6] = [
    "Response ID",
    "Username",
    "Health Administration",
    "Governorate",
    "Submitted At",
    "Status",
];

/// Fully materialized export payload for one survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub survey_name: String,
    /// Base columns followed by field labels in `field_order`.
    pub header: Vec<String>,
    /// One row per response, aligned with `header`.
    pub rows: Vec<Vec<String>>,
}

/// Read-only source of export snapshots.
pub trait SnapshotSource {
    /// Builds the survey's snapshot; `None` when the survey is unknown.
    /// A survey with no responses yields an empty `rows` vector.
    fn survey_snapshot(&self, survey_id: SurveyId) -> RepoResult<Option<Snapshot>>;
}

/// SQLite-backed snapshot source.
pub struct SqliteSnapshotSource<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSnapshotSource<'conn> {
    /// Constructs a source from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["Surveys", "Survey_Fields", "Responses", "Response_Details"],
        )?;
        Ok(Self { conn })
    }
}

impl SnapshotSource for SqliteSnapshotSource<'_> {
    fn survey_snapshot(&self, survey_id: SurveyId) -> RepoResult<Option<Snapshot>> {
        let survey_name: Option<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT survey_name FROM Surveys WHERE survey_id = ?1;")?;
            let mut rows = stmt.query([survey_id])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };
        let Some(survey_name) = survey_name else {
            return Ok(None);
        };

        // Field labels define the per-field columns, in schema order.
        let mut field_columns: Vec<(i64, String)> = Vec::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT field_id, field_label FROM Survey_Fields
                 WHERE survey_id = ?1 ORDER BY field_order ASC;",
            )?;
            let mut rows = stmt.query([survey_id])?;
            while let Some(row) = rows.next()? {
                field_columns.push((row.get(0)?, row.get(1)?));
            }
        }
        let column_of: HashMap<i64, usize> = field_columns
            .iter()
            .enumerate()
            .map(|(index, (field_id, _))| (*field_id, BASE_COLUMNS.len() + index))
            .collect();

        let mut header: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
        header.extend(field_columns.iter().map(|(_, label)| label.clone()));

        let mut rows_out: Vec<Vec<String>> = Vec::new();
        let mut detail_stmt = self.conn.prepare(
            "SELECT field_id, answer_value FROM Response_Details WHERE response_id = ?1;",
        )?;
        let mut response_stmt = self.conn.prepare(
            "SELECT r.response_id, u.username, ha.admin_name, g.governorate_name,
                    r.submission_date, r.is_completed
             FROM Responses r
             INNER JOIN Users u ON u.user_id = r.user_id
             INNER JOIN HealthAdministrations ha ON ha.admin_id = r.region_id
             INNER JOIN Governorates g ON g.governorate_id = ha.governorate_id
             WHERE r.survey_id = ?1
             ORDER BY r.submission_date DESC, r.response_id DESC;",
        )?;
        let mut responses = response_stmt.query([survey_id])?;
        while let Some(row) = responses.next()? {
            let response_id: i64 = row.get("response_id")?;
            let completed: i64 = row.get("is_completed")?;
            let mut record = vec![String::new(); header.len()];
            record[0] = response_id.to_string();
            record[1] = row.get("username")?;
            record[2] = row.get("admin_name")?;
            record[3] = row.get("governorate_name")?;
            record[4] = row.get("submission_date")?;
            let status = if completed == 1 { "completed" } else { "draft" };
            record[5] = status.to_string();

            let mut details = detail_stmt.query([response_id])?;
            while let Some(detail) = details.next()? {
                let field_id: i64 = detail.get(0)?;
                if let Some(&column) = column_of.get(&field_id) {
                    record[column] = detail.get::<_, Option<String>>(1)?.unwrap_or_default();
                }
            }
            rows_out.push(record);
        }

        Ok(Some(Snapshot {
            survey_name,
            header,
            rows: rows_out,
        }))
    }
}
