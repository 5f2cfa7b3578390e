//! Survey responses and per-field answers.
//!
//! # Invariants
//! - Every answer row belongs to exactly one response.
//! - An answer's field must belong to the response's survey.
//! - Answer values are stored as text, empty string for absent input.

use crate::model::region::HealthAdminId;
use crate::model::survey::{FieldId, FieldType, SurveyId};
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// Surrogate key of a `Responses` row.
pub type ResponseId = i64;
/// Surrogate key of a `Response_Details` row.
pub type DetailId = i64;

/// One submission instance of a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub response_id: ResponseId,
    pub survey_id: SurveyId,
    pub user_id: UserId,
    pub region_id: HealthAdminId,
    /// Storage-formatted timestamp (`YYYY-MM-DD HH:MM:SS`).
    pub submitted_at: String,
    pub is_completed: bool,
}

/// One answer joined with its field metadata, for review screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDetail {
    pub detail_id: DetailId,
    pub field_id: FieldId,
    pub field_label: String,
    pub field_type: FieldType,
    pub field_options: Vec<String>,
    pub answer_value: String,
}

/// Response header joined across the region hierarchy, for review screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub response_id: ResponseId,
    pub survey_name: String,
    pub username: String,
    pub health_admin_name: String,
    pub governorate_name: String,
    pub submitted_at: String,
}
