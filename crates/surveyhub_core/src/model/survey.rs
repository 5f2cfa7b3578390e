//! Surveys and their typed field schemas.
//!
//! # Invariants
//! - A survey carries an ordered, non-empty field list once created.
//! - `field_order` values are 1-based and dense in creation order; edits
//!   append with the next free order value and never reorder.
//! - Field option lists are persisted as JSON text, `NULL` when empty.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// Surrogate key of a `Surveys` row.
pub type SurveyId = i64;
/// Surrogate key of a `Survey_Fields` row.
pub type FieldId = i64;

/// Input widget vocabulary for survey fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Select,
    Multiselect,
    Checkbox,
}

impl FieldType {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Checkbox => "checkbox",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "select" => Some(Self::Select),
            "multiselect" => Some(Self::Multiselect),
            "checkbox" => Some(Self::Checkbox),
            _ => None,
        }
    }
}

/// Stored survey header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub survey_id: SurveyId,
    pub name: String,
    pub created_by: UserId,
    /// Storage-formatted timestamp (`YYYY-MM-DD HH:MM:SS`).
    pub created_at: String,
    pub is_active: bool,
}

/// Stored field definition within a survey schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyField {
    pub field_id: FieldId,
    pub survey_id: SurveyId,
    pub field_type: FieldType,
    pub label: String,
    /// Choice values for select-like fields; empty for free-form fields.
    pub options: Vec<String>,
    pub required: bool,
    /// 1-based position within the survey.
    pub order: u32,
}

/// Field definition submitted when creating a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

/// Field definition submitted when editing a survey.
///
/// A present `field_id` updates that row in place without touching its
/// order; an absent one appends a new field at the end. Fields omitted from
/// an edit payload are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPatch {
    pub field_id: Option<FieldId>,
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

/// Serializes an option list for storage; empty lists become `NULL`.
pub fn encode_options(options: &[String]) -> Option<String> {
    if options.is_empty() {
        None
    } else {
        serde_json::to_string(options).ok()
    }
}

/// Parses a stored option column back into a list.
pub fn decode_options(raw: Option<&str>) -> Result<Vec<String>, serde_json::Error> {
    match raw {
        Some(text) => serde_json::from_str(text),
        None => Ok(Vec::new()),
    }
}
