//! Audit trail vocabulary and recording policy.
//!
//! # Invariants
//! - Audit rows are append-only; nothing updates or deletes them.
//! - Which (table, action) pairs get recorded is a reviewable policy value,
//!   not an accident of individual call sites.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Surrogate key of an `AuditLog` row.
pub type AuditLogId = i64;

/// Table-name constants used as audit hook keys.
pub mod tables {
    pub const GOVERNORATES: &str = "Governorates";
    pub const HEALTH_ADMINISTRATIONS: &str = "HealthAdministrations";
    pub const USERS: &str = "Users";
    pub const SURVEYS: &str = "Surveys";
    pub const SURVEY_FIELDS: &str = "Survey_Fields";
    pub const RESPONSES: &str = "Responses";
    pub const RESPONSE_DETAILS: &str = "Response_Details";
    pub const USER_SURVEYS: &str = "UserSurveys";
}

/// Kind of mutation recorded in the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One recorded mutation, joined with the actor's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub log_id: AuditLogId,
    pub username: String,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: Option<i64>,
    /// JSON text of the state before the mutation, when captured.
    pub old_value: Option<String>,
    /// JSON text of the state after the mutation, when captured.
    pub new_value: Option<String>,
    pub timestamp: String,
}

/// Filter set for audit queries. All criteria are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Exact table-name match.
    pub table: Option<String>,
    /// Exact action match.
    pub action: Option<AuditAction>,
    /// Substring match on the actor's username.
    pub username: Option<String>,
    /// Inclusive calendar-date lower bound.
    pub from: Option<NaiveDate>,
    /// Inclusive calendar-date upper bound.
    pub to: Option<NaiveDate>,
    /// Substring match across values, username, table and action columns.
    pub search: Option<String>,
}

/// The set of (table, action) pairs whose mutations are recorded.
///
/// Mutating repository operations always invoke the audit hook; this value
/// decides which invocations become rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPolicy {
    recorded: BTreeSet<(&'static str, AuditAction)>,
}

impl AuditPolicy {
    /// The shipped policy: account edits are recorded, nothing else.
    pub fn standard() -> Self {
        Self {
            recorded: BTreeSet::from([(tables::USERS, AuditAction::Update)]),
        }
    }

    /// Records every mutation routed through the hook.
    pub fn full() -> Self {
        let mut recorded = BTreeSet::new();
        for table in [
            tables::GOVERNORATES,
            tables::HEALTH_ADMINISTRATIONS,
            tables::USERS,
            tables::SURVEYS,
            tables::SURVEY_FIELDS,
            tables::RESPONSES,
            tables::RESPONSE_DETAILS,
            tables::USER_SURVEYS,
        ] {
            for action in [AuditAction::Insert, AuditAction::Update, AuditAction::Delete] {
                recorded.insert((table, action));
            }
        }
        Self { recorded }
    }

    /// Records nothing.
    pub fn none() -> Self {
        Self {
            recorded: BTreeSet::new(),
        }
    }

    /// Adds one (table, action) pair to the recorded set.
    pub fn with(mut self, table: &'static str, action: AuditAction) -> Self {
        self.recorded.insert((table, action));
        self
    }

    pub fn records(&self, table: &str, action: AuditAction) -> bool {
        self.recorded
            .iter()
            .any(|(t, a)| *t == table && *a == action)
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::{tables, AuditAction, AuditPolicy};

    #[test]
    fn standard_policy_records_only_user_updates() {
        let policy = AuditPolicy::standard();
        assert!(policy.records(tables::USERS, AuditAction::Update));
        assert!(!policy.records(tables::USERS, AuditAction::Insert));
        assert!(!policy.records(tables::SURVEYS, AuditAction::Update));
    }

    #[test]
    fn policy_is_extensible_per_pair() {
        let policy = AuditPolicy::standard().with(tables::SURVEYS, AuditAction::Delete);
        assert!(policy.records(tables::SURVEYS, AuditAction::Delete));
        assert!(!policy.records(tables::SURVEYS, AuditAction::Insert));
    }

    #[test]
    fn action_db_values_roundtrip() {
        for action in [AuditAction::Insert, AuditAction::Update, AuditAction::Delete] {
            assert_eq!(AuditAction::parse(action.as_db()), Some(action));
        }
        assert_eq!(AuditAction::parse("UPSERT"), None);
    }
}
