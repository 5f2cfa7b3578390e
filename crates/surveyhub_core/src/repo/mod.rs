//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per aggregate.
//! - Isolate SQL details from service/business orchestration.
//!
//! # Invariants
//! - Every mutating operation is one transaction: committed whole or not at
//!   all, with the connection released on every exit path.
//! - Mutating operations take an explicit actor id and route through the
//!   audit hook; `AuditPolicy` decides what is recorded.
//! - "Not found" reads return `Ok(None)`; constraint violations surface as
//!   semantic errors, never panics.

use crate::db::DbError;
use crate::model::survey::SurveyId;
use crate::model::user::UserId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod access_repo;
pub mod audit_repo;
pub mod export_repo;
pub mod region_repo;
pub mod response_repo;
pub mod survey_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// The addressed row does not exist.
    NotFound { entity: &'static str, id: i64 },
    /// A uniqueness rule was violated.
    Duplicate { entity: &'static str, detail: String },
    /// A completed response already exists for this (user, survey, day).
    CompletionConflict { user_id: UserId, survey_id: SurveyId },
    /// The user has no region mapping to a governorate.
    NoRegionScope(UserId),
    /// Input or persisted state violates a domain rule.
    InvalidData(String),
    MissingRequiredTable(&'static str),
    UninitializedConnection { expected_version: u32, actual_version: u32 },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Duplicate { entity, detail } => {
                write!(f, "duplicate {entity}: {detail}")
            }
            Self::CompletionConflict { user_id, survey_id } => write!(
                f,
                "user {user_id} already completed survey {survey_id} today"
            ),
            Self::NoRegionScope(user_id) => {
                write!(f, "user {user_id} is not mapped to a governorate")
            }
            Self::InvalidData(message) => write!(f, "invalid data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` is missing")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(format!("malformed JSON payload: {value}"))
    }
}

/// Returns whether the error is a SQLite uniqueness/constraint failure.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(info, _)
            if info.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Returns whether the error is specifically a UNIQUE-index failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(info, _)
            if info.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub(crate) fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

/// Verifies the connection carries the expected schema revision and the
/// tables a repository depends on.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    required_tables: &[&'static str],
) -> RepoResult<()> {
    let expected = crate::db::migrations::latest_version();
    let actual = crate::db::migrations::schema_version(conn)?;
    if actual != expected {
        return Err(RepoError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        });
    }

    for &table in required_tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

/// Re-exported read models shared by callers.
pub use access_repo::{GovernorateEmployee, SurveyListItem};
pub use export_repo::Snapshot;
