//! Submission use-case with the per-day completion gate.
//!
//! # Responsibility
//! - Enforce "one completed response per (user, survey) per day" before
//!   writing, and surface the storage engine's hard conflict the same way.
//!
//! # Invariants
//! - Incomplete (draft) submissions are never gated.
//! - The calendar day is the storage engine's date, not the caller's clock.

use crate::model::region::HealthAdminId;
use crate::model::response::ResponseId;
use crate::model::survey::{FieldId, SurveyId};
use crate::model::user::UserId;
use crate::repo::response_repo::ResponseRepository;
use crate::repo::{RepoError, RepoResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for submission use-cases.
#[derive(Debug)]
pub enum SubmissionError {
    /// A completed response already exists for this pair today.
    CompletedToday { user_id: UserId, survey_id: SurveyId },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for SubmissionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompletedToday { user_id, survey_id } => write!(
                f,
                "user {user_id} already completed survey {survey_id} today"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SubmissionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::CompletedToday { .. } => None,
        }
    }
}

impl From<RepoError> for SubmissionError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::CompletionConflict { user_id, survey_id } => {
                Self::CompletedToday { user_id, survey_id }
            }
            other => Self::Repo(other),
        }
    }
}

/// Submission facade over the response repository.
pub struct SubmissionService<R: ResponseRepository> {
    repo: R,
}

impl<R: ResponseRepository> SubmissionService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a response, rejecting a completed submission when the user
    /// already completed this survey today. The predicate check closes the
    /// common path; the storage engine's unique index closes the race.
    pub fn submit(
        &mut self,
        survey_id: SurveyId,
        user_id: UserId,
        region_id: HealthAdminId,
        is_completed: bool,
    ) -> Result<ResponseId, SubmissionError> {
        if is_completed && self.repo.has_completed_survey_today(user_id, survey_id)? {
            return Err(SubmissionError::CompletedToday { user_id, survey_id });
        }
        Ok(self
            .repo
            .save_response(survey_id, user_id, region_id, is_completed)?)
    }

    /// Stores one answer for a saved response.
    pub fn record_answer(
        &mut self,
        response_id: ResponseId,
        field_id: FieldId,
        value: Option<&str>,
    ) -> RepoResult<()> {
        self.repo.save_response_detail(response_id, field_id, value)
    }

    /// Pure predicate over the storage engine's calendar date.
    pub fn has_completed_today(
        &self,
        user_id: UserId,
        survey_id: SurveyId,
    ) -> RepoResult<bool> {
        self.repo.has_completed_survey_today(user_id, survey_id)
    }
}
