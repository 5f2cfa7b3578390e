//! Visibility and grant use-cases.
//!
//! # Responsibility
//! - Combine the two independent survey-grant mechanisms for
//!   submission-time eligibility.
//! - Pass role-wide and per-user queries through for list screens.
//!
//! # Invariants
//! - Governorate links and per-user grants are independent; a survey need
//!   not appear in both to be eligible.
//! - The eligibility union is deduplicated and name-ordered.

use crate::model::region::GovernorateId;
use crate::model::survey::SurveyId;
use crate::model::user::UserId;
use crate::repo::access_repo::{AccessRepository, GovernorateEmployee, SurveyListItem};
use crate::repo::RepoResult;
use std::collections::BTreeSet;

/// Service facade over the access repository.
pub struct AccessService<R: AccessRepository> {
    repo: R,
}

impl<R: AccessRepository> AccessService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Role-wide visibility for one user (governorate-linked surveys).
    pub fn allowed_surveys(&self, user_id: UserId) -> RepoResult<Vec<SurveyListItem>> {
        self.repo.allowed_surveys(user_id)
    }

    /// Explicit per-user grants.
    pub fn granted_surveys(&self, user_id: UserId) -> RepoResult<Vec<SurveyListItem>> {
        self.repo.user_granted_surveys(user_id)
    }

    /// Surveys the user may actually submit: the union of governorate-linked
    /// and individually granted sets.
    pub fn submission_eligible_surveys(
        &self,
        user_id: UserId,
    ) -> RepoResult<Vec<SurveyListItem>> {
        let mut seen = BTreeSet::new();
        let mut union = Vec::new();
        for item in self
            .repo
            .allowed_surveys(user_id)?
            .into_iter()
            .chain(self.repo.user_granted_surveys(user_id)?)
        {
            if seen.insert(item.survey_id) {
                union.push(item);
            }
        }
        union.sort_by(|a, b| a.name.cmp(&b.name).then(a.survey_id.cmp(&b.survey_id)));
        Ok(union)
    }

    /// Replaces the user's grant set; candidates outside the user's
    /// governorate-linked surveys are dropped. Returns the persisted ids.
    pub fn replace_grants(
        &mut self,
        actor: UserId,
        user_id: UserId,
        survey_ids: &[SurveyId],
    ) -> RepoResult<Vec<SurveyId>> {
        self.repo.replace_user_grants(actor, user_id, survey_ids)
    }

    /// Employees scoped to a governorate, for oversight screens.
    pub fn governorate_employees(
        &self,
        governorate_id: GovernorateId,
    ) -> RepoResult<Vec<GovernorateEmployee>> {
        self.repo.governorate_employees(governorate_id)
    }
}
