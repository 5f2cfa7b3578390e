//! Core domain logic for SurveyHub.
//! This crate is the single source of truth for business invariants:
//! referential integrity across the governorate hierarchy, survey schema
//! ordering, authorization scoping, the per-day completion gate and the
//! audit discipline applied to mutations.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::audit::{
    tables, AuditAction, AuditEntry, AuditFilter, AuditLogId, AuditPolicy,
};
pub use model::region::{Governorate, GovernorateId, HealthAdminId, HealthAdministration};
pub use model::response::{
    DetailId, Response, ResponseDetail, ResponseId, ResponseInfo,
};
pub use model::survey::{
    FieldId, FieldPatch, FieldSpec, FieldType, Survey, SurveyField, SurveyId,
};
pub use model::user::{Role, User, UserAuditSnapshot, UserId};
pub use repo::access_repo::{
    AccessRepository, GovernorateEmployee, SqliteAccessRepository, SurveyListItem,
};
pub use repo::audit_repo::{AuditRepository, SqliteAuditRepository};
pub use repo::export_repo::{Snapshot, SnapshotSource, SqliteSnapshotSource, BASE_COLUMNS};
pub use repo::region_repo::{RegionRepository, SqliteRegionRepository};
pub use repo::response_repo::{ResponseRepository, SqliteResponseRepository};
pub use repo::survey_repo::{SqliteSurveyRepository, SurveyRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::access::AccessService;
pub use service::export::{
    ExportError, ExportService, SheetDestination, SheetSink, SinkError,
};
pub use service::submission::{SubmissionError, SubmissionService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
