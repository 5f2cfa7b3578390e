//! Regional reference data: governorates and their health administrations.
//!
//! # Invariants
//! - Governorate names are globally unique.
//! - Health administration names are unique within their governorate.

use serde::{Deserialize, Serialize};

/// Surrogate key of a `Governorates` row.
pub type GovernorateId = i64;
/// Surrogate key of a `HealthAdministrations` row.
pub type HealthAdminId = i64;

/// Top-level administrative region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Governorate {
    pub governorate_id: GovernorateId,
    pub name: String,
    pub description: Option<String>,
}

/// Sub-region within a governorate; the unit a user is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAdministration {
    pub admin_id: HealthAdminId,
    pub name: String,
    pub description: Option<String>,
    pub governorate_id: GovernorateId,
}
