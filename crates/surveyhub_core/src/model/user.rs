//! User accounts and role vocabulary.
//!
//! # Invariants
//! - Usernames are globally unique (case-sensitive).
//! - `role` decides which authorization scoping rule applies to the user.
//! - Password hashing happens at the caller; core only stores the hash.

use crate::model::region::HealthAdminId;
use serde::{Deserialize, Serialize};

/// Surrogate key of a `Users` row.
pub type UserId = i64;

/// Access role forming a strict visibility hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unrestricted read/write over all entities.
    Admin,
    /// Scoped to exactly one governorate via `GovernorateAdmins`.
    GovernorateAdmin,
    /// Scoped to the governorate implied by the assigned region.
    Employee,
}

impl Role {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::GovernorateAdmin => "governorate_admin",
            Self::Employee => "employee",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "governorate_admin" => Some(Self::GovernorateAdmin),
            "employee" => Some(Self::Employee),
            _ => None,
        }
    }
}

/// Stored account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    /// Direct region assignment; `None` for accounts without a region.
    pub assigned_region: Option<HealthAdminId>,
    /// Storage-formatted timestamp (`YYYY-MM-DD HH:MM:SS`).
    pub created_at: String,
    pub last_login: Option<String>,
}

/// The identity tuple captured before and after an account mutation,
/// serialized into audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuditSnapshot {
    pub username: String,
    pub role: Role,
    pub assigned_region: Option<HealthAdminId>,
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn role_db_values_roundtrip() {
        for role in [Role::Admin, Role::GovernorateAdmin, Role::Employee] {
            assert_eq!(Role::parse(role.as_db()), Some(role));
        }
        assert_eq!(Role::parse("supervisor"), None);
    }
}
