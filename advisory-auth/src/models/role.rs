//! Role model - ordered privilege tiers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role held by an identity.
///
/// Variants are declared in ascending privilege, so the derived `Ord` is the
/// privilege ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    Employee,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Client, Role::Employee, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Employee => "EMPLOYEE",
            Role::Admin => "ADMIN",
        }
    }

    /// `self >= other` in privilege.
    pub fn has_privilege_of(&self, other: Role) -> bool {
        *self >= other
    }

    /// Role changes only move upward.
    pub fn can_upgrade_to(&self, target: Role) -> bool {
        target > *self
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CLIENT" => Ok(Role::Client),
            "EMPLOYEE" => Ok(Role::Employee),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}
