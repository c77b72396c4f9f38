//! Identity model - one authenticated principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

use super::{Grant, Role};

/// Identity entity. Never physically deleted; deactivation clears `active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    /// Normalised (trimmed, lower-cased) and unique.
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub custom_grants: BTreeSet<Grant>,
    pub active: bool,
    pub password_hash: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Identity {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sanitized(&self) -> SanitizedIdentity {
        SanitizedIdentity::from(self)
    }
}

/// Fields needed to create an identity; the repository assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
}

/// Identity without credential material, safe to return from the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SanitizedIdentity {
    #[schema(example = 42)]
    pub id: i64,
    #[schema(example = "client@example.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub display_name: String,
    pub role: Role,
    pub custom_grants: Vec<Grant>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<&Identity> for SanitizedIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            role: identity.role,
            custom_grants: identity.custom_grants.iter().copied().collect(),
            active: identity.active,
            created_utc: identity.created_utc,
        }
    }
}

/// Canonical form used for lookup, uniqueness and token subjects.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
