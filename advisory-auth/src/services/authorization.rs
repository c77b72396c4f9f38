//! Entity-scoped permission evaluation.

use std::sync::Arc;

use super::{permissions::RolePermissions, ServiceError};
use crate::models::{Grant, Identity, Resource, Role};

/// Decides whether an identity may exercise a grant, optionally against a
/// specific resource. Every ambiguous input is a denial.
#[derive(Debug, Clone)]
pub struct PermissionEvaluator {
    permissions: Arc<RolePermissions>,
}

impl PermissionEvaluator {
    pub fn new(permissions: Arc<RolePermissions>) -> Self {
        Self { permissions }
    }

    pub fn permissions(&self) -> &RolePermissions {
        &self.permissions
    }

    pub fn authorize(
        &self,
        identity: Option<&Identity>,
        grant: Option<Grant>,
        resource: Option<&Resource>,
    ) -> bool {
        let (Some(identity), Some(grant)) = (identity, grant) else {
            return false;
        };

        if identity.role == Role::Admin {
            return true;
        }

        if !self.permissions.has_grant(identity, grant) {
            return false;
        }

        match resource {
            None => true,
            Some(resource) => owns_or_serves(identity, resource),
        }
    }

    /// [`authorize`](Self::authorize) for service code: inactive identities
    /// are refused and a denial becomes [`ServiceError::PermissionDenied`].
    pub fn require(
        &self,
        identity: &Identity,
        grant: Grant,
        resource: Option<&Resource>,
    ) -> Result<(), ServiceError> {
        if identity.is_active() && self.authorize(Some(identity), Some(grant), resource) {
            return Ok(());
        }

        tracing::warn!(
            identity_id = identity.id,
            role = %identity.role,
            grant = %grant,
            resource_kind = resource.map(|r| r.kind()).unwrap_or("none"),
            "Permission denied"
        );
        Err(ServiceError::PermissionDenied(grant.to_string()))
    }
}

/// Ownership rules for non-admin callers.
fn owns_or_serves(caller: &Identity, resource: &Resource) -> bool {
    match *resource {
        Resource::Client {
            assigned_employee_id,
            ..
        } => caller.role == Role::Employee && assigned_employee_id == Some(caller.id),
        Resource::Investment {
            owner_client_id,
            assigned_employee_id,
            ..
        } => match caller.role {
            Role::Client => owner_client_id == caller.id,
            Role::Employee => assigned_employee_id == Some(caller.id),
            Role::Admin => true,
        },
        Resource::Identity { identity_id } => identity_id == caller.id,
    }
}
