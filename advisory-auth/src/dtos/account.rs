use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Grant, ResourceRef, Role};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateIdentityRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    #[schema(example = "Jane Q. Doe")]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetGrantsRequest {
    pub grants: Vec<Grant>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthzCheckRequest {
    pub grant: Grant,
    #[serde(default)]
    pub resource: Option<ResourceRef>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthzDecision {
    pub allowed: bool,
    pub grant: Grant,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "client")]
    pub resource_kind: Option<String>,
}
