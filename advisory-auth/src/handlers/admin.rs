//! Administrative identity management. Routes are additionally guarded by
//! `require_grant` in the router.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::account::{ChangeRoleRequest, SetGrantsRequest},
    middleware::AuthUser,
    AppState,
};

/// Raise an identity's role
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(
        ("id" = i64, Path, description = "Identity id")
    ),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed; the identity's tokens are revoked",
            body = SanitizedIdentity),
        (status = 400, description = "Not an upgrade", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Missing MANAGE_ROLES", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_role(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state
        .account_service
        .change_role(&caller.identity, id, req.role)
        .await?;
    Ok(Json(identity))
}

/// Replace an identity's custom grants
#[utoipa::path(
    put,
    path = "/admin/users/{id}/grants",
    params(
        ("id" = i64, Path, description = "Identity id")
    ),
    request_body = SetGrantsRequest,
    responses(
        (status = 200, description = "Custom grants replaced", body = SanitizedIdentity),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Missing MANAGE_ROLES", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_grants(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<SetGrantsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state
        .account_service
        .set_custom_grants(&caller.identity, id, req.grants)
        .await?;
    Ok(Json(identity))
}

/// Deactivate an identity
#[utoipa::path(
    post,
    path = "/admin/users/{id}/deactivate",
    params(
        ("id" = i64, Path, description = "Identity id")
    ),
    responses(
        (status = 200, description = "Identity deactivated; its tokens are revoked",
            body = SanitizedIdentity),
        (status = 400, description = "Self-deactivation", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Missing MANAGE_USERS", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state
        .account_service
        .deactivate(&caller.identity, id)
        .await?;
    Ok(Json(identity))
}
