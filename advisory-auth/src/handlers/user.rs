use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::account::UpdateIdentityRequest,
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

/// Current identity
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Caller's identity", body = SanitizedIdentity),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let identity = state
        .account_service
        .get(&caller.identity, caller.identity.id)
        .await?;
    Ok(Json(identity))
}

/// Edit own display name
#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UpdateIdentityRequest,
    responses(
        (status = 200, description = "Identity updated", body = SanitizedIdentity),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Missing EDIT_OWN_DETAILS", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateIdentityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state
        .account_service
        .update_me(&caller.identity, &req.name)
        .await?;
    Ok(Json(identity))
}

/// Identity by id: own account, or any with MANAGE_USERS
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "Identity id")
    ),
    responses(
        (status = 200, description = "Identity found", body = SanitizedIdentity),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Permission denied", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.account_service.get(&caller.identity, id).await?;
    Ok(Json(identity))
}
