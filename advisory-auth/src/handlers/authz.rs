use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::account::AuthzCheckRequest,
    middleware::AuthUser,
    AppState,
};

/// Ask whether the caller may exercise a grant, optionally on a resource.
///
/// Client and investment ownership is not stored by this service, so the
/// decision holds for the ownership facts in the request. Callers that own
/// those records look the facts up before asking.
#[utoipa::path(
    post,
    path = "/authz/check",
    request_body = AuthzCheckRequest,
    responses(
        (status = 200, description = "Decision for the supplied ownership facts",
            body = AuthzDecision),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Authorization",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn check(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(req): Json<AuthzCheckRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        state
            .account_service
            .check_authorization(&caller.identity, &req),
    ))
}
