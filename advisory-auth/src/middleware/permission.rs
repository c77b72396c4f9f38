use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{middleware::AuthenticatedIdentity, models::Grant, AppState};

/// Route guard: the caller must be authenticated, active, and hold `grant`.
///
/// Wire it per route group with
/// `from_fn_with_state(state, move |s, req, next| require_grant(s, Grant::X, req, next))`.
pub async fn require_grant(
    State(state): State<AppState>,
    grant: Grant,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = req
        .extensions()
        .get::<AuthenticatedIdentity>()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

    state.evaluator.require(&caller.identity, grant, None)?;

    Ok(next.run(req).await)
}
