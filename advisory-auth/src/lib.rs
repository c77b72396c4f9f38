pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    routing::{get, post, put},
    Json, Router,
};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::AdvisoryConfig;
use crate::middleware::{authentication_filter, require_grant};
use crate::models::Grant;
use crate::services::{
    AccountService, AuthService, Clock, IdentityRepository, PermissionEvaluator,
    RevocationStore, RolePermissions, TokenManager, TokenService,
};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::registration::register,
        handlers::auth::session::login,
        handlers::auth::session::logout,
        handlers::auth::session::logout_all,
        handlers::auth::session::refresh,
        handlers::auth::session::introspect,
        handlers::user::get_me,
        handlers::user::update_me,
        handlers::user::get_user,
        handlers::admin::change_role,
        handlers::admin::set_grants,
        handlers::admin::deactivate_user,
        handlers::authz::check,
    ),
    components(
        schemas(
            dtos::auth::RegisterRequest,
            dtos::auth::RegisterResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LogoutRequest,
            dtos::auth::RefreshRequest,
            dtos::auth::IntrospectRequest,
            dtos::auth::IntrospectResponse,
            dtos::account::UpdateIdentityRequest,
            dtos::account::ChangeRoleRequest,
            dtos::account::SetGrantsRequest,
            dtos::account::AuthzCheckRequest,
            dtos::account::AuthzDecision,
            dtos::ErrorResponse,
            services::TokenResponse,
            services::TokenKind,
            models::SanitizedIdentity,
            models::ResourceRef,
            models::Role,
            models::Grant,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and token lifecycle"),
        (name = "User", description = "Identity profile"),
        (name = "Admin", description = "Role, grant and activation management"),
        (name = "Authorization", description = "Permission decisions"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AdvisoryConfig>,
    pub identities: Arc<dyn IdentityRepository>,
    pub tokens: TokenManager,
    pub evaluator: PermissionEvaluator,
    pub auth_service: AuthService,
    pub account_service: AccountService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every service around the given stores and clock.
    pub fn new(
        config: AdvisoryConfig,
        identities: Arc<dyn IdentityRepository>,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let jwt = TokenService::new(&config.jwt, clock).map_err(AppError::ConfigError)?;
        let tokens = TokenManager::new(jwt, revocations);
        let evaluator = PermissionEvaluator::new(Arc::new(RolePermissions::standard()));

        let auth_service = AuthService::new(identities.clone(), tokens.clone());
        let account_service =
            AccountService::new(identities.clone(), tokens.clone(), evaluator.clone());

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let register_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.register_attempts,
            config.rate_limit.register_window_seconds,
        );

        Ok(Self {
            config: Arc::new(config),
            identities,
            tokens,
            evaluator,
            auth_service,
            account_service,
            login_rate_limiter,
            register_rate_limiter,
        })
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Role and grant management
    let role_routes = Router::new()
        .route("/admin/users/:id/role", put(handlers::change_role))
        .route("/admin/users/:id/grants", put(handlers::set_grants))
        .route_layer(from_fn_with_state(
            state.clone(),
            |state: State<AppState>, req: Request, next: Next| {
                require_grant(state, Grant::ManageRoles, req, next)
            },
        ));

    // Account lifecycle
    let user_admin_routes = Router::new()
        .route(
            "/admin/users/:id/deactivate",
            post(handlers::deactivate_user),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            |state: State<AppState>, req: Request, next: Next| {
                require_grant(state, Grant::ManageUsers, req, next)
            },
        ));

    let login_route = Router::new()
        .route("/auth/login", post(handlers::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(login_route)
        .merge(register_route)
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/introspect", post(handlers::introspect))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/logout-all", post(handlers::logout_all))
        .route(
            "/users/me",
            get(handlers::get_me).patch(handlers::update_me),
        )
        .route("/users/:id", get(handlers::get_user))
        .route("/authz/check", post(handlers::check))
        .merge(role_routes)
        .merge(user_admin_routes)
        .with_state(state.clone())
        // Establish the caller for every route; never rejects
        .layer(from_fn_with_state(state.clone(), authentication_filter))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins));

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(origin) if o != "*" => Some(origin),
            Ok(_) => {
                tracing::warn!("Ignoring wildcard CORS origin");
                None
            }
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}", o, e);
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.identities.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Identity repository health check failed");
        AppError::InternalError(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "identities": "up",
            "revoked_tokens": state.tokens.revocations().revoked_token_count(),
        }
    })))
}
