//! Shared setup for advisory-auth integration tests.
//!
//! Every test gets its own in-memory stores and a manual clock, so expiry and
//! retention can be driven without sleeping.

#![allow(dead_code)]

use advisory_auth::{
    build_router,
    config::{
        AdvisoryConfig, Environment, JwtConfig, RateLimitConfig, RevocationConfig, SecurityConfig,
    },
    models::{Identity, NewIdentity, Role},
    services::{
        IdentityRepository, InMemoryIdentityRepository, InMemoryRevocationStore, ManualClock,
        TokenKind,
    },
    AppState,
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> AdvisoryConfig {
    AdvisoryConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "advisory-auth-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        jwt: JwtConfig {
            secret: SecretString::new("integration-test-secret-0123456789abcdef".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        revocation: RevocationConfig {
            retention_hours: 24,
            compaction_interval_seconds: 300,
            compaction_threshold: 10_000,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        rate_limit: RateLimitConfig {
            login_attempts: 5,
            login_window_seconds: 900,
            register_attempts: 3,
            register_window_seconds: 3600,
        },
        bootstrap_admin: None,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AdvisoryConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let revocations = Arc::new(
            InMemoryRevocationStore::new(
                config.revocation_retention(),
                config.revocation.compaction_threshold,
                clock.clone(),
            )
            .with_identity_retention(config.identity_revocation_retention()),
        );
        let identities = Arc::new(InMemoryIdentityRepository::new(clock.clone()));

        let state = AppState::new(config, identities, revocations, clock.clone())
            .expect("Failed to build app state");
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            clock,
        }
    }

    /// Insert an identity directly, skipping password hashing.
    pub async fn create_identity(&self, email: &str, role: Role) -> Identity {
        self.state
            .identities
            .insert(NewIdentity {
                email: email.to_string(),
                display_name: email.to_string(),
                role,
                password_hash: String::new(),
            })
            .await
            .expect("Failed to insert identity")
    }

    pub fn access_token(&self, identity: &Identity) -> String {
        self.state
            .tokens
            .jwt()
            .issue_default(identity, TokenKind::Access)
            .expect("Failed to issue token")
    }

    /// Register through the API and return the response body.
    pub async fn register(&self, email: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": TEST_PASSWORD,
                    "name": "Test Client",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.call(request).await
    }

    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}
