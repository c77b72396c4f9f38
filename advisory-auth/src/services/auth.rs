use std::sync::Arc;

use crate::{
    dtos::auth::{IntrospectResponse, LoginRequest, RegisterRequest, RegisterResponse},
    models::{normalize_email, Identity, NewIdentity, Role},
    services::{IdentityRepository, ServiceError, TokenKind, TokenManager, TokenResponse},
    utils::{
        hash_password, password::verify_against_dummy, verify_password, Password,
        PasswordHashString,
    },
};

/// Session operations: registration, credential login, refresh rotation,
/// logout and introspection.
#[derive(Clone)]
pub struct AuthService {
    identities: Arc<dyn IdentityRepository>,
    tokens: TokenManager,
}

impl AuthService {
    pub fn new(identities: Arc<dyn IdentityRepository>, tokens: TokenManager) -> Self {
        Self { identities, tokens }
    }

    /// Self-registration always creates a CLIENT.
    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ServiceError> {
        let identity = self
            .create_identity(&req.email, &req.name, req.password, Role::Client)
            .await?;

        tracing::info!(identity_id = identity.id, "Identity registered");

        let tokens = self.tokens.issue_pair(&identity)?;
        Ok(RegisterResponse {
            identity: identity.sanitized(),
            tokens,
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<TokenResponse, ServiceError> {
        let email = normalize_email(&req.email);
        let password = Password::new(req.password);

        let identity = match self.identities.find_by_email(&email).await? {
            Some(identity) => identity,
            None => {
                verify_against_dummy(&password);
                tracing::warn!("Login attempt for unknown email");
                return Err(ServiceError::AuthenticationFailed);
            }
        };

        let hash = PasswordHashString::new(identity.password_hash.clone());
        if verify_password(&password, &hash).is_err() {
            tracing::warn!(identity_id = identity.id, "Login failed: wrong password");
            return Err(ServiceError::AuthenticationFailed);
        }

        if !identity.is_active() {
            tracing::warn!(identity_id = identity.id, "Login failed: identity inactive");
            return Err(ServiceError::AuthenticationFailed);
        }

        tracing::info!(identity_id = identity.id, role = %identity.role, "Login successful");

        Ok(self.tokens.issue_pair(&identity)?)
    }

    /// Exchange a refresh token for a new pair. The presented refresh token
    /// is revoked so it cannot be replayed; of two concurrent exchanges of
    /// the same token only the one that revokes it gets a pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ServiceError> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;

        let identity = self
            .identities
            .find_by_email(&claims.sub)
            .await?
            .filter(|identity| identity.id == claims.uid)
            .ok_or(ServiceError::TokenInvalid)?;

        if !identity.is_active() {
            return Err(ServiceError::TokenInvalid);
        }

        if !self.tokens.revoke(refresh_token) {
            tracing::warn!(identity_id = identity.id, "Refresh token replayed concurrently");
            return Err(ServiceError::TokenRevoked);
        }

        tracing::info!(identity_id = identity.id, "Tokens refreshed");

        Ok(self.tokens.issue_pair(&identity)?)
    }

    /// Revoke the caller's access token and, when it belongs to the same
    /// subject, the refresh token they hand back.
    pub fn logout(&self, caller: &Identity, access_token: &str, refresh_token: Option<&str>) {
        self.tokens.revoke(access_token);

        if let Some(refresh_token) = refresh_token {
            match self.tokens.extract_claim(refresh_token, |c| c.sub.clone()) {
                Ok(sub) if sub == caller.email => {
                    self.tokens.revoke(refresh_token);
                }
                Ok(_) => tracing::warn!(
                    identity_id = caller.id,
                    "Logout ignored a refresh token issued to another identity"
                ),
                // Already expired or garbage: nothing left to revoke.
                Err(_) => {}
            }
        }

        tracing::info!(identity_id = caller.id, "Logged out");
    }

    /// Invalidate every token issued to the caller so far.
    pub fn logout_all(&self, caller: &Identity) {
        self.tokens.revoke_all_for_identity(&caller.email);
    }

    /// Token state as the authentication filter would see it.
    pub async fn introspect(&self, token: &str) -> Result<IntrospectResponse, ServiceError> {
        let Ok(claims) = self.tokens.check(token) else {
            return Ok(IntrospectResponse::inactive());
        };

        let active = self
            .identities
            .find_by_email(&claims.sub)
            .await?
            .is_some_and(|identity| identity.is_active() && identity.id == claims.uid);

        if !active {
            return Ok(IntrospectResponse::inactive());
        }

        Ok(IntrospectResponse {
            active: true,
            sub: Some(claims.sub),
            role: Some(claims.role),
            token_type: Some(claims.token_type),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
        })
    }

    /// Ensure an administrator with `email` exists. An existing identity is
    /// left untouched.
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        password: String,
        name: &str,
    ) -> Result<Identity, ServiceError> {
        if let Some(existing) = self.identities.find_by_email(&normalize_email(email)).await? {
            if existing.role != Role::Admin {
                tracing::warn!(
                    identity_id = existing.id,
                    role = %existing.role,
                    "Bootstrap admin email belongs to a non-admin identity"
                );
            }
            return Ok(existing);
        }

        let admin = self
            .create_identity(email, name, password, Role::Admin)
            .await?;
        tracing::info!(identity_id = admin.id, "Bootstrap administrator created");
        Ok(admin)
    }

    async fn create_identity(
        &self,
        email: &str,
        name: &str,
        password: String,
        role: Role,
    ) -> Result<Identity, ServiceError> {
        let password_hash = hash_password(&Password::new(password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        self.identities
            .insert(NewIdentity {
                email: normalize_email(email),
                display_name: name.trim().to_string(),
                role,
                password_hash: password_hash.into_string(),
            })
            .await
    }
}
