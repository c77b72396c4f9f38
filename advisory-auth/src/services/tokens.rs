//! Token lifecycle: issue, verify against the revocation store, revoke.

use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::jwt::{TokenClaims, TokenError, TokenKind, TokenService};
use super::revocation::RevocationStore;
use crate::models::Identity;

/// Token response returned to client
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[schema(example = 900)]
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenManager {
    jwt: TokenService,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenManager {
    pub fn new(jwt: TokenService, revocations: Arc<dyn RevocationStore>) -> Self {
        Self { jwt, revocations }
    }

    pub fn jwt(&self) -> &TokenService {
        &self.jwt
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationStore> {
        &self.revocations
    }

    pub fn issue(
        &self,
        identity: &Identity,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.jwt.issue(identity, kind, ttl)
    }

    /// Access + refresh pair with the configured lifetimes.
    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenResponse, TokenError> {
        let access_token = self.jwt.issue_default(identity, TokenKind::Access)?;
        let refresh_token = self.jwt.issue_default(identity, TokenKind::Refresh)?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.ttl(TokenKind::Access).num_seconds(),
        })
    }

    /// Full check: signature, expiry, per-token revocation, blanket revocation.
    pub fn check(&self, token: &str) -> Result<TokenClaims, TokenError> {
        if self.revocations.is_token_revoked(token) {
            return Err(TokenError::Revoked);
        }

        let claims = self.jwt.decode(token)?;

        if let Some(revoked_at) = self.revocations.identity_revoked_at(&claims.sub) {
            if claims.iat_ms <= revoked_at.timestamp_millis() {
                return Err(TokenError::Revoked);
            }
        }

        Ok(claims)
    }

    /// [`check`](Self::check) plus a token-kind match.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let claims = self.check(token)?;
        if claims.token_type != kind {
            return Err(TokenError::WrongKind {
                expected: kind,
                actual: claims.token_type,
            });
        }
        Ok(claims)
    }

    /// `true` iff the token passes every check.
    pub fn validate(&self, token: &str) -> bool {
        self.check(token).is_ok()
    }

    /// Claim extraction over signature and expiry only; malformed and expired
    /// tokens surface as distinct errors.
    pub fn extract_claim<T>(
        &self,
        token: &str,
        claim: impl FnOnce(&TokenClaims) -> T,
    ) -> Result<T, TokenError> {
        self.jwt.extract_claim(token, claim)
    }

    /// Blacklist a token for the store's retention window, whatever its own
    /// expiry. Idempotent; returns `false` when the token was already
    /// blacklisted, so exactly one of several racing callers sees `true`.
    pub fn revoke(&self, token: &str) -> bool {
        let revoked = self.revocations.revoke_token(token);
        if revoked {
            tracing::info!(
                blacklist_size = self.revocations.revoked_token_count(),
                "Token revoked"
            );
        }
        revoked
    }

    /// Invalidate every token issued to `email` so far ("log out everywhere").
    pub fn revoke_all_for_identity(&self, email: &str) {
        let revoked_at = self.revocations.revoke_identity(email);
        tracing::info!(email = %email, revoked_at = %revoked_at, "All tokens revoked for identity");
    }

    pub fn is_token_blacklisted(&self, token: &str) -> bool {
        self.revocations.is_token_revoked(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::models::Role;
    use crate::services::clock::ManualClock;
    use crate::services::revocation::InMemoryRevocationStore;
    use chrono::Utc;
    use secrecy::SecretString;

    fn manager() -> (TokenManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = JwtConfig {
            secret: SecretString::new("token-manager-test-secret-0123456789".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        };
        let jwt = TokenService::new(&config, clock.clone()).unwrap();
        let store = InMemoryRevocationStore::new(Duration::hours(24), 1000, clock.clone())
            .with_identity_retention(Duration::days(7));
        (TokenManager::new(jwt, Arc::new(store)), clock)
    }

    fn identity(email: &str) -> Identity {
        let now = Utc::now();
        Identity {
            id: 1,
            email: email.to_string(),
            display_name: "Tester".to_string(),
            role: Role::Client,
            custom_grants: Default::default(),
            active: true,
            password_hash: String::new(),
            created_utc: now,
            updated_utc: now,
        }
    }

    #[test]
    fn test_client_token_valid_until_expiry() {
        let (manager, clock) = manager();
        let token = manager
            .issue(&identity("a@x.com"), TokenKind::Access, Duration::hours(1))
            .unwrap();
        assert!(manager.validate(&token));
        assert_eq!(
            manager.extract_claim(&token, |c| c.sub.clone()).unwrap(),
            "a@x.com"
        );

        clock.advance(Duration::hours(1) + Duration::seconds(1));
        assert!(!manager.validate(&token));
        assert_eq!(manager.check(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_revoked_token_stays_invalid() {
        let (manager, clock) = manager();
        let token = manager
            .issue(&identity("a@x.com"), TokenKind::Access, Duration::hours(2))
            .unwrap();

        manager.revoke(&token);
        assert!(manager.is_token_blacklisted(&token));
        assert_eq!(manager.check(&token), Err(TokenError::Revoked));

        clock.advance(Duration::minutes(90));
        assert!(!manager.validate(&token));
    }

    #[test]
    fn test_revoke_twice_keeps_blacklist_size() {
        let (manager, _) = manager();
        assert!(manager.revoke("T1"));
        let size = manager.revocations().revoked_token_count();
        assert!(!manager.revoke("T1"));
        assert!(manager.is_token_blacklisted("T1"));
        assert_eq!(manager.revocations().revoked_token_count(), size);
    }

    #[test]
    fn test_refresh_token_outliving_retention_becomes_valid_again() {
        let (manager, clock) = manager();
        let refresh = manager
            .issue_pair(&identity("a@x.com"))
            .unwrap()
            .refresh_token;

        manager.revoke(&refresh);
        clock.advance(Duration::hours(25));
        // Retention is fixed at 24h regardless of the 7 day refresh lifetime.
        assert!(manager.validate(&refresh));
    }

    #[test]
    fn test_blanket_revocation_covers_refresh_lifetime() {
        let (manager, clock) = manager();
        let alice = identity("a@x.com");
        let refresh = manager.issue_pair(&alice).unwrap().refresh_token;

        manager.revoke_all_for_identity(&alice.email);
        clock.advance(Duration::hours(25));
        manager.revocations().compact();
        assert_eq!(manager.check(&refresh), Err(TokenError::Revoked));
    }

    #[test]
    fn test_revoke_all_for_identity() {
        let (manager, clock) = manager();
        let alice = identity("a@x.com");
        let bob = identity("b@x.com");
        let alice_pair = manager.issue_pair(&alice).unwrap();
        let bob_token = manager.issue_pair(&bob).unwrap().access_token;

        manager.revoke_all_for_identity(&alice.email);
        assert!(!manager.validate(&alice_pair.access_token));
        assert!(!manager.validate(&alice_pair.refresh_token));
        assert!(manager.validate(&bob_token));

        clock.advance(Duration::seconds(1));
        let fresh = manager.issue_pair(&alice).unwrap().access_token;
        assert!(manager.validate(&fresh));
    }

    #[test]
    fn test_verify_checks_kind() {
        let (manager, _) = manager();
        let pair = manager.issue_pair(&identity("a@x.com")).unwrap();
        assert!(manager.verify(&pair.access_token, TokenKind::Access).is_ok());
        assert_eq!(
            manager.verify(&pair.refresh_token, TokenKind::Access),
            Err(TokenError::WrongKind {
                expected: TokenKind::Access,
                actual: TokenKind::Refresh
            })
        );
    }
}
