use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    dtos::account::{AuthzCheckRequest, AuthzDecision},
    models::{Grant, Identity, Resource, Role, SanitizedIdentity},
    services::{IdentityRepository, PermissionEvaluator, ServiceError, TokenManager},
};

/// Profile and administrative operations on identities. Every operation is
/// checked against the permission evaluator for the calling identity.
#[derive(Clone)]
pub struct AccountService {
    identities: Arc<dyn IdentityRepository>,
    tokens: TokenManager,
    evaluator: PermissionEvaluator,
}

impl AccountService {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        tokens: TokenManager,
        evaluator: PermissionEvaluator,
    ) -> Self {
        Self {
            identities,
            tokens,
            evaluator,
        }
    }

    /// Own account, or anyone's with `MANAGE_USERS`.
    pub async fn get(&self, caller: &Identity, id: i64) -> Result<SanitizedIdentity, ServiceError> {
        let own = Resource::Identity { identity_id: id };
        let allowed = caller.is_active()
            && (self
                .evaluator
                .authorize(Some(caller), Some(Grant::ViewOwnAccount), Some(&own))
                || self
                    .evaluator
                    .authorize(Some(caller), Some(Grant::ManageUsers), None));

        if !allowed {
            tracing::warn!(identity_id = caller.id, target_id = id, "Identity lookup denied");
            return Err(ServiceError::PermissionDenied(Grant::ManageUsers.to_string()));
        }

        Ok(self.load(id).await?.sanitized())
    }

    pub async fn update_me(
        &self,
        caller: &Identity,
        name: &str,
    ) -> Result<SanitizedIdentity, ServiceError> {
        let own = Resource::Identity {
            identity_id: caller.id,
        };
        self.evaluator
            .require(caller, Grant::EditOwnDetails, Some(&own))?;

        let name = name.trim().to_string();
        let identity = self
            .identities
            .update_with(
                caller.id,
                Box::new(move |identity: &mut Identity| {
                    identity.display_name = name;
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(identity_id = identity.id, "Profile updated");
        Ok(identity.sanitized())
    }

    /// Raise a role. Downgrades and no-op changes are refused, and the
    /// target's outstanding tokens are revoked so the new role takes effect
    /// at their next login.
    pub async fn change_role(
        &self,
        caller: &Identity,
        id: i64,
        role: Role,
    ) -> Result<SanitizedIdentity, ServiceError> {
        self.evaluator.require(caller, Grant::ManageRoles, None)?;

        // The upgrade rule is checked against the record being changed.
        let target = self
            .identities
            .update_with(
                id,
                Box::new(move |target: &mut Identity| {
                    if !target.role.can_upgrade_to(role) {
                        return Err(ServiceError::Validation(format!(
                            "Role can only be raised; {} cannot become {}",
                            target.role, role
                        )));
                    }
                    target.role = role;
                    Ok(())
                }),
            )
            .await?;
        self.tokens.revoke_all_for_identity(&target.email);

        tracing::info!(
            identity_id = target.id,
            changed_by = caller.id,
            to = %role,
            "Role changed"
        );
        Ok(target.sanitized())
    }

    /// Replace the target's custom grant overlay.
    pub async fn set_custom_grants(
        &self,
        caller: &Identity,
        id: i64,
        grants: Vec<Grant>,
    ) -> Result<SanitizedIdentity, ServiceError> {
        self.evaluator.require(caller, Grant::ManageRoles, None)?;

        let grants = grants.into_iter().collect::<BTreeSet<_>>();
        let target = self
            .identities
            .update_with(
                id,
                Box::new(move |target: &mut Identity| {
                    target.custom_grants = grants;
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(
            identity_id = target.id,
            changed_by = caller.id,
            grants = target.custom_grants.len(),
            "Custom grants replaced"
        );
        Ok(target.sanitized())
    }

    /// Soft-deactivate an identity and revoke everything issued to it.
    pub async fn deactivate(
        &self,
        caller: &Identity,
        id: i64,
    ) -> Result<SanitizedIdentity, ServiceError> {
        self.evaluator.require(caller, Grant::ManageUsers, None)?;

        if caller.id == id {
            return Err(ServiceError::Validation(
                "An identity cannot deactivate itself".to_string(),
            ));
        }

        let target = self
            .identities
            .update_with(
                id,
                Box::new(|target: &mut Identity| {
                    target.active = false;
                    Ok(())
                }),
            )
            .await?;
        self.tokens.revoke_all_for_identity(&target.email);

        tracing::info!(identity_id = target.id, changed_by = caller.id, "Identity deactivated");
        Ok(target.sanitized())
    }

    /// Evaluator decision for the caller. Ownership facts on the resource
    /// reference are taken as given; a reference that does not resolve is a
    /// denial.
    pub fn check_authorization(&self, caller: &Identity, req: &AuthzCheckRequest) -> AuthzDecision {
        let resource = req.resource.as_ref().map(|r| (r.kind.clone(), r.resolve()));

        let allowed = match &resource {
            Some((_, None)) => false,
            Some((_, Some(resource))) => {
                caller.is_active()
                    && self
                        .evaluator
                        .authorize(Some(caller), Some(req.grant), Some(resource))
            }
            None => {
                caller.is_active() && self.evaluator.authorize(Some(caller), Some(req.grant), None)
            }
        };

        tracing::debug!(
            identity_id = caller.id,
            grant = %req.grant,
            decision = allowed,
            "Authorization check"
        );

        AuthzDecision {
            allowed,
            grant: req.grant,
            resource_kind: resource.map(|(kind, _)| kind),
        }
    }

    async fn load(&self, id: i64) -> Result<Identity, ServiceError> {
        self.identities
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Identity".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::models::{NewIdentity, ResourceRef};
    use crate::services::identity_store::testing::YieldingIdentityRepository;
    use crate::services::{
        InMemoryIdentityRepository, InMemoryRevocationStore, ManualClock, RolePermissions,
        TokenKind, TokenService,
    };
    use chrono::Duration;
    use secrecy::SecretString;

    struct Fixture {
        accounts: AccountService,
        tokens: TokenManager,
        identities: Arc<InMemoryIdentityRepository>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let jwt = TokenService::new(
            &JwtConfig {
                secret: SecretString::new("account-service-test-secret-0123456789".to_string()),
                access_token_expiry_minutes: 15,
                refresh_token_expiry_days: 7,
            },
            clock.clone(),
        )
        .unwrap();
        let store = InMemoryRevocationStore::new(Duration::hours(24), 1000, clock.clone());
        let tokens = TokenManager::new(jwt, Arc::new(store));
        let identities = Arc::new(InMemoryIdentityRepository::new(clock));
        let evaluator = PermissionEvaluator::new(Arc::new(RolePermissions::standard()));
        Fixture {
            accounts: AccountService::new(identities.clone(), tokens.clone(), evaluator),
            tokens,
            identities,
        }
    }

    async fn create(f: &Fixture, email: &str, role: Role) -> Identity {
        f.identities
            .insert(NewIdentity {
                email: email.to_string(),
                display_name: "Someone".to_string(),
                role,
                password_hash: String::new(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_self_or_with_manage_users() {
        let f = fixture();
        let client = create(&f, "client@x.com", Role::Client).await;
        let other = create(&f, "other@x.com", Role::Client).await;
        let admin = create(&f, "admin@x.com", Role::Admin).await;

        assert_eq!(f.accounts.get(&client, client.id).await.unwrap().id, client.id);
        assert!(matches!(
            f.accounts.get(&client, other.id).await,
            Err(ServiceError::PermissionDenied(_))
        ));
        assert_eq!(f.accounts.get(&admin, other.id).await.unwrap().id, other.id);
        assert!(matches!(
            f.accounts.get(&admin, 999).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_me_changes_display_name() {
        let f = fixture();
        let client = create(&f, "client@x.com", Role::Client).await;

        let updated = f.accounts.update_me(&client, "  New Name ").await.unwrap();
        assert_eq!(updated.display_name, "New Name");
    }

    #[tokio::test]
    async fn test_change_role_only_upwards_and_revokes() {
        let f = fixture();
        let admin = create(&f, "admin@x.com", Role::Admin).await;
        let employee = create(&f, "emp@x.com", Role::Employee).await;
        let client = create(&f, "client@x.com", Role::Client).await;

        let token = f
            .tokens
            .issue(&client, TokenKind::Access, Duration::hours(1))
            .unwrap();

        let upgraded = f.accounts.change_role(&admin, client.id, Role::Employee).await.unwrap();
        assert_eq!(upgraded.role, Role::Employee);
        assert!(!f.tokens.validate(&token));

        assert!(matches!(
            f.accounts.change_role(&admin, client.id, Role::Client).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            f.accounts.change_role(&employee, client.id, Role::Admin).await,
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_custom_grants_extend_effective_grants() {
        let f = fixture();
        let admin = create(&f, "admin@x.com", Role::Admin).await;
        let client = create(&f, "client@x.com", Role::Client).await;

        let updated = f
            .accounts
            .set_custom_grants(
                &admin,
                client.id,
                vec![Grant::GenerateReport, Grant::GenerateReport],
            )
            .await
            .unwrap();
        assert_eq!(updated.custom_grants, vec![Grant::GenerateReport]);

        let client = f.identities.find_by_id(client.id).await.unwrap().unwrap();
        let decision = f.accounts.check_authorization(
            &client,
            &AuthzCheckRequest {
                grant: Grant::GenerateReport,
                resource: None,
            },
        );
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_deactivate() {
        let f = fixture();
        let admin = create(&f, "admin@x.com", Role::Admin).await;
        let client = create(&f, "client@x.com", Role::Client).await;

        assert!(matches!(
            f.accounts.deactivate(&admin, admin.id).await,
            Err(ServiceError::Validation(_))
        ));

        let deactivated = f.accounts.deactivate(&admin, client.id).await.unwrap();
        assert!(!deactivated.active);
        assert!(f.tokens.revocations().identity_revoked_at("client@x.com").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_admin_changes_keep_each_other() {
        let f = fixture();
        let admin = create(&f, "admin@x.com", Role::Admin).await;
        let client = create(&f, "client@x.com", Role::Client).await;

        let accounts = AccountService::new(
            Arc::new(YieldingIdentityRepository(f.identities.clone())),
            f.tokens.clone(),
            PermissionEvaluator::new(Arc::new(RolePermissions::standard())),
        );

        let (deactivated, granted, upgraded) = tokio::join!(
            accounts.deactivate(&admin, client.id),
            accounts.set_custom_grants(&admin, client.id, vec![Grant::GenerateReport]),
            accounts.change_role(&admin, client.id, Role::Employee),
        );
        deactivated.unwrap();
        granted.unwrap();
        upgraded.unwrap();

        let stored = f.identities.find_by_id(client.id).await.unwrap().unwrap();
        assert!(!stored.active);
        assert_eq!(stored.role, Role::Employee);
        assert!(stored.custom_grants.contains(&Grant::GenerateReport));
    }

    #[tokio::test]
    async fn test_check_authorization_with_resources() {
        let f = fixture();
        let employee = create(&f, "emp@x.com", Role::Employee).await;

        let check = |kind: &str, assigned: Option<i64>| AuthzCheckRequest {
            grant: Grant::ViewClient,
            resource: Some(ResourceRef {
                kind: kind.to_string(),
                id: 10,
                owner_client_id: None,
                assigned_employee_id: assigned,
            }),
        };

        let decision = f
            .accounts
            .check_authorization(&employee, &check("client", Some(employee.id)));
        assert!(decision.allowed);
        assert_eq!(decision.resource_kind.as_deref(), Some("client"));

        assert!(!f.accounts.check_authorization(&employee, &check("client", None)).allowed);
        assert!(
            !f.accounts
                .check_authorization(&employee, &check("portfolio", Some(employee.id)))
                .allowed
        );
    }
}
