use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::{clock::Clock, ServiceError};
use crate::models::{normalize_email, Identity, NewIdentity};

/// Field-level change applied to a stored identity. Returning an error
/// leaves the record untouched.
pub type IdentityChange = Box<dyn FnOnce(&mut Identity) -> Result<(), ServiceError> + Send>;

/// Persistence seam for identities.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Insert a new identity; the email must not be registered yet.
    async fn insert(&self, new: NewIdentity) -> Result<Identity, ServiceError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, ServiceError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, ServiceError>;

    /// Apply `change` to the current record in one step, so concurrent
    /// changes to different fields of the same identity never undo each
    /// other.
    async fn update_with(&self, id: i64, change: IdentityChange) -> Result<Identity, ServiceError>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

/// Process-local repository. Ids start at 1 and only grow.
pub struct InMemoryIdentityRepository {
    by_id: DashMap<i64, Identity>,
    id_by_email: DashMap<String, i64>,
    next_id: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl InMemoryIdentityRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            by_id: DashMap::new(),
            id_by_email: DashMap::new(),
            next_id: AtomicI64::new(1),
            clock,
        }
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn insert(&self, new: NewIdentity) -> Result<Identity, ServiceError> {
        let email = normalize_email(&new.email);

        let id = match self.id_by_email.entry(email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(ServiceError::EmailAlreadyRegistered)
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                entry.insert(id);
                id
            }
        };

        let now = self.clock.now();
        let identity = Identity {
            id,
            email,
            display_name: new.display_name,
            role: new.role,
            custom_grants: Default::default(),
            active: true,
            password_hash: new.password_hash,
            created_utc: now,
            updated_utc: now,
        };
        self.by_id.insert(id, identity.clone());

        Ok(identity)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, ServiceError> {
        let id = match self.id_by_email.get(&normalize_email(email)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.by_id.get(&id).map(|identity| identity.clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, ServiceError> {
        Ok(self.by_id.get(&id).map(|identity| identity.clone()))
    }

    async fn update_with(&self, id: i64, change: IdentityChange) -> Result<Identity, ServiceError> {
        let mut stored = self
            .by_id
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound("Identity".to_string()))?;

        let mut identity = stored.clone();
        change(&mut identity)?;

        if identity.id != stored.id || identity.email != stored.email {
            return Err(ServiceError::Validation(
                "Id and email cannot be changed".to_string(),
            ));
        }

        identity.updated_utc = self.clock.now();
        *stored = identity.clone();
        Ok(identity)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

/// Repository wrapper that yields to the scheduler before every call, so
/// tests can interleave concurrent service operations the way a networked
/// store would.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) struct YieldingIdentityRepository(pub Arc<InMemoryIdentityRepository>);

    #[async_trait]
    impl IdentityRepository for YieldingIdentityRepository {
        async fn insert(&self, new: NewIdentity) -> Result<Identity, ServiceError> {
            tokio::task::yield_now().await;
            self.0.insert(new).await
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, ServiceError> {
            tokio::task::yield_now().await;
            self.0.find_by_email(email).await
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, ServiceError> {
            tokio::task::yield_now().await;
            self.0.find_by_id(id).await
        }

        async fn update_with(
            &self,
            id: i64,
            change: IdentityChange,
        ) -> Result<Identity, ServiceError> {
            tokio::task::yield_now().await;
            self.0.update_with(id, change).await
        }

        async fn health_check(&self) -> Result<(), anyhow::Error> {
            self.0.health_check().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::clock::SystemClock;

    fn new_identity(email: &str) -> NewIdentity {
        NewIdentity {
            email: email.to_string(),
            display_name: "Test".to_string(),
            role: Role::Client,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_normalizes_and_assigns_ids() {
        let repo = InMemoryIdentityRepository::new(Arc::new(SystemClock));
        let first = repo.insert(new_identity(" First@Example.com")).await.unwrap();
        let second = repo.insert(new_identity("second@example.com")).await.unwrap();

        assert_eq!(first.email, "first@example.com");
        assert!(first.active);
        assert!(second.id > first.id);

        let found = repo.find_by_email("FIRST@example.com").await.unwrap();
        assert_eq!(found.map(|i| i.id), Some(first.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = InMemoryIdentityRepository::new(Arc::new(SystemClock));
        repo.insert(new_identity("dup@example.com")).await.unwrap();
        let err = repo.insert(new_identity("DUP@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmailAlreadyRegistered));
    }

    #[tokio::test]
    async fn test_update_with_changes_only_touched_fields() {
        let repo = InMemoryIdentityRepository::new(Arc::new(SystemClock));
        let identity = repo.insert(new_identity("u@example.com")).await.unwrap();

        repo.update_with(
            identity.id,
            Box::new(|identity: &mut Identity| {
                identity.active = false;
                Ok(())
            }),
        )
        .await
        .unwrap();
        // A change built from a stale snapshot must not resurrect the identity.
        repo.update_with(
            identity.id,
            Box::new(|identity: &mut Identity| {
                identity.role = Role::Employee;
                Ok(())
            }),
        )
        .await
        .unwrap();

        let stored = repo.find_by_id(identity.id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Employee);
        assert!(!stored.active);

        assert!(matches!(
            repo.update_with(999, Box::new(|_: &mut Identity| Ok(()))).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_change_leaves_record_untouched() {
        let repo = InMemoryIdentityRepository::new(Arc::new(SystemClock));
        let identity = repo.insert(new_identity("u@example.com")).await.unwrap();

        let result = repo
            .update_with(
                identity.id,
                Box::new(|identity: &mut Identity| {
                    identity.active = false;
                    Err(ServiceError::Validation("nope".to_string()))
                }),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));

        let renamed = repo
            .update_with(
                identity.id,
                Box::new(|identity: &mut Identity| {
                    identity.email = "other@example.com".to_string();
                    Ok(())
                }),
            )
            .await;
        assert!(matches!(renamed, Err(ServiceError::Validation(_))));

        let stored = repo.find_by_id(identity.id).await.unwrap().unwrap();
        assert!(stored.active);
        assert_eq!(stored.email, "u@example.com");
    }
}
