//! Revocation store: per-token blacklist plus per-identity blanket revocation.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::clock::Clock;

/// Outcome of one compaction sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    pub tokens_removed: usize,
    pub identities_removed: usize,
}

pub trait RevocationStore: Send + Sync {
    /// Blacklist a token for the retention window. Returns `false` when it was
    /// already blacklisted; the existing entry is left untouched.
    fn revoke_token(&self, token: &str) -> bool;

    fn is_token_revoked(&self, token: &str) -> bool;

    /// Invalidate every token issued to `email` up to now. Returns the
    /// recorded revocation instant.
    fn revoke_identity(&self, email: &str) -> DateTime<Utc>;

    fn identity_revoked_at(&self, email: &str) -> Option<DateTime<Utc>>;

    /// Drop entries whose retention has passed.
    fn compact(&self) -> CompactionStats;

    fn revoked_token_count(&self) -> usize;
}

/// Key revoked tokens by digest so raw bearer credentials are never held.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// In-process revocation store on sharded concurrent maps.
pub struct InMemoryRevocationStore {
    /// fingerprint -> retained until
    tokens: DashMap<String, DateTime<Utc>>,
    /// normalised email -> blanket revocation instant
    identities: DashMap<String, DateTime<Utc>>,
    retention: Duration,
    /// Never shorter than `retention`; must cover the longest token lifetime.
    identity_retention: Duration,
    compaction_threshold: usize,
    clock: Arc<dyn Clock>,
}

impl InMemoryRevocationStore {
    pub fn new(retention: Duration, compaction_threshold: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            tokens: DashMap::new(),
            identities: DashMap::new(),
            retention,
            identity_retention: retention,
            compaction_threshold: compaction_threshold.max(1),
            clock,
        }
    }

    /// Keep blanket revocations for `retention`, never less than the
    /// per-token window.
    pub fn with_identity_retention(mut self, retention: Duration) -> Self {
        self.identity_retention = retention.max(self.retention);
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn identity_retention(&self) -> Duration {
        self.identity_retention
    }
}

impl RevocationStore for InMemoryRevocationStore {
    fn revoke_token(&self, token: &str) -> bool {
        let now = self.clock.now();
        let retain_until = now + self.retention;
        let inserted = match self.tokens.entry(token_fingerprint(token)) {
            // A lapsed entry awaiting compaction counts as absent.
            dashmap::mapref::entry::Entry::Occupied(mut entry) if *entry.get() <= now => {
                entry.insert(retain_until);
                true
            }
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(retain_until);
                true
            }
        };

        if inserted && self.tokens.len() > self.compaction_threshold {
            let stats = self.compact();
            tracing::debug!(
                tokens_removed = stats.tokens_removed,
                identities_removed = stats.identities_removed,
                "Size-triggered revocation compaction"
            );
        }

        inserted
    }

    fn is_token_revoked(&self, token: &str) -> bool {
        let now = self.clock.now();
        self.tokens
            .get(&token_fingerprint(token))
            .is_some_and(|retain_until| *retain_until > now)
    }

    fn revoke_identity(&self, email: &str) -> DateTime<Utc> {
        let now = self.clock.now();
        self.identities.insert(email.to_string(), now);
        now
    }

    fn identity_revoked_at(&self, email: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.identities
            .get(email)
            .map(|revoked_at| *revoked_at)
            .filter(|revoked_at| *revoked_at + self.identity_retention > now)
    }

    fn compact(&self) -> CompactionStats {
        let now = self.clock.now();

        let tokens_before = self.tokens.len();
        self.tokens.retain(|_, retain_until| *retain_until > now);

        let identities_before = self.identities.len();
        let retention = self.identity_retention;
        self.identities
            .retain(|_, revoked_at| *revoked_at + retention > now);

        CompactionStats {
            tokens_removed: tokens_before.saturating_sub(self.tokens.len()),
            identities_removed: identities_before.saturating_sub(self.identities.len()),
        }
    }

    fn revoked_token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Periodically compact `store` until `shutdown` is cancelled.
pub fn spawn_compaction_task(
    store: Arc<dyn RevocationStore>,
    every: std::time::Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Revocation compaction task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let stats = store.compact();
                    if stats.tokens_removed > 0 || stats.identities_removed > 0 {
                        tracing::info!(
                            tokens_removed = stats.tokens_removed,
                            identities_removed = stats.identities_removed,
                            remaining = store.revoked_token_count(),
                            "Compacted revocation store"
                        );
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;

    fn store(threshold: usize) -> (InMemoryRevocationStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = InMemoryRevocationStore::new(Duration::hours(24), threshold, clock.clone());
        (store, clock)
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let (store, _) = store(100);
        assert!(store.revoke_token("T1"));
        assert!(store.is_token_revoked("T1"));
        assert_eq!(store.revoked_token_count(), 1);

        assert!(!store.revoke_token("T1"));
        assert_eq!(store.revoked_token_count(), 1);
        assert!(!store.is_token_revoked("T2"));
    }

    #[test]
    fn test_revocation_lasts_for_retention_window() {
        let (store, clock) = store(100);
        store.revoke_token("T1");

        clock.advance(Duration::hours(23));
        assert!(store.is_token_revoked("T1"));

        clock.advance(Duration::hours(1));
        assert!(!store.is_token_revoked("T1"));
    }

    #[test]
    fn test_compaction_drops_expired_entries() {
        let (store, clock) = store(100);
        store.revoke_token("old");
        store.revoke_identity("a@x.com");

        clock.advance(Duration::hours(12));
        store.revoke_token("new");

        clock.advance(Duration::hours(13));
        let stats = store.compact();
        assert_eq!(
            stats,
            CompactionStats {
                tokens_removed: 1,
                identities_removed: 1
            }
        );
        assert_eq!(store.revoked_token_count(), 1);
        assert!(store.is_token_revoked("new"));
        assert_eq!(store.identity_revoked_at("a@x.com"), None);
    }

    #[test]
    fn test_size_triggered_compaction() {
        let (store, clock) = store(2);
        store.revoke_token("a");
        store.revoke_token("b");
        clock.advance(Duration::hours(25));

        store.revoke_token("c");
        assert_eq!(store.revoked_token_count(), 1);
        assert!(store.is_token_revoked("c"));
    }

    #[test]
    fn test_identity_revocation_records_instant() {
        let (store, clock) = store(100);
        assert_eq!(store.identity_revoked_at("a@x.com"), None);

        let at = store.revoke_identity("a@x.com");
        assert_eq!(at, clock.now());
        assert_eq!(store.identity_revoked_at("a@x.com"), Some(at));

        clock.advance(Duration::minutes(5));
        let later = store.revoke_identity("a@x.com");
        assert_eq!(store.identity_revoked_at("a@x.com"), Some(later));
    }

    #[test]
    fn test_identity_revocation_outlives_token_retention() {
        let (store, clock) = store(100);
        let store = store.with_identity_retention(Duration::days(7));
        store.revoke_token("T1");
        let at = store.revoke_identity("a@x.com");

        clock.advance(Duration::hours(25));
        assert_eq!(
            store.compact(),
            CompactionStats {
                tokens_removed: 1,
                identities_removed: 0
            }
        );
        assert_eq!(store.identity_revoked_at("a@x.com"), Some(at));

        clock.advance(Duration::days(6));
        assert_eq!(store.compact().identities_removed, 1);
        assert_eq!(store.identity_revoked_at("a@x.com"), None);
    }

    #[test]
    fn test_identity_retention_never_below_token_retention() {
        let (store, _) = store(100);
        let store = store.with_identity_retention(Duration::hours(1));
        assert_eq!(store.identity_retention(), Duration::hours(24));
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let fp = token_fingerprint("T1");
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, token_fingerprint("T1"));
        assert_ne!(fp, token_fingerprint("T2"));
    }

    #[tokio::test]
    async fn test_compaction_task_stops_on_shutdown() {
        let (store, _) = store(100);
        let shutdown = CancellationToken::new();
        let handle = spawn_compaction_task(
            Arc::new(store),
            std::time::Duration::from_millis(10),
            shutdown.clone(),
        );

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("compaction task did not stop")
            .expect("compaction task panicked");
    }
}
