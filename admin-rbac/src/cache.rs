//! Per-user permission cache with a fixed TTL.
//!
//! The cache is an explicit service instance: construct one at startup and
//! share it (behind an `Arc`) between the resolver and role administration.
//! Expiry is measured with `tokio::time::Instant` so paused-clock tests can
//! drive it.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::permissions::PermissionSet;

/// Default time a resolved permission set stays valid.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CachedPermissions {
    permissions: PermissionSet,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CachedPermissions>,
    /// Bumped per user by `invalidate`.
    generations: HashMap<String, u64>,
    /// Bumped by `clear`.
    epoch: u64,
}

impl CacheState {
    fn generation(&self, user_id: &str) -> CacheGeneration {
        CacheGeneration {
            epoch: self.epoch,
            user: self.generations.get(user_id).copied().unwrap_or(0),
        }
    }
}

/// Snapshot of the invalidation state for one user.
///
/// Take it before reading the store and hand it back to
/// [`PermissionCache::insert`]; a fill whose snapshot is older than the last
/// `invalidate` or `clear` is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeneration {
    epoch: u64,
    user: u64,
}

/// Concurrency-safe map from user id to resolved permissions.
#[derive(Debug)]
pub struct PermissionCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl PermissionCache {
    /// Create a cache with the default five-minute TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a user's cached permissions if present and not expired.
    pub async fn get(&self, user_id: &str) -> Option<PermissionSet> {
        let state = self.state.read().await;
        state
            .entries
            .get(user_id)
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| cached.permissions.clone())
    }

    /// Current invalidation snapshot for `user_id`.
    pub async fn generation(&self, user_id: &str) -> CacheGeneration {
        self.state.read().await.generation(user_id)
    }

    /// Cache a set computed after `generation` was taken.
    ///
    /// Returns `false` and stores nothing if the user was invalidated or the
    /// cache cleared since then.
    pub async fn insert(&self, user_id: &str, permissions: PermissionSet, generation: CacheGeneration) -> bool {
        let mut state = self.state.write().await;
        if state.generation(user_id) != generation {
            return false;
        }
        let cached = CachedPermissions {
            permissions,
            expires_at: Instant::now() + self.ttl,
        };
        state.entries.insert(user_id.to_string(), cached);
        true
    }

    /// Remove one user's entry. Returns `true` if an entry was present.
    ///
    /// Fills already in flight for this user are discarded.
    pub async fn invalidate(&self, user_id: &str) -> bool {
        let mut state = self.state.write().await;
        *state.generations.entry(user_id.to_string()).or_insert(0) += 1;
        state.entries.remove(user_id).is_some()
    }

    /// Remove every entry and discard every fill in flight.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.epoch += 1;
        state.generations.clear();
        state.entries.clear();
    }

    /// Drop expired entries and return how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, cached| cached.expires_at > now);
        before - state.entries.len()
    }

    /// Number of entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Check if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> PermissionSet {
        keys.iter().copied().collect()
    }

    async fn fill(cache: &PermissionCache, user_id: &str, keys: &[&str]) {
        let generation = cache.generation(user_id).await;
        assert!(cache.insert(user_id, set(keys), generation).await);
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = PermissionCache::new();
        assert!(cache.get("u1").await.is_none());

        fill(&cache, "u1", &["a.read"]).await;
        assert_eq!(cache.get("u1").await, Some(set(&["a.read"])));
        assert!(cache.get("u2").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = PermissionCache::with_ttl(Duration::from_secs(60));
        fill(&cache, "u1", &["a.read"]).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("u1").await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("u1").await.is_none());
        assert_eq!(cache.len().await, 1);

        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = PermissionCache::new();
        fill(&cache, "u1", &["a.read"]).await;
        fill(&cache, "u2", &["b.read"]).await;

        assert!(cache.invalidate("u1").await);
        assert!(!cache.invalidate("u1").await);
        assert!(cache.get("u2").await.is_some());

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_fill_after_invalidate_is_dropped() {
        let cache = PermissionCache::new();
        let stale = cache.generation("u1").await;
        let other = cache.generation("u2").await;

        cache.invalidate("u1").await;
        assert!(!cache.insert("u1", set(&["a.read"]), stale).await);
        assert!(cache.get("u1").await.is_none());

        // Other users are unaffected by a targeted invalidation.
        assert!(cache.insert("u2", set(&["b.read"]), other).await);

        let fresh = cache.generation("u1").await;
        assert!(cache.insert("u1", set(&["a.read"]), fresh).await);
        assert!(cache.get("u1").await.is_some());
    }

    #[tokio::test]
    async fn test_fill_after_clear_is_dropped() {
        let cache = PermissionCache::new();
        let stale = cache.generation("u1").await;

        cache.invalidate("u1").await;
        cache.clear().await;
        assert_ne!(cache.generation("u1").await, stale);
        assert!(!cache.insert("u1", set(&["a.read"]), stale).await);
        assert!(cache.is_empty().await);
    }
}
