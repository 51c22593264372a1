//! # Permission Resolution
//!
//! Computes a user's effective permissions as the union of:
//! 1. keys reachable through explicit user→role→permission edges, and
//! 2. keys implied by the legacy single-role field on the user record.
//!
//! Results are cached per user in a [`PermissionCache`]. Checks never fail:
//! if the store cannot be read the user is treated as holding nothing.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::PermissionCache;
use crate::catalog::legacy_permissions;
use crate::error::RbacResult;
use crate::permissions::PermissionSet;
use crate::store::{IdentityLookup, RbacStore};

/// Outcome of an authorization gate.
///
/// A denial carries the single missing key so callers can name it in the
/// response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    /// The user holds the permission.
    Granted,
    /// The user lacks `missing`.
    Denied {
        /// The key that was required.
        missing: String,
    },
}

impl PermissionDecision {
    /// Check if access was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionDecision::Granted)
    }

    /// The missing key, for denials.
    pub fn missing(&self) -> Option<&str> {
        match self {
            PermissionDecision::Granted => None,
            PermissionDecision::Denied { missing } => Some(missing),
        }
    }
}

/// Resolves and checks user permissions.
///
/// # Example
///
/// ```rust,no_run
/// use admin_rbac::{MemoryIdentityDirectory, MemoryRbacStore, PermissionCache, PermissionKey, PermissionResolver};
/// use std::sync::Arc;
///
/// async fn example() {
///     let resolver = PermissionResolver::new(
///         Arc::new(MemoryRbacStore::new()),
///         Arc::new(MemoryIdentityDirectory::new()),
///         Arc::new(PermissionCache::new()),
///     );
///
///     if !resolver.has_permission("user-1", PermissionKey::UsersWriteBan).await {
///         // reject the request
///     }
/// }
/// ```
pub struct PermissionResolver {
    store: Arc<dyn RbacStore>,
    identity: Arc<dyn IdentityLookup>,
    cache: Arc<PermissionCache>,
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("cache_ttl", &self.cache.ttl())
            .finish()
    }
}

impl PermissionResolver {
    /// Create a resolver over its storage and cache.
    pub fn new(
        store: Arc<dyn RbacStore>,
        identity: Arc<dyn IdentityLookup>,
        cache: Arc<PermissionCache>,
    ) -> Self {
        Self { store, identity, cache }
    }

    /// The cache this resolver reads and fills.
    pub fn cache(&self) -> &Arc<PermissionCache> {
        &self.cache
    }

    /// Get the effective permissions of a user, from cache when fresh.
    ///
    /// A miss or an expired entry triggers a full recomputation which is
    /// then cached for the configured TTL, unless the user was invalidated
    /// while it ran.
    pub async fn get_user_permissions(&self, user_id: &str) -> RbacResult<PermissionSet> {
        if let Some(permissions) = self.cache.get(user_id).await {
            debug!(user_id, count = permissions.len(), "Permission cache hit");
            return Ok(permissions);
        }

        let generation = self.cache.generation(user_id).await;
        let permissions = self.compute_permissions(user_id).await?;
        debug!(user_id, count = permissions.len(), "Permissions recomputed");
        if !self.cache.insert(user_id, permissions.clone(), generation).await {
            debug!(user_id, "Discarded permission fill raced by invalidation");
        }
        Ok(permissions)
    }

    async fn compute_permissions(&self, user_id: &str) -> RbacResult<PermissionSet> {
        let mut permissions: PermissionSet = self
            .store
            .user_permission_keys(user_id)
            .await?
            .into_iter()
            .collect();

        if let Some(role) = self.identity.legacy_role(user_id).await? {
            for key in legacy_permissions(&role) {
                permissions.add(key);
            }
        }

        Ok(permissions)
    }

    /// Permissions for a check; storage failures resolve to the empty set.
    async fn permissions_or_empty(&self, user_id: &str) -> PermissionSet {
        match self.get_user_permissions(user_id).await {
            Ok(permissions) => permissions,
            Err(e) => {
                warn!(user_id, error = %e, "Permission lookup failed; denying");
                PermissionSet::new()
            }
        }
    }

    /// Check if the user holds `key`.
    pub async fn has_permission(&self, user_id: &str, key: impl AsRef<str>) -> bool {
        self.permissions_or_empty(user_id).await.has(key)
    }

    /// Check if the user holds at least one of `keys`.
    pub async fn has_any_permission<K: AsRef<str>>(&self, user_id: &str, keys: &[K]) -> bool {
        self.permissions_or_empty(user_id).await.has_any(keys)
    }

    /// Check if the user holds every one of `keys`.
    pub async fn has_all_permissions<K: AsRef<str>>(&self, user_id: &str, keys: &[K]) -> bool {
        self.permissions_or_empty(user_id).await.has_all(keys)
    }

    /// Authorization gate: grant, or deny naming the missing key.
    pub async fn require_permission(&self, user_id: &str, key: impl AsRef<str>) -> PermissionDecision {
        let key = key.as_ref();
        if self.has_permission(user_id, key).await {
            PermissionDecision::Granted
        } else {
            warn!(user_id, permission = key, "Permission denied");
            PermissionDecision::Denied {
                missing: key.to_string(),
            }
        }
    }

    /// Drop one user's cached permissions.
    pub async fn invalidate_permission_cache(&self, user_id: &str) {
        if self.cache.invalidate(user_id).await {
            debug!(user_id, "Permission cache invalidated");
        }
    }

    /// Drop every cached entry.
    ///
    /// Used after changes whose affected users are unknown (role deleted,
    /// role permissions changed).
    pub async fn clear_permission_cache(&self) {
        self.cache.clear().await;
        debug!("Permission cache cleared");
    }
}
