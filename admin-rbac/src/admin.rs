//! # Role Administration
//!
//! Reads and mutations over roles, permissions and their edges. Every
//! mutation invalidates resolver caches:
//! - user→role edge changes drop that user's entry;
//! - role deletion and role→permission edge changes clear the whole cache,
//!   since the set of affected users is not tracked.
//!
//! Mutations report success as booleans and log storage failures rather
//! than propagating them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::catalog::{Permission, PermissionKey, Role, SystemRole};
use crate::error::{RbacError, RbacResult};
use crate::resolver::PermissionResolver;
use crate::store::RbacStore;

/// A user's roles together with their effective permission keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissionSummary {
    /// Explicitly assigned roles, ordered by name.
    pub roles: Vec<Role>,
    /// Effective permission keys (explicit plus legacy), sorted.
    pub permissions: Vec<String>,
}

/// Role and permission administration.
pub struct RoleAdmin {
    store: Arc<dyn RbacStore>,
    resolver: Arc<PermissionResolver>,
}

impl std::fmt::Debug for RoleAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleAdmin").finish_non_exhaustive()
    }
}

impl RoleAdmin {
    /// Create role administration over the same store the resolver reads.
    pub fn new(store: Arc<dyn RbacStore>, resolver: Arc<PermissionResolver>) -> Self {
        Self { store, resolver }
    }

    /// Seed catalog permissions, system roles and system role grants.
    ///
    /// Idempotent: permissions and roles are upserted, grants are inserted
    /// only when absent, and custom grants on system roles are left alone.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> RbacResult<()> {
        for key in PermissionKey::ALL {
            self.store.upsert_permission(&key.to_permission()).await?;
        }

        let mut granted = 0usize;
        for role in SystemRole::ALL {
            self.store.upsert_role(&role.to_role()).await?;
            for key in role.permissions() {
                if self.store.insert_role_permission(role.id(), &key.id()).await? {
                    granted += 1;
                }
            }
        }

        self.resolver.clear_permission_cache().await;
        info!(
            permissions = PermissionKey::ALL.len(),
            roles = SystemRole::ALL.len(),
            new_grants = granted,
            "RBAC catalog seeded"
        );
        Ok(())
    }

    /// All roles: system roles first, then by name.
    pub async fn get_all_roles(&self) -> RbacResult<Vec<Role>> {
        self.store.list_roles().await
    }

    /// All permissions ordered by category, then key.
    pub async fn get_all_permissions(&self) -> RbacResult<Vec<Permission>> {
        self.store.list_permissions().await
    }

    /// Permissions granted to a role. Unknown roles yield an empty list.
    pub async fn get_role_permissions(&self, role_id: &str) -> RbacResult<Vec<Permission>> {
        self.store.role_permissions(role_id).await
    }

    /// Roles explicitly held by a user, ordered by name.
    pub async fn get_user_roles(&self, user_id: &str) -> RbacResult<Vec<Role>> {
        self.store.user_roles(user_id).await
    }

    /// Roles plus the sorted effective permission list for a user.
    pub async fn get_user_permission_summary(&self, user_id: &str) -> RbacResult<UserPermissionSummary> {
        let roles = self.store.user_roles(user_id).await?;
        let permissions = self.resolver.get_user_permissions(user_id).await?;
        Ok(UserPermissionSummary {
            roles,
            permissions: permissions.sorted(),
        })
    }

    /// Grant a role to a user (no-op if already held).
    #[instrument(skip(self))]
    pub async fn assign_role_to_user(&self, user_id: &str, role_id: &str) -> bool {
        match self.store.insert_user_role(user_id, role_id).await {
            Ok(_) => {
                self.resolver.invalidate_permission_cache(user_id).await;
                info!("Role assigned");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to assign role");
                false
            }
        }
    }

    /// Revoke a role from a user (no-op if not held).
    #[instrument(skip(self))]
    pub async fn remove_role_from_user(&self, user_id: &str, role_id: &str) -> bool {
        match self.store.delete_user_role(user_id, role_id).await {
            Ok(_) => {
                self.resolver.invalidate_permission_cache(user_id).await;
                info!("Role removed");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to remove role");
                false
            }
        }
    }

    /// Create a custom role. Returns `None` if the id or name is taken.
    #[instrument(skip(self, description))]
    pub async fn create_role(&self, id: &str, name: &str, description: Option<&str>) -> Option<Role> {
        let description = description.filter(|d| !d.is_empty()).map(str::to_string);
        match self.store.insert_role(Role::custom(id, name, description)).await {
            Ok(role) => {
                info!("Role created");
                Some(role)
            }
            Err(RbacError::Conflict(reason)) => {
                warn!(%reason, "Role not created");
                None
            }
            Err(e) => {
                error!(error = %e, "Failed to create role");
                None
            }
        }
    }

    /// Delete a custom role and its edges.
    ///
    /// System roles are never deleted: the request affects zero rows and
    /// reports `false`. The whole permission cache is cleared either way.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, role_id: &str) -> bool {
        let result = self.store.delete_custom_role(role_id).await;
        self.resolver.clear_permission_cache().await;

        match result {
            Ok(0) => {
                warn!("Role not deleted (system role or unknown id)");
                false
            }
            Ok(_) => {
                info!("Role deleted");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to delete role");
                false
            }
        }
    }

    /// Grant a permission to a role (no-op if already granted).
    #[instrument(skip(self))]
    pub async fn assign_permission_to_role(&self, role_id: &str, permission_id: &str) -> bool {
        match self.store.insert_role_permission(role_id, permission_id).await {
            Ok(_) => {
                self.resolver.clear_permission_cache().await;
                info!("Permission assigned to role");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to assign permission");
                false
            }
        }
    }

    /// Revoke a permission from a role (no-op if not granted).
    #[instrument(skip(self))]
    pub async fn remove_permission_from_role(&self, role_id: &str, permission_id: &str) -> bool {
        match self.store.delete_role_permission(role_id, permission_id).await {
            Ok(_) => {
                self.resolver.clear_permission_cache().await;
                info!("Permission removed from role");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to remove permission");
                false
            }
        }
    }
}
