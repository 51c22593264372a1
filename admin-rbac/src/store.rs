//! Storage seams for roles, permissions and their edges.
//!
//! The relational store itself lives outside this crate. [`RbacStore`] is the
//! primitive surface the resolver and role administration need from it, and
//! [`IdentityLookup`] is the single read the resolver makes against the user
//! record. In-memory implementations back tests and single-process setups.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::catalog::{Permission, Role};
use crate::error::{RbacError, RbacResult};

/// Storage for roles, permissions, role→permission and user→role edges.
///
/// Ordering contracts are part of the trait: implementations sort the way
/// each method documents so every backend lists identically.
#[async_trait]
pub trait RbacStore: Send + Sync {
    /// Insert a permission, or replace the row with the same id.
    async fn upsert_permission(&self, permission: &Permission) -> RbacResult<()>;

    /// Insert a role, or replace the row with the same id.
    async fn upsert_role(&self, role: &Role) -> RbacResult<()>;

    /// Insert a new role. Fails with [`RbacError::Conflict`] if the id or
    /// name is taken.
    async fn insert_role(&self, role: Role) -> RbacResult<Role>;

    /// Delete a role and its edges, but only when `is_system` is false.
    /// Returns the number of role rows removed (0 or 1).
    async fn delete_custom_role(&self, role_id: &str) -> RbacResult<u64>;

    /// All roles: system roles first, then by name.
    async fn list_roles(&self) -> RbacResult<Vec<Role>>;

    /// All permissions ordered by category, then key.
    async fn list_permissions(&self) -> RbacResult<Vec<Permission>>;

    /// Permissions granted to a role, ordered by category, then key.
    async fn role_permissions(&self, role_id: &str) -> RbacResult<Vec<Permission>>;

    /// Roles held by a user, ordered by name.
    async fn user_roles(&self, user_id: &str) -> RbacResult<Vec<Role>>;

    /// Keys reachable through the user's role edges (may contain duplicates).
    async fn user_permission_keys(&self, user_id: &str) -> RbacResult<Vec<String>>;

    /// Insert a user→role edge if absent. Returns `true` if a row was added.
    async fn insert_user_role(&self, user_id: &str, role_id: &str) -> RbacResult<bool>;

    /// Delete a user→role edge. Returns `true` if a row was removed.
    async fn delete_user_role(&self, user_id: &str, role_id: &str) -> RbacResult<bool>;

    /// Insert a role→permission edge if absent. Returns `true` if a row was added.
    async fn insert_role_permission(&self, role_id: &str, permission_id: &str) -> RbacResult<bool>;

    /// Delete a role→permission edge. Returns `true` if a row was removed.
    async fn delete_role_permission(&self, role_id: &str, permission_id: &str) -> RbacResult<bool>;
}

/// Read access to the single role field on the user record.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// The user's legacy role field, or `None` if unset or the user is unknown.
    async fn legacy_role(&self, user_id: &str) -> RbacResult<Option<String>>;
}

#[derive(Debug, Default)]
struct RbacState {
    permissions: HashMap<String, Permission>,
    roles: HashMap<String, Role>,
    /// (role_id, permission_id)
    role_permissions: BTreeSet<(String, String)>,
    /// (user_id, role_id)
    user_roles: BTreeSet<(String, String)>,
}

fn sort_permissions(permissions: &mut [Permission]) {
    permissions.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.key.cmp(&b.key)));
}

/// In-memory [`RbacStore`].
///
/// Edges enforce referential integrity the way foreign keys would: inserting
/// an edge to an unknown role or permission fails with
/// [`RbacError::NotFound`], and deleting a role cascades to its edges.
#[derive(Debug, Default)]
pub struct MemoryRbacStore {
    state: RwLock<RbacState>,
}

impl MemoryRbacStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RbacStore for MemoryRbacStore {
    async fn upsert_permission(&self, permission: &Permission) -> RbacResult<()> {
        let mut state = self.state.write().await;
        let key_taken = state
            .permissions
            .values()
            .any(|p| p.key == permission.key && p.id != permission.id);
        if key_taken {
            return Err(RbacError::Conflict(format!("permission key {} already exists", permission.key)));
        }
        state.permissions.insert(permission.id.clone(), permission.clone());
        Ok(())
    }

    async fn upsert_role(&self, role: &Role) -> RbacResult<()> {
        let mut state = self.state.write().await;
        let name_taken = state.roles.values().any(|r| r.name == role.name && r.id != role.id);
        if name_taken {
            return Err(RbacError::Conflict(format!("role name {} already exists", role.name)));
        }
        state.roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn insert_role(&self, role: Role) -> RbacResult<Role> {
        let mut state = self.state.write().await;
        if state.roles.contains_key(&role.id) {
            return Err(RbacError::Conflict(format!("role id {} already exists", role.id)));
        }
        if state.roles.values().any(|r| r.name == role.name) {
            return Err(RbacError::Conflict(format!("role name {} already exists", role.name)));
        }
        state.roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    async fn delete_custom_role(&self, role_id: &str) -> RbacResult<u64> {
        let mut state = self.state.write().await;
        match state.roles.get(role_id) {
            Some(role) if !role.is_system => {}
            _ => return Ok(0),
        }
        state.roles.remove(role_id);
        state.role_permissions.retain(|(r, _)| r != role_id);
        state.user_roles.retain(|(_, r)| r != role_id);
        Ok(1)
    }

    async fn list_roles(&self) -> RbacResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|a, b| b.is_system.cmp(&a.is_system).then_with(|| a.name.cmp(&b.name)));
        Ok(roles)
    }

    async fn list_permissions(&self) -> RbacResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state.permissions.values().cloned().collect();
        sort_permissions(&mut permissions);
        Ok(permissions)
    }

    async fn role_permissions(&self, role_id: &str) -> RbacResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state
            .role_permissions
            .iter()
            .filter(|(r, _)| r == role_id)
            .filter_map(|(_, p)| state.permissions.get(p).cloned())
            .collect();
        sort_permissions(&mut permissions);
        Ok(permissions)
    }

    async fn user_roles(&self, user_id: &str) -> RbacResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .user_roles
            .iter()
            .filter(|(u, _)| u == user_id)
            .filter_map(|(_, r)| state.roles.get(r).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn user_permission_keys(&self, user_id: &str) -> RbacResult<Vec<String>> {
        let state = self.state.read().await;
        let role_ids: BTreeSet<&String> = state
            .user_roles
            .iter()
            .filter(|(u, _)| u == user_id)
            .map(|(_, r)| r)
            .collect();

        Ok(state
            .role_permissions
            .iter()
            .filter(|(r, _)| role_ids.contains(r))
            .filter_map(|(_, p)| state.permissions.get(p))
            .map(|p| p.key.clone())
            .collect())
    }

    async fn insert_user_role(&self, user_id: &str, role_id: &str) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(role_id) {
            return Err(RbacError::NotFound(format!("role {}", role_id)));
        }
        Ok(state.user_roles.insert((user_id.to_string(), role_id.to_string())))
    }

    async fn delete_user_role(&self, user_id: &str, role_id: &str) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.user_roles.remove(&(user_id.to_string(), role_id.to_string())))
    }

    async fn insert_role_permission(&self, role_id: &str, permission_id: &str) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(role_id) {
            return Err(RbacError::NotFound(format!("role {}", role_id)));
        }
        if !state.permissions.contains_key(permission_id) {
            return Err(RbacError::NotFound(format!("permission {}", permission_id)));
        }
        Ok(state
            .role_permissions
            .insert((role_id.to_string(), permission_id.to_string())))
    }

    async fn delete_role_permission(&self, role_id: &str, permission_id: &str) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .role_permissions
            .remove(&(role_id.to_string(), permission_id.to_string())))
    }
}

/// In-memory [`IdentityLookup`] keyed by user id.
#[derive(Debug, Default)]
pub struct MemoryIdentityDirectory {
    roles: RwLock<HashMap<String, String>>,
}

impl MemoryIdentityDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear a user's legacy role field.
    pub async fn set_legacy_role(&self, user_id: &str, role: Option<&str>) {
        let mut roles = self.roles.write().await;
        match role {
            Some(role) => {
                roles.insert(user_id.to_string(), role.to_string());
            }
            None => {
                roles.remove(user_id);
            }
        }
    }
}

#[async_trait]
impl IdentityLookup for MemoryIdentityDirectory {
    async fn legacy_role(&self, user_id: &str) -> RbacResult<Option<String>> {
        Ok(self.roles.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PermissionKey, SystemRole};

    async fn seeded() -> MemoryRbacStore {
        let store = MemoryRbacStore::new();
        store.upsert_permission(&PermissionKey::UsersRead.to_permission()).await.unwrap();
        store.upsert_permission(&PermissionKey::StatsRead.to_permission()).await.unwrap();
        store.upsert_role(&SystemRole::Admin.to_role()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_role_rejects_duplicates() {
        let store = seeded().await;
        store.insert_role(Role::custom("role_editor", "editor", None)).await.unwrap();

        let dup_id = store.insert_role(Role::custom("role_editor", "other", None)).await;
        assert!(matches!(dup_id, Err(RbacError::Conflict(_))));

        let dup_name = store.insert_role(Role::custom("role_other", "editor", None)).await;
        assert!(matches!(dup_name, Err(RbacError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_system_roles_survive_delete() {
        let store = seeded().await;
        assert_eq!(store.delete_custom_role("role_admin").await.unwrap(), 0);
        assert_eq!(store.delete_custom_role("role_missing").await.unwrap(), 0);
        assert_eq!(store.list_roles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_edges() {
        let store = seeded().await;
        store.insert_role(Role::custom("role_editor", "editor", None)).await.unwrap();
        store.insert_role_permission("role_editor", "perm_users_read").await.unwrap();
        store.insert_user_role("u1", "role_editor").await.unwrap();

        assert_eq!(store.delete_custom_role("role_editor").await.unwrap(), 1);
        assert!(store.user_roles("u1").await.unwrap().is_empty());
        assert!(store.user_permission_keys("u1").await.unwrap().is_empty());
        assert!(store.role_permissions("role_editor").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edges_require_existing_rows() {
        let store = seeded().await;
        assert!(matches!(
            store.insert_user_role("u1", "role_missing").await,
            Err(RbacError::NotFound(_))
        ));
        assert!(matches!(
            store.insert_role_permission("role_admin", "perm_missing").await,
            Err(RbacError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_edges_are_idempotent() {
        let store = seeded().await;
        assert!(store.insert_user_role("u1", "role_admin").await.unwrap());
        assert!(!store.insert_user_role("u1", "role_admin").await.unwrap());
        assert!(store.delete_user_role("u1", "role_admin").await.unwrap());
        assert!(!store.delete_user_role("u1", "role_admin").await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_order() {
        let store = seeded().await;
        store.insert_role(Role::custom("role_aaa", "aaa", None)).await.unwrap();
        store.upsert_role(&SystemRole::Moderator.to_role()).await.unwrap();

        let names: Vec<String> = store.list_roles().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["admin", "moderator", "aaa"]);

        let keys: Vec<String> = store
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.key)
            .collect();
        assert_eq!(keys, vec!["admin.stats.read", "admin.users.read"]);
    }

    #[tokio::test]
    async fn test_identity_directory() {
        let directory = MemoryIdentityDirectory::new();
        assert_eq!(directory.legacy_role("u1").await.unwrap(), None);

        directory.set_legacy_role("u1", Some("admin")).await;
        assert_eq!(directory.legacy_role("u1").await.unwrap(), Some("admin".to_string()));

        directory.set_legacy_role("u1", None).await;
        assert_eq!(directory.legacy_role("u1").await.unwrap(), None);
    }
}
