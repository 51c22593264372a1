//! # Admin RBAC (Role-Based Access Control)
//!
//! This crate decides what an admin user may do.
//!
//! ## Overview
//!
//! The admin-rbac crate handles:
//! - **Catalog**: Seeded permission keys, categories and system roles
//! - **Resolution**: A user's effective permissions (explicit roles + legacy role field)
//! - **Caching**: Per-user TTL cache shared by resolution and administration
//! - **Administration**: Role/permission CRUD and edge assignment with cache invalidation
//!
//! ## Architecture
//!
//! ```text
//! user ──UserRole──▶ role ──RolePermission──▶ permission key
//!   │
//!   └─ legacy role field ──(static table)──▶ permission keys
//!
//! effective permissions = union of both, cached per user (5 min TTL)
//! ```
//!
//! ## Permission Keys
//!
//! Keys are stable, dot-namespaced strings grouped by category:
//!
//! **Monitoring**: `admin.stats.read`, `admin.activity.read`, `admin.audit.read`
//!
//! **Users**: `admin.users.read`, `admin.users.write.{role,ban,email,password,accounts,sessions}`
//!
//! **System**: `admin.system.{bootstrap,settings,maintenance}`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use admin_rbac::{
//!     MemoryIdentityDirectory, MemoryRbacStore, PermissionCache, PermissionDecision,
//!     PermissionKey, PermissionResolver, RoleAdmin,
//! };
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let store = Arc::new(MemoryRbacStore::new());
//!     let resolver = Arc::new(PermissionResolver::new(
//!         store.clone(),
//!         Arc::new(MemoryIdentityDirectory::new()),
//!         Arc::new(PermissionCache::new()),
//!     ));
//!     let admin = RoleAdmin::new(store, resolver.clone());
//!     admin.bootstrap().await.unwrap();
//!
//!     admin.assign_role_to_user("user-1", "role_moderator").await;
//!
//!     match resolver.require_permission("user-1", PermissionKey::UsersWriteBan).await {
//!         PermissionDecision::Granted => { /* proceed */ }
//!         PermissionDecision::Denied { missing } => println!("missing {missing}"),
//!     }
//! }
//! ```
//!
//! ## Cache Invalidation
//!
//! - Assigning or removing a user's role drops that user's cache entry.
//! - Deleting a role or changing a role's permissions clears the entire
//!   cache: without a reverse index the affected users are unknown.

pub mod admin;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod permissions;
pub mod resolver;
pub mod store;

// Re-export main types for convenience
pub use admin::{RoleAdmin, UserPermissionSummary};
pub use cache::{CacheGeneration, PermissionCache, DEFAULT_CACHE_TTL};
pub use catalog::{LegacyRole, Permission, PermissionCategory, PermissionKey, Role, SystemRole};
pub use error::{RbacError, RbacResult};
pub use permissions::PermissionSet;
pub use resolver::{PermissionDecision, PermissionResolver};
pub use store::{IdentityLookup, MemoryIdentityDirectory, MemoryRbacStore, RbacStore};
