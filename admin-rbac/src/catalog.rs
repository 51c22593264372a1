//! # Permission Catalog
//!
//! Seeded permission keys, their categories, the built-in system roles and
//! the legacy single-role mapping. Everything in this module is pure data:
//! the tables are consulted by the resolver and written to the store once at
//! bootstrap.
//!
//! Permission keys are part of the external contract. They are dot-namespaced
//! (`admin.<area>.<verb>[.<detail>]`) and must never be renamed.

use serde::{Deserialize, Serialize};

/// Category a permission is grouped under in admin listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    /// Read-only insight into the running system (stats, activity, audit).
    Monitoring,
    /// Operations on user accounts.
    Users,
    /// Platform-level administration.
    System,
}

impl PermissionCategory {
    /// Get the string representation of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionCategory::Monitoring => "monitoring",
            PermissionCategory::Users => "users",
            PermissionCategory::System => "system",
        }
    }

    /// Parse category from string representation (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "monitoring" => Some(PermissionCategory::Monitoring),
            "users" => Some(PermissionCategory::Users),
            "system" => Some(PermissionCategory::System),
            _ => None,
        }
    }
}

/// Built-in permission keys.
///
/// Custom permissions may exist in the store with other keys; this enum
/// covers the catalog seeded at bootstrap.
///
/// # Example
///
/// ```
/// use admin_rbac::catalog::{PermissionCategory, PermissionKey};
///
/// let key = PermissionKey::UsersWriteBan;
/// assert_eq!(key.as_str(), "admin.users.write.ban");
/// assert_eq!(key.category(), PermissionCategory::Users);
/// assert_eq!(PermissionKey::parse("admin.users.write.ban"), Some(key));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PermissionKey {
    /// View dashboard statistics.
    #[serde(rename = "admin.stats.read")]
    StatsRead,
    /// View live user activity.
    #[serde(rename = "admin.activity.read")]
    ActivityRead,
    /// Query and verify the audit log.
    #[serde(rename = "admin.audit.read")]
    AuditRead,
    /// List and inspect users.
    #[serde(rename = "admin.users.read")]
    UsersRead,
    /// Change a user's role.
    #[serde(rename = "admin.users.write.role")]
    UsersWriteRole,
    /// Ban and unban users.
    #[serde(rename = "admin.users.write.ban")]
    UsersWriteBan,
    /// Change a user's email address.
    #[serde(rename = "admin.users.write.email")]
    UsersWriteEmail,
    /// Reset a user's password.
    #[serde(rename = "admin.users.write.password")]
    UsersWritePassword,
    /// Link and unlink a user's external accounts.
    #[serde(rename = "admin.users.write.accounts")]
    UsersWriteAccounts,
    /// Revoke a user's sessions.
    #[serde(rename = "admin.users.write.sessions")]
    UsersWriteSessions,
    /// Run first-time platform bootstrap.
    #[serde(rename = "admin.system.bootstrap")]
    SystemBootstrap,
    /// Change platform settings.
    #[serde(rename = "admin.system.settings")]
    SystemSettings,
    /// Enter and leave maintenance mode.
    #[serde(rename = "admin.system.maintenance")]
    SystemMaintenance,
}

impl PermissionKey {
    /// Every catalog key, in seeding order.
    pub const ALL: &'static [PermissionKey] = &[
        PermissionKey::StatsRead,
        PermissionKey::ActivityRead,
        PermissionKey::AuditRead,
        PermissionKey::UsersRead,
        PermissionKey::UsersWriteRole,
        PermissionKey::UsersWriteBan,
        PermissionKey::UsersWriteEmail,
        PermissionKey::UsersWritePassword,
        PermissionKey::UsersWriteAccounts,
        PermissionKey::UsersWriteSessions,
        PermissionKey::SystemBootstrap,
        PermissionKey::SystemSettings,
        PermissionKey::SystemMaintenance,
    ];

    /// Get the stable key string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKey::StatsRead => "admin.stats.read",
            PermissionKey::ActivityRead => "admin.activity.read",
            PermissionKey::AuditRead => "admin.audit.read",
            PermissionKey::UsersRead => "admin.users.read",
            PermissionKey::UsersWriteRole => "admin.users.write.role",
            PermissionKey::UsersWriteBan => "admin.users.write.ban",
            PermissionKey::UsersWriteEmail => "admin.users.write.email",
            PermissionKey::UsersWritePassword => "admin.users.write.password",
            PermissionKey::UsersWriteAccounts => "admin.users.write.accounts",
            PermissionKey::UsersWriteSessions => "admin.users.write.sessions",
            PermissionKey::SystemBootstrap => "admin.system.bootstrap",
            PermissionKey::SystemSettings => "admin.system.settings",
            PermissionKey::SystemMaintenance => "admin.system.maintenance",
        }
    }

    /// Parse a key string. Keys are exact; no aliases are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.as_str() == s)
    }

    /// Store identifier used for this permission's row (`perm_<area>_<verb>...`).
    pub fn id(&self) -> String {
        let tail = self.as_str().trim_start_matches("admin.");
        format!("perm_{}", tail.replace('.', "_"))
    }

    /// Category this key is listed under.
    pub fn category(&self) -> PermissionCategory {
        match self {
            PermissionKey::StatsRead | PermissionKey::ActivityRead | PermissionKey::AuditRead => {
                PermissionCategory::Monitoring
            }
            PermissionKey::UsersRead
            | PermissionKey::UsersWriteRole
            | PermissionKey::UsersWriteBan
            | PermissionKey::UsersWriteEmail
            | PermissionKey::UsersWritePassword
            | PermissionKey::UsersWriteAccounts
            | PermissionKey::UsersWriteSessions => PermissionCategory::Users,
            PermissionKey::SystemBootstrap
            | PermissionKey::SystemSettings
            | PermissionKey::SystemMaintenance => PermissionCategory::System,
        }
    }

    /// Human-readable description shown in the admin UI.
    pub fn description(&self) -> &'static str {
        match self {
            PermissionKey::StatsRead => "View dashboard statistics",
            PermissionKey::ActivityRead => "View live user activity",
            PermissionKey::AuditRead => "View and verify the audit log",
            PermissionKey::UsersRead => "List and view user accounts",
            PermissionKey::UsersWriteRole => "Change user roles",
            PermissionKey::UsersWriteBan => "Ban and unban users",
            PermissionKey::UsersWriteEmail => "Change user email addresses",
            PermissionKey::UsersWritePassword => "Reset user passwords",
            PermissionKey::UsersWriteAccounts => "Manage linked accounts",
            PermissionKey::UsersWriteSessions => "Revoke user sessions",
            PermissionKey::SystemBootstrap => "Run platform bootstrap",
            PermissionKey::SystemSettings => "Change platform settings",
            PermissionKey::SystemMaintenance => "Toggle maintenance mode",
        }
    }

    /// Build the catalog row for this key.
    pub fn to_permission(&self) -> Permission {
        Permission {
            id: self.id(),
            key: self.as_str().to_string(),
            description: self.description().to_string(),
            category: self.category().as_str().to_string(),
        }
    }
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for PermissionKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// A permission row as stored.
///
/// Created once at bootstrap (or by an operator for custom permissions) and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Permission {
    /// Unique row identifier.
    pub id: String,
    /// Unique dot-namespaced key.
    pub key: String,
    /// Human-readable description.
    pub description: String,
    /// Category name (see [`PermissionCategory`] for the built-in ones).
    pub category: String,
}

impl Permission {
    /// Create a permission row.
    pub fn new(
        id: impl Into<String>,
        key: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            description: description.into(),
            category: category.into(),
        }
    }
}

/// A named policy bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Role {
    /// Unique identifier.
    pub id: String,
    /// Unique name.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// System roles are seeded at bootstrap and cannot be deleted.
    pub is_system: bool,
}

impl Role {
    /// Create a custom (non-system) role.
    pub fn custom(id: impl Into<String>, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description,
            is_system: false,
        }
    }
}

const ADMIN_PERMISSIONS: &[PermissionKey] = &[
    PermissionKey::StatsRead,
    PermissionKey::ActivityRead,
    PermissionKey::AuditRead,
    PermissionKey::UsersRead,
    PermissionKey::UsersWriteBan,
    PermissionKey::UsersWriteSessions,
];

const MODERATOR_PERMISSIONS: &[PermissionKey] = &[
    PermissionKey::StatsRead,
    PermissionKey::ActivityRead,
    PermissionKey::UsersRead,
    PermissionKey::UsersWriteBan,
];

const READONLY_PERMISSIONS: &[PermissionKey] = &[
    PermissionKey::StatsRead,
    PermissionKey::ActivityRead,
    PermissionKey::AuditRead,
    PermissionKey::UsersRead,
];

/// Roles seeded at bootstrap.
///
/// These carry `is_system = true` in the store and are structurally
/// protected from deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    /// Every catalog permission.
    Superadmin,
    /// Day-to-day administration.
    Admin,
    /// User moderation.
    Moderator,
    /// Read-only oversight.
    Readonly,
}

impl SystemRole {
    /// All system roles, in seeding order.
    pub const ALL: &'static [SystemRole] = &[
        SystemRole::Superadmin,
        SystemRole::Admin,
        SystemRole::Moderator,
        SystemRole::Readonly,
    ];

    /// Store identifier (`role_<name>`).
    pub fn id(&self) -> &'static str {
        match self {
            SystemRole::Superadmin => "role_superadmin",
            SystemRole::Admin => "role_admin",
            SystemRole::Moderator => "role_moderator",
            SystemRole::Readonly => "role_readonly",
        }
    }

    /// Role name.
    pub fn name(&self) -> &'static str {
        match self {
            SystemRole::Superadmin => "superadmin",
            SystemRole::Admin => "admin",
            SystemRole::Moderator => "moderator",
            SystemRole::Readonly => "readonly",
        }
    }

    /// Role description.
    pub fn description(&self) -> &'static str {
        match self {
            SystemRole::Superadmin => "Full access to every admin capability",
            SystemRole::Admin => "Standard administration of users and monitoring",
            SystemRole::Moderator => "User moderation and monitoring",
            SystemRole::Readonly => "Read-only access to monitoring and users",
        }
    }

    /// Permissions granted to this role at bootstrap.
    pub fn permissions(&self) -> &'static [PermissionKey] {
        match self {
            SystemRole::Superadmin => PermissionKey::ALL,
            SystemRole::Admin => ADMIN_PERMISSIONS,
            SystemRole::Moderator => MODERATOR_PERMISSIONS,
            SystemRole::Readonly => READONLY_PERMISSIONS,
        }
    }

    /// Look up a system role by its store identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|role| role.id() == id)
    }

    /// Build the role row for this system role.
    pub fn to_role(&self) -> Role {
        Role {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            is_system: true,
        }
    }
}

/// Values of the single-role field carried on the user record.
///
/// The field predates explicit role assignments; its mapping is additive to
/// whatever roles the user holds explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LegacyRole {
    /// Implies every catalog permission.
    Superadmin,
    /// Implies the admin set.
    Admin,
    /// Implies the moderator set.
    Moderator,
}

impl LegacyRole {
    /// Parse the legacy field (case-insensitive). Unknown values yield `None`.
    ///
    /// # Example
    ///
    /// ```
    /// use admin_rbac::catalog::LegacyRole;
    ///
    /// assert_eq!(LegacyRole::parse("ADMIN"), Some(LegacyRole::Admin));
    /// assert_eq!(LegacyRole::parse("user"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "superadmin" => Some(LegacyRole::Superadmin),
            "admin" => Some(LegacyRole::Admin),
            "moderator" => Some(LegacyRole::Moderator),
            _ => None,
        }
    }

    /// Permissions implied by this legacy value.
    pub fn permissions(&self) -> &'static [PermissionKey] {
        match self {
            LegacyRole::Superadmin => PermissionKey::ALL,
            LegacyRole::Admin => ADMIN_PERMISSIONS,
            LegacyRole::Moderator => MODERATOR_PERMISSIONS,
        }
    }
}

/// Permissions implied by a raw legacy role field; empty for unknown values.
pub fn legacy_permissions(role: &str) -> &'static [PermissionKey] {
    LegacyRole::parse(role).map(|r| r.permissions()).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique_and_parse_back() {
        let strings: HashSet<&str> = PermissionKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(strings.len(), PermissionKey::ALL.len());

        for key in PermissionKey::ALL {
            assert_eq!(PermissionKey::parse(key.as_str()), Some(*key));
            assert!(key.as_str().starts_with("admin."));
        }
        assert_eq!(PermissionKey::parse("admin.stats.write"), None);
    }

    #[test]
    fn test_key_ids() {
        assert_eq!(PermissionKey::StatsRead.id(), "perm_stats_read");
        assert_eq!(PermissionKey::UsersWriteBan.id(), "perm_users_write_ban");
        assert_eq!(PermissionKey::SystemBootstrap.id(), "perm_system_bootstrap");
    }

    #[test]
    fn test_key_categories() {
        assert_eq!(PermissionKey::AuditRead.category(), PermissionCategory::Monitoring);
        assert_eq!(PermissionKey::UsersWriteSessions.category(), PermissionCategory::Users);
        assert_eq!(PermissionKey::SystemSettings.category(), PermissionCategory::System);

        for key in PermissionKey::ALL {
            let area = key.as_str().split('.').nth(1).unwrap();
            match key.category() {
                PermissionCategory::Users => assert_eq!(area, "users"),
                PermissionCategory::System => assert_eq!(area, "system"),
                PermissionCategory::Monitoring => {
                    assert!(["stats", "activity", "audit"].contains(&area))
                }
            }
        }
    }

    #[test]
    fn test_key_display_matches_key_string() {
        assert_eq!(PermissionKey::UsersWriteBan.to_string(), "admin.users.write.ban");
        assert_eq!(PermissionKey::UsersWriteBan.as_ref(), "admin.users.write.ban");
    }

    #[test]
    fn test_legacy_mapping_table() {
        assert_eq!(legacy_permissions("superadmin").len(), PermissionKey::ALL.len());
        assert_eq!(
            legacy_permissions("admin"),
            &[
                PermissionKey::StatsRead,
                PermissionKey::ActivityRead,
                PermissionKey::AuditRead,
                PermissionKey::UsersRead,
                PermissionKey::UsersWriteBan,
                PermissionKey::UsersWriteSessions,
            ]
        );
        assert_eq!(
            legacy_permissions("Moderator"),
            &[
                PermissionKey::StatsRead,
                PermissionKey::ActivityRead,
                PermissionKey::UsersRead,
                PermissionKey::UsersWriteBan,
            ]
        );
        assert!(legacy_permissions("user").is_empty());
        assert!(legacy_permissions("").is_empty());
    }

    #[test]
    fn test_legacy_parse_is_case_insensitive() {
        assert_eq!(LegacyRole::parse("SuperAdmin"), Some(LegacyRole::Superadmin));
        assert_eq!(LegacyRole::parse("MODERATOR"), Some(LegacyRole::Moderator));
        assert_eq!(LegacyRole::parse("readonly"), None);
    }

    #[test]
    fn test_system_roles() {
        assert_eq!(SystemRole::from_id("role_superadmin"), Some(SystemRole::Superadmin));
        assert_eq!(SystemRole::from_id("role_editor"), None);

        let role = SystemRole::Readonly.to_role();
        assert!(role.is_system);
        assert_eq!(role.name, "readonly");
        assert!(SystemRole::Readonly
            .permissions()
            .iter()
            .all(|k| k.category() != PermissionCategory::System));

        assert_eq!(SystemRole::Superadmin.permissions(), PermissionKey::ALL);
    }

    #[test]
    fn test_custom_role_is_not_system() {
        let role = Role::custom("role_editor", "editor", None);
        assert!(!role.is_system);
        assert!(role.description.is_none());
    }
}
