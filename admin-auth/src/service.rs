//! Service container wiring the admin trust components together.

use std::sync::Arc;
use tracing::info;

use admin_audit::{AuditLedger, AuditStore, MemoryAuditStore};
use admin_rbac::{IdentityLookup, MemoryRbacStore, PermissionCache, PermissionResolver, RbacStore, RoleAdmin};

use crate::config::AdminTrustConfig;
use crate::error::AdminResult;
use crate::gate::AdminGate;
use crate::stepup::{MemoryStepUpStore, StepUpService, StepUpStore};

/// Every admin trust service, sharing one permission cache.
///
/// `RoleAdmin` and `PermissionResolver` hold the same cache, so role
/// mutations are visible to the next permission check.
#[derive(Debug, Clone)]
pub struct AdminTrust {
    /// Effective configuration.
    pub config: AdminTrustConfig,
    /// Permission checks.
    pub resolver: Arc<PermissionResolver>,
    /// Role and permission administration.
    pub roles: Arc<RoleAdmin>,
    /// The audit log.
    pub ledger: Arc<AuditLedger>,
    /// Step-up challenges.
    pub step_up: Arc<StepUpService>,
    /// Combined entry point for handlers.
    pub gate: AdminGate,
}

impl AdminTrust {
    /// Wire services over the given stores.
    pub fn new(
        config: AdminTrustConfig,
        rbac_store: Arc<dyn RbacStore>,
        identity: Arc<dyn IdentityLookup>,
        audit_store: Arc<dyn AuditStore>,
        step_up_store: Arc<dyn StepUpStore>,
    ) -> AdminResult<Self> {
        config.validate()?;

        let cache = Arc::new(PermissionCache::with_ttl(config.permission_cache_ttl()));
        let resolver = Arc::new(PermissionResolver::new(rbac_store.clone(), identity, cache));
        let roles = Arc::new(RoleAdmin::new(rbac_store, resolver.clone()));
        let ledger = Arc::new(AuditLedger::with_config(audit_store, config.audit));
        let step_up = Arc::new(StepUpService::new(step_up_store, config.step_up));
        let gate = AdminGate::new(resolver.clone(), ledger.clone(), step_up.clone());

        Ok(Self {
            config,
            resolver,
            roles,
            ledger,
            step_up,
            gate,
        })
    }

    /// Wire services over fresh in-memory stores.
    pub fn in_memory(config: AdminTrustConfig, identity: Arc<dyn IdentityLookup>) -> AdminResult<Self> {
        Self::new(
            config,
            Arc::new(MemoryRbacStore::new()),
            identity,
            Arc::new(MemoryAuditStore::new()),
            Arc::new(MemoryStepUpStore::new()),
        )
    }

    /// Seed the permission catalog and system roles.
    pub async fn bootstrap(&self) -> AdminResult<()> {
        self.roles.bootstrap().await?;
        info!("Admin trust services ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdminError;
    use admin_rbac::{MemoryIdentityDirectory, PermissionKey};
    use std::time::Duration;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AdminTrustConfig {
            permission_cache_ttl_secs: 0,
            ..Default::default()
        };
        let result = AdminTrust::in_memory(config, Arc::new(MemoryIdentityDirectory::new()));
        assert!(matches!(result, Err(AdminError::Config(_))));
    }

    #[tokio::test]
    async fn test_role_changes_reach_resolver() {
        let config = AdminTrustConfig {
            permission_cache_ttl_secs: 60,
            ..Default::default()
        };
        let trust = AdminTrust::in_memory(config, Arc::new(MemoryIdentityDirectory::new())).unwrap();
        trust.bootstrap().await.unwrap();
        assert_eq!(trust.resolver.cache().ttl(), Duration::from_secs(60));

        assert!(!trust.resolver.has_permission("u1", PermissionKey::UsersWriteBan).await);
        assert!(trust.roles.assign_role_to_user("u1", "role_moderator").await);
        assert!(trust.resolver.has_permission("u1", PermissionKey::UsersWriteBan).await);

        assert!(trust.roles.remove_role_from_user("u1", "role_moderator").await);
        assert!(!trust.resolver.has_permission("u1", PermissionKey::UsersWriteBan).await);
    }
}
