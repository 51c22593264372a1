//! Configuration for the admin trust services.
//!
//! Loaded from environment variables with defaults matching the admin
//! routes: a five minute permission cache, 50/100 audit page sizes, and
//! ten minute step-up windows.

use admin_audit::AuditConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AdminError, AdminResult};

/// Step-up challenge limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepUpConfig {
    /// Minutes a challenge stays verifiable.
    pub challenge_ttl_minutes: i64,
    /// Minutes a successful verification satisfies step-up checks.
    pub max_age_minutes: i64,
    /// Unused, unexpired challenges a user may hold at once.
    pub max_active_challenges: usize,
    /// Challenges a user may create per rate window.
    pub max_challenges_per_window: usize,
    /// Length of the creation rate window in minutes.
    pub rate_window_minutes: i64,
    /// Failed attempts before one challenge is locked.
    pub max_failed_attempts: u32,
    /// Failed attempts summed over active challenges before all are locked.
    pub max_total_failed_attempts: u32,
}

impl Default for StepUpConfig {
    fn default() -> Self {
        Self {
            challenge_ttl_minutes: 10,
            max_age_minutes: 10,
            max_active_challenges: 3,
            max_challenges_per_window: 5,
            rate_window_minutes: 10,
            max_failed_attempts: 5,
            max_total_failed_attempts: 10,
        }
    }
}

impl StepUpConfig {
    /// Challenge lifetime.
    pub fn challenge_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.challenge_ttl_minutes)
    }

    /// How long a verification counts as recent.
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.max_age_minutes)
    }

    /// Creation rate window.
    pub fn rate_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.rate_window_minutes)
    }
}

/// Configuration for all admin trust services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminTrustConfig {
    /// Permission cache entry lifetime in seconds.
    pub permission_cache_ttl_secs: u64,

    /// Audit paging bounds.
    pub audit: AuditConfig,

    /// Step-up challenge limits.
    pub step_up: StepUpConfig,
}

impl Default for AdminTrustConfig {
    fn default() -> Self {
        Self {
            permission_cache_ttl_secs: 300,
            audit: AuditConfig::default(),
            step_up: StepUpConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl AdminTrustConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ADMIN_PERMISSION_CACHE_TTL_SECS`: Permission cache TTL (default: 300)
    /// - `ADMIN_AUDIT_DEFAULT_PAGE_SIZE`: Audit page size (default: 50)
    /// - `ADMIN_AUDIT_MAX_PAGE_SIZE`: Largest audit page (default: 100)
    /// - `ADMIN_AUDIT_HISTORY_LIMIT`: Per-target history length (default: 20)
    /// - `STEP_UP_CHALLENGE_TTL_MINUTES`: Step-up challenge lifetime (default: 10)
    /// - `STEP_UP_MAX_AGE_MINUTES`: Step-up validity window (default: 10)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            permission_cache_ttl_secs: env_parse("ADMIN_PERMISSION_CACHE_TTL_SECS")
                .unwrap_or(default.permission_cache_ttl_secs),
            audit: AuditConfig {
                default_page_size: env_parse("ADMIN_AUDIT_DEFAULT_PAGE_SIZE")
                    .unwrap_or(default.audit.default_page_size),
                max_page_size: env_parse("ADMIN_AUDIT_MAX_PAGE_SIZE").unwrap_or(default.audit.max_page_size),
                default_history_limit: env_parse("ADMIN_AUDIT_HISTORY_LIMIT")
                    .unwrap_or(default.audit.default_history_limit),
            },
            step_up: StepUpConfig {
                challenge_ttl_minutes: env_parse("STEP_UP_CHALLENGE_TTL_MINUTES")
                    .unwrap_or(default.step_up.challenge_ttl_minutes),
                max_age_minutes: env_parse("STEP_UP_MAX_AGE_MINUTES").unwrap_or(default.step_up.max_age_minutes),
                ..default.step_up
            },
        }
    }

    /// Permission cache TTL as a Duration.
    pub fn permission_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.permission_cache_ttl_secs)
    }

    /// Reject settings that would disable caching, paging or step-up.
    pub fn validate(&self) -> AdminResult<()> {
        if self.permission_cache_ttl_secs == 0 {
            return Err(AdminError::Config("permission cache TTL must be positive".to_string()));
        }
        if self.audit.default_page_size == 0 || self.audit.max_page_size == 0 || self.audit.default_history_limit == 0 {
            return Err(AdminError::Config("audit page sizes must be positive".to_string()));
        }
        if self.audit.default_page_size > self.audit.max_page_size {
            return Err(AdminError::Config(format!(
                "default audit page size {} exceeds maximum {}",
                self.audit.default_page_size, self.audit.max_page_size
            )));
        }
        if self.step_up.challenge_ttl_minutes <= 0 || self.step_up.max_age_minutes <= 0 {
            return Err(AdminError::Config("step-up windows must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdminTrustConfig::default();
        assert_eq!(config.permission_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.audit.default_page_size, 50);
        assert_eq!(config.audit.max_page_size, 100);
        assert_eq!(config.audit.default_history_limit, 20);
        assert_eq!(config.step_up.challenge_ttl(), chrono::Duration::minutes(10));
        assert_eq!(config.step_up.max_active_challenges, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = AdminTrustConfig {
            permission_cache_ttl_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AdminError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_page_sizes() {
        let mut config = AdminTrustConfig::default();
        config.audit.default_page_size = 200;
        assert!(matches!(config.validate(), Err(AdminError::Config(_))));

        let mut config = AdminTrustConfig::default();
        config.audit.max_page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_step_up_window() {
        let mut config = AdminTrustConfig::default();
        config.step_up.max_age_minutes = 0;
        assert!(config.validate().is_err());
    }
}
