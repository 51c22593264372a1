//! Error types for privileged admin operations
//!
//! This module defines the errors surfaced to admin request handlers,
//! including authorization denials, step-up failures and audit faults.

use admin_audit::AuditError;
use admin_rbac::RbacError;
use thiserror::Error;

/// Admin operation error types.
///
/// Each variant maps onto an HTTP status and a stable error code for API
/// responses.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The caller lacks a required permission key
    #[error("Missing required permission: {missing}")]
    PermissionDenied {
        /// The key that was required.
        missing: String,
    },

    /// The operation needs a recent step-up verification
    #[error("Recent step-up verification required")]
    StepUpRequired,

    /// A step-up code was rejected
    #[error("{0}")]
    VerificationFailed(String),

    /// Too many step-up requests
    #[error("{0}")]
    RateLimited(String),

    /// Malformed request input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The audit chain failed verification
    #[error("Audit chain integrity check failed: {reason} (entry {entry_id})")]
    AuditChainInvalid {
        /// First offending entry.
        entry_id: i64,
        /// What was wrong with it.
        reason: String,
    },

    /// Role or permission storage failed
    #[error(transparent)]
    Rbac(#[from] RbacError),

    /// Audit storage failed
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Step-up challenge storage failed
    #[error("Step-up storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for admin operations.
pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    /// Check if this error should be logged at error level.
    ///
    /// Denials and rejected codes are expected outcomes, not faults.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AdminError::Rbac(_) | AdminError::Audit(_) | AdminError::Storage(_) | AdminError::Config(_)
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AdminError::PermissionDenied { .. }
            | AdminError::StepUpRequired
            | AdminError::VerificationFailed(_) => 403,

            AdminError::RateLimited(_) => 429,

            AdminError::InvalidInput(_) | AdminError::AuditChainInvalid { .. } => 400,

            AdminError::Rbac(_) | AdminError::Audit(_) | AdminError::Storage(_) | AdminError::Config(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AdminError::PermissionDenied { .. } => "PERMISSION_DENIED",
            AdminError::StepUpRequired => "STEP_UP_REQUIRED",
            AdminError::VerificationFailed(_) => "VERIFICATION_FAILED",
            AdminError::RateLimited(_) => "RATE_LIMITED",
            AdminError::InvalidInput(_) => "INVALID_INPUT",
            AdminError::AuditChainInvalid { .. } => "AUDIT_CHAIN_INVALID",
            AdminError::Rbac(_) | AdminError::Audit(_) | AdminError::Storage(_) => "SERVER_ERROR",
            AdminError::Config(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_message_names_key() {
        let err = AdminError::PermissionDenied {
            missing: "admin.users.write.ban".to_string(),
        };
        assert_eq!(err.to_string(), "Missing required permission: admin.users.write.ban");
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.error_code(), "PERMISSION_DENIED");
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_chain_failure_message() {
        let err = AdminError::AuditChainInvalid {
            entry_id: 7,
            reason: "Hash mismatch at entry 7".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Audit chain integrity check failed: Hash mismatch at entry 7 (entry 7)"
        );
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_storage_errors_are_server_errors() {
        let err: AdminError = AuditError::Storage("disk full".into()).into();
        assert!(err.is_server_error());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.error_code(), "SERVER_ERROR");

        let err: AdminError = RbacError::Storage("locked".into()).into();
        assert_eq!(err.error_code(), "SERVER_ERROR");
    }

    #[test]
    fn test_rate_limit_status() {
        let err = AdminError::RateLimited("slow down".into());
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.to_string(), "slow down");
    }
}
