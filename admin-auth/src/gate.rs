//! # Admin Gate
//!
//! The entry point privileged handlers go through: check a permission,
//! demand a recent step-up, and record what was done.
//!
//! ```text
//! handler ──authorize──▶ PermissionResolver
//!    │
//!    ├──require_step_up──▶ StepUpService
//!    │
//!    └──record──▶ AuditLedger
//! ```

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, instrument, warn};

use admin_audit::{AuditEntry, AuditEventInput, AuditLedger, ChainVerification};
use admin_rbac::{PermissionDecision, PermissionKey, PermissionResolver};

use crate::error::{AdminError, AdminResult};
use crate::stepup::{IssuedChallenge, StepUpService};

/// Origin of the request being audited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Client address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
}

impl RequestMeta {
    /// Create request metadata.
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self { ip_address, user_agent }
    }
}

/// Authorization, step-up and audit for privileged callers.
#[derive(Debug, Clone)]
pub struct AdminGate {
    resolver: Arc<PermissionResolver>,
    ledger: Arc<AuditLedger>,
    step_up: Arc<StepUpService>,
}

impl AdminGate {
    /// Create a gate over shared services.
    pub fn new(resolver: Arc<PermissionResolver>, ledger: Arc<AuditLedger>, step_up: Arc<StepUpService>) -> Self {
        Self {
            resolver,
            ledger,
            step_up,
        }
    }

    /// Fail with [`AdminError::PermissionDenied`] unless `actor_id` holds `key`.
    pub async fn authorize(&self, actor_id: &str, key: impl AsRef<str>) -> AdminResult<()> {
        match self.resolver.require_permission(actor_id, key).await {
            PermissionDecision::Granted => Ok(()),
            PermissionDecision::Denied { missing } => Err(AdminError::PermissionDenied { missing }),
        }
    }

    /// Append an audit event. Callers must not report success when this fails.
    pub async fn record(&self, input: AuditEventInput) -> AdminResult<AuditEntry> {
        self.ledger.write_event(input).await.map_err(|e| {
            error!(error = %e, "Audit write failed");
            AdminError::from(e)
        })
    }

    /// Fail with [`AdminError::StepUpRequired`] unless `user_id` verified a
    /// challenge within the configured window.
    pub async fn require_step_up(&self, user_id: &str) -> AdminResult<()> {
        let max_age = self.step_up.config().max_age();
        if self.step_up.has_valid_step_up(user_id, max_age).await? {
            Ok(())
        } else {
            warn!(user_id, "Step-up required");
            Err(AdminError::StepUpRequired)
        }
    }

    /// Issue a step-up challenge and record the request.
    ///
    /// Delivering the code is the caller's job.
    #[instrument(skip(self, meta))]
    pub async fn request_step_up(&self, actor_id: &str, meta: &RequestMeta) -> AdminResult<IssuedChallenge> {
        let issued = self.step_up.create_challenge(actor_id).await?;

        self.record(
            AuditEventInput::new(actor_id, "admin.stepup.request")
                .with_target("user", actor_id)
                .with_after(json!({ "challengeId": issued.challenge_id }))
                .with_request_meta(meta.ip_address.clone(), meta.user_agent.clone()),
        )
        .await?;

        Ok(issued)
    }

    /// Verify a step-up code, recording success or failure.
    #[instrument(skip(self, otp, meta))]
    pub async fn verify_step_up(
        &self,
        actor_id: &str,
        challenge_id: &str,
        otp: &str,
        meta: &RequestMeta,
    ) -> AdminResult<()> {
        let (challenge_id, otp) = (challenge_id.trim(), otp.trim());
        if challenge_id.is_empty() || otp.is_empty() {
            return Err(AdminError::InvalidInput("Challenge ID and OTP are required".to_string()));
        }

        let result = self.step_up.verify_challenge(actor_id, challenge_id, otp).await?;
        let (action, after) = if result.valid {
            ("admin.stepup.verify.success", json!({ "challengeId": challenge_id }))
        } else {
            (
                "admin.stepup.verify.failed",
                json!({ "challengeId": challenge_id, "reason": result.error }),
            )
        };

        self.record(
            AuditEventInput::new(actor_id, action)
                .with_target("user", actor_id)
                .with_after(after)
                .with_request_meta(meta.ip_address.clone(), meta.user_agent.clone()),
        )
        .await?;

        if result.valid {
            Ok(())
        } else {
            Err(AdminError::VerificationFailed(
                result.error.unwrap_or_else(|| "Invalid verification code".to_string()),
            ))
        }
    }

    /// Verify the audit chain on behalf of `actor_id`.
    ///
    /// Requires `admin.audit.read` and a recent step-up. The check itself is
    /// recorded as `admin.audit.verify` whatever its outcome.
    #[instrument(skip(self, meta))]
    pub async fn verify_audit_chain(&self, actor_id: &str, meta: &RequestMeta) -> AdminResult<ChainVerification> {
        self.authorize(actor_id, PermissionKey::AuditRead).await?;
        self.require_step_up(actor_id).await?;

        let result = self.ledger.verify_audit_chain().await?;

        self.record(
            AuditEventInput::new(actor_id, "admin.audit.verify")
                .with_target_type("system")
                .with_after(json!({
                    "valid": result.valid,
                    "firstInvalidId": result.first_invalid_id,
                }))
                .with_request_meta(meta.ip_address.clone(), meta.user_agent.clone()),
        )
        .await?;

        match (result.valid, result.first_invalid_id) {
            (false, Some(entry_id)) => Err(AdminError::AuditChainInvalid {
                entry_id,
                reason: result.error_message().unwrap_or_default(),
            }),
            _ => Ok(result),
        }
    }
}
