//! # Admin Auth
//!
//! Authorization gate, step-up verification and service wiring for the
//! admin trust subsystem.
//!
//! ## Overview
//!
//! The admin-auth crate handles:
//! - **Gate**: Permission checks, step-up enforcement and audit recording for handlers
//! - **Step-Up**: Email OTP challenges with per-user rate limits and lockouts
//! - **Errors**: A single `AdminError` with HTTP status and error code mapping
//! - **Configuration**: Environment-driven cache, paging and step-up settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use admin_auth::{AdminTrust, AdminTrustConfig, RequestMeta};
//! use admin_audit::AuditEventInput;
//! use admin_rbac::{MemoryIdentityDirectory, PermissionKey};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! async fn ban_user(actor_id: &str, user_id: &str) -> Result<(), admin_auth::AdminError> {
//!     let trust = AdminTrust::in_memory(
//!         AdminTrustConfig::from_env(),
//!         Arc::new(MemoryIdentityDirectory::new()),
//!     )?;
//!     trust.bootstrap().await?;
//!
//!     trust.gate.authorize(actor_id, PermissionKey::UsersWriteBan).await?;
//!
//!     // ... perform the ban ...
//!
//!     trust
//!         .gate
//!         .record(
//!             AuditEventInput::new(actor_id, "admin.users.ban")
//!                 .with_target("user", user_id)
//!                 .with_before(json!({ "banned": false }))
//!                 .with_after(json!({ "banned": true })),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Mapping
//!
//! | Error | Status | Code |
//! |---|---|---|
//! | `PermissionDenied` | 403 | `PERMISSION_DENIED` |
//! | `StepUpRequired` | 403 | `STEP_UP_REQUIRED` |
//! | `VerificationFailed` | 403 | `VERIFICATION_FAILED` |
//! | `RateLimited` | 429 | `RATE_LIMITED` |
//! | `AuditChainInvalid` | 400 | `AUDIT_CHAIN_INVALID` |
//! | storage faults | 500 | `SERVER_ERROR` |

pub mod config;
pub mod error;
pub mod gate;
pub mod service;
pub mod stepup;

// Re-export main types for convenience
pub use config::{AdminTrustConfig, StepUpConfig};
pub use error::{AdminError, AdminResult};
pub use gate::{AdminGate, RequestMeta};
pub use service::AdminTrust;
pub use stepup::{
    ChallengeStatus, IssuedChallenge, MemoryStepUpStore, StepUpChallenge, StepUpService, StepUpStore,
    StepUpVerification,
};
