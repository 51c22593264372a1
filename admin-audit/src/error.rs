//! Error types for the audit ledger.

use thiserror::Error;

/// Audit ledger error types.
///
/// A failed write means the audited action has no evidentiary record, so
/// callers must treat these as fatal to the action being audited.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing store is unreachable or rejected the operation
    #[error("Audit storage error: {0}")]
    Storage(String),

    /// A snapshot could not be serialized
    #[error("Audit serialization error: {0}")]
    Serialization(String),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
