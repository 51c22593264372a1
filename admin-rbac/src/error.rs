//! Error types for role and permission storage.

use thiserror::Error;

/// RBAC error types.
#[derive(Debug, Error)]
pub enum RbacError {
    /// The backing store is unreachable or rejected the operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// A unique constraint was violated (duplicate role id or name)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An edge references a role or permission that does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type for RBAC operations.
pub type RbacResult<T> = Result<T, RbacError>;
