//! End-to-end chain verification.
//!
//! Walks the log in id order and stops at the first of:
//! - the first entry's `hash_prev` is not the genesis hash;
//! - an entry's stored `hash_curr` differs from the digest of its stored
//!   fields (the row was altered after insertion);
//! - an entry's `hash_prev` differs from its predecessor's `hash_curr` (a
//!   row was deleted, inserted out of order, or re-chained).
//!
//! Verification only detects; it never repairs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::{AuditEntry, GENESIS_HASH};

/// Why the chain failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainIntegrityError {
    /// The first entry does not chain from the genesis hash.
    #[error("Genesis hash mismatch")]
    GenesisMismatch {
        /// Id of the first entry.
        entry_id: i64,
    },

    /// An entry's content no longer matches its stored hash.
    #[error("Hash mismatch at entry {entry_id}")]
    HashMismatch {
        /// Id of the altered entry.
        entry_id: i64,
    },

    /// An entry does not cite its predecessor's hash.
    #[error("Chain broken between entries {previous_id} and {entry_id}")]
    BrokenLink {
        /// Id of the predecessor.
        previous_id: i64,
        /// Id of the entry whose link is wrong.
        entry_id: i64,
    },
}

impl ChainIntegrityError {
    /// Id of the first offending entry.
    pub fn entry_id(&self) -> i64 {
        match self {
            ChainIntegrityError::GenesisMismatch { entry_id }
            | ChainIntegrityError::HashMismatch { entry_id }
            | ChainIntegrityError::BrokenLink { entry_id, .. } => *entry_id,
        }
    }
}

/// Result of verifying the whole chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    /// `true` when no failure was found.
    pub valid: bool,
    /// Id of the first offending entry.
    pub first_invalid_id: Option<i64>,
    /// What was wrong with it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ChainIntegrityError>,
    /// Number of entries examined.
    pub entries_checked: usize,
}

impl ChainVerification {
    fn valid(entries_checked: usize) -> Self {
        Self {
            valid: true,
            first_invalid_id: None,
            error: None,
            entries_checked,
        }
    }

    fn invalid(error: ChainIntegrityError, entries_checked: usize) -> Self {
        Self {
            valid: false,
            first_invalid_id: Some(error.entry_id()),
            error: Some(error),
            entries_checked,
        }
    }

    /// Human-readable failure reason, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Verify entries already sorted by id ascending.
pub fn verify_entries(entries: &[AuditEntry]) -> ChainVerification {
    let Some(first) = entries.first() else {
        return ChainVerification::valid(0);
    };

    if first.hash_prev != GENESIS_HASH {
        return ChainVerification::invalid(ChainIntegrityError::GenesisMismatch { entry_id: first.id }, 1);
    }

    for (i, entry) in entries.iter().enumerate() {
        if !entry.is_intact() {
            return ChainVerification::invalid(ChainIntegrityError::HashMismatch { entry_id: entry.id }, i + 1);
        }

        if let Some(next) = entries.get(i + 1) {
            if next.hash_prev != entry.hash_curr {
                return ChainVerification::invalid(
                    ChainIntegrityError::BrokenLink {
                        previous_id: entry.id,
                        entry_id: next.id,
                    },
                    i + 2,
                );
            }
        }
    }

    ChainVerification::valid(entries.len())
}
