//! # Admin Audit
//!
//! Append-only, hash-chained audit log for privileged admin actions.
//!
//! ## Overview
//!
//! The admin-audit crate handles:
//! - **Writing**: Each event is hashed and chained onto its predecessor
//! - **Querying**: Filtered, paginated reads and per-target history
//! - **Statistics**: Event counts, distinct actors, per-action breakdown
//! - **Verification**: Full-chain integrity check reporting the first failure
//!
//! ## Chain Layout
//!
//! ```text
//! GENESIS_HASH ──▶ entry 1 ──▶ entry 2 ──▶ ... ──▶ entry n
//!                  hash_prev = GENESIS_HASH
//!                  hash_curr = sha256(canonical(entry 1))
//!                              entry 2.hash_prev = entry 1.hash_curr
//! ```
//!
//! Altering any stored field changes that entry's digest; deleting or
//! reordering rows breaks the link to the following entry. Truncating the
//! tail is not detectable from the log alone.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use admin_audit::{AuditEventInput, AuditFilter, AuditLedger, MemoryAuditStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let ledger = AuditLedger::new(Arc::new(MemoryAuditStore::new()));
//!
//!     ledger
//!         .write_event(
//!             AuditEventInput::new("admin-1", "admin.users.ban")
//!                 .with_target("user", "user-42")
//!                 .with_after(json!({ "banned": true })),
//!         )
//!         .await
//!         .unwrap();
//!
//!     let page = ledger
//!         .query_audit_log(&AuditFilter::new().actor("admin-1"), Some(20), 0)
//!         .await
//!         .unwrap();
//!     println!("{} of {} events", page.logs.len(), page.total);
//!
//!     let check = ledger.verify_audit_chain().await.unwrap();
//!     assert!(check.valid);
//! }
//! ```

pub mod entry;
pub mod error;
pub mod ledger;
pub mod query;
pub mod store;
pub mod verify;

// Re-export main types for convenience
pub use entry::{
    format_timestamp, sha256_hex, timestamp_now, AuditEntry, AuditEventInput, NewAuditEntry, GENESIS_HASH,
    GENESIS_SEED,
};
pub use error::{AuditError, AuditResult};
pub use ledger::{AuditConfig, AuditLedger, DEFAULT_HISTORY_LIMIT, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use query::{AuditFilter, AuditPage, AuditStats};
pub use store::{AuditStore, MemoryAuditStore};
pub use verify::{verify_entries, ChainIntegrityError, ChainVerification};
