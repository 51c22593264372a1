//! # Audit Ledger
//!
//! Write, query and verify the hash-chained audit log.
//!
//! Writes are serialized process-wide: reading the latest `hash_curr` and
//! inserting the row that cites it happen under one lock, so no two rows
//! ever claim the same predecessor. Readers never take the lock.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::entry::{timestamp_now, AuditEntry, AuditEventInput, NewAuditEntry, GENESIS_HASH};
use crate::error::AuditResult;
use crate::query::{AuditFilter, AuditPage, AuditStats};
use crate::store::AuditStore;
use crate::verify::{verify_entries, ChainVerification};

/// Default page size for [`AuditLedger::query_audit_log`].
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Largest page [`AuditLedger::query_audit_log`] will return.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Default number of entries returned by per-target history.
pub const DEFAULT_HISTORY_LIMIT: u64 = 20;

/// Paging bounds for ledger reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Page size when the caller gives none.
    pub default_page_size: u64,
    /// Upper clamp for any requested page size.
    pub max_page_size: u64,
    /// History length when the caller gives none.
    pub default_history_limit: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            default_history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl AuditConfig {
    /// Resolve a requested limit into `[1, max_page_size]`.
    pub fn clamp_limit(&self, requested: Option<u64>, default: u64) -> u64 {
        let max = self.max_page_size.max(1);
        requested.unwrap_or(default).clamp(1, max)
    }
}

/// The hash-chained audit log.
pub struct AuditLedger {
    store: Arc<dyn AuditStore>,
    write_lock: Mutex<()>,
    config: AuditConfig,
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuditLedger {
    /// Create a ledger with default paging bounds.
    ///
    /// The ledger must be the only writer to `store`.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self::with_config(store, AuditConfig::default())
    }

    /// Create a ledger with explicit paging bounds.
    pub fn with_config(store: Arc<dyn AuditStore>, config: AuditConfig) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            config,
        }
    }

    /// Paging bounds in effect.
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Append an event, chaining it onto the most recent entry.
    ///
    /// A returned error means nothing was written.
    #[instrument(skip(self, input), fields(actor_id = %input.actor_id, action = %input.action))]
    pub async fn write_event(&self, input: AuditEventInput) -> AuditResult<AuditEntry> {
        let _guard = self.write_lock.lock().await;

        let hash_prev = match self.store.latest_hash().await {
            Ok(latest) => latest.unwrap_or_else(|| GENESIS_HASH.to_string()),
            Err(e) => {
                error!(error = %e, "Failed to read latest audit hash");
                return Err(e);
            }
        };

        let pending = NewAuditEntry::build(input, hash_prev, timestamp_now())?;
        match self.store.insert(pending).await {
            Ok(entry) => {
                debug!(id = entry.id, hash = %entry.hash_curr, "Audit event written");
                Ok(entry)
            }
            Err(e) => {
                error!(error = %e, "Failed to write audit event");
                Err(e)
            }
        }
    }

    /// Filtered, paginated view of the log, newest first.
    ///
    /// `limit` is clamped into `[1, max_page_size]` and defaults to the
    /// configured page size.
    pub async fn query_audit_log(
        &self,
        filter: &AuditFilter,
        limit: Option<u64>,
        offset: u64,
    ) -> AuditResult<AuditPage> {
        let limit = self.config.clamp_limit(limit, self.config.default_page_size);
        let (logs, total) = self.store.query(filter, limit, offset).await?;
        Ok(AuditPage::new(logs, total, offset))
    }

    /// Most recent entries about one entity, newest first.
    pub async fn get_audit_history_for_target(
        &self,
        target_type: &str,
        target_id: &str,
        limit: Option<u64>,
    ) -> AuditResult<Vec<AuditEntry>> {
        let limit = self.config.clamp_limit(limit, self.config.default_history_limit);
        let filter = AuditFilter::new().target(target_type, target_id);
        let (logs, _) = self.store.query(&filter, limit, 0).await?;
        Ok(logs)
    }

    /// Aggregate counts over the whole log.
    pub async fn get_audit_stats(&self) -> AuditResult<AuditStats> {
        self.store.stats().await
    }

    /// Verify the entire chain and report the first failure.
    ///
    /// Runs concurrently with writes; a racing verifier sees a shorter,
    /// still-consistent prefix.
    #[instrument(skip(self))]
    pub async fn verify_audit_chain(&self) -> AuditResult<ChainVerification> {
        let entries = self.store.scan_ascending().await?;
        let result = verify_entries(&entries);

        if result.valid {
            info!(entries = result.entries_checked, "Audit chain verified");
        } else {
            warn!(
                first_invalid_id = ?result.first_invalid_id,
                error = ?result.error_message(),
                "Audit chain integrity check failed"
            );
        }
        Ok(result)
    }
}
