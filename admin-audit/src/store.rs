//! Append-only storage for audit entries.
//!
//! The relational table lives outside this crate; [`AuditStore`] is the
//! insert/scan/lookup surface the ledger needs from it. The store never
//! updates or deletes rows.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::entry::{AuditEntry, NewAuditEntry};
use crate::error::AuditResult;
use crate::query::{newest_first, AuditFilter, AuditStats};

/// Append-only audit table.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// `hash_curr` of the row with the highest id, or `None` when empty.
    async fn latest_hash(&self) -> AuditResult<Option<String>>;

    /// Insert a row, assigning the next id, and return it as stored.
    async fn insert(&self, entry: NewAuditEntry) -> AuditResult<AuditEntry>;

    /// Every row ordered by id ascending.
    async fn scan_ascending(&self) -> AuditResult<Vec<AuditEntry>>;

    /// Matching rows newest first (`created_at` desc, id desc), paginated,
    /// plus the total number of matching rows.
    async fn query(&self, filter: &AuditFilter, limit: u64, offset: u64) -> AuditResult<(Vec<AuditEntry>, u64)>;

    /// Aggregate counts over all rows.
    async fn stats(&self) -> AuditResult<AuditStats>;
}

/// In-memory [`AuditStore`].
///
/// Rows live in id order. Ids start at 1 and increase by one per insert.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    rows: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously exported rows (e.g. restoring a backup).
    ///
    /// Rows are kept exactly as given, sorted by id; nothing is re-hashed,
    /// so verification reports any damage they carry.
    pub fn from_entries(mut entries: Vec<AuditEntry>) -> Self {
        entries.sort_by_key(|e| e.id);
        Self {
            rows: RwLock::new(entries),
        }
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn latest_hash(&self) -> AuditResult<Option<String>> {
        Ok(self.rows.read().await.last().map(|e| e.hash_curr.clone()))
    }

    async fn insert(&self, entry: NewAuditEntry) -> AuditResult<AuditEntry> {
        let mut rows = self.rows.write().await;
        let id = rows.last().map_or(1, |e| e.id + 1);
        let stored = entry.into_entry(id);
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn scan_ascending(&self) -> AuditResult<Vec<AuditEntry>> {
        Ok(self.rows.read().await.clone())
    }

    async fn query(&self, filter: &AuditFilter, limit: u64, offset: u64) -> AuditResult<(Vec<AuditEntry>, u64)> {
        let rows = self.rows.read().await;
        let mut matching: Vec<&AuditEntry> = rows.iter().filter(|e| filter.matches(e)).collect();
        let total = matching.len() as u64;
        matching.sort_by(|a, b| newest_first(a, b));

        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn stats(&self) -> AuditResult<AuditStats> {
        let rows = self.rows.read().await;
        let actors: HashSet<&str> = rows.iter().map(|e| e.actor_id.as_str()).collect();
        let mut actions_breakdown: BTreeMap<String, u64> = BTreeMap::new();
        for entry in rows.iter() {
            *actions_breakdown.entry(entry.action.clone()).or_insert(0) += 1;
        }

        Ok(AuditStats {
            total_events: rows.len() as u64,
            unique_actors: actors.len() as u64,
            actions_breakdown,
        })
    }
}
