//! Query filters, pages and aggregate statistics for the audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entry::AuditEntry;

/// Filters for [`crate::AuditLedger::query_audit_log`].
///
/// All set fields must match (logical AND). String fields are exact
/// matches; the date range is inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Only entries by this actor.
    pub actor_id: Option<String>,
    /// Only entries with this exact action.
    pub action: Option<String>,
    /// Only entries on this target type.
    pub target_type: Option<String>,
    /// Only entries on this target id.
    pub target_id: Option<String>,
    /// Only entries created at or after this instant.
    pub start_date: Option<DateTime<Utc>>,
    /// Only entries created at or before this instant.
    pub end_date: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by actor.
    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Filter by action.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Filter by target type and id.
    pub fn target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = Some(target_id.into());
        self
    }

    /// Filter by target type only.
    pub fn target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    /// Restrict to an inclusive creation-time range. Either bound may be open.
    pub fn between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Check whether an entry satisfies every set filter.
    ///
    /// Entries whose timestamp cannot be parsed never match a date bound.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        fn eq(filter: &Option<String>, value: Option<&str>) -> bool {
            match filter {
                None => true,
                Some(expected) => value == Some(expected.as_str()),
            }
        }

        if !eq(&self.actor_id, Some(&entry.actor_id))
            || !eq(&self.action, Some(&entry.action))
            || !eq(&self.target_type, entry.target_type.as_deref())
            || !eq(&self.target_id, entry.target_id.as_deref())
        {
            return false;
        }

        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }

        let Some(created_at) = entry.created_at_utc() else {
            return false;
        };
        self.start_date.map_or(true, |start| created_at >= start)
            && self.end_date.map_or(true, |end| created_at <= end)
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPage {
    /// Entries on this page, newest first.
    pub logs: Vec<AuditEntry>,
    /// Total matching entries across all pages.
    pub total: u64,
    /// Whether entries remain past this page.
    pub has_more: bool,
}

impl AuditPage {
    /// Assemble a page; `has_more = offset + len(logs) < total`.
    pub fn new(logs: Vec<AuditEntry>, total: u64, offset: u64) -> Self {
        let has_more = offset + (logs.len() as u64) < total;
        Self { logs, total, has_more }
    }
}

/// Aggregate counts over the whole log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    /// Number of entries.
    pub total_events: u64,
    /// Number of distinct actors.
    pub unique_actors: u64,
    /// Occurrences per action.
    pub actions_breakdown: BTreeMap<String, u64>,
}

/// Newest first: `created_at` descending, then id descending.
pub fn newest_first(a: &AuditEntry, b: &AuditEntry) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditEventInput, NewAuditEntry, GENESIS_HASH};

    fn entry(id: i64, actor: &str, action: &str, created_at: &str) -> AuditEntry {
        NewAuditEntry::build(
            AuditEventInput::new(actor, action).with_target("doc", "42"),
            GENESIS_HASH.to_string(),
            created_at.to_string(),
        )
        .unwrap()
        .into_entry(id)
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let e = entry(1, "a", "create", "2026-01-01T00:00:00.000Z");
        assert!(AuditFilter::new().matches(&e));
    }

    #[test]
    fn test_exact_field_filters() {
        let e = entry(1, "a", "create", "2026-01-01T00:00:00.000Z");
        assert!(AuditFilter::new().actor("a").action("create").matches(&e));
        assert!(!AuditFilter::new().action("creat").matches(&e));
        assert!(AuditFilter::new().target("doc", "42").matches(&e));
        assert!(!AuditFilter::new().target("doc", "43").matches(&e));
        assert!(!AuditFilter::new().target_type("user").matches(&e));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let e = entry(1, "a", "create", "2026-01-01T12:00:00.000Z");
        let exact = at("2026-01-01T12:00:00Z");

        assert!(AuditFilter::new().between(Some(exact), Some(exact)).matches(&e));
        assert!(AuditFilter::new().between(Some(at("2026-01-01T00:00:00Z")), None).matches(&e));
        assert!(!AuditFilter::new().between(Some(at("2026-01-02T00:00:00Z")), None).matches(&e));
        assert!(!AuditFilter::new().between(None, Some(at("2026-01-01T11:59:59Z"))).matches(&e));
    }

    #[test]
    fn test_missing_target_never_matches_target_filter() {
        let e = NewAuditEntry::build(
            AuditEventInput::new("a", "login"),
            GENESIS_HASH.to_string(),
            "2026-01-01T00:00:00.000Z".to_string(),
        )
        .unwrap()
        .into_entry(1);
        assert!(!AuditFilter::new().target_type("doc").matches(&e));
    }

    #[test]
    fn test_page_has_more() {
        let logs = vec![entry(1, "a", "x", "2026-01-01T00:00:00.000Z")];
        assert!(AuditPage::new(logs.clone(), 3, 0).has_more);
        assert!(AuditPage::new(logs.clone(), 3, 1).has_more);
        assert!(!AuditPage::new(logs, 3, 2).has_more);
        assert!(!AuditPage::new(Vec::new(), 3, 5).has_more);
    }

    #[test]
    fn test_newest_first_breaks_ties_by_id() {
        let mut entries = vec![
            entry(1, "a", "x", "2026-01-01T00:00:00.000Z"),
            entry(2, "a", "x", "2026-01-01T00:00:00.000Z"),
            entry(3, "a", "x", "2025-12-31T00:00:00.000Z"),
        ];
        entries.sort_by(newest_first);
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
