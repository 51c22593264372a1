//! Audit entry types and the canonical hashing form.
//!
//! An entry's `hash_curr` is the SHA-256 (lowercase hex) of its canonical
//! string: these fields joined with `|`, absent values as empty strings:
//!
//! ```text
//! actor_id|action|target_type|target_id|reason|before_json|after_json|ip_address|user_agent|hash_prev|created_at
//! ```
//!
//! The id and `hash_curr` itself are not covered. The first entry's
//! `hash_prev` is [`GENESIS_HASH`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AuditError, AuditResult};

/// Seed string whose digest anchors every chain.
pub const GENESIS_SEED: &str = "ZENTRIO_ADMIN_AUDIT_GENESIS";

/// `sha256_hex(GENESIS_SEED)`: the `hash_prev` of the first entry.
pub const GENESIS_HASH: &str = "88a4a765c55ce2d4ede49de2e040900c766dff13d1ad0394d5627380bbc0ae14";

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current UTC time in the stored format (RFC 3339, millisecond precision, `Z`).
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

/// Format an instant the way `created_at` is stored.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// What a privileged caller supplies when recording an action.
///
/// # Example
///
/// ```
/// use admin_audit::AuditEventInput;
/// use serde_json::json;
///
/// let input = AuditEventInput::new("admin-1", "admin.users.ban")
///     .with_target("user", "user-42")
///     .with_reason("spam")
///     .with_before(json!({ "banned": false }))
///     .with_after(json!({ "banned": true }))
///     .with_request_meta(Some("203.0.113.7".to_string()), None);
///
/// assert_eq!(input.target_id.as_deref(), Some("user-42"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditEventInput {
    /// Who performed the action.
    pub actor_id: String,
    /// Free-form verb (e.g. `admin.users.ban`).
    pub action: String,
    /// Kind of entity acted upon.
    pub target_type: Option<String>,
    /// Id of the entity acted upon.
    pub target_id: Option<String>,
    /// Human-supplied justification.
    pub reason: Option<String>,
    /// State before the action.
    pub before: Option<serde_json::Value>,
    /// State after the action.
    pub after: Option<serde_json::Value>,
    /// Request origin address.
    pub ip_address: Option<String>,
    /// Request user agent.
    pub user_agent: Option<String>,
}

impl AuditEventInput {
    /// Create an input with the required fields.
    pub fn new(actor_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    /// Set the target entity.
    pub fn with_target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = Some(target_id.into());
        self
    }

    /// Set only the target type (system-wide actions).
    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    /// Set the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the before snapshot.
    pub fn with_before(mut self, before: serde_json::Value) -> Self {
        self.before = Some(before);
        self
    }

    /// Set the after snapshot.
    pub fn with_after(mut self, after: serde_json::Value) -> Self {
        self.after = Some(after);
        self
    }

    /// Set request metadata.
    pub fn with_request_meta(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// Empty strings are stored as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn snapshot_json(value: Option<serde_json::Value>) -> AuditResult<Option<String>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => serde_json::to_string(&value)
            .map(Some)
            .map_err(|e| AuditError::Serialization(e.to_string())),
    }
}

/// A fully hashed row waiting for the store to assign its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    /// Who performed the action.
    pub actor_id: String,
    /// Action verb.
    pub action: String,
    /// Kind of entity acted upon.
    pub target_type: Option<String>,
    /// Id of the entity acted upon.
    pub target_id: Option<String>,
    /// Justification.
    pub reason: Option<String>,
    /// Serialized before snapshot.
    pub before_json: Option<String>,
    /// Serialized after snapshot.
    pub after_json: Option<String>,
    /// Request origin address.
    pub ip_address: Option<String>,
    /// Request user agent.
    pub user_agent: Option<String>,
    /// `hash_curr` of the preceding entry, or the genesis hash.
    pub hash_prev: String,
    /// Digest of this entry's canonical string.
    pub hash_curr: String,
    /// Insertion time (RFC 3339, UTC).
    pub created_at: String,
}

impl NewAuditEntry {
    /// Build and hash a row from caller input, chaining onto `hash_prev`.
    pub fn build(input: AuditEventInput, hash_prev: String, created_at: String) -> AuditResult<Self> {
        let mut entry = Self {
            actor_id: input.actor_id,
            action: input.action,
            target_type: non_empty(input.target_type),
            target_id: non_empty(input.target_id),
            reason: non_empty(input.reason),
            before_json: snapshot_json(input.before)?,
            after_json: snapshot_json(input.after)?,
            ip_address: non_empty(input.ip_address),
            user_agent: non_empty(input.user_agent),
            hash_prev,
            hash_curr: String::new(),
            created_at,
        };
        entry.hash_curr = sha256_hex(&entry.canonical());
        Ok(entry)
    }

    /// Canonical hashing string.
    pub fn canonical(&self) -> String {
        canonical_string(CanonicalFields {
            actor_id: &self.actor_id,
            action: &self.action,
            target_type: self.target_type.as_deref(),
            target_id: self.target_id.as_deref(),
            reason: self.reason.as_deref(),
            before_json: self.before_json.as_deref(),
            after_json: self.after_json.as_deref(),
            ip_address: self.ip_address.as_deref(),
            user_agent: self.user_agent.as_deref(),
            hash_prev: &self.hash_prev,
            created_at: &self.created_at,
        })
    }

    /// Attach the id the store assigned.
    pub fn into_entry(self, id: i64) -> AuditEntry {
        AuditEntry {
            id,
            actor_id: self.actor_id,
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id,
            reason: self.reason,
            before_json: self.before_json,
            after_json: self.after_json,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            hash_prev: self.hash_prev,
            hash_curr: self.hash_curr,
            created_at: self.created_at,
        }
    }
}

/// A written, immutable audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonically increasing position in the log.
    pub id: i64,
    /// Who performed the action.
    pub actor_id: String,
    /// Action verb.
    pub action: String,
    /// Kind of entity acted upon.
    pub target_type: Option<String>,
    /// Id of the entity acted upon.
    pub target_id: Option<String>,
    /// Justification.
    pub reason: Option<String>,
    /// Serialized before snapshot.
    pub before_json: Option<String>,
    /// Serialized after snapshot.
    pub after_json: Option<String>,
    /// Request origin address.
    pub ip_address: Option<String>,
    /// Request user agent.
    pub user_agent: Option<String>,
    /// `hash_curr` of the preceding entry, or the genesis hash.
    pub hash_prev: String,
    /// Digest of this entry's canonical string.
    pub hash_curr: String,
    /// Insertion time (RFC 3339, UTC).
    pub created_at: String,
}

impl AuditEntry {
    /// Canonical hashing string rebuilt from the stored fields.
    pub fn canonical(&self) -> String {
        canonical_string(CanonicalFields {
            actor_id: &self.actor_id,
            action: &self.action,
            target_type: self.target_type.as_deref(),
            target_id: self.target_id.as_deref(),
            reason: self.reason.as_deref(),
            before_json: self.before_json.as_deref(),
            after_json: self.after_json.as_deref(),
            ip_address: self.ip_address.as_deref(),
            user_agent: self.user_agent.as_deref(),
            hash_prev: &self.hash_prev,
            created_at: &self.created_at,
        })
    }

    /// Recompute the digest from the stored fields.
    pub fn compute_hash(&self) -> String {
        sha256_hex(&self.canonical())
    }

    /// Check that the stored `hash_curr` matches the stored fields.
    pub fn is_intact(&self) -> bool {
        self.compute_hash() == self.hash_curr
    }

    /// Parsed `created_at`, if well-formed.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    /// Parse the before snapshot.
    pub fn before(&self) -> Option<serde_json::Value> {
        self.before_json.as_deref().and_then(|s| serde_json::from_str(s).ok())
    }

    /// Parse the after snapshot.
    pub fn after(&self) -> Option<serde_json::Value> {
        self.after_json.as_deref().and_then(|s| serde_json::from_str(s).ok())
    }
}

struct CanonicalFields<'a> {
    actor_id: &'a str,
    action: &'a str,
    target_type: Option<&'a str>,
    target_id: Option<&'a str>,
    reason: Option<&'a str>,
    before_json: Option<&'a str>,
    after_json: Option<&'a str>,
    ip_address: Option<&'a str>,
    user_agent: Option<&'a str>,
    hash_prev: &'a str,
    created_at: &'a str,
}

fn canonical_string(fields: CanonicalFields<'_>) -> String {
    [
        fields.actor_id,
        fields.action,
        fields.target_type.unwrap_or(""),
        fields.target_id.unwrap_or(""),
        fields.reason.unwrap_or(""),
        fields.before_json.unwrap_or(""),
        fields.after_json.unwrap_or(""),
        fields.ip_address.unwrap_or(""),
        fields.user_agent.unwrap_or(""),
        fields.hash_prev,
        fields.created_at,
    ]
    .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_genesis_hash_is_digest_of_seed() {
        assert_eq!(sha256_hex(GENESIS_SEED), GENESIS_HASH);
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_canonical_field_order_and_empties() {
        let entry = NewAuditEntry::build(
            AuditEventInput::new("admin-1", "admin.users.ban").with_target("user", "u-9"),
            GENESIS_HASH.to_string(),
            "2026-01-01T00:00:00.000Z".to_string(),
        )
        .unwrap();

        assert_eq!(
            entry.canonical(),
            format!("admin-1|admin.users.ban|user|u-9||||||{}|2026-01-01T00:00:00.000Z", GENESIS_HASH)
        );
        assert_eq!(entry.hash_curr, sha256_hex(&entry.canonical()));
    }

    #[test]
    fn test_snapshots_are_serialized() {
        let entry = NewAuditEntry::build(
            AuditEventInput::new("a", "x")
                .with_before(json!({ "role": "user" }))
                .with_after(serde_json::Value::Null),
            GENESIS_HASH.to_string(),
            "2026-01-01T00:00:00.000Z".to_string(),
        )
        .unwrap();

        assert_eq!(entry.before_json.as_deref(), Some(r#"{"role":"user"}"#));
        assert_eq!(entry.after_json, None);

        let stored = entry.into_entry(1);
        assert_eq!(stored.before(), Some(json!({ "role": "user" })));
        assert!(stored.is_intact());
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let mut input = AuditEventInput::new("a", "x");
        input.reason = Some(String::new());
        input.target_type = Some(String::new());
        let entry = NewAuditEntry::build(input, GENESIS_HASH.to_string(), timestamp_now()).unwrap();
        assert_eq!(entry.reason, None);
        assert_eq!(entry.target_type, None);
    }

    #[test]
    fn test_stored_canonical_matches_pending() {
        let pending = NewAuditEntry::build(
            AuditEventInput::new("a", "x")
                .with_reason("why")
                .with_request_meta(Some("10.0.0.1".into()), Some("curl/8".into())),
            GENESIS_HASH.to_string(),
            timestamp_now(),
        )
        .unwrap();
        let canonical = pending.canonical();
        let stored = pending.into_entry(7);
        assert_eq!(stored.canonical(), canonical);
        assert!(stored.is_intact());
    }

    #[test]
    fn test_mutation_breaks_integrity() {
        let mut stored = NewAuditEntry::build(
            AuditEventInput::new("a", "x"),
            GENESIS_HASH.to_string(),
            timestamp_now(),
        )
        .unwrap()
        .into_entry(1);
        stored.action = "y".to_string();
        assert!(!stored.is_intact());
    }

    #[test]
    fn test_timestamp_format() {
        let at = DateTime::parse_from_rfc3339("2026-03-04T05:06:07.089Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(at), "2026-03-04T05:06:07.089Z");
    }
}
