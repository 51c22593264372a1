//! # Step-Up Verification
//!
//! One-time codes that re-confirm an admin's identity before sensitive
//! operations. A challenge is created with a 6-digit code (delivered out of
//! band by the caller), verified once, and then counts as a recent step-up
//! until it ages past the configured window.
//!
//! ## Limits
//!
//! - at most 3 active (unused, unexpired) challenges per user;
//! - at most 5 challenges created per 10 minute window;
//! - 5 wrong codes lock a challenge;
//! - 10 wrong codes summed over a user's active challenges lock them all,
//!   so requesting fresh challenges does not reset a brute-force budget.
//!
//! Only the SHA-256 of a code is stored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use admin_audit::sha256_hex;

use crate::config::StepUpConfig;
use crate::error::{AdminError, AdminResult};

/// A stored step-up challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepUpChallenge {
    /// Unique challenge id.
    pub id: String,
    /// Admin the challenge was issued to.
    pub user_id: String,
    /// SHA-256 hex of the code.
    pub otp_hash: String,
    /// Wrong codes submitted so far.
    pub failed_attempts: u32,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// End of the verification window.
    pub expires_at: DateTime<Utc>,
    /// When the code was accepted.
    pub used_at: Option<DateTime<Utc>>,
}

impl StepUpChallenge {
    /// Whether the code was already accepted.
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Whether the verification window has closed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Unused and unexpired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired(now)
    }
}

/// Storage for step-up challenges.
#[async_trait]
pub trait StepUpStore: Send + Sync {
    /// Insert a new challenge.
    async fn insert(&self, challenge: StepUpChallenge) -> AdminResult<()>;

    /// Look up a challenge issued to `user_id`.
    async fn get(&self, user_id: &str, challenge_id: &str) -> AdminResult<Option<StepUpChallenge>>;

    /// Every challenge currently stored for a user.
    async fn list_for_user(&self, user_id: &str) -> AdminResult<Vec<StepUpChallenge>>;

    /// Delete a user's expired and used challenges. Returns the number removed.
    async fn delete_stale(&self, user_id: &str, now: DateTime<Utc>) -> AdminResult<u64>;

    /// Increment a challenge's failure counter and return the new value.
    async fn record_failed_attempt(&self, challenge_id: &str) -> AdminResult<u32>;

    /// Mark a challenge as accepted.
    async fn mark_used(&self, challenge_id: &str, at: DateTime<Utc>) -> AdminResult<()>;
}

/// In-memory [`StepUpStore`].
#[derive(Debug, Default)]
pub struct MemoryStepUpStore {
    challenges: RwLock<HashMap<String, StepUpChallenge>>,
}

impl MemoryStepUpStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StepUpStore for MemoryStepUpStore {
    async fn insert(&self, challenge: StepUpChallenge) -> AdminResult<()> {
        self.challenges.write().await.insert(challenge.id.clone(), challenge);
        Ok(())
    }

    async fn get(&self, user_id: &str, challenge_id: &str) -> AdminResult<Option<StepUpChallenge>> {
        Ok(self
            .challenges
            .read()
            .await
            .get(challenge_id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> AdminResult<Vec<StepUpChallenge>> {
        Ok(self
            .challenges
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_stale(&self, user_id: &str, now: DateTime<Utc>) -> AdminResult<u64> {
        let mut challenges = self.challenges.write().await;
        let before = challenges.len();
        challenges.retain(|_, c| c.user_id != user_id || c.is_active(now));
        Ok((before - challenges.len()) as u64)
    }

    async fn record_failed_attempt(&self, challenge_id: &str) -> AdminResult<u32> {
        let mut challenges = self.challenges.write().await;
        let challenge = challenges
            .get_mut(challenge_id)
            .ok_or_else(|| AdminError::Storage(format!("challenge {} not found", challenge_id)))?;
        challenge.failed_attempts += 1;
        Ok(challenge.failed_attempts)
    }

    async fn mark_used(&self, challenge_id: &str, at: DateTime<Utc>) -> AdminResult<()> {
        let mut challenges = self.challenges.write().await;
        let challenge = challenges
            .get_mut(challenge_id)
            .ok_or_else(|| AdminError::Storage(format!("challenge {} not found", challenge_id)))?;
        challenge.used_at = Some(at);
        Ok(())
    }
}

/// A freshly issued challenge. The plain code exists only here.
#[derive(Clone)]
pub struct IssuedChallenge {
    /// Id the client echoes back with the code.
    pub challenge_id: String,
    /// The plain 6-digit code to deliver to the admin.
    pub otp: String,
    /// End of the verification window.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedChallenge")
            .field("challenge_id", &self.challenge_id)
            .field("otp", &"******")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Outcome of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepUpVerification {
    /// Whether the code was accepted.
    pub valid: bool,
    /// Why it was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepUpVerification {
    fn accepted() -> Self {
        Self { valid: true, error: None }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(reason.into()),
        }
    }
}

/// Per-user challenge counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeStatus {
    /// All stored challenges.
    pub total: u64,
    /// Unused and unexpired.
    pub active: u64,
    /// Accepted.
    pub used: u64,
    /// Unused and past their window.
    pub expired: u64,
}

/// Random 6-digit code, zero padded.
fn generate_otp() -> String {
    let mut rng = OsRng;
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}

/// Compare a submitted code against the stored digest in constant time.
fn otp_matches(otp: &str, otp_hash: &str) -> bool {
    sha256_hex(otp).as_bytes().ct_eq(otp_hash.as_bytes()).into()
}

fn generate_challenge_id() -> String {
    format!("stepup_{}", Uuid::now_v7().simple())
}

/// Issues and verifies step-up challenges.
pub struct StepUpService {
    store: Arc<dyn StepUpStore>,
    config: StepUpConfig,
    // Count checks and the write that follows must not interleave.
    lock: Mutex<()>,
}

impl std::fmt::Debug for StepUpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepUpService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StepUpService {
    /// Create a service over a challenge store.
    pub fn new(store: Arc<dyn StepUpStore>, config: StepUpConfig) -> Self {
        Self {
            store,
            config,
            lock: Mutex::new(()),
        }
    }

    /// Limits in effect.
    pub fn config(&self) -> &StepUpConfig {
        &self.config
    }

    /// Issue a new challenge for `user_id`.
    pub async fn create_challenge(&self, user_id: &str) -> AdminResult<IssuedChallenge> {
        self.create_challenge_at(user_id, Utc::now()).await
    }

    /// [`Self::create_challenge`] with an explicit clock.
    #[instrument(skip(self, now))]
    pub async fn create_challenge_at(&self, user_id: &str, now: DateTime<Utc>) -> AdminResult<IssuedChallenge> {
        let _guard = self.lock.lock().await;

        let removed = self.store.delete_stale(user_id, now).await?;
        if removed > 0 {
            debug!(removed, "Removed stale step-up challenges");
        }

        let existing = self.store.list_for_user(user_id).await?;
        let active = existing.iter().filter(|c| c.is_active(now)).count();
        if active >= self.config.max_active_challenges {
            warn!(active, "Step-up request refused: too many active challenges");
            return Err(AdminError::RateLimited(
                "Too many active challenges. Please wait before requesting another.".to_string(),
            ));
        }

        let window_start = now - self.config.rate_window();
        let recent = existing.iter().filter(|c| c.created_at > window_start).count();
        if recent >= self.config.max_challenges_per_window {
            warn!(recent, "Step-up request refused: rate window exhausted");
            return Err(AdminError::RateLimited(
                "Too many verification requests in a short period. Please wait before requesting another."
                    .to_string(),
            ));
        }

        let otp = generate_otp();
        let challenge = StepUpChallenge {
            id: generate_challenge_id(),
            user_id: user_id.to_string(),
            otp_hash: sha256_hex(&otp),
            failed_attempts: 0,
            created_at: now,
            expires_at: now + self.config.challenge_ttl(),
            used_at: None,
        };
        let issued = IssuedChallenge {
            challenge_id: challenge.id.clone(),
            otp,
            expires_at: challenge.expires_at,
        };
        self.store.insert(challenge).await?;

        info!(challenge_id = %issued.challenge_id, "Step-up challenge created");
        Ok(issued)
    }

    /// Check a submitted code; on success the challenge is marked used.
    pub async fn verify_challenge(&self, user_id: &str, challenge_id: &str, otp: &str) -> AdminResult<StepUpVerification> {
        self.verify_challenge_at(user_id, challenge_id, otp, Utc::now()).await
    }

    /// [`Self::verify_challenge`] with an explicit clock.
    #[instrument(skip(self, otp, now))]
    pub async fn verify_challenge_at(
        &self,
        user_id: &str,
        challenge_id: &str,
        otp: &str,
        now: DateTime<Utc>,
    ) -> AdminResult<StepUpVerification> {
        let _guard = self.lock.lock().await;

        let Some(challenge) = self.store.get(user_id, challenge_id).await? else {
            return Ok(StepUpVerification::rejected("Challenge not found"));
        };
        if challenge.is_used() {
            return Ok(StepUpVerification::rejected("Challenge already used"));
        }
        if challenge.is_expired(now) {
            return Ok(StepUpVerification::rejected("Challenge expired"));
        }
        if challenge.failed_attempts >= self.config.max_failed_attempts {
            return Ok(StepUpVerification::rejected(
                "Too many failed attempts. Request a new verification code.",
            ));
        }

        let total_failed: u32 = self
            .store
            .list_for_user(user_id)
            .await?
            .iter()
            .filter(|c| c.is_active(now))
            .map(|c| c.failed_attempts)
            .sum();
        if total_failed >= self.config.max_total_failed_attempts {
            warn!(total_failed, "Step-up verification locked across challenges");
            return Ok(StepUpVerification::rejected(
                "Too many failed attempts across verification codes. Wait for them to expire before trying again.",
            ));
        }

        if !otp_matches(otp, &challenge.otp_hash) {
            let failed = self.store.record_failed_attempt(challenge_id).await?;
            let remaining = self.config.max_failed_attempts.saturating_sub(failed);
            warn!(failed, remaining, "Step-up code rejected");
            let message = match remaining {
                0 => "Invalid code. No attempts remaining. Request a new verification code.".to_string(),
                1 => "Invalid code. 1 attempt remaining.".to_string(),
                n => format!("Invalid code. {} attempts remaining.", n),
            };
            return Ok(StepUpVerification::rejected(message));
        }

        self.store.mark_used(challenge_id, now).await?;
        info!("Step-up challenge verified");
        Ok(StepUpVerification::accepted())
    }

    /// Whether the user completed a step-up within `max_age` whose challenge
    /// has not yet expired.
    pub async fn has_valid_step_up(&self, user_id: &str, max_age: chrono::Duration) -> AdminResult<bool> {
        self.has_valid_step_up_at(user_id, max_age, Utc::now()).await
    }

    /// [`Self::has_valid_step_up`] with an explicit clock.
    pub async fn has_valid_step_up_at(
        &self,
        user_id: &str,
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> AdminResult<bool> {
        let cutoff = now - max_age;
        Ok(self
            .store
            .list_for_user(user_id)
            .await?
            .iter()
            .any(|c| !c.is_expired(now) && c.used_at.is_some_and(|used| used > cutoff)))
    }

    /// Challenge counts for a user.
    pub async fn challenge_status(&self, user_id: &str) -> AdminResult<ChallengeStatus> {
        self.challenge_status_at(user_id, Utc::now()).await
    }

    /// [`Self::challenge_status`] with an explicit clock.
    pub async fn challenge_status_at(&self, user_id: &str, now: DateTime<Utc>) -> AdminResult<ChallengeStatus> {
        let challenges = self.store.list_for_user(user_id).await?;
        let mut status = ChallengeStatus {
            total: challenges.len() as u64,
            ..Default::default()
        };
        for challenge in &challenges {
            if challenge.is_used() {
                status.used += 1;
            } else if challenge.is_expired(now) {
                status.expired += 1;
            } else {
                status.active += 1;
            }
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn service() -> StepUpService {
        StepUpService::new(Arc::new(MemoryStepUpStore::new()), StepUpConfig::default())
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-01T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn wrong(otp: &str) -> String {
        if otp == "000000" {
            "111111".to_string()
        } else {
            "000000".to_string()
        }
    }

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_otp_matches_only_its_digest() {
        let hash = sha256_hex("123456");
        assert!(otp_matches("123456", &hash));
        assert!(!otp_matches("123457", &hash));
        assert!(!otp_matches("123456", &hash.to_uppercase()));
        assert!(!otp_matches("123456", &hash[..32]));
        assert!(!otp_matches("123456", ""));
    }

    #[test]
    fn test_issued_debug_hides_code() {
        let issued = IssuedChallenge {
            challenge_id: "c".into(),
            otp: "123456".into(),
            expires_at: t0(),
        };
        assert!(!format!("{:?}", issued).contains("123456"));
    }

    #[tokio::test]
    async fn test_create_and_verify() {
        let svc = service();
        let issued = svc.create_challenge_at("admin-1", t0()).await.unwrap();
        assert_eq!(issued.expires_at, t0() + Duration::minutes(10));
        assert!(issued.challenge_id.starts_with("stepup_"));

        let result = svc
            .verify_challenge_at("admin-1", &issued.challenge_id, &issued.otp, t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(result, StepUpVerification::accepted());

        let again = svc
            .verify_challenge_at("admin-1", &issued.challenge_id, &issued.otp, t0() + Duration::minutes(2))
            .await
            .unwrap();
        assert_eq!(again.error.as_deref(), Some("Challenge already used"));
    }

    #[tokio::test]
    async fn test_code_is_not_stored_in_plain() {
        let store = Arc::new(MemoryStepUpStore::new());
        let svc = StepUpService::new(store.clone(), StepUpConfig::default());
        let issued = svc.create_challenge_at("admin-1", t0()).await.unwrap();

        let stored = store.get("admin-1", &issued.challenge_id).await.unwrap().unwrap();
        assert_ne!(stored.otp_hash, issued.otp);
        assert_eq!(stored.otp_hash, sha256_hex(&issued.otp));
    }

    #[tokio::test]
    async fn test_challenge_belongs_to_its_user() {
        let svc = service();
        let issued = svc.create_challenge_at("admin-1", t0()).await.unwrap();
        let result = svc
            .verify_challenge_at("admin-2", &issued.challenge_id, &issued.otp, t0())
            .await
            .unwrap();
        assert_eq!(result.error.as_deref(), Some("Challenge not found"));
    }

    #[tokio::test]
    async fn test_expired_challenge() {
        let svc = service();
        let issued = svc.create_challenge_at("admin-1", t0()).await.unwrap();
        let result = svc
            .verify_challenge_at("admin-1", &issued.challenge_id, &issued.otp, t0() + Duration::minutes(11))
            .await
            .unwrap();
        assert_eq!(result.error.as_deref(), Some("Challenge expired"));
    }

    #[tokio::test]
    async fn test_wrong_code_counts_down_then_locks() {
        let svc = service();
        let issued = svc.create_challenge_at("admin-1", t0()).await.unwrap();
        let bad = wrong(&issued.otp);

        let expected = [
            "Invalid code. 4 attempts remaining.",
            "Invalid code. 3 attempts remaining.",
            "Invalid code. 2 attempts remaining.",
            "Invalid code. 1 attempt remaining.",
            "Invalid code. No attempts remaining. Request a new verification code.",
        ];
        for message in expected {
            let result = svc
                .verify_challenge_at("admin-1", &issued.challenge_id, &bad, t0())
                .await
                .unwrap();
            assert_eq!(result.error.as_deref(), Some(message));
        }

        let locked = svc
            .verify_challenge_at("admin-1", &issued.challenge_id, &issued.otp, t0())
            .await
            .unwrap();
        assert_eq!(
            locked.error.as_deref(),
            Some("Too many failed attempts. Request a new verification code.")
        );
    }

    #[tokio::test]
    async fn test_cross_challenge_lockout() {
        let svc = service();
        let first = svc.create_challenge_at("admin-1", t0()).await.unwrap();
        let second = svc.create_challenge_at("admin-1", t0()).await.unwrap();
        let third = svc.create_challenge_at("admin-1", t0()).await.unwrap();

        for issued in [&first, &second] {
            let bad = wrong(&issued.otp);
            for _ in 0..5 {
                svc.verify_challenge_at("admin-1", &issued.challenge_id, &bad, t0())
                    .await
                    .unwrap();
            }
        }

        let result = svc
            .verify_challenge_at("admin-1", &third.challenge_id, &third.otp, t0())
            .await
            .unwrap();
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("across verification codes"));
    }

    #[tokio::test]
    async fn test_active_challenge_limit() {
        let svc = service();
        for _ in 0..3 {
            svc.create_challenge_at("admin-1", t0()).await.unwrap();
        }
        let err = svc.create_challenge_at("admin-1", t0()).await.unwrap_err();
        assert!(matches!(err, AdminError::RateLimited(ref m) if m.starts_with("Too many active challenges")));

        // Other users are unaffected.
        assert!(svc.create_challenge_at("admin-2", t0()).await.is_ok());
    }

    #[tokio::test]
    async fn test_window_counts_recent_creations() {
        let config = StepUpConfig {
            max_active_challenges: 10,
            ..StepUpConfig::default()
        };
        let svc = StepUpService::new(Arc::new(MemoryStepUpStore::new()), config);

        for _ in 0..5 {
            svc.create_challenge_at("admin-1", t0()).await.unwrap();
        }
        let err = svc.create_challenge_at("admin-1", t0()).await.unwrap_err();
        assert!(matches!(err, AdminError::RateLimited(ref m) if m.starts_with("Too many verification requests")));

        // After the window (and the challenges) have passed, creation resumes.
        assert!(svc
            .create_challenge_at("admin-1", t0() + Duration::minutes(11))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_has_valid_step_up() {
        let svc = service();
        assert!(!svc.has_valid_step_up_at("admin-1", Duration::minutes(10), t0()).await.unwrap());

        let issued = svc.create_challenge_at("admin-1", t0()).await.unwrap();
        assert!(!svc.has_valid_step_up_at("admin-1", Duration::minutes(10), t0()).await.unwrap());

        svc.verify_challenge_at("admin-1", &issued.challenge_id, &issued.otp, t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert!(svc
            .has_valid_step_up_at("admin-1", Duration::minutes(10), t0() + Duration::minutes(2))
            .await
            .unwrap());

        // Verified more than max_age ago.
        assert!(!svc
            .has_valid_step_up_at("admin-1", Duration::minutes(1), t0() + Duration::minutes(5))
            .await
            .unwrap());

        // Challenge window closed.
        assert!(!svc
            .has_valid_step_up_at("admin-1", Duration::minutes(30), t0() + Duration::minutes(10))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_challenge_status_and_cleanup() {
        let svc = service();
        let used = svc.create_challenge_at("admin-1", t0()).await.unwrap();
        svc.verify_challenge_at("admin-1", &used.challenge_id, &used.otp, t0())
            .await
            .unwrap();
        svc.create_challenge_at("admin-1", t0()).await.unwrap();

        let status = svc
            .challenge_status_at("admin-1", t0() + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(status, ChallengeStatus { total: 2, active: 1, used: 1, expired: 0 });

        let status = svc
            .challenge_status_at("admin-1", t0() + Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(status, ChallengeStatus { total: 2, active: 0, used: 1, expired: 1 });

        // Creating a new challenge clears used and expired ones first.
        svc.create_challenge_at("admin-1", t0() + Duration::minutes(15))
            .await
            .unwrap();
        let status = svc
            .challenge_status_at("admin-1", t0() + Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(status, ChallengeStatus { total: 1, active: 1, used: 0, expired: 0 });
    }
}
