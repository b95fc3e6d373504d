//! In-memory Repository Implementations
//!
//! Each store is one map behind a `tokio::sync::Mutex`; holding the lock
//! across load-evaluate-store gives the same per-key atomicity the SQL
//! implementations get from row locks and conditional updates.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;
use kernel::id::ChallengeId;
use platform::rate_limit::{RateLimitDecision, RateLimitPolicy, evaluate};
use tokio::sync::Mutex;

use crate::domain::entities::{OtpChallenge, RateLimitRecord};
use crate::domain::repository::{ChallengeRepository, RateLimitRepository};
use crate::domain::value_objects::{OtpCode, SessionHandle};
use crate::error::{OtpError, OtpResult};

#[derive(Debug, Default)]
pub struct MemoryChallengeRepository {
    challenges: Mutex<HashMap<ChallengeId, OtpChallenge>>,
}

impl MemoryChallengeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.challenges.lock().await.len()
    }

    pub async fn get(&self, id: ChallengeId) -> Option<OtpChallenge> {
        self.challenges.lock().await.get(&id).cloned()
    }
}

impl ChallengeRepository for MemoryChallengeRepository {
    async fn create(&self, challenge: &OtpChallenge) -> OtpResult<()> {
        let mut challenges = self.challenges.lock().await;
        if challenges
            .values()
            .any(|c| c.session_handle == challenge.session_handle)
        {
            return Err(OtpError::Internal("duplicate session handle".to_string()));
        }
        challenges.insert(challenge.id, challenge.clone());
        Ok(())
    }

    async fn find_redeemable(
        &self,
        handle: &SessionHandle,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> OtpResult<Option<OtpChallenge>> {
        let challenges = self.challenges.lock().await;
        Ok(challenges
            .values()
            .filter(|c| &c.session_handle == handle && c.code.matches(code) && c.is_redeemable(now))
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn mark_used(&self, challenge_id: ChallengeId, now: DateTime<Utc>) -> OtpResult<bool> {
        let mut challenges = self.challenges.lock().await;
        Ok(challenges
            .get_mut(&challenge_id)
            .is_some_and(|c| c.mark_used(now)))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> OtpResult<u64> {
        let mut challenges = self.challenges.lock().await;
        let before = challenges.len();
        challenges.retain(|_, c| !c.is_expired(now));
        Ok((before - challenges.len()) as u64)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRateLimitRepository {
    windows: Mutex<HashMap<PhoneNumber, RateLimitRecord>>,
}

impl MemoryRateLimitRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, phone: &PhoneNumber) -> Option<RateLimitRecord> {
        self.windows.lock().await.get(phone).cloned()
    }

    /// Store a record as-is, including one without expiry
    pub async fn insert(&self, record: RateLimitRecord) {
        self.windows
            .lock()
            .await
            .insert(record.phone_number.clone(), record);
    }
}

impl RateLimitRepository for MemoryRateLimitRepository {
    async fn check_and_record(
        &self,
        phone: &PhoneNumber,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> OtpResult<RateLimitDecision> {
        let mut windows = self.windows.lock().await;

        let current = windows
            .get(phone)
            .filter(|r| r.is_live(now))
            .map(|r| r.window);

        let decision = evaluate(policy, current.as_ref(), now);

        if let RateLimitDecision::Allowed { state, ttl, .. } = &decision {
            windows.insert(
                phone.clone(),
                RateLimitRecord {
                    phone_number: phone.clone(),
                    window: *state,
                    expires_at: Some(now + to_chrono(*ttl)),
                },
            );
        }

        Ok(decision)
    }

    async fn repair_missing_expiry(&self, window: Duration, now: DateTime<Utc>) -> OtpResult<u64> {
        let mut windows = self.windows.lock().await;
        let mut repaired = 0;
        for record in windows.values_mut().filter(|r| r.expires_at.is_none()) {
            record.expires_at = Some(now + to_chrono(window));
            repaired += 1;
        }
        Ok(repaired)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> OtpResult<u64> {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, r| r.is_live(now));
        Ok((before - windows.len()) as u64)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::rate_limit::WindowState;

    fn phone() -> PhoneNumber {
        PhoneNumber::new("+1234567890").unwrap()
    }

    #[tokio::test]
    async fn test_find_prefers_newest_and_skips_used() {
        let repo = MemoryChallengeRepository::new();
        let now = Utc::now();
        let ttl = Duration::from_secs(120);

        let older = OtpChallenge::issue(phone(), 6, ttl, now);
        let mut newer = older.clone();
        newer.id = ChallengeId::new();
        newer.created_at = now + chrono::Duration::seconds(1);
        // Same handle only reachable by constructing it directly
        repo.challenges.lock().await.insert(older.id, older.clone());
        repo.challenges.lock().await.insert(newer.id, newer.clone());

        let found = repo
            .find_redeemable(&older.session_handle, &older.code, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, newer.id);

        assert!(repo.mark_used(newer.id, now).await.unwrap());
        let found = repo
            .find_redeemable(&older.session_handle, &older.code, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, older.id);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_handle() {
        let repo = MemoryChallengeRepository::new();
        let c = OtpChallenge::issue(phone(), 6, Duration::from_secs(120), Utc::now());
        repo.create(&c).await.unwrap();
        let mut dup = c.clone();
        dup.id = ChallengeId::new();
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let repo = MemoryChallengeRepository::new();
        let now = Utc::now();
        let c = OtpChallenge::issue(phone(), 6, Duration::from_secs(120), now);
        repo.create(&c).await.unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 0);
        assert_eq!(
            repo.delete_expired(now + chrono::Duration::seconds(120))
                .await
                .unwrap(),
            1
        );
        assert_eq!(repo.len().await, 0);
    }

    #[tokio::test]
    async fn test_rate_limit_record_ttl_is_written() {
        let repo = MemoryRateLimitRepository::new();
        let policy = RateLimitPolicy::default();
        let now = Utc::now();

        repo.check_and_record(&phone(), &policy, now).await.unwrap();
        let record = repo.get(&phone()).await.unwrap();
        assert_eq!(record.window.request_count, 1);
        assert_eq!(record.expires_at, Some(now + chrono::Duration::minutes(10)));
    }

    #[tokio::test]
    async fn test_expired_record_counts_as_absent() {
        let repo = MemoryRateLimitRepository::new();
        let policy = RateLimitPolicy::default();
        let now = Utc::now();
        repo.insert(RateLimitRecord {
            phone_number: phone(),
            window: WindowState {
                request_count: 3,
                window_start_at: now,
                last_request_at: now,
            },
            expires_at: Some(now),
        })
        .await;

        let decision = repo.check_and_record(&phone(), &policy, now).await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(repo.get(&phone()).await.unwrap().window.request_count, 1);
    }

    #[tokio::test]
    async fn test_repair_and_purge() {
        let repo = MemoryRateLimitRepository::new();
        let now = Utc::now();
        repo.insert(RateLimitRecord {
            phone_number: phone(),
            window: WindowState {
                request_count: 1,
                window_start_at: now,
                last_request_at: now,
            },
            expires_at: None,
        })
        .await;

        let window = Duration::from_secs(600);
        assert_eq!(repo.repair_missing_expiry(window, now).await.unwrap(), 1);
        assert_eq!(repo.repair_missing_expiry(window, now).await.unwrap(), 0);
        assert_eq!(repo.purge_expired(now).await.unwrap(), 0);
        assert_eq!(
            repo.purge_expired(now + chrono::Duration::minutes(10))
                .await
                .unwrap(),
            1
        );
    }
}
