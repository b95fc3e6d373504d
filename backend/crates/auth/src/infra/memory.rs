//! In-memory Repository Implementations
//!
//! Session records and the per-user index share one lock so `put`, `remove`
//! and `remove_all_for_user` are each a single atomic batch.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;
use tokio::sync::Mutex;

use crate::domain::entity::{session_record::SessionRecord, user::User};
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::domain::value_object::{token_fingerprint::TokenFingerprint, user_id::UserId};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: Mutex<HashMap<UserId, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn get(&self, user_id: UserId) -> Option<User> {
        self.users.lock().await.get(&user_id).cloned()
    }

    /// Returns `false` if the user does not exist
    pub async fn deactivate(&self, user_id: UserId) -> bool {
        match self.users.lock().await.get_mut(&user_id) {
            Some(user) => {
                user.is_active = false;
                true
            }
            None => false,
        }
    }
}

impl UserRepository for MemoryUserRepository {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> AuthResult<Option<User>> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|u| &u.phone_number == phone && u.is_active)
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.get(&user_id).filter(|u| u.is_active).cloned())
    }

    async fn create(&self, user: &User) -> AuthResult<bool> {
        let mut users = self.users.lock().await;
        // Uniqueness covers inactive users too, like the table constraint
        if users.values().any(|u| u.phone_number == user.phone_number) {
            return Ok(false);
        }
        users.insert(user.user_id, user.clone());
        Ok(true)
    }

    async fn update_last_login(&self, user_id: UserId, now: DateTime<Utc>) -> AuthResult<()> {
        let mut users = self.users.lock().await;
        match users.get_mut(&user_id) {
            Some(user) if user.is_active => {
                user.record_login(now);
                Ok(())
            }
            _ => Err(AuthError::UserNotFound),
        }
    }
}

#[derive(Debug)]
struct UserIndex {
    fingerprints: HashSet<TokenFingerprint>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SessionState {
    records: HashMap<TokenFingerprint, SessionRecord>,
    index: HashMap<UserId, UserIndex>,
}

#[derive(Debug, Default)]
pub struct MemorySessionRepository {
    state: Mutex<SessionState>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `fingerprint`, live or not
    pub async fn get(&self, fingerprint: &TokenFingerprint) -> Option<SessionRecord> {
        self.state.lock().await.records.get(fingerprint).cloned()
    }

    /// Fingerprints currently indexed for `user_id`
    pub async fn indexed(&self, user_id: UserId) -> usize {
        self.state
            .lock()
            .await
            .index
            .get(&user_id)
            .map_or(0, |i| i.fingerprints.len())
    }
}

impl SessionRepository for MemorySessionRepository {
    async fn put(&self, record: &SessionRecord, index_expires_at: DateTime<Utc>) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state
            .records
            .insert(record.token_fingerprint.clone(), record.clone());

        let entry = state.index.entry(record.user_id).or_insert_with(|| UserIndex {
            fingerprints: HashSet::new(),
            expires_at: index_expires_at,
        });
        entry.fingerprints.insert(record.token_fingerprint.clone());
        entry.expires_at = entry.expires_at.max(index_expires_at);
        Ok(())
    }

    async fn find(
        &self,
        fingerprint: &TokenFingerprint,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<SessionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .get(fingerprint)
            .filter(|r| r.is_live(now))
            .cloned())
    }

    async fn touch(&self, fingerprint: &TokenFingerprint, now: DateTime<Utc>) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some(record) = state.records.get_mut(fingerprint).filter(|r| r.is_live(now)) {
            record.last_used_at = now;
        }
        Ok(())
    }

    async fn remove(&self, user_id: UserId, fingerprint: &TokenFingerprint) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state.records.remove(fingerprint);
        if let Some(index) = state.index.get_mut(&user_id) {
            index.fingerprints.remove(fingerprint);
            if index.fingerprints.is_empty() {
                state.index.remove(&user_id);
            }
        }
        Ok(())
    }

    async fn remove_all_for_user(&self, user_id: UserId, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let Some(index) = state.index.remove(&user_id) else {
            return Ok(0);
        };
        if index.expires_at <= now {
            return Ok(0);
        }

        let mut removed = 0;
        for fingerprint in &index.fingerprints {
            if let Some(record) = state.records.remove(fingerprint)
                && record.is_live(now)
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.records.len();
        state.records.retain(|_, r| r.is_live(now));
        let purged = (before - state.records.len()) as u64;

        let SessionState { records, index } = &mut *state;
        index.retain(|_, i| {
            i.fingerprints.retain(|fp| records.contains_key(fp));
            i.expires_at > now && !i.fingerprints.is_empty()
        });
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> PhoneNumber {
        PhoneNumber::new("+1234567890").unwrap()
    }

    fn record(user_id: UserId, token: &str, now: DateTime<Utc>, secs: i64) -> SessionRecord {
        SessionRecord::new(
            TokenFingerprint::of(token),
            user_id,
            now,
            now + chrono::Duration::seconds(secs),
        )
    }

    #[tokio::test]
    async fn test_create_is_unique_per_phone() {
        let repo = MemoryUserRepository::new();
        let now = Utc::now();
        let first = User::register(phone(), now);
        assert!(repo.create(&first).await.unwrap());
        assert!(!repo.create(&User::register(phone(), now)).await.unwrap());
        assert_eq!(repo.len().await, 1);

        // Deactivated users keep the number but are invisible to lookups
        assert!(repo.deactivate(first.user_id).await);
        assert!(repo.find_by_phone(&phone()).await.unwrap().is_none());
        assert!(!repo.create(&User::register(phone(), now)).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_id_skips_inactive_users() {
        let repo = MemoryUserRepository::new();
        let user = User::register(phone(), Utc::now());
        repo.create(&user).await.unwrap();

        let found = repo.find_by_id(user.user_id).await.unwrap().unwrap();
        assert_eq!(found.phone_number, user.phone_number);
        assert!(repo.find_by_id(UserId::new()).await.unwrap().is_none());

        repo.deactivate(user.user_id).await;
        assert!(repo.find_by_id(user.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_last_login_requires_active_user() {
        let repo = MemoryUserRepository::new();
        let now = Utc::now();
        let user = User::register(phone(), now);
        repo.create(&user).await.unwrap();

        let later = now + chrono::Duration::seconds(30);
        repo.update_last_login(user.user_id, later).await.unwrap();
        assert_eq!(repo.get(user.user_id).await.unwrap().last_login_at, later);

        repo.deactivate(user.user_id).await;
        assert!(matches!(
            repo.update_last_login(user.user_id, later).await,
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            repo.update_last_login(UserId::new(), later).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_find_ignores_expired_record() {
        let repo = MemorySessionRepository::new();
        let now = Utc::now();
        let rec = record(UserId::new(), "t1", now, 10);
        repo.put(&rec, rec.expires_at).await.unwrap();

        assert!(repo.find(&rec.token_fingerprint, now).await.unwrap().is_some());
        let at_expiry = rec.expires_at;
        assert!(repo.find(&rec.token_fingerprint, at_expiry).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_keeps_expiry() {
        let repo = MemorySessionRepository::new();
        let now = Utc::now();
        let rec = record(UserId::new(), "t1", now, 60);
        repo.put(&rec, rec.expires_at).await.unwrap();

        let later = now + chrono::Duration::seconds(5);
        repo.touch(&rec.token_fingerprint, later).await.unwrap();
        let stored = repo.get(&rec.token_fingerprint).await.unwrap();
        assert_eq!(stored.last_used_at, later);
        assert_eq!(stored.expires_at, rec.expires_at);
    }

    #[tokio::test]
    async fn test_remove_all_counts_live_records_only() {
        let repo = MemorySessionRepository::new();
        let now = Utc::now();
        let user = UserId::new();
        let other = UserId::new();
        let slack = now + chrono::Duration::hours(2);

        let live_a = record(user, "a", now, 3600);
        let live_b = record(user, "b", now, 3600);
        let short = record(user, "c", now, 1);
        let foreign = record(other, "d", now, 3600);
        for r in [&live_a, &live_b, &short, &foreign] {
            repo.put(r, slack).await.unwrap();
        }
        assert_eq!(repo.indexed(user).await, 3);

        let later = now + chrono::Duration::seconds(10);
        assert_eq!(repo.remove_all_for_user(user, later).await.unwrap(), 2);
        assert_eq!(repo.indexed(user).await, 0);
        assert!(repo.get(&live_a.token_fingerprint).await.is_none());
        assert!(repo.get(&short.token_fingerprint).await.is_none());
        assert!(repo.find(&foreign.token_fingerprint, later).await.unwrap().is_some());

        assert_eq!(repo.remove_all_for_user(user, later).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_drops_expired_records_and_index() {
        let repo = MemorySessionRepository::new();
        let now = Utc::now();
        let user = UserId::new();
        let rec = record(user, "a", now, 10);
        repo.put(&rec, rec.expires_at + chrono::Duration::seconds(10))
            .await
            .unwrap();

        let later = now + chrono::Duration::seconds(30);
        assert_eq!(repo.purge_expired(later).await.unwrap(), 1);
        assert_eq!(repo.indexed(user).await, 0);
        assert!(repo.get(&rec.token_fingerprint).await.is_none());
    }
}
