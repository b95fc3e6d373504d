//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;

use crate::domain::entity::{session_record::SessionRecord, user::User};
use crate::domain::value_object::{token_fingerprint::TokenFingerprint, user_id::UserId};
use crate::error::AuthResult;

/// User directory (durable store)
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Active user owning `phone`
    async fn find_by_phone(&self, phone: &PhoneNumber) -> AuthResult<Option<User>>;

    /// Active user with `user_id`
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;

    /// Insert a new user. Returns `false` when the phone number is already taken.
    async fn create(&self, user: &User) -> AuthResult<bool>;

    /// Fails with `UserNotFound` if the user vanished or was deactivated
    async fn update_last_login(&self, user_id: UserId, now: DateTime<Utc>) -> AuthResult<()>;
}

/// Session records plus the per-user fingerprint index (ephemeral store)
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    /// Store `record` until `record.expires_at` and add it to the user's
    /// index, which lives until `index_expires_at`
    async fn put(&self, record: &SessionRecord, index_expires_at: DateTime<Utc>) -> AuthResult<()>;

    /// Live record for `fingerprint`
    async fn find(
        &self,
        fingerprint: &TokenFingerprint,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<SessionRecord>>;

    /// Set `last_used_at` without touching the record's expiry
    async fn touch(&self, fingerprint: &TokenFingerprint, now: DateTime<Utc>) -> AuthResult<()>;

    /// Delete one record and its index entry; absent records are not an error
    async fn remove(&self, user_id: UserId, fingerprint: &TokenFingerprint) -> AuthResult<()>;

    /// Delete every record in the user's index plus the index, as one batch.
    /// Returns the number of live records removed.
    async fn remove_all_for_user(&self, user_id: UserId, now: DateTime<Utc>) -> AuthResult<u64>;

    /// Drop records and index entries past their expiry
    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}
