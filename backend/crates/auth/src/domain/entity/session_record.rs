//! Session Record Entity
//!
//! Server-side half of a bearer session. A token is only accepted while its
//! record exists, so deleting the record revokes the token early.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{token_fingerprint::TokenFingerprint, user_id::UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token_fingerprint: TokenFingerprint,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    /// Record TTL: equal to the token's `exp`
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        token_fingerprint: TokenFingerprint,
        user_id: UserId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token_fingerprint,
            user_id,
            issued_at,
            expires_at,
            last_used_at: issued_at,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
