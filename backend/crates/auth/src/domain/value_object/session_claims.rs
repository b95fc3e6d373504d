//! Bearer token claims

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_object::user_id::UserId;

/// Claims carried by every bearer token.
///
/// Timestamps are Unix seconds. `jti` is random per token so two tokens
/// minted for one user in the same second still differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// `user:<uuid>`
    pub sub: String,
    pub uid: Uuid,
    pub phone_number: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

impl SessionClaims {
    pub fn subject_for(user_id: &UserId) -> String {
        format!("user:{}", user_id)
    }

    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.uid)
    }

    /// `nbf <= now < exp`
    pub fn is_current(&self, now_ts: i64) -> bool {
        self.nbf <= now_ts && now_ts < self.exp
    }
}
