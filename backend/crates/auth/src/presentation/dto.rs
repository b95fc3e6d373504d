//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entity::user::User;
use crate::domain::value_object::session_claims::SessionClaims;

// ============================================================================
// Send Code
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SendCodeRequest {
    pub phone_number: String,
}

/// Never carries the code or the phone number
#[derive(Debug, Clone, Serialize)]
pub struct SendCodeResponse {
    pub session_handle: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Verify Code
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCodeRequest {
    pub session_handle: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub phone_number: String,
    pub registered_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id.to_string(),
            phone_number: user.phone_number.as_str().to_string(),
            registered_at: user.registered_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyCodeResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

// ============================================================================
// Logout
// ============================================================================

/// Body is optional; an empty body means `logout_all = false`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub logout_all: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
    pub tokens_revoked: u64,
}

// ============================================================================
// Me
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub phone_number: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<&SessionClaims> for MeResponse {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            user_id: claims.uid.to_string(),
            phone_number: claims.phone_number.clone(),
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}
