//! Domain Entities
//!
//! Core business entities for the OTP domain.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;
use kernel::id::ChallengeId;
use platform::rate_limit::WindowState;

use crate::domain::value_objects::{OtpCode, SessionHandle};

/// One-time-code challenge issued to a phone number
///
/// `used_at` is set exactly when `is_used` is true, and `is_used` flips at
/// most once. Expiry is never stored; it is derived from `expires_at`.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub id: ChallengeId,
    pub phone_number: PhoneNumber,
    pub code: OtpCode,
    pub session_handle: SessionHandle,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl OtpChallenge {
    /// Create a new challenge with fresh code and handle
    pub fn issue(phone_number: PhoneNumber, code_length: u32, ttl: Duration, now: DateTime<Utc>) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        Self {
            id: ChallengeId::new(),
            phone_number,
            code: OtpCode::generate(code_length),
            session_handle: SessionHandle::generate(),
            expires_at: now + ttl,
            is_used: false,
            created_at: now,
            used_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Unused and not past expiry
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && !self.is_expired(now)
    }

    /// Flip to used. Returns false if it was already used or has expired.
    pub fn mark_used(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_redeemable(now) {
            return false;
        }
        self.is_used = true;
        self.used_at = Some(now);
        true
    }
}

/// Stored rate-limit window for one phone number
///
/// `expires_at` plays the role of the record TTL; `None` means the record
/// lost its expiry and is waiting for the maintenance sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub phone_number: PhoneNumber,
    pub window: WindowState,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}
