//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;
use kernel::id::ChallengeId;
use platform::rate_limit::{RateLimitDecision, RateLimitPolicy};

use crate::domain::entities::OtpChallenge;
use crate::domain::value_objects::{OtpCode, SessionHandle};
use crate::error::OtpResult;

/// Challenge repository trait (durable store)
#[trait_variant::make(ChallengeRepository: Send)]
pub trait LocalChallengeRepository {
    /// Persist a freshly issued challenge
    async fn create(&self, challenge: &OtpChallenge) -> OtpResult<()>;

    /// Most recently created unused, unexpired challenge matching handle and code
    async fn find_redeemable(
        &self,
        handle: &SessionHandle,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> OtpResult<Option<OtpChallenge>>;

    /// Conditional `is_used: false -> true` flip.
    ///
    /// Returns `false` when zero records changed (already used or expired).
    async fn mark_used(&self, challenge_id: ChallengeId, now: DateTime<Utc>) -> OtpResult<bool>;

    /// Delete challenges past `expires_at`
    async fn delete_expired(&self, now: DateTime<Utc>) -> OtpResult<u64>;
}

/// Rate limit repository trait (ephemeral store)
#[trait_variant::make(RateLimitRepository: Send)]
pub trait LocalRateLimitRepository {
    /// Load, evaluate and persist the window for `phone` in one atomic step
    async fn check_and_record(
        &self,
        phone: &PhoneNumber,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> OtpResult<RateLimitDecision>;

    /// Give records that have no expiry a full `window` TTL
    async fn repair_missing_expiry(&self, window: Duration, now: DateTime<Utc>) -> OtpResult<u64>;

    /// Drop records whose TTL has passed
    async fn purge_expired(&self, now: DateTime<Utc>) -> OtpResult<u64>;
}
