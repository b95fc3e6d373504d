//! Issue Challenge Use Case

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;
use platform::clock::Clock;
use platform::rate_limit::RateLimitDecision;
use platform::timeout::bounded;

use crate::application::config::OtpConfig;
use crate::domain::delivery::CodeDeliverySink;
use crate::domain::entities::OtpChallenge;
use crate::domain::repository::{ChallengeRepository, RateLimitRepository};
use crate::domain::value_objects::SessionHandle;
use crate::error::{OtpError, OtpResult};

/// Output DTO for issue challenge
///
/// Carries neither the code nor the phone number.
#[derive(Debug, Clone)]
pub struct IssueChallengeOutput {
    pub session_handle: SessionHandle,
    pub expires_at: DateTime<Utc>,
    /// Sends left in the current window
    pub remaining: u32,
}

/// Issue Challenge Use Case
pub struct IssueChallengeUseCase<C, R, D>
where
    C: ChallengeRepository,
    R: RateLimitRepository,
    D: CodeDeliverySink,
{
    challenge_repo: Arc<C>,
    rate_limit_repo: Arc<R>,
    delivery: Arc<D>,
    clock: Arc<dyn Clock>,
    config: Arc<OtpConfig>,
}

impl<C, R, D> IssueChallengeUseCase<C, R, D>
where
    C: ChallengeRepository + Send + Sync,
    R: RateLimitRepository + Send + Sync,
    D: CodeDeliverySink + Send + Sync,
{
    pub fn new(
        challenge_repo: Arc<C>,
        rate_limit_repo: Arc<R>,
        delivery: Arc<D>,
        clock: Arc<dyn Clock>,
        config: Arc<OtpConfig>,
    ) -> Self {
        Self {
            challenge_repo,
            rate_limit_repo,
            delivery,
            clock,
            config,
        }
    }

    pub async fn execute(&self, phone_number: &str) -> OtpResult<IssueChallengeOutput> {
        // Validation happens before any side effect
        let phone = PhoneNumber::new(phone_number)?;
        let timeout = self.config.store_timeout;
        let now = self.clock.now();

        // A limiter failure blocks issuance
        let decision = bounded(
            "rate_limit.check_and_record",
            timeout,
            self.rate_limit_repo
                .check_and_record(&phone, &self.config.rate_limit, now),
        )
        .await??;

        let remaining = match decision {
            RateLimitDecision::Allowed { remaining, .. } => remaining,
            RateLimitDecision::Limited { retry_after, .. } => {
                tracing::warn!(
                    phone = %phone.masked(),
                    retry_after_secs = retry_after.as_secs(),
                    "OTP send rate limited"
                );
                return Err(OtpError::RateLimited { retry_after });
            }
        };

        let challenge = OtpChallenge::issue(
            phone,
            self.config.code_length,
            self.config.challenge_ttl,
            now,
        );

        bounded(
            "challenge.create",
            timeout,
            self.challenge_repo.create(&challenge),
        )
        .await??;

        bounded(
            "delivery.on_code_generated",
            timeout,
            self.delivery.on_code_generated(
                &challenge.phone_number,
                &challenge.code,
                challenge.expires_at,
            ),
        )
        .await??;

        tracing::info!(
            challenge_id = %challenge.id,
            phone = %challenge.phone_number.masked(),
            handle = %challenge.session_handle.short(),
            remaining,
            "Issued OTP challenge"
        );

        Ok(IssueChallengeOutput {
            session_handle: challenge.session_handle,
            expires_at: challenge.expires_at,
            remaining,
        })
    }
}
