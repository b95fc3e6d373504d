//! Verify Challenge Use Case

use std::sync::Arc;

use kernel::PhoneNumber;
use kernel::id::ChallengeId;
use platform::clock::Clock;
use platform::timeout::bounded;

use crate::application::config::OtpConfig;
use crate::domain::repository::ChallengeRepository;
use crate::domain::value_objects::{OtpCode, SessionHandle};
use crate::error::{OtpError, OtpResult};

/// Result of a successful verification
#[derive(Debug, Clone)]
pub struct VerifiedChallenge {
    pub challenge_id: ChallengeId,
    pub phone_number: PhoneNumber,
}

/// Verify Challenge Use Case
pub struct VerifyChallengeUseCase<C>
where
    C: ChallengeRepository,
{
    challenge_repo: Arc<C>,
    clock: Arc<dyn Clock>,
    config: Arc<OtpConfig>,
}

impl<C> VerifyChallengeUseCase<C>
where
    C: ChallengeRepository + Send + Sync,
{
    pub fn new(challenge_repo: Arc<C>, clock: Arc<dyn Clock>, config: Arc<OtpConfig>) -> Self {
        Self {
            challenge_repo,
            clock,
            config,
        }
    }

    /// Consume the challenge behind `session_handle` if `code` matches.
    ///
    /// A mismatch leaves the challenge untouched, so the client may retry
    /// before expiry. Exactly one of any number of concurrent identical
    /// calls succeeds.
    pub async fn execute(&self, session_handle: &str, code: &str) -> OtpResult<VerifiedChallenge> {
        let handle = SessionHandle::parse(session_handle)?;
        let code = OtpCode::parse(code, self.config.code_length)?;
        let timeout = self.config.store_timeout;
        let now = self.clock.now();

        let challenge = bounded(
            "challenge.find_redeemable",
            timeout,
            self.challenge_repo.find_redeemable(&handle, &code, now),
        )
        .await??
        .ok_or_else(|| {
            tracing::warn!(handle = %handle.short(), "No redeemable challenge for handle and code");
            OtpError::InvalidOrExpiredChallenge
        })?;

        let flipped = bounded(
            "challenge.mark_used",
            timeout,
            self.challenge_repo.mark_used(challenge.id, now),
        )
        .await??;

        if !flipped {
            tracing::warn!(
                challenge_id = %challenge.id,
                "Challenge consumed concurrently"
            );
            return Err(OtpError::InvalidOrExpiredChallenge);
        }

        tracing::info!(
            challenge_id = %challenge.id,
            phone = %challenge.phone_number.masked(),
            "OTP challenge verified"
        );

        Ok(VerifiedChallenge {
            challenge_id: challenge.id,
            phone_number: challenge.phone_number,
        })
    }
}
