//! Periodic OTP maintenance
//!
//! Retention only: expiry is always enforced by timestamp at verify time,
//! and the rate-limit TTL is the primary cleanup path.

use std::sync::Arc;

use platform::clock::Clock;
use platform::timeout::bounded;

use crate::application::config::OtpConfig;
use crate::domain::repository::{ChallengeRepository, RateLimitRepository};
use crate::error::OtpResult;

/// Counts per job; `None` means the job failed this round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub challenges_deleted: Option<u64>,
    pub windows_repaired: Option<u64>,
    pub windows_purged: Option<u64>,
}

pub struct OtpMaintenance<C, R>
where
    C: ChallengeRepository,
    R: RateLimitRepository,
{
    challenge_repo: Arc<C>,
    rate_limit_repo: Arc<R>,
    clock: Arc<dyn Clock>,
    config: Arc<OtpConfig>,
}

impl<C, R> OtpMaintenance<C, R>
where
    C: ChallengeRepository + Send + Sync,
    R: RateLimitRepository + Send + Sync,
{
    pub fn new(
        challenge_repo: Arc<C>,
        rate_limit_repo: Arc<R>,
        clock: Arc<dyn Clock>,
        config: Arc<OtpConfig>,
    ) -> Self {
        Self {
            challenge_repo,
            rate_limit_repo,
            clock,
            config,
        }
    }

    /// Run every job once. Never fails: each job's error is logged and the
    /// remaining jobs still run.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let timeout = self.config.store_timeout;

        let challenges_deleted = report(
            "delete expired challenges",
            bounded(
                "challenge.delete_expired",
                timeout,
                self.challenge_repo.delete_expired(now),
            )
            .await
            .map_err(Into::into)
            .and_then(|r| r),
        );

        let windows_repaired = report(
            "repair rate-limit expiry",
            bounded(
                "rate_limit.repair_missing_expiry",
                timeout,
                self.rate_limit_repo
                    .repair_missing_expiry(self.config.rate_limit.window, now),
            )
            .await
            .map_err(Into::into)
            .and_then(|r| r),
        );

        let windows_purged = report(
            "purge expired rate-limit windows",
            bounded(
                "rate_limit.purge_expired",
                timeout,
                self.rate_limit_repo.purge_expired(now),
            )
            .await
            .map_err(Into::into)
            .and_then(|r| r),
        );

        if windows_repaired.is_some_and(|n| n > 0) {
            tracing::warn!(
                repaired = windows_repaired,
                "Rate-limit windows without expiry were found"
            );
        }

        tracing::info!(
            challenges_deleted,
            windows_repaired,
            windows_purged,
            "OTP maintenance completed"
        );

        SweepReport {
            challenges_deleted,
            windows_repaired,
            windows_purged,
        }
    }
}

fn report(job: &'static str, result: OtpResult<u64>) -> Option<u64> {
    match result {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(job, error = %e, "OTP maintenance job failed, retrying next tick");
            None
        }
    }
}
