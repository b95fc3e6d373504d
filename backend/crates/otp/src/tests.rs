//! Scenario tests for the OTP crate, run against the in-memory stores

#[cfg(test)]
mod harness {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use platform::clock::{Clock, ManualClock};

    use crate::application::{IssueChallengeUseCase, OtpMaintenance, VerifyChallengeUseCase};
    use crate::domain::delivery::CodeDeliverySink;
    use crate::domain::repository::{ChallengeRepository, RateLimitRepository};
    use crate::infra::delivery::CapturingCodeSink;
    use crate::infra::memory::{MemoryChallengeRepository, MemoryRateLimitRepository};
    use crate::OtpConfig;

    pub const PHONE: &str = "+1234567890";

    pub struct Harness<C, R, D> {
        pub clock: Arc<ManualClock>,
        pub challenges: Arc<C>,
        pub limits: Arc<R>,
        pub sink: Arc<D>,
        pub config: Arc<OtpConfig>,
    }

    pub type MemHarness =
        Harness<MemoryChallengeRepository, MemoryRateLimitRepository, CapturingCodeSink>;

    pub fn memory() -> MemHarness {
        with_stores(
            MemoryChallengeRepository::new(),
            MemoryRateLimitRepository::new(),
            CapturingCodeSink::new(),
        )
    }

    pub fn with_stores<C, R, D>(challenges: C, limits: R, sink: D) -> Harness<C, R, D> {
        Harness {
            clock: Arc::new(ManualClock::new(Utc::now())),
            challenges: Arc::new(challenges),
            limits: Arc::new(limits),
            sink: Arc::new(sink),
            config: Arc::new(OtpConfig::default()),
        }
    }

    impl<C, R, D> Harness<C, R, D>
    where
        C: ChallengeRepository + Send + Sync,
        R: RateLimitRepository + Send + Sync,
        D: CodeDeliverySink + Send + Sync,
    {
        pub fn clock(&self) -> Arc<dyn Clock> {
            self.clock.clone()
        }

        pub fn issue(&self) -> IssueChallengeUseCase<C, R, D> {
            IssueChallengeUseCase::new(
                self.challenges.clone(),
                self.limits.clone(),
                self.sink.clone(),
                self.clock(),
                self.config.clone(),
            )
        }

        pub fn verify(&self) -> VerifyChallengeUseCase<C> {
            VerifyChallengeUseCase::new(self.challenges.clone(), self.clock(), self.config.clone())
        }

        pub fn maintenance(&self) -> OtpMaintenance<C, R> {
            OtpMaintenance::new(
                self.challenges.clone(),
                self.limits.clone(),
                self.clock(),
                self.config.clone(),
            )
        }

        pub fn advance(&self, by: Duration) {
            self.clock.advance(by);
        }
    }
}

#[cfg(test)]
mod send_tests {
    use std::time::Duration;

    use super::harness::{PHONE, memory};
    use crate::OtpError;
    use kernel::PhoneNumber;
    use platform::clock::Clock;

    #[tokio::test]
    async fn test_send_returns_handle_and_delivers_code() {
        let h = memory();
        let out = h.issue().execute(PHONE).await.unwrap();

        assert_eq!(out.session_handle.as_str().len(), 64);
        assert_eq!(out.remaining, 2);
        let code = h.sink.last_code(PHONE).await.unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(h.challenges.len().await, 1);
    }

    #[tokio::test]
    async fn test_expiry_is_two_minutes_after_issue() {
        let h = memory();
        let before = h.clock.now();
        let out = h.issue().execute(PHONE).await.unwrap();
        assert_eq!(out.expires_at - before, chrono::Duration::minutes(2));
    }

    #[tokio::test]
    async fn test_invalid_phone_rejected_before_side_effects() {
        let h = memory();
        for bad in ["1234567890", "+0123456789", "+12 34567890", ""] {
            let err = h.issue().execute(bad).await.unwrap_err();
            assert!(matches!(err, OtpError::InvalidPhoneNumber(_)), "{bad:?}");
        }
        assert_eq!(h.challenges.len().await, 0);
        let phone = PhoneNumber::new(PHONE).unwrap();
        assert!(h.limits.get(&phone).await.is_none());
    }

    #[tokio::test]
    async fn test_three_sends_then_limited_then_window_resets() {
        let h = memory();
        let issue = h.issue();

        for _ in 0..3 {
            issue.execute(PHONE).await.unwrap();
        }

        match issue.execute(PHONE).await {
            Err(OtpError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(600));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
        assert_eq!(h.challenges.len().await, 3);

        h.advance(Duration::from_secs(600));
        let out = issue.execute(PHONE).await.unwrap();
        assert_eq!(out.remaining, 2);

        let phone = PhoneNumber::new(PHONE).unwrap();
        assert_eq!(h.limits.get(&phone).await.unwrap().window.request_count, 1);
    }

    #[tokio::test]
    async fn test_limit_is_per_phone_number() {
        let h = memory();
        let issue = h.issue();
        for _ in 0..3 {
            issue.execute(PHONE).await.unwrap();
        }
        assert!(issue.execute(PHONE).await.is_err());
        assert!(issue.execute("+447911123456").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_sends_never_exceed_quota() {
        let h = memory();
        let issue = std::sync::Arc::new(h.issue());

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let issue = issue.clone();
            tasks.push(tokio::spawn(async move { issue.execute(PHONE).await }));
        }

        let mut allowed = 0;
        let mut limited = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => allowed += 1,
                Err(OtpError::RateLimited { .. }) => limited += 1,
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(allowed, 3);
        assert_eq!(limited, 17);
    }

    #[tokio::test]
    async fn test_rate_limited_maps_to_429_with_retry_after() {
        let h = memory();
        let issue = h.issue();
        for _ in 0..3 {
            issue.execute(PHONE).await.unwrap();
        }
        h.advance(Duration::from_secs(60));
        let err: kernel::AppError = issue.execute(PHONE).await.unwrap_err().into();
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.retry_after_secs(), Some(540));
    }
}

#[cfg(test)]
mod verify_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::harness::{PHONE, memory};
    use crate::OtpError;

    fn wrong(code: &str) -> String {
        code.chars()
            .map(|c| if c == '9' { '0' } else { char::from(c as u8 + 1) })
            .collect()
    }

    #[tokio::test]
    async fn test_verify_succeeds_once() {
        let h = memory();
        let out = h.issue().execute(PHONE).await.unwrap();
        let code = h.sink.last_code(PHONE).await.unwrap();

        let verified = h
            .verify()
            .execute(out.session_handle.as_str(), &code)
            .await
            .unwrap();
        assert_eq!(verified.phone_number.as_str(), PHONE);

        let stored = h.challenges.get(verified.challenge_id).await.unwrap();
        assert!(stored.is_used);
        assert!(stored.used_at.is_some());

        let again = h.verify().execute(out.session_handle.as_str(), &code).await;
        assert!(matches!(again, Err(OtpError::InvalidOrExpiredChallenge)));
    }

    #[tokio::test]
    async fn test_wrong_code_does_not_consume() {
        let h = memory();
        let out = h.issue().execute(PHONE).await.unwrap();
        let code = h.sink.last_code(PHONE).await.unwrap();

        let bad = h
            .verify()
            .execute(out.session_handle.as_str(), &wrong(&code))
            .await;
        assert!(matches!(bad, Err(OtpError::InvalidOrExpiredChallenge)));

        assert!(
            h.verify()
                .execute(out.session_handle.as_str(), &code)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_verify_after_expiry_fails_with_correct_code() {
        let h = memory();
        let out = h.issue().execute(PHONE).await.unwrap();
        let code = h.sink.last_code(PHONE).await.unwrap();

        h.advance(Duration::from_secs(120));
        let result = h.verify().execute(out.session_handle.as_str(), &code).await;
        assert!(matches!(result, Err(OtpError::InvalidOrExpiredChallenge)));
    }

    #[tokio::test]
    async fn test_unknown_handle_is_indistinguishable() {
        let h = memory();
        h.issue().execute(PHONE).await.unwrap();
        let code = h.sink.last_code(PHONE).await.unwrap();

        let unknown = "ab".repeat(32);
        let err = h.verify().execute(&unknown, &code).await.unwrap_err();
        assert!(matches!(err, OtpError::InvalidOrExpiredChallenge));
        assert_eq!(err.to_string(), OtpError::InvalidOrExpiredChallenge.to_string());
    }

    #[tokio::test]
    async fn test_malformed_inputs_are_validation_errors() {
        let h = memory();
        let out = h.issue().execute(PHONE).await.unwrap();

        let err = h.verify().execute("not-a-handle", "123456").await.unwrap_err();
        assert!(matches!(err, OtpError::InvalidSessionHandle));
        assert_eq!(err.status_code(), 400);

        let err = h
            .verify()
            .execute(out.session_handle.as_str(), "12ab56")
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::InvalidCode));
    }

    #[tokio::test]
    async fn test_concurrent_verifies_yield_exactly_one_success() {
        let h = memory();
        let out = h.issue().execute(PHONE).await.unwrap();
        let code = h.sink.last_code(PHONE).await.unwrap();
        let verify = Arc::new(h.verify());
        let handle = out.session_handle.as_str().to_string();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let verify = verify.clone();
            let handle = handle.clone();
            let code = code.clone();
            tasks.push(tokio::spawn(async move { verify.execute(&handle, &code).await }));
        }

        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(OtpError::InvalidOrExpiredChallenge) => {}
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_handles_from_other_sends_stay_valid() {
        let h = memory();
        let first = h.issue().execute(PHONE).await.unwrap();
        let first_code = h.sink.last_code(PHONE).await.unwrap();
        let second = h.issue().execute(PHONE).await.unwrap();
        let second_code = h.sink.last_code(PHONE).await.unwrap();

        assert_ne!(first.session_handle, second.session_handle);
        assert!(
            h.verify()
                .execute(first.session_handle.as_str(), &first_code)
                .await
                .is_ok()
        );
        assert!(
            h.verify()
                .execute(second.session_handle.as_str(), &second_code)
                .await
                .is_ok()
        );
    }
}

#[cfg(test)]
mod failure_tests {
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use kernel::PhoneNumber;
    use platform::rate_limit::{RateLimitDecision, RateLimitPolicy};

    use super::harness::{PHONE, with_stores};
    use crate::domain::delivery::CodeDeliverySink;
    use crate::domain::repository::RateLimitRepository;
    use crate::domain::value_objects::OtpCode;
    use crate::error::{OtpError, OtpResult};
    use crate::infra::delivery::CapturingCodeSink;
    use crate::infra::memory::{MemoryChallengeRepository, MemoryRateLimitRepository};

    struct DownRateLimiter;

    impl RateLimitRepository for DownRateLimiter {
        async fn check_and_record(
            &self,
            _phone: &PhoneNumber,
            _policy: &RateLimitPolicy,
            _now: DateTime<Utc>,
        ) -> OtpResult<RateLimitDecision> {
            Err(OtpError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn repair_missing_expiry(&self, _w: Duration, _now: DateTime<Utc>) -> OtpResult<u64> {
            Err(OtpError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn purge_expired(&self, _now: DateTime<Utc>) -> OtpResult<u64> {
            Err(OtpError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    struct SlowRateLimiter;

    impl RateLimitRepository for SlowRateLimiter {
        async fn check_and_record(
            &self,
            _phone: &PhoneNumber,
            _policy: &RateLimitPolicy,
            _now: DateTime<Utc>,
        ) -> OtpResult<RateLimitDecision> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(OtpError::Internal("unreachable".to_string()))
        }

        async fn repair_missing_expiry(&self, _w: Duration, _now: DateTime<Utc>) -> OtpResult<u64> {
            Ok(0)
        }

        async fn purge_expired(&self, _now: DateTime<Utc>) -> OtpResult<u64> {
            Ok(0)
        }
    }

    struct BrokenSink;

    impl CodeDeliverySink for BrokenSink {
        async fn on_code_generated(
            &self,
            _phone_number: &PhoneNumber,
            _code: &OtpCode,
            _expires_at: DateTime<Utc>,
        ) -> OtpResult<()> {
            Err(OtpError::Delivery("gateway refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_limiter_outage_fails_closed() {
        let h = with_stores(
            MemoryChallengeRepository::new(),
            DownRateLimiter,
            CapturingCodeSink::new(),
        );
        let err = h.issue().execute(PHONE).await.unwrap_err();
        assert!(err.is_infrastructure());
        assert_eq!(err.status_code(), 503);
        assert_eq!(h.challenges.len().await, 0);
        assert!(h.sink.last_code(PHONE).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_limiter_times_out() {
        let h = with_stores(
            MemoryChallengeRepository::new(),
            SlowRateLimiter,
            CapturingCodeSink::new(),
        );
        let err = h.issue().execute(PHONE).await.unwrap_err();
        assert!(matches!(err, OtpError::Timeout(_)));
        assert!(err.is_infrastructure());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_infrastructure_error() {
        let h = with_stores(
            MemoryChallengeRepository::new(),
            MemoryRateLimitRepository::new(),
            BrokenSink,
        );
        let err = h.issue().execute(PHONE).await.unwrap_err();
        assert!(matches!(err, OtpError::Delivery(_)));
        assert!(err.is_infrastructure());
        let app: kernel::AppError = err.into();
        assert!(!app.message().contains("gateway"));
    }

    #[tokio::test]
    async fn test_sweep_survives_failing_job() {
        let h = with_stores(
            MemoryChallengeRepository::new(),
            DownRateLimiter,
            CapturingCodeSink::new(),
        );
        let report = h.maintenance().sweep().await;
        assert_eq!(report.challenges_deleted, Some(0));
        assert_eq!(report.windows_repaired, None);
        assert_eq!(report.windows_purged, None);
    }
}

#[cfg(test)]
mod maintenance_tests {
    use std::time::Duration;

    use super::harness::{PHONE, memory};

    #[tokio::test]
    async fn test_sweep_removes_only_expired_challenges() {
        let h = memory();
        h.issue().execute(PHONE).await.unwrap();
        h.advance(Duration::from_secs(60));
        h.issue().execute(PHONE).await.unwrap();

        h.advance(Duration::from_secs(61));
        let report = h.maintenance().sweep().await;
        assert_eq!(report.challenges_deleted, Some(1));
        assert_eq!(h.challenges.len().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_purges_elapsed_windows() {
        let h = memory();
        h.issue().execute(PHONE).await.unwrap();

        let report = h.maintenance().sweep().await;
        assert_eq!(report.windows_repaired, Some(0));
        assert_eq!(report.windows_purged, Some(0));

        h.advance(Duration::from_secs(600));
        let report = h.maintenance().sweep().await;
        assert_eq!(report.windows_purged, Some(1));
    }
}
