//! PostgreSQL Repository Implementations
//!
//! Challenges live in the logged `otp_challenges` table. Rate-limit windows
//! live in the UNLOGGED `otp_rate_limits` table, with `expires_at` standing in
//! for a key TTL.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;
use kernel::id::ChallengeId;
use platform::rate_limit::{RateLimitDecision, RateLimitPolicy, WindowState, evaluate};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::OtpChallenge;
use crate::domain::repository::{ChallengeRepository, RateLimitRepository};
use crate::domain::value_objects::{OtpCode, SessionHandle};
use crate::error::OtpResult;

/// Rows with `expires_at <= now` are expired, matching `OtpChallenge::is_expired`
const DELETE_EXPIRED_CHALLENGES: &str = "DELETE FROM otp_challenges WHERE expires_at <= $1";

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgOtpRepository {
    pool: PgPool,
}

impl PgOtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ChallengeRepository for PgOtpRepository {
    async fn create(&self, challenge: &OtpChallenge) -> OtpResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_challenges (
                challenge_id,
                phone_number,
                code,
                session_handle,
                expires_at,
                is_used,
                created_at,
                used_at
            ) VALUES ($1, $2, $3, $4, $5, FALSE, $6, NULL)
            "#,
        )
        .bind(challenge.id.as_uuid())
        .bind(challenge.phone_number.as_str())
        .bind(challenge.code.as_str())
        .bind(challenge.session_handle.as_str())
        .bind(challenge.expires_at)
        .bind(challenge.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(challenge_id = %challenge.id, "Challenge created");
        Ok(())
    }

    async fn find_redeemable(
        &self,
        handle: &SessionHandle,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> OtpResult<Option<OtpChallenge>> {
        let row = sqlx::query_as::<_, ChallengeRow>(
            r#"
            SELECT
                challenge_id,
                phone_number,
                code,
                session_handle,
                expires_at,
                is_used,
                created_at,
                used_at
            FROM otp_challenges
            WHERE session_handle = $1
              AND code = $2
              AND is_used = FALSE
              AND expires_at > $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(handle.as_str())
        .bind(code.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ChallengeRow::into_challenge))
    }

    async fn mark_used(&self, challenge_id: ChallengeId, now: DateTime<Utc>) -> OtpResult<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE otp_challenges
            SET is_used = TRUE, used_at = $2
            WHERE challenge_id = $1
              AND is_used = FALSE
              AND expires_at > $2
            "#,
        )
        .bind(challenge_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected == 1)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> OtpResult<u64> {
        let deleted = sqlx::query(DELETE_EXPIRED_CHALLENGES)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

impl RateLimitRepository for PgOtpRepository {
    async fn check_and_record(
        &self,
        phone: &PhoneNumber,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> OtpResult<RateLimitDecision> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent requests for the same number, including the
        // first one when no row exists yet to lock
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(phone.as_str())
            .execute(&mut *tx)
            .await?;

        let current = sqlx::query_as::<_, WindowRow>(
            r#"
            SELECT request_count, window_start_at, last_request_at
            FROM otp_rate_limits
            WHERE phone_number = $1
              AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
        .bind(phone.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .map(WindowRow::into_state);

        let decision = evaluate(policy, current.as_ref(), now);

        if let RateLimitDecision::Allowed { state, ttl, .. } = &decision {
            sqlx::query(
                r#"
                INSERT INTO otp_rate_limits (
                    phone_number,
                    request_count,
                    window_start_at,
                    last_request_at,
                    expires_at
                ) VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (phone_number) DO UPDATE SET
                    request_count = EXCLUDED.request_count,
                    window_start_at = EXCLUDED.window_start_at,
                    last_request_at = EXCLUDED.last_request_at,
                    expires_at = EXCLUDED.expires_at
                "#,
            )
            .bind(phone.as_str())
            .bind(i32::try_from(state.request_count).unwrap_or(i32::MAX))
            .bind(state.window_start_at)
            .bind(state.last_request_at)
            .bind(now + to_chrono(*ttl))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(decision)
    }

    async fn repair_missing_expiry(&self, window: Duration, now: DateTime<Utc>) -> OtpResult<u64> {
        let repaired =
            sqlx::query("UPDATE otp_rate_limits SET expires_at = $1 WHERE expires_at IS NULL")
                .bind(now + to_chrono(window))
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(repaired)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> OtpResult<u64> {
        let purged = sqlx::query("DELETE FROM otp_rate_limits WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(purged)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct ChallengeRow {
    challenge_id: Uuid,
    phone_number: String,
    code: String,
    session_handle: String,
    expires_at: DateTime<Utc>,
    is_used: bool,
    created_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl ChallengeRow {
    fn into_challenge(self) -> OtpChallenge {
        OtpChallenge {
            id: ChallengeId::from_uuid(self.challenge_id),
            phone_number: PhoneNumber::from_trusted(self.phone_number),
            code: OtpCode::from_trusted(self.code),
            session_handle: SessionHandle::from_trusted(self.session_handle),
            expires_at: self.expires_at,
            is_used: self.is_used,
            created_at: self.created_at,
            used_at: self.used_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WindowRow {
    request_count: i32,
    window_start_at: DateTime<Utc>,
    last_request_at: DateTime<Utc>,
}

impl WindowRow {
    fn into_state(self) -> WindowState {
        WindowState {
            request_count: u32::try_from(self.request_count).unwrap_or(0),
            window_start_at: self.window_start_at,
            last_request_at: self.last_request_at,
        }
    }
}
