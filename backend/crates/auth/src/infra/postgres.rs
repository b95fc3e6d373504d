//! PostgreSQL Repository Implementations
//!
//! Users live in the logged `users` table. Session records and the per-user
//! index live in UNLOGGED tables whose `expires_at` columns stand in for key
//! TTLs; reads filter on them and the periodic sweep deletes what is past.

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{session_record::SessionRecord, user::User};
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::domain::value_object::{token_fingerprint::TokenFingerprint, user_id::UserId};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, phone_number, registered_at, last_login_at, is_active
            FROM users
            WHERE phone_number = $1 AND is_active = TRUE
            "#,
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, phone_number, registered_at, last_login_at, is_active
            FROM users
            WHERE user_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn create(&self, user: &User) -> AuthResult<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                phone_number,
                registered_at,
                last_login_at,
                is_active
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (phone_number) DO NOTHING
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.phone_number.as_str())
        .bind(user.registered_at)
        .bind(user.last_login_at)
        .bind(user.is_active)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            tracing::debug!(user_id = %user.user_id, "User created");
        }
        Ok(inserted == 1)
    }

    async fn update_last_login(&self, user_id: UserId, now: DateTime<Utc>) -> AuthResult<()> {
        let updated = sqlx::query(
            "UPDATE users SET last_login_at = $2 WHERE user_id = $1 AND is_active = TRUE",
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for PgAuthRepository {
    async fn put(&self, record: &SessionRecord, index_expires_at: DateTime<Utc>) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                token_fingerprint,
                user_id,
                issued_at,
                expires_at,
                last_used_at
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (token_fingerprint) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                issued_at = EXCLUDED.issued_at,
                expires_at = EXCLUDED.expires_at,
                last_used_at = EXCLUDED.last_used_at
            "#,
        )
        .bind(record.token_fingerprint.as_str())
        .bind(record.user_id.as_uuid())
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(record.last_used_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO auth_session_index (user_id, token_fingerprint, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, token_fingerprint) DO NOTHING
            "#,
        )
        .bind(record.user_id.as_uuid())
        .bind(record.token_fingerprint.as_str())
        .bind(index_expires_at)
        .execute(&mut *tx)
        .await?;

        // The index expires as a whole: every add pushes it out
        sqlx::query(
            r#"
            UPDATE auth_session_index
            SET expires_at = GREATEST(expires_at, $2)
            WHERE user_id = $1
            "#,
        )
        .bind(record.user_id.as_uuid())
        .bind(index_expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find(
        &self,
        fingerprint: &TokenFingerprint,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT token_fingerprint, user_id, issued_at, expires_at, last_used_at
            FROM auth_sessions
            WHERE token_fingerprint = $1 AND expires_at > $2
            "#,
        )
        .bind(fingerprint.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionRow::into_record))
    }

    async fn touch(&self, fingerprint: &TokenFingerprint, now: DateTime<Utc>) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE auth_sessions
            SET last_used_at = $2
            WHERE token_fingerprint = $1 AND expires_at > $2
            "#,
        )
        .bind(fingerprint.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, user_id: UserId, fingerprint: &TokenFingerprint) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM auth_sessions WHERE token_fingerprint = $1")
            .bind(fingerprint.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM auth_session_index WHERE user_id = $1 AND token_fingerprint = $2")
            .bind(user_id.as_uuid())
            .bind(fingerprint.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(fingerprint = %fingerprint.short(), "Session record removed");
        Ok(())
    }

    async fn remove_all_for_user(&self, user_id: UserId, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut tx = self.pool.begin().await?;

        let removed: Vec<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            DELETE FROM auth_sessions s
            USING auth_session_index i
            WHERE i.user_id = $1
              AND i.expires_at > $2
              AND s.token_fingerprint = i.token_fingerprint
            RETURNING s.expires_at
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM auth_session_index WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed.into_iter().filter(|exp| *exp > now).count() as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut tx = self.pool.begin().await?;

        let sessions = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let entries = sqlx::query("DELETE FROM auth_session_index WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        tracing::debug!(sessions, entries, "Purged expired session rows");
        Ok(sessions)
    }
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    phone_number: String,
    registered_at: DateTime<Utc>,
    last_login_at: DateTime<Utc>,
    is_active: bool,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            user_id: UserId::from_uuid(self.user_id),
            phone_number: PhoneNumber::from_trusted(self.phone_number),
            registered_at: self.registered_at,
            last_login_at: self.last_login_at,
            is_active: self.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    token_fingerprint: String,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_record(self) -> SessionRecord {
        SessionRecord {
            token_fingerprint: TokenFingerprint::from_trusted(self.token_fingerprint),
            user_id: UserId::from_uuid(self.user_id),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            last_used_at: self.last_used_at,
        }
    }
}
