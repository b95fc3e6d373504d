//! Session/Token Store
//!
//! Issues bearer tokens and keeps the revocable server-side record for each.
//! A token is accepted only while both its signature/claims are valid and
//! its record still exists.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::clock::Clock;
use platform::timeout::bounded;

use crate::application::config::AuthConfig;
use crate::application::token_codec::TokenCodec;
use crate::domain::entity::{session_record::SessionRecord, user::User};
use crate::domain::repository::SessionRepository;
use crate::domain::value_object::{
    session_claims::SessionClaims, token_fingerprint::TokenFingerprint, user_id::UserId,
};
use crate::error::{AuthError, AuthResult};

/// Freshly minted bearer token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionService<S>
where
    S: SessionRepository + Send + Sync + 'static,
{
    session_repo: Arc<S>,
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
    config: Arc<AuthConfig>,
}

impl<S> SessionService<S>
where
    S: SessionRepository + Send + Sync + 'static,
{
    pub fn new(session_repo: Arc<S>, clock: Arc<dyn Clock>, config: Arc<AuthConfig>) -> Self {
        Self {
            session_repo,
            codec: TokenCodec::new(&config),
            clock,
            config,
        }
    }

    /// Mint a token for `user` and persist its session record.
    ///
    /// A failed record write is logged and the token is still returned:
    /// login stays available during a store outage, at the cost of that
    /// token being rejected at validation time.
    pub async fn issue_token(&self, user: &User) -> AuthResult<IssuedToken> {
        let now = self.clock.now();
        let (token, claims) = self.codec.mint(user, now)?;

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::Internal("token expiry out of range".to_string()))?;
        let fingerprint = TokenFingerprint::of(&token);
        let record = SessionRecord::new(fingerprint, user.user_id, now, expires_at);
        let slack = chrono::Duration::from_std(self.config.index_ttl_slack)
            .unwrap_or(chrono::Duration::hours(1));

        let stored = bounded(
            "session.put",
            self.config.store_timeout,
            self.session_repo.put(&record, expires_at + slack),
        )
        .await
        .map_err(AuthError::from)
        .and_then(|r| r);

        match stored {
            Ok(()) => tracing::info!(
                user_id = %user.user_id,
                fingerprint = %record.token_fingerprint.short(),
                expires_at = %expires_at,
                "Session issued"
            ),
            Err(e) => tracing::error!(
                user_id = %user.user_id,
                fingerprint = %record.token_fingerprint.short(),
                error = %e,
                "Failed to persist session record; token issued anyway"
            ),
        }

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Accept `token` only if it verifies and its record is still live.
    ///
    /// On success a detached task refreshes `last_used_at`. That task has no
    /// completion guarantee and never extends the record's expiry.
    pub async fn validate(&self, token: &str) -> AuthResult<SessionClaims> {
        let (claims, fingerprint) = self.check(token).await?;

        let repo = self.session_repo.clone();
        let timeout = self.config.store_timeout;
        let now = self.clock.now();
        tokio::spawn(async move {
            match bounded("session.touch", timeout, repo.touch(&fingerprint, now)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to update session last_used_at")
                }
                Err(e) => tracing::warn!(error = %e, "Session last_used_at update timed out"),
            }
        });

        Ok(claims)
    }

    /// Signature/claims check followed by the record lookup, no side effects
    pub async fn check(&self, token: &str) -> AuthResult<(SessionClaims, TokenFingerprint)> {
        let now = self.clock.now();
        let claims = self.codec.verify(token, now)?;

        let fingerprint = TokenFingerprint::of(token);
        let record = bounded(
            "session.find",
            self.config.store_timeout,
            self.session_repo.find(&fingerprint, now),
        )
        .await??;

        match record {
            Some(record) if record.user_id == claims.user_id() => Ok((claims, fingerprint)),
            Some(_) => {
                tracing::warn!(
                    fingerprint = %fingerprint.short(),
                    "Session record belongs to a different user"
                );
                Err(AuthError::Unauthorized)
            }
            None => {
                tracing::debug!(
                    fingerprint = %fingerprint.short(),
                    "No live session record for token"
                );
                Err(AuthError::Unauthorized)
            }
        }
    }

    /// Delete the token's record. Revoking an already revoked token is fine.
    pub async fn revoke(&self, token: &str) -> AuthResult<()> {
        let claims = self.codec.verify(token, self.clock.now())?;
        let fingerprint = TokenFingerprint::of(token);

        bounded(
            "session.remove",
            self.config.store_timeout,
            self.session_repo.remove(claims.user_id(), &fingerprint),
        )
        .await??;

        tracing::info!(
            user_id = %claims.uid,
            fingerprint = %fingerprint.short(),
            "Session revoked"
        );
        Ok(())
    }

    /// Delete every session of `user_id` in one batch
    pub async fn revoke_all(&self, user_id: UserId) -> AuthResult<u64> {
        let revoked = bounded(
            "session.remove_all_for_user",
            self.config.store_timeout,
            self.session_repo
                .remove_all_for_user(user_id, self.clock.now()),
        )
        .await??;

        tracing::info!(user_id = %user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Maintenance: drop expired records for backends without native TTL
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        let purged = bounded(
            "session.purge_expired",
            self.config.store_timeout,
            self.session_repo.purge_expired(self.clock.now()),
        )
        .await??;
        Ok(purged)
    }
}
