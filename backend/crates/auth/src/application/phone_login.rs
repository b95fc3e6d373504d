//! Phone login flow
//!
//! The three operations the HTTP layer drives: send a code, trade a code
//! for a bearer token, and log out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use otp::domain::delivery::CodeDeliverySink;
use otp::domain::repository::{ChallengeRepository, RateLimitRepository};
use otp::{IssueChallengeUseCase, OtpConfig, VerifyChallengeUseCase};
use platform::clock::Clock;
use platform::timeout::bounded;

use crate::application::config::AuthConfig;
use crate::application::session_service::SessionService;
use crate::domain::entity::user::User;
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::domain::value_object::{session_claims::SessionClaims, user_id::UserId};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone)]
pub struct SendCodeOutput {
    pub session_handle: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VerifyCodeOutput {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutOutput {
    pub tokens_revoked: u64,
}

/// Operations exposed to the presentation layer
#[trait_variant::make(LoginFlow: Send)]
pub trait LocalLoginFlow {
    async fn send(&self, phone_number: &str) -> AuthResult<SendCodeOutput>;

    async fn verify(&self, session_handle: &str, code: &str) -> AuthResult<VerifyCodeOutput>;

    /// Validates `token` first; `logout_all` revokes every session of its user
    async fn logout(&self, token: &str, logout_all: bool) -> AuthResult<LogoutOutput>;

    /// Full bearer validation for protected routes
    async fn authenticate(&self, token: &str) -> AuthResult<SessionClaims>;

    /// Active user by id; `UserNotFound` otherwise
    async fn get_user(&self, user_id: UserId) -> AuthResult<User>;
}

pub struct PhoneLoginService<C, R, D, U, S>
where
    C: ChallengeRepository + Send + Sync,
    R: RateLimitRepository + Send + Sync,
    D: CodeDeliverySink + Send + Sync,
    U: UserRepository + Send + Sync,
    S: SessionRepository + Send + Sync + 'static,
{
    issue: IssueChallengeUseCase<C, R, D>,
    verify: VerifyChallengeUseCase<C>,
    user_repo: Arc<U>,
    sessions: SessionService<S>,
    clock: Arc<dyn Clock>,
    config: Arc<AuthConfig>,
}

impl<C, R, D, U, S> PhoneLoginService<C, R, D, U, S>
where
    C: ChallengeRepository + Send + Sync,
    R: RateLimitRepository + Send + Sync,
    D: CodeDeliverySink + Send + Sync,
    U: UserRepository + Send + Sync,
    S: SessionRepository + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        challenge_repo: Arc<C>,
        rate_limit_repo: Arc<R>,
        delivery: Arc<D>,
        user_repo: Arc<U>,
        session_repo: Arc<S>,
        clock: Arc<dyn Clock>,
        otp_config: Arc<OtpConfig>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            issue: IssueChallengeUseCase::new(
                challenge_repo.clone(),
                rate_limit_repo,
                delivery,
                clock.clone(),
                otp_config.clone(),
            ),
            verify: VerifyChallengeUseCase::new(challenge_repo, clock.clone(), otp_config),
            user_repo,
            sessions: SessionService::new(session_repo, clock.clone(), config.clone()),
            clock,
            config,
        }
    }

    pub fn sessions(&self) -> &SessionService<S> {
        &self.sessions
    }

    /// Existing active user for the phone, or a newly registered one
    async fn resolve_user(&self, phone: kernel::PhoneNumber) -> AuthResult<User> {
        let timeout = self.config.store_timeout;
        let now = self.clock.now();

        let existing = bounded(
            "user.find_by_phone",
            timeout,
            self.user_repo.find_by_phone(&phone),
        )
        .await??;

        if let Some(mut user) = existing {
            bounded(
                "user.update_last_login",
                timeout,
                self.user_repo.update_last_login(user.user_id, now),
            )
            .await??;
            user.record_login(now);
            return Ok(user);
        }

        let user = User::register(phone, now);
        let created = bounded("user.create", timeout, self.user_repo.create(&user)).await??;
        if created {
            tracing::info!(
                user_id = %user.user_id,
                phone = %user.phone_number.masked(),
                "Registered new user"
            );
            return Ok(user);
        }

        // Lost a creation race, or the number belongs to a deactivated user
        let mut winner = bounded(
            "user.find_by_phone",
            timeout,
            self.user_repo.find_by_phone(&user.phone_number),
        )
        .await??
        .ok_or(AuthError::AccountDisabled)?;

        bounded(
            "user.update_last_login",
            timeout,
            self.user_repo.update_last_login(winner.user_id, now),
        )
        .await??;
        winner.record_login(now);
        Ok(winner)
    }
}

impl<C, R, D, U, S> LoginFlow for PhoneLoginService<C, R, D, U, S>
where
    C: ChallengeRepository + Send + Sync,
    R: RateLimitRepository + Send + Sync,
    D: CodeDeliverySink + Send + Sync,
    U: UserRepository + Send + Sync,
    S: SessionRepository + Send + Sync + 'static,
{
    async fn send(&self, phone_number: &str) -> AuthResult<SendCodeOutput> {
        let out = self.issue.execute(phone_number).await?;
        Ok(SendCodeOutput {
            session_handle: out.session_handle.as_str().to_string(),
            expires_at: out.expires_at,
        })
    }

    async fn verify(&self, session_handle: &str, code: &str) -> AuthResult<VerifyCodeOutput> {
        let verified = self.verify.execute(session_handle, code).await?;
        let user = self.resolve_user(verified.phone_number).await?;
        let issued = self.sessions.issue_token(&user).await?;

        tracing::info!(
            user_id = %user.user_id,
            challenge_id = %verified.challenge_id,
            "Phone login succeeded"
        );

        Ok(VerifyCodeOutput {
            token: issued.token,
            user,
            expires_at: issued.expires_at,
        })
    }

    async fn logout(&self, token: &str, logout_all: bool) -> AuthResult<LogoutOutput> {
        let (claims, _) = self.sessions.check(token).await?;

        let tokens_revoked = if logout_all {
            self.sessions.revoke_all(claims.user_id()).await?
        } else {
            self.sessions.revoke(token).await?;
            1
        };

        tracing::info!(user_id = %claims.uid, logout_all, tokens_revoked, "User logged out");
        Ok(LogoutOutput { tokens_revoked })
    }

    async fn authenticate(&self, token: &str) -> AuthResult<SessionClaims> {
        self.sessions.validate(token).await
    }

    async fn get_user(&self, user_id: UserId) -> AuthResult<User> {
        bounded(
            "user.find_by_id",
            self.config.store_timeout,
            self.user_repo.find_by_id(user_id),
        )
        .await??
        .ok_or(AuthError::UserNotFound)
    }
}
