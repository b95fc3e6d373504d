//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, conversions::classify_sqlx, kind::ErrorKind};
use otp::OtpError;
use platform::timeout::StoreTimeout;
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Failure from the one-time-code flow
    #[error(transparent)]
    Otp(#[from] OtpError),

    /// Bad signature, expired claims, or revoked/absent session record
    #[error("Invalid or expired token")]
    Unauthorized,

    /// Missing or malformed bearer header
    #[error("Missing bearer token")]
    MissingToken,

    /// Malformed request body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// User vanished between lookup and update
    #[error("User not found")]
    UserNotFound,

    /// Phone number belongs to a deactivated user
    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store timeout: {0}")]
    Timeout(#[from] StoreTimeout),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Otp(e) => e.kind(),
            AuthError::Unauthorized | AuthError::MissingToken => ErrorKind::Unauthorized,
            AuthError::InvalidRequest(_) => ErrorKind::BadRequest,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::AccountDisabled => ErrorKind::Forbidden,
            AuthError::Database(e) => classify_sqlx(e).0,
            AuthError::Timeout(_) => ErrorKind::ServiceUnavailable,
            AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Store/timeout failure rather than a business-rule rejection
    pub fn is_infrastructure(&self) -> bool {
        match self {
            AuthError::Otp(e) => e.is_infrastructure(),
            AuthError::Database(_) | AuthError::Timeout(_) | AuthError::Internal(_) => true,
            _ => false,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Otp(e) => e.log(),
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Timeout(e) => {
                tracing::error!(error = %e, "Auth store timeout");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::Unauthorized => {
                tracing::warn!("Rejected bearer token");
            }
            AuthError::AccountDisabled => {
                tracing::warn!("Login attempt on disabled account");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let kind = err.kind();
        match err {
            AuthError::Otp(e) => e.into(),
            AuthError::MissingToken => AppError::new(kind, "Missing bearer token")
                .with_action("Send Authorization: Bearer <token>"),
            // Client-facing text must not leak store details
            e @ (AuthError::Database(_) | AuthError::Timeout(_) | AuthError::Internal(_)) => {
                AppError::new(kind, "Authentication service temporarily unavailable")
                    .with_source(e)
            }
            other => AppError::new(kind, other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
