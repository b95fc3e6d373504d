//! OTP Error Types
//!
//! This module provides OTP-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use std::time::Duration;

use kernel::error::{app_error::AppError, conversions::classify_sqlx, kind::ErrorKind};
use kernel::phone::InvalidPhoneNumber;
use platform::timeout::StoreTimeout;
use thiserror::Error;

/// OTP-specific result type alias
pub type OtpResult<T> = Result<T, OtpError>;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Invalid phone number format")]
    InvalidPhoneNumber(#[from] InvalidPhoneNumber),

    #[error("Invalid code format")]
    InvalidCode,

    #[error("Invalid session handle format")]
    InvalidSessionHandle,

    /// Quota for the current window is used up
    #[error("Too many code requests")]
    RateLimited { retry_after: Duration },

    /// Wrong code, unknown or used handle, or past expiry
    #[error("Invalid or expired code")]
    InvalidOrExpiredChallenge,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store timeout: {0}")]
    Timeout(#[from] StoreTimeout),

    #[error("Code delivery failed: {0}")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OtpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OtpError::InvalidPhoneNumber(_)
            | OtpError::InvalidCode
            | OtpError::InvalidSessionHandle => ErrorKind::BadRequest,
            OtpError::RateLimited { .. } => ErrorKind::TooManyRequests,
            OtpError::InvalidOrExpiredChallenge => ErrorKind::Unauthorized,
            OtpError::Timeout(_) => ErrorKind::ServiceUnavailable,
            OtpError::Database(e) => classify_sqlx(e).0,
            OtpError::Delivery(_) => ErrorKind::ServiceUnavailable,
            OtpError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Store, timeout or delivery failure rather than a business-rule rejection
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            OtpError::Database(_)
                | OtpError::Timeout(_)
                | OtpError::Delivery(_)
                | OtpError::Internal(_)
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            OtpError::Database(e) => {
                tracing::error!(error = %e, "OTP database error");
            }
            OtpError::Timeout(e) => {
                tracing::error!(error = %e, "OTP store timeout");
            }
            OtpError::Delivery(msg) => {
                tracing::error!(message = %msg, "OTP code delivery failed");
            }
            OtpError::Internal(msg) => {
                tracing::error!(message = %msg, "OTP internal error");
            }
            OtpError::RateLimited { retry_after } => {
                tracing::warn!(retry_after_secs = retry_after.as_secs(), "OTP rate limit exceeded");
            }
            OtpError::InvalidOrExpiredChallenge => {
                tracing::warn!("OTP verification rejected");
            }
            _ => {
                tracing::debug!(error = %self, "OTP error");
            }
        }
    }
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match err {
            OtpError::RateLimited { retry_after } => AppError::new(kind, message)
                .with_retry_after(retry_after.as_secs())
                .with_action("Wait before requesting another code"),
            OtpError::InvalidPhoneNumber(_) => {
                AppError::new(kind, message).with_action("Use E.164 format, e.g. +1234567890")
            }
            // Client-facing text must not leak store details
            e @ (OtpError::Database(_) | OtpError::Timeout(_) | OtpError::Internal(_)) => {
                AppError::new(kind, "OTP service temporarily unavailable").with_source(e)
            }
            OtpError::Delivery(_) => AppError::new(kind, "Code could not be delivered"),
            _ => AppError::new(kind, message),
        }
    }
}
