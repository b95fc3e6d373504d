//! Application Configuration
//!
//! Configuration for the OTP application layer.

use std::time::Duration;

use platform::rate_limit::RateLimitPolicy;
use platform::timeout::DEFAULT_STORE_TIMEOUT;

/// Accepted range for the number of digits in a code
pub const CODE_LENGTH_RANGE: std::ops::RangeInclusive<u32> = 4..=10;

/// OTP application configuration
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// Digits per code
    pub code_length: u32,
    /// Challenge lifetime
    pub challenge_ttl: Duration,
    /// Issuance quota per phone number
    pub rate_limit: RateLimitPolicy,
    /// Bound on each store round trip
    pub store_timeout: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            challenge_ttl: Duration::from_secs(2 * 60),
            rate_limit: RateLimitPolicy::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl OtpConfig {
    /// Reject settings the use cases cannot honour
    pub fn validate(&self) -> Result<(), String> {
        if !CODE_LENGTH_RANGE.contains(&self.code_length) {
            return Err(format!(
                "OTP code length must be between {} and {}, got {}",
                CODE_LENGTH_RANGE.start(),
                CODE_LENGTH_RANGE.end(),
                self.code_length
            ));
        }
        if self.challenge_ttl.is_zero() {
            return Err("OTP expiration must be positive".to_string());
        }
        if self.rate_limit.max_requests == 0 {
            return Err("rate limit max requests must be at least 1".to_string());
        }
        if self.rate_limit.window.is_zero() {
            return Err("rate limit window must be positive".to_string());
        }
        if self.store_timeout.is_zero() {
            return Err("store timeout must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OtpConfig::default();
        assert_eq!(config.code_length, 6);
        assert_eq!(config.challenge_ttl, Duration::from_secs(120));
        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.rate_limit.window, Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let short = OtpConfig {
            code_length: 3,
            ..Default::default()
        };
        assert!(short.validate().is_err());

        let no_quota = OtpConfig {
            rate_limit: RateLimitPolicy::new(0, Duration::from_secs(60)),
            ..Default::default()
        };
        assert!(no_quota.validate().is_err());
    }
}
