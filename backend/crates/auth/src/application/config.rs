//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::fmt;
use std::time::Duration;

use platform::timeout::DEFAULT_STORE_TIMEOUT;

/// Smallest accepted HS256 secret
pub const MIN_SECRET_LEN: usize = 32;

/// Auth application configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing key
    pub jwt_secret: Vec<u8>,
    /// `iss` claim, checked on every decode
    pub jwt_issuer: String,
    /// Bearer token lifetime
    pub token_ttl: Duration,
    /// How much longer the per-user index outlives its newest token
    pub index_ttl_slack: Duration,
    /// Bound on each store round trip
    pub store_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Vec::new(),
            jwt_issuer: "otp-auth-service".to_string(),
            token_ttl: Duration::from_secs(24 * 3600),
            index_ttl_slack: Duration::from_secs(3600),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl AuthConfig {
    /// Create config with a random signing secret (for development)
    pub fn with_random_secret() -> Self {
        Self {
            jwt_secret: platform::crypto::random_bytes(MIN_SECRET_LEN),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(format!(
                "JWT secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                self.jwt_secret.len()
            ));
        }
        if self.jwt_issuer.trim().is_empty() {
            return Err("JWT issuer must not be empty".to_string());
        }
        if self.token_ttl.as_secs() == 0 {
            return Err("JWT expiration must be at least one second".to_string());
        }
        if self.store_timeout.is_zero() {
            return Err("store timeout must be positive".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("token_ttl", &self.token_ttl)
            .field("index_ttl_slack", &self.index_ttl_slack)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}
