//! Server configuration
//!
//! Read once from the environment at startup. Anything malformed fails
//! startup with the offending variable named.

use std::time::Duration;

use anyhow::{Context, bail};
use auth::AuthConfig;
use otp::OtpConfig;
use platform::rate_limit::RateLimitPolicy;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_FRONTEND_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// Backend for rate-limit windows and session records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EphemeralStore {
    /// UNLOGGED tables in the main database
    Postgres,
    /// Process memory; lost on restart and not shared between instances
    Memory,
}

impl std::str::FromStr for EphemeralStore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("expected `postgres` or `memory`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub ephemeral_store: EphemeralStore,
    pub frontend_origins: Vec<String>,
    pub cleanup_interval: Duration,
    pub shutdown_timeout: Duration,
    pub otp: OtpConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<L>(lookup: L) -> anyhow::Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("HTTP_SERVER_PORT").or_else(|| get("APP_PORT")) {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .with_context(|| format!("HTTP_SERVER_PORT: invalid port `{v}`"))?,
            None => DEFAULT_PORT,
        };

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections =
            parse_or(&get, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;

        let ephemeral_store = match get("EPHEMERAL_STORE") {
            Some(v) => v
                .parse::<EphemeralStore>()
                .map_err(|e| anyhow::anyhow!("EPHEMERAL_STORE: {e}"))?,
            None => EphemeralStore::Postgres,
        };

        let frontend_origins = get("FRONTEND_ORIGINS")
            .unwrap_or_else(|| DEFAULT_FRONTEND_ORIGINS.to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let store_timeout = duration_or(&get, "STORE_TIMEOUT", Duration::from_secs(3))?;

        let defaults = OtpConfig::default();
        let otp = OtpConfig {
            code_length: parse_or(&get, "OTP_LENGTH", defaults.code_length)?,
            challenge_ttl: duration_or(&get, "OTP_EXPIRATION_TIME", defaults.challenge_ttl)?,
            rate_limit: RateLimitPolicy {
                max_requests: parse_or(
                    &get,
                    "RATE_LIMIT_MAX_REQUESTS",
                    defaults.rate_limit.max_requests,
                )?,
                window: duration_or(
                    &get,
                    "RATE_LIMIT_WINDOW_DURATION",
                    defaults.rate_limit.window,
                )?,
            },
            store_timeout,
        };
        otp.validate().map_err(|e| anyhow::anyhow!("OTP config: {e}"))?;

        let mut auth = match get("JWT_SECRET") {
            Some(secret) => AuthConfig {
                jwt_secret: secret.into_bytes(),
                ..AuthConfig::default()
            },
            None if cfg!(debug_assertions) => {
                tracing::warn!("JWT_SECRET not set, using a random secret for this process");
                AuthConfig::with_random_secret()
            }
            None => bail!("JWT_SECRET must be set in release builds"),
        };
        if let Some(issuer) = get("JWT_ISSUER") {
            auth.jwt_issuer = issuer;
        }
        auth.token_ttl = duration_or(&get, "JWT_EXPIRATION_TIME", auth.token_ttl)?;
        auth.store_timeout = store_timeout;
        auth.validate().map_err(|e| anyhow::anyhow!("Auth config: {e}"))?;

        let cleanup_interval = duration_or(&get, "CLEANUP_INTERVAL", Duration::from_secs(300))?;
        if cleanup_interval.is_zero() {
            bail!("CLEANUP_INTERVAL must be positive");
        }

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            ephemeral_store,
            frontend_origins,
            cleanup_interval,
            shutdown_timeout: duration_or(
                &get,
                "APPLICATION_GRACEFUL_SHUTDOWN_TIMEOUT",
                Duration::from_secs(30),
            )?,
            otp,
            auth,
        })
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}: invalid value `{v}`: {e}")),
        None => Ok(default),
    }
}

fn duration_or<G>(get: &G, key: &str, default: Duration) -> anyhow::Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => parse_duration(&v).map_err(|e| anyhow::anyhow!("{key}: {e}")),
        None => Ok(default),
    }
}

/// Go-style duration: one or more `<integer><unit>` pairs with units
/// `ms`, `s`, `m`, `h` (e.g. `90s`, `1h30m`). A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(format!("invalid duration `{s}`: expected a number"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration `{s}`: number too large"))?;
        rest = &rest[digits..];

        let unit_len = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "" => return Err(format!("invalid duration `{s}`: missing unit")),
            unit => return Err(format!("invalid duration `{s}`: unknown unit `{unit}`")),
        };
        rest = &rest[unit_len..];
        total = total.saturating_add(part);
    }
    Ok(total)
}
