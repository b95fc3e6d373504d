//! Rate Limiting Infrastructure
//!
//! Fixed-window counter shared by every storage backend. Backends load the
//! current [`WindowState`], call [`evaluate`], and persist the result inside
//! one atomic section per key.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Shortest TTL ever written for a window record
pub const MIN_RECORD_TTL: Duration = Duration::from_secs(60);

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 3,
            window: Duration::from_secs(10 * 60),
        }
    }
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    fn window_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::days(3650))
    }
}

/// Stored per-key window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub request_count: u32,
    pub window_start_at: DateTime<Utc>,
    pub last_request_at: DateTime<Utc>,
}

/// Outcome of one [`evaluate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Record the request: persist `state` with `ttl`.
    Allowed {
        state: WindowState,
        remaining: u32,
        reset_at: DateTime<Utc>,
        ttl: Duration,
    },
    /// Quota exhausted; nothing is written.
    Limited {
        reset_at: DateTime<Utc>,
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Apply the fixed-window policy to the currently stored window.
///
/// - no record, or `now - window_start >= window`: start a new window at `now`
///   with count 1 and a full-window TTL
/// - inside the window with `count < max`: increment, TTL = remaining window
///   time floored at [`MIN_RECORD_TTL`]
/// - inside the window with `count >= max`: reject without incrementing
pub fn evaluate(
    policy: &RateLimitPolicy,
    current: Option<&WindowState>,
    now: DateTime<Utc>,
) -> RateLimitDecision {
    let window = policy.window_chrono();

    let active = current.filter(|w| now.signed_duration_since(w.window_start_at) < window);

    let Some(active) = active else {
        let state = WindowState {
            request_count: 1,
            window_start_at: now,
            last_request_at: now,
        };
        return RateLimitDecision::Allowed {
            state,
            remaining: policy.max_requests.saturating_sub(1),
            reset_at: now + window,
            ttl: policy.window,
        };
    };

    let reset_at = active.window_start_at + window;
    let left = (reset_at - now).to_std().unwrap_or(Duration::ZERO);

    if active.request_count >= policy.max_requests {
        return RateLimitDecision::Limited {
            reset_at,
            retry_after: round_up_secs(left),
        };
    }

    let state = WindowState {
        request_count: active.request_count + 1,
        window_start_at: active.window_start_at,
        last_request_at: now,
    };
    RateLimitDecision::Allowed {
        state,
        remaining: policy.max_requests.saturating_sub(state.request_count),
        reset_at,
        ttl: left.max(MIN_RECORD_TTL),
    }
}

fn round_up_secs(d: Duration) -> Duration {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    Duration::from_secs(secs.max(1))
}
