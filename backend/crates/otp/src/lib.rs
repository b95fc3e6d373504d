//! OTP (One-Time Code) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Challenge and rate-limit entities, value objects, repository traits
//! - `application/` - Issue / verify / maintenance use cases
//! - `infra/` - PostgreSQL and in-memory implementations, code delivery sinks
//!
//! ## Security Model
//! - The code never leaves the server except through the delivery sink
//! - Clients only ever see an opaque session handle, never the phone number
//! - Issuance is metered per phone number; a limiter outage fails closed
//! - Challenge consumption is a single conditional update (no double-spend)
//! - Wrong code, used handle, unknown handle and expiry are indistinguishable

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::OtpConfig;
pub use application::{
    IssueChallengeOutput, IssueChallengeUseCase, OtpMaintenance, SweepReport, VerifiedChallenge,
    VerifyChallengeUseCase,
};
pub use error::{OtpError, OtpResult};
pub use infra::delivery::{CapturingCodeSink, TracingCodeSink};
pub use infra::memory::{MemoryChallengeRepository, MemoryRateLimitRepository};
pub use infra::postgres::PgOtpRepository;

#[cfg(test)]
mod tests;
