//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure.
//! Contains use case implementations.

pub mod config;
pub mod issue_challenge;
pub mod maintenance;
pub mod verify_challenge;

// Re-exports
pub use config::OtpConfig;
pub use issue_challenge::{IssueChallengeOutput, IssueChallengeUseCase};
pub use maintenance::{OtpMaintenance, SweepReport};
pub use verify_challenge::{VerifiedChallenge, VerifyChallengeUseCase};
