//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (random tokens, numeric codes, SHA-256)
//! - The fixed-window rate limit algorithm
//! - Injectable clocks
//! - Bounded external-store calls
//! - Bearer header parsing
//! - Cancellable periodic tasks

pub mod bearer;
pub mod clock;
pub mod crypto;
pub mod rate_limit;
pub mod scheduler;
pub mod timeout;
