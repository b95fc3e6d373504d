//! Value Object Module

pub mod session_claims;
pub mod token_fingerprint;
pub mod user_id;
