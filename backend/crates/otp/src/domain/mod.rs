//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (OtpChallenge, RateLimitRecord)
//! - Domain value objects (OtpCode, SessionHandle)
//! - Repository and delivery traits (interfaces)

pub mod delivery;
pub mod entities;
pub mod repository;
pub mod value_objects;
