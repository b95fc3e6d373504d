//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Users, session records, token claims, repository traits
//! - `application/` - Token codec, session store, the phone login flow
//! - `infra/` - PostgreSQL and in-memory implementations
//! - `presentation/` - HTTP handlers, DTOs, router, bearer middleware
//!
//! ## Features
//! - Passwordless login: phone number -> one-time code -> bearer token
//! - First successful login registers the user
//! - Logout of a single token or of every session of the user
//!
//! ## Security Model
//! - HS256 tokens, validated against the injected clock
//! - A token is accepted only while its server-side record exists
//! - Records are keyed by the SHA-256 of the token, never the token itself
//! - Failure responses do not reveal store details

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::{LoginFlow, PhoneLoginService, SessionService};
pub use error::{AuthError, AuthResult};
pub use infra::{MemorySessionRepository, MemoryUserRepository, PgAuthRepository};
pub use presentation::router::auth_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}
