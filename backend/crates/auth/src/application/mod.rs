//! Application Layer
//!
//! Use cases and application services.

pub mod config;
pub mod phone_login;
pub mod session_service;
pub mod token_codec;

// Re-exports
pub use config::AuthConfig;
pub use phone_login::{
    LocalLoginFlow, LoginFlow, LogoutOutput, PhoneLoginService, SendCodeOutput, VerifyCodeOutput,
};
pub use session_service::{IssuedToken, SessionService};
pub use token_codec::TokenCodec;
