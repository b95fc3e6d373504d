//! Infrastructure Layer
//!
//! User directory and session store implementations.

pub mod memory;
pub mod postgres;

pub use memory::{MemorySessionRepository, MemoryUserRepository};
pub use postgres::PgAuthRepository;
