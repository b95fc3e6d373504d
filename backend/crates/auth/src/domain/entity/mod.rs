//! Entity Module

pub mod session_record;
pub mod user;
