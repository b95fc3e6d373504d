//! Infrastructure Layer
//!
//! Concrete repositories and delivery sinks, selected at composition time.

pub mod delivery;
pub mod memory;
pub mod postgres;
