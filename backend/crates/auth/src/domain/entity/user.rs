//! User Entity
//!
//! A user is identified externally by their phone number.

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;

use crate::domain::value_object::user_id::UserId;

/// User entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    pub phone_number: PhoneNumber,
    pub registered_at: DateTime<Utc>,
    /// Equal to `registered_at` for a brand-new user
    pub last_login_at: DateTime<Utc>,
    pub is_active: bool,
}

impl User {
    /// First login registers the user
    pub fn register(phone_number: PhoneNumber, now: DateTime<Utc>) -> Self {
        Self {
            user_id: UserId::new(),
            phone_number,
            registered_at: now,
            last_login_at: now,
            is_active: true,
        }
    }

    /// Record successful login
    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.last_login_at = now;
    }
}
