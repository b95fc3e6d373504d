//! Phone number value object
//!
//! Canonical form is E.164 without separators: a `+`, a first digit in
//! `1..=9`, then 6 to 14 more digits (7 to 15 digits in total).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::app_error::AppError;

/// Smallest digit count after the `+`
pub const MIN_DIGITS: usize = 7;
/// Largest digit count after the `+`
pub const MAX_DIGITS: usize = 15;

/// Format predicate for phone numbers.
///
/// Pure; used as the precondition gate before any challenge is issued and
/// before any user is persisted.
///
/// ## Examples
/// ```rust
/// use kernel::phone::is_valid_phone_number;
///
/// assert!(is_valid_phone_number("+1234567890"));
/// assert!(!is_valid_phone_number("1234567890"));
/// assert!(!is_valid_phone_number("+0123456789"));
/// assert!(!is_valid_phone_number("+1 234 567 890"));
/// ```
pub fn is_valid_phone_number(s: &str) -> bool {
    let Some(digits) = s.strip_prefix('+') else {
        return false;
    };
    let bytes = digits.as_bytes();
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&bytes.len()) {
        return false;
    }
    if !matches!(bytes[0], b'1'..=b'9') {
        return false;
    }
    bytes.iter().all(u8::is_ascii_digit)
}

/// Validated phone number.
///
/// Construction always goes through [`is_valid_phone_number`], so holding a
/// `PhoneNumber` proves the format check already ran.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidPhoneNumber> {
        let value = value.into();
        if is_valid_phone_number(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidPhoneNumber)
        }
    }

    /// Rehydrate from storage; the stored value was validated on write
    pub fn from_trusted(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Log-safe rendering: everything except the last four digits is masked
    pub fn masked(&self) -> String {
        let visible = self.0.len().saturating_sub(4);
        let mut out = String::with_capacity(self.0.len());
        out.push('+');
        for _ in 1..visible {
            out.push('*');
        }
        out.push_str(&self.0[visible.max(1)..]);
        out
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = InvalidPhoneNumber;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("phone number must be in E.164 format (+ followed by 7 to 15 digits, no leading zero)")]
pub struct InvalidPhoneNumber;

impl From<InvalidPhoneNumber> for AppError {
    fn from(err: InvalidPhoneNumber) -> Self {
        AppError::bad_request("Invalid phone number format")
            .with_action("Use E.164 format, e.g. +1234567890")
            .with_source(err)
    }
}
