//! Domain Value Objects

use std::fmt;

use crate::error::{OtpError, OtpResult};

/// Random bytes behind a session handle (256 bits)
pub const SESSION_HANDLE_BYTES: usize = 32;

/// Numeric one-time code.
///
/// `Debug` is redacted so the code never ends up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Draw a fresh uniformly distributed code of `digits` digits
    pub fn generate(digits: u32) -> Self {
        Self(platform::crypto::random_numeric_code(digits))
    }

    /// Accept client input: exactly `digits` ASCII digits
    pub fn parse(input: &str, digits: u32) -> OtpResult<Self> {
        let input = input.trim();
        if input.len() != digits as usize || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpError::InvalidCode);
        }
        Ok(Self(input.to_string()))
    }

    pub(crate) fn from_trusted(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time equality
    pub fn matches(&self, other: &OtpCode) -> bool {
        platform::crypto::constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OtpCode({})", "*".repeat(self.0.len()))
    }
}

/// Opaque handle standing in for the phone number on the wire.
///
/// 32 random bytes, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn generate() -> Self {
        Self(platform::crypto::random_hex(SESSION_HANDLE_BYTES))
    }

    /// Accept client input; normalised to lowercase
    pub fn parse(input: &str) -> OtpResult<Self> {
        let input = input.trim();
        if input.len() != SESSION_HANDLE_BYTES * 2 || !input.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(OtpError::InvalidSessionHandle);
        }
        Ok(Self(input.to_ascii_lowercase()))
    }

    pub(crate) fn from_trusted(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for logs
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
