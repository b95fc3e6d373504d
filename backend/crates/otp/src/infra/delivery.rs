//! Code delivery sinks

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;
use tokio::sync::Mutex;

use crate::domain::delivery::CodeDeliverySink;
use crate::domain::value_objects::OtpCode;
use crate::error::OtpResult;

/// Development stand-in for an SMS gateway: writes the code to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCodeSink;

impl CodeDeliverySink for TracingCodeSink {
    async fn on_code_generated(
        &self,
        phone_number: &PhoneNumber,
        code: &OtpCode,
        expires_at: DateTime<Utc>,
    ) -> OtpResult<()> {
        tracing::info!(
            phone = %phone_number.masked(),
            code = code.as_str(),
            expires_at = %expires_at,
            "OTP code generated (development delivery)"
        );
        Ok(())
    }
}

/// Keeps the latest code per phone number in memory.
#[derive(Debug, Default)]
pub struct CapturingCodeSink {
    codes: Mutex<HashMap<PhoneNumber, (OtpCode, DateTime<Utc>)>>,
}

impl CapturingCodeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest code delivered to `phone`
    pub async fn last_code(&self, phone: &str) -> Option<String> {
        let phone = PhoneNumber::new(phone).ok()?;
        self.codes
            .lock()
            .await
            .get(&phone)
            .map(|(code, _)| code.as_str().to_string())
    }
}

impl CodeDeliverySink for CapturingCodeSink {
    async fn on_code_generated(
        &self,
        phone_number: &PhoneNumber,
        code: &OtpCode,
        expires_at: DateTime<Utc>,
    ) -> OtpResult<()> {
        self.codes
            .lock()
            .await
            .insert(phone_number.clone(), (code.clone(), expires_at));
        Ok(())
    }
}
