//! Code delivery boundary
//!
//! The code leaves the core only through [`CodeDeliverySink`]; the actual
//! channel (SMS, voice, console) is chosen at composition time.

use chrono::{DateTime, Utc};
use kernel::PhoneNumber;

use crate::domain::value_objects::OtpCode;
use crate::error::OtpResult;

#[trait_variant::make(CodeDeliverySink: Send)]
pub trait LocalCodeDeliverySink {
    async fn on_code_generated(
        &self,
        phone_number: &PhoneNumber,
        code: &OtpCode,
        expires_at: DateTime<Utc>,
    ) -> OtpResult<()>;
}
