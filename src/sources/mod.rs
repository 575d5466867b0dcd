//! Vendor Source Adapters
//!
//! Thin API clients for the external health-data feeds:
//! - Withings (weight scale, sleep mat)
//! - Omron (blood-pressure cuff, heart rate)
//!
//! Adapters only translate the vendor protocol into raw readings; retry,
//! rate limiting, and caching are owned by the sync orchestrator. OAuth
//! token acquisition is outside this crate; clients use pre-obtained
//! bearer tokens from configuration.

mod omron;
mod withings;

pub use omron::{OmronBloodPressureSource, OmronClient, OmronHeartRateSource};
pub use withings::{WithingsClient, WithingsSleepSource, WithingsWeightSource};

use crate::sync::SourceError;

pub(crate) fn classify_request_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Transport(e.to_string())
    }
}

pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        Err(SourceError::Auth(message))
    } else {
        Err(SourceError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
