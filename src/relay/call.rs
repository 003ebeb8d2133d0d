//! Relay call lifecycle: `Idle → Pending → {Succeeded | Failed}`.
//!
//! Nothing may sit in `Pending` forever, so every call goes through
//! [`bounded`], which turns an elapsed deadline into a failure.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::RelayError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(RelayError),
}

impl CallState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Start a call. Rejected while another call is pending; `Failed` and
    /// `Succeeded` both start over.
    pub fn begin(&mut self) -> bool {
        if self.is_pending() {
            return false;
        }
        *self = Self::Pending;
        true
    }

    pub fn settle<T>(&mut self, result: &Result<T, RelayError>) {
        *self = match result {
            Ok(_) => Self::Succeeded,
            Err(e) => Self::Failed(e.clone()),
        };
    }

    pub fn reset(&mut self) {
        *self = Self::Idle;
    }

    pub fn error(&self) -> Option<&RelayError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Run a relay future under a client-side deadline.
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, RelayError>
where
    F: Future<Output = Result<T, RelayError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Relay call timed out");
            Err(RelayError::Timeout(timeout))
        }
    }
}
