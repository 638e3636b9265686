//! ABOUTME: Batch push delivery with per-recipient retry and backoff
//! ABOUTME: Resends only transient failures and merges outcomes across rounds

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod adapters;
pub mod backoff;
pub mod message;
pub mod outcome;
pub mod sender;

pub use adapters::HttpTransport;
pub use backoff::{Backoff, BackoffConfig};
pub use message::{Payload, SendRequest};
pub use outcome::{is_retryable, BatchResponse, DeliveryError, DeliveryOutcome};
pub use sender::PushSender;

/// Result type for push operations
pub type Result<T> = std::result::Result<T, PushError>;

/// Call-level errors. Per-recipient failures are never reported here; they
/// travel as data inside [`BatchResponse`].
#[derive(Error, Debug)]
pub enum PushError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Batch rejected with status {status}: {message}")]
    Rejected {
        status: u16,
        message: String,
        /// Delay the backend asked for before the next attempt
        retry_after: Option<Duration>,
    },
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl PushError {
    /// True when the batch call itself failed, as opposed to the request or
    /// sender being unusable.
    pub fn is_transport(&self) -> bool {
        match self {
            PushError::Config(_) | PushError::Validation(_) => false,
            PushError::Rejected { .. }
            | PushError::HttpError(_)
            | PushError::SerializationError(_)
            | PushError::Transport(_) => true,
        }
    }
}

/// Limits the backend places on a single batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportLimits {
    /// Most recipient tokens allowed in one batch
    pub max_recipients: usize,
    /// Longest time-to-live (seconds) the backend accepts, if it has a limit
    pub max_time_to_live: Option<u32>,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            max_recipients: 1000,
            max_time_to_live: Some(2_419_200), // 4 weeks
        }
    }
}

/// One batch send against the push backend.
///
/// Implementations must return exactly one outcome per token, in the order
/// the tokens were given. An `Err` means no outcome of that call is usable.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// Send `payload` to every token in `registration_ids`
    async fn send(&self, payload: &Payload, registration_ids: &[String]) -> Result<BatchResponse>;

    /// Check the transport is configured well enough to attempt a send
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn limits(&self) -> TransportLimits {
        TransportLimits::default()
    }

    /// Get the transport's name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(!PushError::Config("no key".to_string()).is_transport());
        assert!(!PushError::Validation("empty".to_string()).is_transport());
        assert!(PushError::Transport("reset".to_string()).is_transport());
        assert!(PushError::Rejected {
            status: 400,
            message: "Bad Request".to_string(),
            retry_after: None,
        }
        .is_transport());
    }

    #[test]
    fn test_rejected_display() {
        let err = PushError::Rejected {
            status: 503,
            message: "Service Unavailable".to_string(),
            retry_after: Some(Duration::from_secs(10)),
        };
        assert_eq!(
            err.to_string(),
            "Batch rejected with status 503: Service Unavailable"
        );
    }

    #[test]
    fn test_default_limits() {
        let limits = TransportLimits::default();
        assert_eq!(limits.max_recipients, 1000);
        assert_eq!(limits.max_time_to_live, Some(2_419_200));
    }
}
