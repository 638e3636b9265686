//! ABOUTME: Per-recipient delivery outcomes and the backend's error codes
//! ABOUTME: Decides which failures are transient enough to retry

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code reported by the backend for a single recipient
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeliveryError {
    MissingRegistration,
    InvalidRegistration,
    MismatchSenderId,
    NotRegistered,
    MessageTooBig,
    InvalidDataKey,
    InvalidTtl,
    /// The backend was temporarily unable to deliver to this recipient
    Unavailable,
    InternalServerError,
    InvalidPackageName,
    /// No outcome was ever reported for the recipient
    Unknown,
    /// A code this crate does not recognise, kept verbatim
    Other(String),
}

impl DeliveryError {
    /// Whether a recipient that failed with this code may be sent again.
    ///
    /// Only `Unavailable` qualifies. `InternalServerError` is terminal here
    /// because the backend may already have delivered the message.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Unavailable => true,
            DeliveryError::MissingRegistration
            | DeliveryError::InvalidRegistration
            | DeliveryError::MismatchSenderId
            | DeliveryError::NotRegistered
            | DeliveryError::MessageTooBig
            | DeliveryError::InvalidDataKey
            | DeliveryError::InvalidTtl
            | DeliveryError::InternalServerError
            | DeliveryError::InvalidPackageName
            | DeliveryError::Unknown
            | DeliveryError::Other(_) => false,
        }
    }

    /// Wire code as the backend spells it
    pub fn as_str(&self) -> &str {
        match self {
            DeliveryError::MissingRegistration => "MissingRegistration",
            DeliveryError::InvalidRegistration => "InvalidRegistration",
            DeliveryError::MismatchSenderId => "MismatchSenderId",
            DeliveryError::NotRegistered => "NotRegistered",
            DeliveryError::MessageTooBig => "MessageTooBig",
            DeliveryError::InvalidDataKey => "InvalidDataKey",
            DeliveryError::InvalidTtl => "InvalidTtl",
            DeliveryError::Unavailable => "Unavailable",
            DeliveryError::InternalServerError => "InternalServerError",
            DeliveryError::InvalidPackageName => "InvalidPackageName",
            DeliveryError::Unknown => "UnknownError",
            DeliveryError::Other(code) => code,
        }
    }
}

impl From<&str> for DeliveryError {
    fn from(code: &str) -> Self {
        match code {
            "MissingRegistration" => DeliveryError::MissingRegistration,
            "InvalidRegistration" => DeliveryError::InvalidRegistration,
            "MismatchSenderId" => DeliveryError::MismatchSenderId,
            "NotRegistered" => DeliveryError::NotRegistered,
            "MessageTooBig" => DeliveryError::MessageTooBig,
            "InvalidDataKey" => DeliveryError::InvalidDataKey,
            "InvalidTtl" => DeliveryError::InvalidTtl,
            "Unavailable" => DeliveryError::Unavailable,
            "InternalServerError" => DeliveryError::InternalServerError,
            "InvalidPackageName" => DeliveryError::InvalidPackageName,
            "UnknownError" => DeliveryError::Unknown,
            other => DeliveryError::Other(other.to_string()),
        }
    }
}

impl From<String> for DeliveryError {
    fn from(code: String) -> Self {
        DeliveryError::from(code.as_str())
    }
}

impl From<DeliveryError> for String {
    fn from(err: DeliveryError) -> Self {
        err.as_str().to_string()
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one recipient of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered {
        message_id: String,
        /// Replacement token the caller should use from now on
        #[serde(default, skip_serializing_if = "Option::is_none")]
        canonical_id: Option<String>,
    },
    Failed {
        error: DeliveryError,
    },
}

impl DeliveryOutcome {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        DeliveryOutcome::Delivered {
            message_id: message_id.into(),
            canonical_id: None,
        }
    }

    pub fn failed(error: DeliveryError) -> Self {
        DeliveryOutcome::Failed { error }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn error(&self) -> Option<&DeliveryError> {
        match self {
            DeliveryOutcome::Delivered { .. } => None,
            DeliveryOutcome::Failed { error } => Some(error),
        }
    }
}

/// Classify a single outcome: true only for a transient per-recipient failure
pub fn is_retryable(outcome: &DeliveryOutcome) -> bool {
    outcome.error().is_some_and(DeliveryError::is_retryable)
}

/// Outcomes of one batch, positionally aligned with the recipients sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Backend id of the batch that produced this response
    pub multicast_id: i64,
    pub success: usize,
    pub failure: usize,
    /// Delivered outcomes that carry a replacement token
    pub canonical_ids: usize,
    pub results: Vec<DeliveryOutcome>,
}

impl BatchResponse {
    /// Build a response whose counters are derived from `results`
    pub fn from_outcomes(multicast_id: i64, results: Vec<DeliveryOutcome>) -> Self {
        let mut success = 0;
        let mut canonical_ids = 0;
        for outcome in &results {
            if let DeliveryOutcome::Delivered { canonical_id, .. } = outcome {
                success += 1;
                if canonical_id.is_some() {
                    canonical_ids += 1;
                }
            }
        }

        Self {
            multicast_id,
            success,
            failure: results.len() - success,
            canonical_ids,
            results,
        }
    }
}
