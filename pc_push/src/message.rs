//! ABOUTME: Send request model: recipient tokens plus the message payload
//! ABOUTME: Built by callers, only ever read by the sender and transports

use pc_core::RequestId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message content and delivery options shared by every recipient of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Free-form key/value data handed to the client application
    pub data: HashMap<String, String>,
    /// Groups messages so only the latest one is shown when delivery resumes
    pub collapse_key: Option<String>,
    /// Hold the message until the device becomes active
    pub delay_while_idle: bool,
    /// How long (seconds) the backend keeps the message if the device is offline
    pub time_to_live: Option<u32>,
    /// Only deliver to registrations belonging to this package name
    pub restricted_package_name: Option<String>,
    /// Validate the request on the backend without delivering it
    pub dry_run: bool,
}

/// A batch of recipients and the payload they should all receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub id: RequestId,
    /// Recipient tokens; outcomes are reported in this order
    pub registration_ids: Vec<String>,
    pub payload: Payload,
}

impl SendRequest {
    /// Create a request carrying `data` for each of `registration_ids`
    pub fn new<I, S>(data: HashMap<String, String>, registration_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: RequestId::new(),
            registration_ids: registration_ids.into_iter().map(Into::into).collect(),
            payload: Payload {
                data,
                ..Payload::default()
            },
        }
    }

    pub fn with_collapse_key(mut self, key: impl Into<String>) -> Self {
        self.payload.collapse_key = Some(key.into());
        self
    }

    pub fn with_time_to_live(mut self, seconds: u32) -> Self {
        self.payload.time_to_live = Some(seconds);
        self
    }

    pub fn with_restricted_package_name(mut self, name: impl Into<String>) -> Self {
        self.payload.restricted_package_name = Some(name.into());
        self
    }

    pub fn delay_while_idle(mut self, delay: bool) -> Self {
        self.payload.delay_while_idle = delay;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.payload.dry_run = dry_run;
        self
    }

    /// Number of recipients in the batch
    pub fn len(&self) -> usize {
        self.registration_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registration_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::sample_data;

    #[test]
    fn test_new_keeps_recipient_order() {
        let req = SendRequest::new(sample_data(), ["c", "a", "b"]);
        assert_eq!(req.registration_ids, vec!["c", "a", "b"]);
        assert_eq!(req.payload.data.get("key"), Some(&"value".to_string()));
        assert_eq!(req.len(), 3);
        assert!(req.payload.collapse_key.is_none());
        assert!(!req.payload.dry_run);
    }

    #[test]
    fn test_builder_options() {
        let req = SendRequest::new(HashMap::new(), vec!["1".to_string()])
            .with_collapse_key("scores")
            .with_time_to_live(3600)
            .with_restricted_package_name("com.example.app")
            .delay_while_idle(true)
            .dry_run(true);

        assert_eq!(req.payload.collapse_key.as_deref(), Some("scores"));
        assert_eq!(req.payload.time_to_live, Some(3600));
        assert_eq!(
            req.payload.restricted_package_name.as_deref(),
            Some("com.example.app")
        );
        assert!(req.payload.delay_while_idle);
        assert!(req.payload.dry_run);
    }

    #[test]
    fn test_empty_request() {
        let req = SendRequest::new(HashMap::new(), Vec::<String>::new());
        assert!(req.is_empty());
    }
}
