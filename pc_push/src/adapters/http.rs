//! ABOUTME: JSON-over-HTTP batch transport for multicast push backends
//! ABOUTME: Posts one message for many tokens and decodes per-token results

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::outcome::{BatchResponse, DeliveryError, DeliveryOutcome};
use crate::{BatchTransport, Payload, PushError, Result, TransportLimits};

/// Multicast send endpoint of the legacy HTTP API
pub const DEFAULT_ENDPOINT: &str = "https://android.googleapis.com/gcm/send";

/// HTTP batch transport authenticated with a server API key
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    api_key: String,
    limits: TransportLimits,
}

impl HttpTransport {
    /// Create a transport for the default endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(DEFAULT_ENDPOINT)
            .map_err(|e| PushError::Config(format!("Invalid default endpoint: {}", e)))?;
        Self::with_client(Client::new(), endpoint, api_key)
    }

    /// Create a transport with a custom client and endpoint
    pub fn with_client(client: Client, endpoint: Url, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PushError::Config(
                "the sender's API key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client,
            endpoint,
            api_key,
            limits: TransportLimits::default(),
        })
    }

    /// Override the backend limits reported to the sender
    pub fn with_limits(mut self, limits: TransportLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .field("limits", &self.limits)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    registration_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    collapse_key: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty_map")]
    data: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "is_false")]
    delay_while_idle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_to_live: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restricted_package_name: Option<&'a str>,
    #[serde(skip_serializing_if = "is_false")]
    dry_run: bool,
}

impl<'a> WireMessage<'a> {
    fn new(payload: &'a Payload, registration_ids: &'a [String]) -> Self {
        Self {
            registration_ids,
            collapse_key: payload.collapse_key.as_deref(),
            data: &payload.data,
            delay_while_idle: payload.delay_while_idle,
            time_to_live: payload.time_to_live,
            restricted_package_name: payload.restricted_package_name.as_deref(),
            dry_run: payload.dry_run,
        }
    }
}

fn is_empty_map(map: &&HashMap<String, String>) -> bool {
    map.is_empty()
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    multicast_id: i64,
    #[serde(default)]
    success: usize,
    #[serde(default)]
    failure: usize,
    #[serde(default)]
    canonical_ids: usize,
    #[serde(default)]
    results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    registration_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl From<WireResult> for DeliveryOutcome {
    fn from(result: WireResult) -> Self {
        let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
        match non_empty(result.message_id) {
            Some(message_id) => DeliveryOutcome::Delivered {
                message_id,
                canonical_id: non_empty(result.registration_id),
            },
            None => DeliveryOutcome::failed(
                non_empty(result.error)
                    .map(DeliveryError::from)
                    .unwrap_or(DeliveryError::Unknown),
            ),
        }
    }
}

impl From<WireResponse> for BatchResponse {
    fn from(wire: WireResponse) -> Self {
        BatchResponse {
            multicast_id: wire.multicast_id,
            success: wire.success,
            failure: wire.failure,
            canonical_ids: wire.canonical_ids,
            results: wire.results.into_iter().map(Into::into).collect(),
        }
    }
}

/// Parse a `Retry-After` header given as delta-seconds or as an HTTP date.
/// Returns `None` when the header cannot be understood.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<i64>() {
        return Some(Duration::from_secs(seconds.max(0) as u64));
    }

    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        let seconds = (at.with_timezone(&Utc) - now).num_seconds();
        return Some(Duration::from_secs(seconds.max(0) as u64));
    }

    warn!(header = %value, "Unparseable Retry-After header");
    None
}

#[async_trait]
impl BatchTransport for HttpTransport {
    async fn send(&self, payload: &Payload, registration_ids: &[String]) -> Result<BatchResponse> {
        debug!(
            endpoint = %self.endpoint,
            recipients = registration_ids.len(),
            "Posting multicast batch"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, format!("key={}", self.api_key))
            .json(&WireMessage::new(payload, registration_ids))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            warn!(
                endpoint = %self.endpoint,
                status = %status,
                retry_after_secs = retry_after.map(|d| d.as_secs()),
                "Push backend rejected batch"
            );
            return Err(PushError::Rejected {
                status: status.as_u16(),
                message: status.to_string(),
                retry_after,
            });
        }

        let body = response.bytes().await?;
        let wire: WireResponse = serde_json::from_slice(&body)?;
        debug!(
            multicast_id = wire.multicast_id,
            success = wire.success,
            failure = wire.failure,
            "Multicast batch accepted"
        );
        Ok(wire.into())
    }

    fn limits(&self) -> TransportLimits {
        self.limits
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_support::sample_data;

    #[test]
    fn test_empty_api_key_is_config_error() {
        let err = HttpTransport::new("  ").unwrap_err();
        assert!(matches!(err, PushError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let transport = HttpTransport::new("super-secret-key").unwrap();
        let debug = format!("{:?}", transport);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-key"));
        assert_eq!(transport.endpoint().as_str(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_wire_message_omits_unset_options() {
        let payload = Payload {
            data: sample_data(),
            ..Payload::default()
        };
        let ids = vec!["a".to_string(), "b".to_string()];
        let json = serde_json::to_value(WireMessage::new(&payload, &ids)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"registration_ids": ["a", "b"], "data": {"key": "value"}})
        );
    }

    #[test]
    fn test_wire_message_includes_set_options() {
        let payload = Payload {
            data: HashMap::new(),
            collapse_key: Some("k".to_string()),
            delay_while_idle: true,
            time_to_live: Some(60),
            restricted_package_name: Some("com.example".to_string()),
            dry_run: true,
        };
        let ids = vec!["a".to_string()];
        let json = serde_json::to_value(WireMessage::new(&payload, &ids)).unwrap();
        assert_eq!(json["collapse_key"], "k");
        assert_eq!(json["delay_while_idle"], true);
        assert_eq!(json["time_to_live"], 60);
        assert_eq!(json["restricted_package_name"], "com.example");
        assert_eq!(json["dry_run"], true);
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_wire_response_conversion() {
        let wire: WireResponse = serde_json::from_value(serde_json::json!({
            "multicast_id": 216,
            "success": 2,
            "failure": 2,
            "canonical_ids": 1,
            "results": [
                {"message_id": "1:0408"},
                {"error": "Unavailable"},
                {"message_id": "1:2342", "registration_id": "32"},
                {"error": "SomethingNew"}
            ]
        }))
        .unwrap();
        let resp: BatchResponse = wire.into();

        assert_eq!(resp.multicast_id, 216);
        assert_eq!(resp.failure, 2);
        assert_eq!(resp.results[0], DeliveryOutcome::delivered("1:0408"));
        assert_eq!(
            resp.results[1],
            DeliveryOutcome::failed(DeliveryError::Unavailable)
        );
        assert_eq!(
            resp.results[2],
            DeliveryOutcome::Delivered {
                message_id: "1:2342".to_string(),
                canonical_id: Some("32".to_string()),
            }
        );
        assert_eq!(
            resp.results[3],
            DeliveryOutcome::failed(DeliveryError::Other("SomethingNew".to_string()))
        );
    }

    #[test]
    fn test_result_without_id_or_error_is_unknown() {
        let outcome: DeliveryOutcome = WireResult {
            message_id: Some(String::new()),
            registration_id: None,
            error: None,
        }
        .into();
        assert_eq!(outcome, DeliveryOutcome::failed(DeliveryError::Unknown));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("-5", now), Some(Duration::from_secs(0)));
        assert_eq!(parse_retry_after("", now), None);
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:20:00 GMT", now),
            Some(Duration::from_secs(0))
        );
    }
}
