//! ABOUTME: Retry orchestrator that resends only transiently failed recipients
//! ABOUTME: Merges outcomes across rounds back into the caller's recipient order

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backoff::{Backoff, BackoffConfig};
use crate::outcome::{is_retryable, BatchResponse, DeliveryError, DeliveryOutcome};
use crate::{BatchTransport, PushError, Result, SendRequest, TransportLimits};

/// Sends batches through a [`BatchTransport`], optionally retrying recipients
/// the backend reported as temporarily unavailable.
///
/// The caller's [`SendRequest`] is only ever borrowed; retry rounds work on
/// a private, shrinking copy of the recipient list.
pub struct PushSender {
    transport: Arc<dyn BatchTransport>,
    backoff: BackoffConfig,
    limits: Option<TransportLimits>,
}

impl PushSender {
    /// Create a sender with the default backoff and the transport's own limits
    pub fn new(transport: Arc<dyn BatchTransport>) -> Self {
        Self {
            transport,
            backoff: BackoffConfig::default(),
            limits: None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the limits reported by the transport
    pub fn with_limits(mut self, limits: TransportLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn limits(&self) -> TransportLimits {
        self.limits.unwrap_or_else(|| self.transport.limits())
    }

    /// Send the request once. Failed recipients are reported in the response
    /// and never retried.
    pub async fn send_once(&self, request: &SendRequest) -> Result<BatchResponse> {
        self.transport.health_check().await?;
        self.validate(request)?;

        debug!(
            request_id = %request.id,
            transport = self.transport.name(),
            recipients = request.len(),
            "Sending batch"
        );
        self.transport
            .send(&request.payload, &request.registration_ids)
            .await
    }

    /// Send the request and retry recipients that failed with a transient
    /// error, up to `max_retries` extra rounds with jittered exponential
    /// backoff in between.
    ///
    /// The returned response is aligned with `request.registration_ids` and
    /// accounts for every recipient. A transport failure in any round aborts
    /// the whole call.
    pub async fn send_with_retry(
        &self,
        request: &SendRequest,
        max_retries: i32,
    ) -> Result<BatchResponse> {
        let max_retries = u32::try_from(max_retries).map_err(|_| {
            PushError::Validation(format!(
                "retry count must not be negative, got {}",
                max_retries
            ))
        })?;

        let mut response = self.send_once(request).await?;
        if response.failure == 0 || max_retries == 0 {
            return Ok(response);
        }

        let mut ledger: HashMap<String, DeliveryOutcome> =
            HashMap::with_capacity(request.registration_ids.len());
        let mut pending = request.registration_ids.clone();
        let mut backoff = Backoff::new(&self.backoff);
        let mut round = 0;

        loop {
            pending = record_round(&pending, response.results, &mut ledger);
            if pending.is_empty() || round >= max_retries {
                break;
            }

            round += 1;
            let delay = backoff.wait().await;
            debug!(
                request_id = %request.id,
                round,
                recipients = pending.len(),
                delay_ms = delay.as_millis() as u64,
                "Retrying unavailable recipients"
            );

            response = match self.transport.send(&request.payload, &pending).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        request_id = %request.id,
                        round,
                        recipients = pending.len(),
                        error = %e,
                        "Retry round failed, aborting send"
                    );
                    return Err(e);
                }
            };
        }

        if !pending.is_empty() {
            warn!(
                request_id = %request.id,
                retry_count = round,
                still_unavailable = pending.len(),
                "Retry budget exhausted with recipients still unavailable"
            );
        }

        let results = request
            .registration_ids
            .iter()
            .map(|token| {
                ledger
                    .get(token)
                    .cloned()
                    .unwrap_or_else(|| DeliveryOutcome::failed(DeliveryError::Unknown))
            })
            .collect();
        // Most recent round's batch id, not the first
        let merged = BatchResponse::from_outcomes(response.multicast_id, results);

        info!(
            request_id = %request.id,
            retry_count = round,
            success = merged.success,
            failure = merged.failure,
            "Batch send finished"
        );
        Ok(merged)
    }

    fn validate(&self, request: &SendRequest) -> Result<()> {
        let limits = self.limits();

        if request.is_empty() {
            return Err(PushError::Validation(
                "the request must specify at least one registration ID".to_string(),
            ));
        }
        if request.len() > limits.max_recipients {
            return Err(PushError::Validation(format!(
                "the request may specify at most {} registration IDs, got {}",
                limits.max_recipients,
                request.len()
            )));
        }
        if let (Some(ttl), Some(max_ttl)) = (request.payload.time_to_live, limits.max_time_to_live)
        {
            if ttl > max_ttl {
                return Err(PushError::Validation(format!(
                    "time_to_live must be between 0 and {} seconds, got {}",
                    max_ttl, ttl
                )));
            }
        }
        Ok(())
    }
}

/// Store one round's outcomes under the tokens they were sent for and return
/// the tokens worth another attempt. Outcomes beyond the token list are
/// ignored; tokens beyond the outcome list are left unrecorded.
fn record_round(
    sent: &[String],
    results: Vec<DeliveryOutcome>,
    ledger: &mut HashMap<String, DeliveryOutcome>,
) -> Vec<String> {
    if results.len() != sent.len() {
        warn!(
            sent = sent.len(),
            outcomes = results.len(),
            "Transport returned a mismatched number of outcomes"
        );
    }

    let mut retry = Vec::new();
    for (token, outcome) in sent.iter().zip(results) {
        if is_retryable(&outcome) {
            retry.push(token.clone());
        }
        ledger.insert(token.clone(), outcome);
    }
    retry
}
