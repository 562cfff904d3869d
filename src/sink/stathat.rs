//! StatHat EZ API sink.
//!
//! Posts one count event per call to the EZ endpoint as a form-encoded
//! request. Transient failures (transport errors and 5xx responses) are
//! retried a bounded number of times with exponential backoff before the
//! delivery is reported as failed; 4xx responses are not retried.

use async_trait::async_trait;
use snafu::prelude::*;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::emit;
use crate::error::{SinkBuildSnafu, SinkError, TransportSnafu};
use crate::metrics::events::PostCompleted;
use crate::sink::MetricsSink;

/// StatHat EZ API endpoint.
const EZ_ENDPOINT: &str = "https://api.stathat.com/ez";

/// Request timeout per attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Retries after the initial attempt.
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (doubles each retry).
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Sink that delivers counts to the StatHat EZ API.
pub struct StatHatSink {
    client: reqwest::Client,
    endpoint: String,
}

impl StatHatSink {
    /// Build a sink against the production EZ endpoint.
    pub fn new() -> Result<Self, crate::error::PipelineError> {
        Self::with_endpoint(EZ_ENDPOINT.to_string())
    }

    /// Build a sink against a custom endpoint (used by tests).
    pub fn with_endpoint(endpoint: String) -> Result<Self, crate::error::PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(SinkBuildSnafu)?;
        Ok(Self { client, endpoint })
    }

    async fn post_once(
        &self,
        stat: &str,
        ez_key: &str,
        count: u64,
        timestamp: i64,
    ) -> Result<(), SinkError> {
        let params = [
            ("stat", stat),
            ("ezkey", ez_key),
            ("count", &count.to_string()),
            ("t", &timestamp.to_string()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .form(&params)
            .send()
            .await
            .context(TransportSnafu)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SinkError::Api {
                status: status.as_u16(),
            })
        }
    }
}

/// Whether a failed attempt is worth retrying.
fn is_retryable(error: &SinkError) -> bool {
    match error {
        SinkError::Transport { .. } => true,
        SinkError::Api { status } => *status >= 500,
        SinkError::RetriesExhausted { .. } => false,
    }
}

#[async_trait]
impl MetricsSink for StatHatSink {
    async fn post_count(
        &self,
        stat: &str,
        ez_key: &str,
        count: u64,
        timestamp: i64,
    ) -> Result<(), SinkError> {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match self.post_once(stat, ez_key, count, timestamp).await {
                Ok(()) => {
                    emit!(PostCompleted {
                        duration: start.elapsed()
                    });
                    debug!(stat, "Posted count");
                    return Ok(());
                }
                Err(error) if attempt < MAX_RETRIES && is_retryable(&error) => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        stat,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "StatHat delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return Err(SinkError::RetriesExhausted {
                        attempts: attempt + 1,
                        source: Box::new(error),
                    });
                }
            }
        }
    }
}
