//! HTTP ingestion client.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use super::{DeliveryError, EventSink};
use crate::models::EventRecord;
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Header carrying the record's natural key so the endpoint can deduplicate.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Posts one JSON record per request to the ingestion endpoint.
#[derive(Clone)]
pub struct HttpEventSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpEventSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EventSink for HttpEventSink {
    async fn submit(&self, record: &EventRecord) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(IDEMPOTENCY_KEY_HEADER, record.idempotency_key())
            .header("Accept", "application/json")
            .json(record)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }

    async fn probe(&self) -> bool {
        // Any HTTP answer, even an error status, means the endpoint is reachable
        match self.client.head(&self.endpoint).send().await {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("Endpoint probe failed: {error}");
                false
            }
        }
    }
}

fn classify_transport_error(error: reqwest::Error) -> DeliveryError {
    if error.is_connect() || error.is_timeout() {
        DeliveryError::Unreachable(error.to_string())
    } else {
        DeliveryError::Http(error)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> Result<String, DeliveryError> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| DeliveryError::InvalidEndpoint("endpoint must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(DeliveryError::InvalidEndpoint(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
