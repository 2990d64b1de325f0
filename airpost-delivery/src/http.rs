//! Bulk HTTP delivery: the whole reading set in one JSON POST.
//!
//! The collector receives a single JSON object per cycle with one
//! string-valued field per channel (two decimal places) plus the node's
//! hardware identifier:
//!
//! ```json
//! {"CO2": "420.00", "humidity": "55.20", "pm10": "10.00",
//!  "pm25": "5.00", "pressure": "1013.00", "temperature": "21.50",
//!  "mac": "24:6F:28:AE:52:7C"}
//! ```
//!
//! Acceptance is HTTP 200 exactly; any other status, success class or
//! not, is a failed delivery, and so is a transport failure that never
//! got a response (those carry no status code). The backend keeps no
//! session, so readiness is only the network-level check and delivery
//! never retries on its own.
//!
//! ## Example
//!
//! ```rust,no_run
//! use airpost_delivery::http::HttpBackend;
//! use airpost_delivery::DeliveryBackend;
//! use airpost_types::ReadingSet;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut backend = HttpBackend::builder()
//!         .endpoint("http://collector.local:3000/logData/")
//!         .device_id("24:6F:28:AE:52:7C")
//!         .build();
//!
//!     let readings = ReadingSet::stock();
//!     backend.initialize(&readings)?;
//!     backend.publish(&readings).await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use airpost_types::{format_value, ReadingSet};

use crate::backend::DeliveryBackend;
use crate::error::{DeliveryError, LinkError};
use crate::link::{LinkState, NetworkLink, Readiness};

/// Stateless backend that posts the whole reading set in one request.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: String,
    device_id: String,
    state: LinkState,
}

impl HttpBackend {
    /// Create a new builder for configuring the backend.
    pub fn builder() -> HttpBackendBuilder {
        HttpBackendBuilder::default()
    }
}

#[async_trait]
impl DeliveryBackend for HttpBackend {
    fn initialize(&mut self, readings: &ReadingSet) -> Result<(), DeliveryError> {
        reqwest::Url::parse(&self.endpoint).map_err(|e| DeliveryError::Configuration {
            reason: format!("collector endpoint '{}': {}", self.endpoint, e),
        })?;
        info!(
            "http delivery ready: {} channels -> {}",
            readings.len(),
            self.endpoint
        );
        Ok(())
    }

    async fn ensure_ready(&mut self, link: &dyn NetworkLink) -> Result<Readiness, LinkError> {
        if !link.is_connected() {
            self.state = LinkState::Disconnected;
            return Err(LinkError::NetworkUnavailable);
        }
        self.state = LinkState::NetworkConnected;
        Ok(Readiness::Ready)
    }

    async fn publish(&mut self, readings: &ReadingSet) -> Result<(), DeliveryError> {
        let payload = bulk_payload(readings, &self.device_id);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(DeliveryError::Fatal {
                reason: format!("collector answered {}", response.status()),
                status: Some(status),
            });
        }

        debug!("delivered {} readings to {}", readings.len(), self.endpoint);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn identity(&self) -> &str {
        &self.device_id
    }

    fn link_state(&self) -> LinkState {
        self.state
    }
}

/// Builder for HttpBackend.
#[derive(Debug, Default)]
pub struct HttpBackendBuilder {
    endpoint: Option<String>,
    device_id: Option<String>,
    timeout: Option<Duration>,
}

impl HttpBackendBuilder {
    /// Set the collector endpoint (default: "http://localhost:3000/logData/").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the hardware identifier reported in the `"mac"` field
    /// (default: a zeroed address).
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the backend.
    pub fn build(self) -> HttpBackend {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        HttpBackend {
            client,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| "http://localhost:3000/logData/".to_string()),
            device_id: self
                .device_id
                .unwrap_or_else(|| "00:00:00:00:00:00".to_string()),
            state: LinkState::Disconnected,
        }
    }
}

/// Assemble the bulk payload: one string-valued field per channel, plus
/// the hardware identifier under `"mac"`.
pub fn bulk_payload(readings: &ReadingSet, device_id: &str) -> serde_json::Value {
    let mut fields = serde_json::Map::new();
    for (channel, value) in readings.iter() {
        fields.insert(
            channel.to_string(),
            serde_json::Value::String(format_value(value)),
        );
    }
    fields.insert(
        "mac".to_string(),
        serde_json::Value::String(device_id.to_string()),
    );
    serde_json::Value::Object(fields)
}
