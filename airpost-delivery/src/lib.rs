//! # airpost-delivery
//!
//! Delivery backends and link management for airpost telemetry nodes.
//!
//! A node samples its sensors into a [`ReadingSet`] and hands it to a
//! [`DeliveryBackend`]; this crate provides the two stock backends and the
//! connection state machine that keeps them deliverable over an unreliable
//! wireless link.
//!
//! ## Supported Transports
//!
//! - **HTTP** (`http` feature) - Posts the whole reading set to a collector
//!   as a single JSON object
//! - **MQTT** (`mqtt` feature) - Publishes each channel to its own feed
//!   topic over a persistent broker session
//!
//! ## Quick Start (HTTP)
//!
//! ```rust,no_run
//! use airpost_delivery::http::HttpBackend;
//! use airpost_delivery::DeliveryBackend;
//! use airpost_types::ReadingSet;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut readings = ReadingSet::stock();
//!     readings.set("temperature", 21.5);
//!
//!     let mut backend = HttpBackend::builder()
//!         .endpoint("http://collector.local:3000/logData/")
//!         .device_id("24:6F:28:AE:52:7C")
//!         .build();
//!
//!     backend.initialize(&readings)?;
//!     backend.publish(&readings).await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod link;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use backend::DeliveryBackend;
pub use error::{DeliveryError, LinkError};
pub use link::{BrokerSession, LinkManager, LinkState, NetworkLink, Readiness, RetryPolicy};

// Re-export types for convenience
pub use airpost_types::{ReadingSet, SENTINEL};
