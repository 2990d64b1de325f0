//! # airpost
//!
//! A resilient telemetry node runtime for environmental air-quality
//! sensing. A node samples a fixed set of channels every period, ships
//! the readings to a collector over HTTP or MQTT, and survives network
//! loss, broker outages and dead sensors without ever blocking the
//! loop that keeps its maintenance chores alive.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        TelemetryNode                         │
//! │  ┌─────────┐   ┌────────────┐   ┌─────────────────────────┐  │
//! │  │ sensors │──▶│ ReadingSet │──▶│ DeliveryBackend         │  │
//! │  │ (seam)  │   │ (schema)   │   │  HttpBackend (bulk)     │  │
//! │  └─────────┘   └────────────┘   │  MqttBackend (per feed) │  │
//! │       │                         └───────────┬─────────────┘  │
//! │       ▼                                     ▼                │
//! │  ┌─────────┐   ┌────────────┐   ┌─────────────────────────┐  │
//! │  │ report  │──▶│ display    │   │ LinkManager (state)     │  │
//! │  │ (lines) │   │ (panel)    │   │  network ─▶ broker      │  │
//! │  └─────────┘   └────────────┘   └─────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`node`]**: The cooperative loop - maintenance every tick, one
//!   telemetry cycle per period, fault handling between them
//! - **[`sensors`]**: The [`Sensor`] seam and per-cycle sampling into
//!   the reading set, with per-sensor failure sentinels
//! - **[`config`]**: File-plus-environment configuration and the
//!   [`build_backend`] factory
//! - **[`fault`]**: The [`CycleFault`] taxonomy; only configuration
//!   faults halt the node
//! - **[`report`]**: Pure renderers turning faults into short panel
//!   diagnostics
//! - **[`sim`]**: Deterministic sensors and collaborators for running a
//!   node on a workstation
//!
//! The wire formats and the connection state machine live in the
//! `airpost-delivery` crate; the reading-set schema lives in
//! `airpost-types`.
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # HTTP delivery to a local collector, defaults throughout
//! airpost
//!
//! # MQTT delivery per a config file, failing the particulate
//! # sensor every 7th read
//! airpost --config node.toml --dropouts 7
//! ```
//!
//! ### As a library
//!
//! ```
//! use airpost::node::TelemetryNode;
//! use airpost::sim::{stock_sensors, ConsolePanel, UpdatePoller, WorkstationLink};
//! use airpost_delivery::http::HttpBackend;
//! use airpost_types::ReadingSet;
//!
//! let backend = HttpBackend::builder()
//!     .endpoint("http://collector.local:3000/logData/")
//!     .device_id("24:6F:28:AE:52:7C")
//!     .build();
//!
//! let node = TelemetryNode::new(
//!     ReadingSet::stock(),
//!     stock_sensors(None),
//!     Box::new(backend),
//!     Box::new(WorkstationLink::default()),
//!     Box::new(ConsolePanel::default()),
//!     Box::new(UpdatePoller::new()),
//! );
//! ```

pub mod config;
pub mod fault;
pub mod node;
pub mod report;
pub mod sensors;
pub mod sim;

// Re-export main types for convenience
pub use config::{build_backend, BackendKind, NodeConfig};
pub use fault::CycleFault;
pub use node::{StatusDisplay, TelemetryNode, UpdateService};
pub use sensors::Sensor;
