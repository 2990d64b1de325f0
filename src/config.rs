//! Node configuration and the delivery backend factory.
//!
//! Configuration stacks an optional TOML file under `AIRPOST`-prefixed
//! environment overrides. A minimal file for HTTP delivery:
//!
//! ```toml
//! [node]
//! device_id = "24:6F:28:AE:52:7C"
//! period_secs = 15
//!
//! [http]
//! endpoint = "http://collector.local:3000/logData/"
//! ```
//!
//! and for MQTT, where the broker retry mode is a required choice:
//!
//! ```toml
//! backend = "mqtt"
//!
//! [mqtt]
//! host = "io.adafruit.com"
//! account = "my-account"
//! key = "aio-key"
//!
//! [mqtt.retry]
//! mode = "bounded"
//! ceiling = 5
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use airpost_delivery::http::HttpBackend;
use airpost_delivery::mqtt::MqttBackend;
use airpost_delivery::{DeliveryBackend, RetryPolicy};

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub http: HttpSection,
    #[serde(default)]
    pub mqtt: Option<MqttSection>,
}

/// Identity and cadence of the node itself.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    /// Hardware identifier reported with every delivery.
    #[serde(default = "default_device_id")]
    pub device_id: String,
    /// Hostname shown in outage diagnostics.
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Telemetry period in seconds.
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    /// Loop tick in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

/// Which delivery backend the node runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Http,
    Mqtt,
}

/// Settings for bulk HTTP delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_http_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for per-channel MQTT delivery.
///
/// `account` doubles as the MQTT username and the first topic segment
/// of every feed. The `retry` table has no default on purpose: a node
/// states whether it wants a bounded burst or spaced, endless retries.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttSection {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub account: String,
    pub key: String,
    #[serde(default)]
    pub retry: Option<RetrySection>,
}

/// The broker retry choice.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    pub mode: RetryMode,
    /// Attempt ceiling; required when `mode = "bounded"`.
    #[serde(default)]
    pub ceiling: Option<u32>,
    /// Spacing between attempts; required when `mode = "unbounded"`.
    #[serde(default)]
    pub delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    Bounded,
    Unbounded,
}

fn default_device_id() -> String {
    "00:00:00:00:00:00".to_string()
}

fn default_hostname() -> String {
    "airpost-node".to_string()
}

fn default_period_secs() -> u64 {
    15
}

fn default_tick_ms() -> u64 {
    5
}

fn default_http_endpoint() -> String {
    "http://localhost:3000/logData/".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            hostname: default_hostname(),
            period_secs: default_period_secs(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            endpoint: default_http_endpoint(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl RetrySection {
    /// Resolve the section into a policy, validating the mode's fields.
    pub fn policy(&self) -> Result<RetryPolicy> {
        match self.mode {
            RetryMode::Bounded => {
                let ceiling = self
                    .ceiling
                    .context("bounded retry needs a ceiling")?;
                if ceiling == 0 {
                    bail!("bounded retry ceiling must be at least 1");
                }
                Ok(RetryPolicy::Bounded { ceiling })
            }
            RetryMode::Unbounded => {
                let delay_secs = self
                    .delay_secs
                    .context("unbounded retry needs delay_secs")?;
                Ok(RetryPolicy::UnboundedDelay {
                    delay: Duration::from_secs(delay_secs),
                })
            }
        }
    }
}

impl NodeConfig {
    /// Load configuration from an optional TOML file plus the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings = builder
            .add_source(Environment::with_prefix("AIRPOST").separator("__"))
            .build()
            .context("loading configuration")?;

        let config: NodeConfig = settings
            .try_deserialize()
            .context("parsing configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.node.period_secs == 0 {
            bail!("node.period_secs must be at least 1");
        }
        if self.node.tick_ms == 0 {
            bail!("node.tick_ms must be at least 1");
        }
        if self.backend == BackendKind::Mqtt && self.mqtt.is_none() {
            bail!("backend = \"mqtt\" needs an [mqtt] section");
        }
        Ok(())
    }

    /// Loop tick as a duration.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.node.tick_ms)
    }

    /// Telemetry period as a duration.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.node.period_secs)
    }
}

/// Build the configured delivery backend.
pub fn build_backend(config: &NodeConfig) -> Result<Box<dyn DeliveryBackend>> {
    match config.backend {
        BackendKind::Http => {
            let backend = HttpBackend::builder()
                .endpoint(config.http.endpoint.clone())
                .device_id(config.node.device_id.clone())
                .timeout(Duration::from_secs(config.http.timeout_secs))
                .build();
            Ok(Box::new(backend))
        }
        BackendKind::Mqtt => {
            let mqtt = config
                .mqtt
                .as_ref()
                .context("backend = \"mqtt\" needs an [mqtt] section")?;
            let retry = mqtt.retry.as_ref().context(
                "[mqtt] needs a retry table: choose mode = \"bounded\" or \"unbounded\"",
            )?;
            let backend = MqttBackend::builder()
                .host(mqtt.host.clone())
                .port(mqtt.port)
                .credentials(mqtt.account.clone(), mqtt.key.clone())
                .retry(retry.policy()?)
                .build()?;
            Ok(Box::new(backend))
        }
    }
}
