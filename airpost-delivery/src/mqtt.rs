//! Per-channel MQTT delivery to feed topics.
//!
//! Each channel publishes to its own feed under the configured account,
//! `<account>/feeds/<channel>` with the channel name lowercased, and the
//! payload is the two-decimal value text. Publishes are QoS 0: readings
//! recur every cycle, so a lost sample costs nothing.
//!
//! Unlike the HTTP flavour this backend holds a persistent broker
//! session, so its readiness check runs the full [`LinkManager`] state
//! machine: network gate, session check, and policy-paced broker
//! reconnects.
//!
//! ## Example
//!
//! ```rust,no_run
//! use airpost_delivery::mqtt::MqttBackend;
//! use airpost_delivery::{DeliveryBackend, RetryPolicy};
//! use airpost_types::ReadingSet;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut backend = MqttBackend::builder()
//!         .host("io.adafruit.com")
//!         .credentials("my-account", "aio-key")
//!         .retry(RetryPolicy::Bounded { ceiling: 5 })
//!         .build()?;
//!
//!     backend.initialize(&ReadingSet::stock())?;
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tracing::{debug, info};

use airpost_types::{format_value, ReadingSet};

use crate::backend::DeliveryBackend;
use crate::error::{DeliveryError, LinkError};
use crate::link::{BrokerSession, LinkManager, LinkState, NetworkLink, Readiness, RetryPolicy};

/// Production broker session over rumqttc.
///
/// A connect attempt builds a fresh client and drives its event loop
/// until the broker acknowledges the session (or the attempt times out).
/// Connection loss is noticed lazily: a failed publish drops the session
/// and the next readiness check reconnects.
pub struct RumqttSession {
    options: MqttOptions,
    attempt_timeout: Duration,
    live: Option<(AsyncClient, EventLoop)>,
    connected: bool,
}

impl RumqttSession {
    /// Create a session for the given broker and credentials.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        account: &str,
        key: &str,
        attempt_timeout: Duration,
    ) -> Self {
        let mut options = MqttOptions::new(format!("airpost-{}", account), host, port);
        if !account.is_empty() {
            options.set_credentials(account, key);
        }
        options.set_keep_alive(Duration::from_secs(30));

        Self {
            options,
            attempt_timeout,
            live: None,
            connected: false,
        }
    }

    async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), DeliveryError> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return if ack.code == ConnectReturnCode::Success {
                        Ok(())
                    } else {
                        Err(DeliveryError::Transient {
                            reason: format!("broker refused session: {:?}", ack.code),
                        })
                    };
                }
                Ok(_) => continue,
                Err(err) => {
                    return Err(DeliveryError::Transient {
                        reason: err.to_string(),
                    })
                }
            }
        }
    }

    /// Drive the event loop until the enqueued publish has gone out.
    async fn flush_publish(
        eventloop: &mut EventLoop,
        topic: &str,
    ) -> Result<(), DeliveryError> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Publish(_))) => return Ok(()),
                Ok(_) => continue,
                Err(err) => {
                    return Err(DeliveryError::Fatal {
                        reason: format!("publish to '{}' failed: {}", topic, err),
                        status: None,
                    })
                }
            }
        }
    }
}

#[async_trait]
impl BrokerSession for RumqttSession {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), DeliveryError> {
        self.live = None;
        self.connected = false;

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), 16);
        let outcome =
            tokio::time::timeout(self.attempt_timeout, Self::wait_for_connack(&mut eventloop))
                .await;

        match outcome {
            Ok(Ok(())) => {
                self.live = Some((client, eventloop));
                self.connected = true;
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(DeliveryError::Transient {
                reason: format!("broker connect timed out after {:?}", self.attempt_timeout),
            }),
        }
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), DeliveryError> {
        let outcome = match self.live.as_mut() {
            Some((client, eventloop)) => {
                match client.publish(topic, QoS::AtMostOnce, false, payload).await {
                    Ok(()) => {
                        tokio::time::timeout(
                            self.attempt_timeout,
                            Self::flush_publish(eventloop, topic),
                        )
                        .await
                        .unwrap_or_else(|_| {
                            Err(DeliveryError::Fatal {
                                reason: format!("publish to '{}' timed out", topic),
                                status: None,
                            })
                        })
                    }
                    Err(err) => Err(DeliveryError::Fatal {
                        reason: format!("publish to '{}' failed: {}", topic, err),
                        status: None,
                    }),
                }
            }
            None => Err(DeliveryError::Fatal {
                reason: "no live broker session".to_string(),
                status: None,
            }),
        };

        if outcome.is_err() {
            // Drop the session; the next readiness check reconnects.
            self.live = None;
            self.connected = false;
        }
        outcome
    }
}

impl fmt::Debug for RumqttSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RumqttSession")
            .field("connected", &self.connected)
            .finish()
    }
}

/// Backend that publishes each channel to its own feed topic.
pub struct MqttBackend {
    session: Box<dyn BrokerSession>,
    manager: LinkManager,
    account: String,
    endpoint: String,
    feeds: BTreeMap<String, String>,
}

impl MqttBackend {
    /// Create a new builder for configuring the backend.
    pub fn builder() -> MqttBackendBuilder {
        MqttBackendBuilder::default()
    }
}

#[async_trait]
impl DeliveryBackend for MqttBackend {
    fn initialize(&mut self, readings: &ReadingSet) -> Result<(), DeliveryError> {
        if self.account.is_empty() {
            return Err(DeliveryError::Configuration {
                reason: "feed account is empty".to_string(),
            });
        }

        self.feeds = readings
            .channels()
            .map(|channel| (channel.to_string(), feed_topic(&self.account, channel)))
            .collect();

        info!(
            "mqtt delivery ready: {} feeds under '{}' at {}",
            self.feeds.len(),
            self.account,
            self.endpoint
        );
        Ok(())
    }

    async fn ensure_ready(&mut self, link: &dyn NetworkLink) -> Result<Readiness, LinkError> {
        self.manager.ensure_ready(link, self.session.as_mut()).await
    }

    async fn publish(&mut self, readings: &ReadingSet) -> Result<(), DeliveryError> {
        for (channel, value) in readings.iter() {
            let topic = self
                .feeds
                .get(channel)
                .ok_or_else(|| DeliveryError::Configuration {
                    reason: format!("no feed bound for channel '{}'", channel),
                })?;

            let payload = format_value(value);
            if let Err(err) = self.session.publish(topic, &payload).await {
                return Err(DeliveryError::Fatal {
                    reason: format!("channel '{}': {}", channel, err),
                    status: None,
                });
            }
        }

        debug!("published {} channels to {}", readings.len(), self.endpoint);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn identity(&self) -> &str {
        &self.account
    }

    fn link_state(&self) -> LinkState {
        self.manager.state()
    }
}

impl fmt::Debug for MqttBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttBackend")
            .field("endpoint", &self.endpoint)
            .field("account", &self.account)
            .field("state", &self.manager.state())
            .finish()
    }
}

/// Builder for MqttBackend.
#[derive(Default)]
pub struct MqttBackendBuilder {
    host: Option<String>,
    port: Option<u16>,
    account: Option<String>,
    key: Option<String>,
    retry: Option<RetryPolicy>,
    attempt_timeout: Option<Duration>,
    session: Option<Box<dyn BrokerSession>>,
}

impl MqttBackendBuilder {
    /// Set the broker host (default: "localhost").
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the broker port (default: 1883).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the feed account and its key.
    ///
    /// The account doubles as the MQTT username and the first topic
    /// segment of every feed.
    pub fn credentials(mut self, account: impl Into<String>, key: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self.key = Some(key.into());
        self
    }

    /// Choose how broker connect attempts are paced and bounded.
    ///
    /// There is no default: a node must state whether it wants a bounded
    /// burst or spaced, unbounded retries.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Set the per-attempt timeout for connects and publishes
    /// (default: 10 seconds).
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Replace the broker session. Tests use this to script the broker.
    pub fn session(mut self, session: Box<dyn BrokerSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Build the backend.
    pub fn build(self) -> Result<MqttBackend, DeliveryError> {
        let policy = self.retry.ok_or_else(|| DeliveryError::Configuration {
            reason: "no retry policy chosen for broker connects".to_string(),
        })?;

        let host = self.host.unwrap_or_else(|| "localhost".to_string());
        let port = self.port.unwrap_or(1883);
        let account = self.account.unwrap_or_default();
        let key = self.key.unwrap_or_default();
        let attempt_timeout = self.attempt_timeout.unwrap_or(Duration::from_secs(10));
        let endpoint = format!("{}:{}", host, port);

        let session = match self.session {
            Some(session) => session,
            None => Box::new(RumqttSession::new(host, port, &account, &key, attempt_timeout)),
        };

        Ok(MqttBackend {
            session,
            manager: LinkManager::new(policy),
            account,
            endpoint,
            feeds: BTreeMap::new(),
        })
    }
}

/// Feed topic for a channel: `<account>/feeds/<channel>`, lowercased.
fn feed_topic(account: &str, channel: &str) -> String {
    format!("{}/feeds/{}", account, channel.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    struct FakeLink {
        up: bool,
    }

    #[async_trait]
    impl NetworkLink for FakeLink {
        fn is_connected(&self) -> bool {
            self.up
        }

        async fn reconnect(&mut self) {
            self.up = true;
        }
    }

    /// Scripted session that records publishes and can fail the nth one.
    ///
    /// The log lives behind an Arc so a test can keep a handle after the
    /// session moves into the backend.
    struct RecordingSession {
        connected: bool,
        fail_on: Option<usize>,
        published: Arc<Mutex<Vec<(String, String)>>>,
        connects: Arc<Mutex<u32>>,
    }

    impl RecordingSession {
        fn live() -> Self {
            Self {
                connected: true,
                fail_on: None,
                published: Arc::default(),
                connects: Arc::default(),
            }
        }

        fn failing_at(n: usize) -> Self {
            Self {
                fail_on: Some(n),
                ..Self::live()
            }
        }
    }

    #[async_trait]
    impl BrokerSession for RecordingSession {
        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn connect(&mut self) -> Result<(), DeliveryError> {
            *self.connects.lock().unwrap() += 1;
            self.connected = true;
            Ok(())
        }

        async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), DeliveryError> {
            let mut published = self.published.lock().unwrap();
            published.push((topic.to_string(), payload.to_string()));
            if self.fail_on == Some(published.len()) {
                return Err(DeliveryError::Transient {
                    reason: "write error".to_string(),
                });
            }
            Ok(())
        }
    }

    fn backend_with(session: RecordingSession) -> MqttBackend {
        MqttBackend::builder()
            .host("broker.local")
            .credentials("acct", "key")
            .retry(RetryPolicy::Bounded { ceiling: 5 })
            .session(Box::new(session))
            .build()
            .unwrap()
    }

    fn scenario_readings() -> ReadingSet {
        let mut readings = ReadingSet::stock();
        readings.set("temperature", 21.5);
        readings.set("humidity", 55.2);
        readings.set("pressure", 1013.0);
        readings.set("pm10", 10.0);
        readings.set("pm25", 5.0);
        readings.set("CO2", 420.0);
        readings
    }

    #[test]
    fn feed_topic_lowercases_the_channel() {
        assert_eq!(feed_topic("acct", "CO2"), "acct/feeds/co2");
        assert_eq!(feed_topic("acct", "pm25"), "acct/feeds/pm25");
        assert_eq!(feed_topic("acct", "temperature"), "acct/feeds/temperature");
    }

    #[test]
    fn test_builder_custom() {
        let backend = backend_with(RecordingSession::live());
        assert_eq!(backend.endpoint(), "broker.local:1883");
        assert_eq!(backend.link_state(), LinkState::Disconnected);
    }

    #[test]
    fn builder_requires_a_retry_policy() {
        let err = MqttBackend::builder()
            .host("broker.local")
            .credentials("acct", "key")
            .build()
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Configuration { .. }));
    }

    #[test]
    fn initialize_binds_a_feed_per_channel() {
        let mut backend = backend_with(RecordingSession::live());
        backend.initialize(&ReadingSet::stock()).unwrap();

        assert_eq!(backend.feeds.len(), 6);
        assert_eq!(backend.feeds["CO2"], "acct/feeds/co2");
        assert_eq!(backend.feeds["temperature"], "acct/feeds/temperature");
    }

    #[test]
    fn initialize_rejects_an_empty_account() {
        let mut backend = MqttBackend::builder()
            .retry(RetryPolicy::Bounded { ceiling: 5 })
            .session(Box::new(RecordingSession::live()))
            .build()
            .unwrap();

        let err = backend.initialize(&ReadingSet::stock()).unwrap_err();
        assert!(matches!(err, DeliveryError::Configuration { .. }));
    }

    #[tokio::test]
    async fn publish_sends_every_channel_to_its_feed() {
        let session = RecordingSession::live();
        let published = session.published.clone();
        let mut backend = backend_with(session);

        let readings = scenario_readings();
        backend.initialize(&readings).unwrap();
        backend.publish(&readings).await.unwrap();

        assert_eq!(
            *published.lock().unwrap(),
            vec![
                ("acct/feeds/co2".to_string(), "420.00".to_string()),
                ("acct/feeds/humidity".to_string(), "55.20".to_string()),
                ("acct/feeds/pm10".to_string(), "10.00".to_string()),
                ("acct/feeds/pm25".to_string(), "5.00".to_string()),
                ("acct/feeds/pressure".to_string(), "1013.00".to_string()),
                ("acct/feeds/temperature".to_string(), "21.50".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn publish_stops_at_the_first_failing_channel() {
        let session = RecordingSession::failing_at(3);
        let published = session.published.clone();
        let mut backend = backend_with(session);

        let readings = scenario_readings();
        backend.initialize(&readings).unwrap();
        let err = backend.publish(&readings).await.unwrap_err();

        // Channels go out in set order, so the third feed is pm10.
        assert!(err.to_string().contains("pm10"), "got: {}", err);
        assert_eq!(published.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn publish_without_initialize_is_a_configuration_fault() {
        let mut backend = backend_with(RecordingSession::live());
        let err = backend.publish(&scenario_readings()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Configuration { .. }));
    }

    #[tokio::test]
    async fn a_live_session_is_ready_without_connecting() {
        let session = RecordingSession::live();
        let connects = session.connects.clone();
        let mut backend = backend_with(session);
        let link = FakeLink { up: true };

        let readiness = backend.ensure_ready(&link).await.unwrap();

        assert_eq!(readiness, Readiness::Ready);
        assert_eq!(backend.link_state(), LinkState::BrokerConnected);
        assert_eq!(*connects.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn a_down_link_escalates_before_touching_the_broker() {
        let session = RecordingSession::live();
        let connects = session.connects.clone();
        let mut backend = backend_with(session);
        let link = FakeLink { up: false };

        let err = backend.ensure_ready(&link).await.unwrap_err();

        assert_eq!(err, LinkError::NetworkUnavailable);
        assert_eq!(backend.link_state(), LinkState::Disconnected);
        assert_eq!(*connects.lock().unwrap(), 0);
    }
}
