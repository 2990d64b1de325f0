//! Connection state machine for delivery over an unreliable link.
//!
//! Delivery has two layers of connectivity: the network interface itself
//! and, for session-oriented backends, the message broker on top of it.
//! [`LinkManager`] tracks both through [`LinkState`] and exposes a single
//! operation, [`ensure_ready`](LinkManager::ensure_ready), that the node
//! calls at the start of every telemetry cycle.
//!
//! The manager never sleeps and never loops forever: a down network is
//! escalated immediately, and broker recovery is paced by the configured
//! [`RetryPolicy`] - either a bounded burst of attempts within one check,
//! or one attempt per check spaced a fixed delay apart. Waiting out that
//! delay is the caller's cycle cadence, not a blocking sleep, so the node
//! stays responsive to its maintenance task throughout an outage.

use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{DeliveryError, LinkError};

/// Connectivity of the delivery path, from interface to broker.
///
/// The broker states only apply to backends that hold a persistent
/// session; stateless backends never go past `NetworkConnected`.
/// `BrokerConnected` implies the network is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// The network interface is down.
    Disconnected,
    /// The network interface is coming back up.
    NetworkConnecting,
    /// The network is usable; no broker session is involved or up yet.
    NetworkConnected,
    /// A broker session is being established.
    BrokerConnecting,
    /// The broker session is live; publishing may proceed.
    BrokerConnected,
}

impl LinkState {
    /// Whether the network layer is usable in this state.
    pub fn network_up(self) -> bool {
        !matches!(self, LinkState::Disconnected | LinkState::NetworkConnecting)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::NetworkConnecting => "network connecting",
            LinkState::NetworkConnected => "network connected",
            LinkState::BrokerConnecting => "broker connecting",
            LinkState::BrokerConnected => "broker connected",
        };
        f.write_str(name)
    }
}

/// How broker connect attempts are paced and bounded.
///
/// The two policies fail differently on a dead broker: `Bounded` burns
/// its attempts in one readiness check and escalates, `UnboundedDelay`
/// keeps trying once per check forever and only ever reports progress.
/// Which one a node runs under is an explicit configuration choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Up to `ceiling` attempts per readiness check, then escalate.
    Bounded { ceiling: u32 },
    /// One attempt per readiness check, spaced at least `delay` apart,
    /// never escalating.
    UnboundedDelay { delay: Duration },
}

/// Outcome of a readiness check that did not escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Everything the backend needs is up; publishing may proceed.
    Ready,
    /// Broker recovery is in progress under [`RetryPolicy::UnboundedDelay`].
    ///
    /// `attempt` counts the attempts made so far in this outage and
    /// `retry_in` says how long until the next one is due. The cycle
    /// should skip publishing and try again next period.
    Deferred { attempt: u32, retry_in: Duration },
}

/// The network interface the node delivers over.
///
/// Production nodes put their Wi-Fi or Ethernet management behind this;
/// tests script it. Reconnection is deliberately blocking: the node only
/// asks for it after declaring the cycle lost.
#[async_trait]
pub trait NetworkLink: Send + Sync {
    /// Whether the link is currently usable.
    fn is_connected(&self) -> bool;

    /// Re-establish the link, returning once it is usable again.
    async fn reconnect(&mut self);

    /// Local address for diagnostics, when the link has one.
    fn local_ip(&self) -> Option<IpAddr> {
        None
    }
}

/// A persistent session with a message broker.
///
/// [`LinkManager`] drives this seam during readiness checks. The
/// `is_connected` answer must come from session-local bookkeeping, not
/// from the wire - a connected session is queried every cycle and that
/// query must cost nothing.
#[async_trait]
pub trait BrokerSession: Send {
    /// Whether the session currently holds a live connection.
    fn is_connected(&self) -> bool;

    /// Establish (or re-establish) the connection. One attempt only.
    async fn connect(&mut self) -> Result<(), DeliveryError>;

    /// Publish one payload to one topic.
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), DeliveryError>;
}

/// Connection state machine shared by session-oriented backends.
///
/// Owns the [`LinkState`], the per-outage attempt counter, and the retry
/// pacing. The counter resets whenever the machine enters
/// `BrokerConnecting` from some other state, so each fresh outage starts
/// a fresh round of attempts.
#[derive(Debug)]
pub struct LinkManager {
    state: LinkState,
    policy: RetryPolicy,
    attempts: u32,
    last_attempt: Option<Instant>,
}

impl LinkManager {
    /// Create a manager in the `Disconnected` state.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: LinkState::Disconnected,
            policy,
            attempts: 0,
            last_attempt: None,
        }
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Bring the delivery path as close to ready as this check allows.
    ///
    /// Checks the network first: a down link demotes the machine to
    /// `Disconnected` and escalates [`LinkError::NetworkUnavailable`]
    /// without touching the session. With the network up, a session that
    /// already reports connected is `Ready` at no cost. Otherwise the
    /// machine enters `BrokerConnecting` and runs connect attempts under
    /// the configured [`RetryPolicy`].
    pub async fn ensure_ready(
        &mut self,
        link: &dyn NetworkLink,
        session: &mut dyn BrokerSession,
    ) -> Result<Readiness, LinkError> {
        if !link.is_connected() {
            if self.state != LinkState::Disconnected {
                warn!("network link lost (was {})", self.state);
            }
            self.transition(LinkState::Disconnected);
            self.attempts = 0;
            self.last_attempt = None;
            return Err(LinkError::NetworkUnavailable);
        }

        if !self.state.network_up() {
            // The link collaborator blocks in reconnect() until the
            // interface is usable again, so the connecting hop resolves
            // within the same check.
            self.transition(LinkState::NetworkConnecting);
            self.transition(LinkState::NetworkConnected);
        }

        if session.is_connected() {
            if self.state != LinkState::BrokerConnected {
                self.transition(LinkState::BrokerConnected);
                self.attempts = 0;
                self.last_attempt = None;
            }
            return Ok(Readiness::Ready);
        }

        if self.state != LinkState::BrokerConnecting {
            self.transition(LinkState::BrokerConnecting);
            self.attempts = 0;
            self.last_attempt = None;
        }

        match self.policy {
            RetryPolicy::Bounded { ceiling } => self.connect_bounded(session, ceiling).await,
            RetryPolicy::UnboundedDelay { delay } => self.connect_spaced(session, delay).await,
        }
    }

    /// Run connect attempts until success or the ceiling, then escalate.
    async fn connect_bounded(
        &mut self,
        session: &mut dyn BrokerSession,
        ceiling: u32,
    ) -> Result<Readiness, LinkError> {
        while self.attempts < ceiling {
            self.attempts += 1;
            info!("connecting to broker (attempt {}/{})", self.attempts, ceiling);
            match session.connect().await {
                Ok(()) => {
                    info!("broker connected");
                    self.transition(LinkState::BrokerConnected);
                    self.attempts = 0;
                    return Ok(Readiness::Ready);
                }
                Err(err) => warn!("broker connect attempt {} failed: {}", self.attempts, err),
            }
        }

        let attempts = self.attempts;
        // Fall back to NetworkConnected so the next check starts a fresh round.
        self.transition(LinkState::NetworkConnected);
        self.attempts = 0;
        Err(LinkError::BrokerConnectionFailed { attempts })
    }

    /// Run at most one connect attempt, spaced `delay` from the last one.
    async fn connect_spaced(
        &mut self,
        session: &mut dyn BrokerSession,
        delay: Duration,
    ) -> Result<Readiness, LinkError> {
        if let Some(last) = self.last_attempt {
            let since = last.elapsed();
            if since < delay {
                return Ok(Readiness::Deferred {
                    attempt: self.attempts,
                    retry_in: delay - since,
                });
            }
        }

        self.attempts += 1;
        info!("connecting to broker (attempt {})", self.attempts);
        self.last_attempt = Some(Instant::now());
        match session.connect().await {
            Ok(()) => {
                info!("broker connected after {} attempts", self.attempts);
                self.transition(LinkState::BrokerConnected);
                self.attempts = 0;
                self.last_attempt = None;
                Ok(Readiness::Ready)
            }
            Err(err) => {
                warn!(
                    "broker connect attempt {} failed: {}, next attempt in {:?}",
                    self.attempts, err, delay
                );
                Ok(Readiness::Deferred {
                    attempt: self.attempts,
                    retry_in: delay,
                })
            }
        }
    }

    fn transition(&mut self, next: LinkState) {
        if self.state != next {
            debug!("link state {} -> {}", self.state, next);
            self.state = next;
        }
    }
}
