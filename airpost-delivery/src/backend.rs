//! The delivery seam between the node and its transport.

use async_trait::async_trait;

use airpost_types::ReadingSet;

use crate::error::{DeliveryError, LinkError};
use crate::link::{LinkState, NetworkLink, Readiness};

/// A transport that can deliver a complete reading set to a collector.
///
/// A node picks one backend at startup and drives it through the same
/// three calls for the rest of its life: [`initialize`] once with the
/// final reading-set schema, then [`ensure_ready`] and [`publish`] every
/// telemetry cycle. Swapping collector infrastructure means swapping the
/// backend, nothing else.
///
/// [`initialize`]: DeliveryBackend::initialize
/// [`ensure_ready`]: DeliveryBackend::ensure_ready
/// [`publish`]: DeliveryBackend::publish
#[async_trait]
pub trait DeliveryBackend: Send {
    /// Bind the backend to the reading-set schema.
    ///
    /// Called once, before the first cycle, with the channel set the node
    /// will report for its whole lifetime. Settings the backend cannot
    /// work with surface here as [`DeliveryError::Configuration`]; the
    /// node treats that as fatal.
    fn initialize(&mut self, readings: &ReadingSet) -> Result<(), DeliveryError>;

    /// Check, and where possible restore, readiness to publish.
    ///
    /// Called at the start of every cycle. Escalations come back as
    /// [`LinkError`]; a healthy path answers [`Readiness::Ready`] without
    /// any network traffic.
    async fn ensure_ready(&mut self, link: &dyn NetworkLink) -> Result<Readiness, LinkError>;

    /// Deliver the reading set.
    ///
    /// One shot - pacing and retry both belong to the cycle cadence, not
    /// to the backend.
    async fn publish(&mut self, readings: &ReadingSet) -> Result<(), DeliveryError>;

    /// Remote endpoint identity, for diagnostics.
    fn endpoint(&self) -> &str;

    /// The account or device identity the backend publishes as.
    fn identity(&self) -> &str;

    /// Current link state, for diagnostics.
    fn link_state(&self) -> LinkState;
}
