//! The telemetry node: one cooperative loop around sampling, delivery
//! and maintenance.
//!
//! The loop has a single cadence rule: every iteration services the
//! maintenance chore, and every `period / tick` iterations it runs one
//! telemetry cycle. Waiting between cycles is counting ticks, never a
//! blocking sleep, so an outage on the delivery side cannot starve
//! maintenance.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use airpost_delivery::{DeliveryBackend, NetworkLink, Readiness};
use airpost_types::ReadingSet;

use crate::fault::CycleFault;
use crate::report::{self, LinkReport};
use crate::sensors::{self, Sensor};

/// Default loop tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(5);

/// Default telemetry period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(15);

/// Where the node shows its status: readings after a delivered cycle,
/// diagnostic lines after a lost one.
pub trait StatusDisplay: Send {
    /// Show diagnostic lines, replacing whatever the panel held.
    fn show_lines(&mut self, lines: &[String]);

    /// Show the latest reading set after a successful delivery.
    fn show_readings(&mut self, readings: &ReadingSet);
}

/// A maintenance chore serviced once per loop iteration, cycle or not.
///
/// Firmware nodes keep their over-the-air update channel responsive
/// through this slot. The contract is "called once per iteration, never
/// starved", so implementations must return promptly.
pub trait UpdateService: Send {
    /// Service the chore.
    fn tick(&mut self);
}

/// What a telemetry cycle that did not fault accomplished.
enum CycleOutcome {
    Delivered,
    Deferred { attempt: u32, retry_in: Duration },
}

/// One telemetry node: a reading set, the sensors that fill it, a
/// delivery backend, and the collaborators around them.
///
/// The node owns all of its state and runs single-tasked; collaborators
/// are trait objects handed over at construction and driven by
/// reference, so nothing here is global or shared.
pub struct TelemetryNode {
    readings: ReadingSet,
    sensors: Vec<Box<dyn Sensor>>,
    backend: Box<dyn DeliveryBackend>,
    link: Box<dyn NetworkLink>,
    display: Box<dyn StatusDisplay>,
    updater: Box<dyn UpdateService>,
    hostname: String,
    tick: Duration,
    period: Duration,
    ticks_per_cycle: u32,
    ticks_until_cycle: u32,
    halted: Option<String>,
}

impl TelemetryNode {
    /// Assemble a node from its parts. Cadence defaults to a 5ms tick
    /// and a 15 second period; override with [`with_cadence`].
    ///
    /// [`with_cadence`]: TelemetryNode::with_cadence
    pub fn new(
        readings: ReadingSet,
        sensors: Vec<Box<dyn Sensor>>,
        backend: Box<dyn DeliveryBackend>,
        link: Box<dyn NetworkLink>,
        display: Box<dyn StatusDisplay>,
        updater: Box<dyn UpdateService>,
    ) -> Self {
        let mut node = Self {
            readings,
            sensors,
            backend,
            link,
            display,
            updater,
            hostname: "airpost-node".to_string(),
            tick: DEFAULT_TICK,
            period: DEFAULT_PERIOD,
            ticks_per_cycle: 1,
            ticks_until_cycle: 0,
            halted: None,
        };
        node.set_cadence(DEFAULT_TICK, DEFAULT_PERIOD);
        node
    }

    /// Set the loop tick and the telemetry period.
    ///
    /// The period is measured in elapsed ticks, so it rounds down to a
    /// whole number of them, with a floor of one tick per cycle.
    pub fn with_cadence(mut self, tick: Duration, period: Duration) -> Self {
        self.set_cadence(tick, period);
        self
    }

    /// Set the hostname shown in outage diagnostics.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    fn set_cadence(&mut self, tick: Duration, period: Duration) {
        let tick = if tick.is_zero() { DEFAULT_TICK } else { tick };
        self.tick = tick;
        self.period = period;
        self.ticks_per_cycle = (period.as_millis() / tick.as_millis()).max(1) as u32;
        // The first service call runs a cycle straight away.
        self.ticks_until_cycle = 0;
    }

    /// Bind the backend to the reading schema. A rejection halts
    /// telemetry before the first cycle ever runs.
    pub fn initialize(&mut self) {
        if self.halted.is_some() {
            return;
        }
        if let Err(err) = self.backend.initialize(&self.readings) {
            error!("backend rejected the configuration: {}", err);
            self.halt(err.to_string());
        }
    }

    /// Whether telemetry is halted by a configuration fault.
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// The reading set as of the last sample.
    pub fn readings(&self) -> &ReadingSet {
        &self.readings
    }

    /// One loop iteration: service maintenance, then run a telemetry
    /// cycle if one is due.
    pub async fn service(&mut self) {
        // Maintenance first, every iteration, whatever the cycle does.
        self.updater.tick();

        if self.ticks_until_cycle == 0 {
            self.ticks_until_cycle = self.ticks_per_cycle;
            self.run_cycle().await;
        }
        self.ticks_until_cycle -= 1;
    }

    /// Drive the node forever on its tick.
    pub async fn run(&mut self) {
        self.initialize();
        info!(
            "node up: {} -> {} every {:?} ({} ticks of {:?})",
            self.backend.identity(),
            self.backend.endpoint(),
            self.period,
            self.ticks_per_cycle,
            self.tick
        );

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.service().await;
        }
    }

    async fn run_cycle(&mut self) {
        if let Some(reason) = &self.halted {
            // Keep the fault on the panel; deliver nothing.
            let lines = report::configuration_halt(reason);
            self.display.show_lines(&lines);
            return;
        }

        sensors::sample_into(&mut self.readings, &mut self.sensors);
        debug!("sampled {:?}", self.readings);

        match self.deliver().await {
            Ok(CycleOutcome::Delivered) => {
                info!(
                    "delivered {} channels to {}",
                    self.readings.len(),
                    self.backend.endpoint()
                );
                self.display.show_readings(&self.readings);
            }
            Ok(CycleOutcome::Deferred { attempt, retry_in }) => {
                info!(
                    "broker recovery attempt {} pending, next in {:?}",
                    attempt, retry_in
                );
                let lines = self.outage_lines(retry_in);
                self.display.show_lines(&lines);
            }
            Err(fault) => self.report_fault(fault).await,
        }
    }

    async fn deliver(&mut self) -> Result<CycleOutcome, CycleFault> {
        match self.backend.ensure_ready(self.link.as_ref()).await? {
            Readiness::Ready => {
                self.backend.publish(&self.readings).await?;
                Ok(CycleOutcome::Delivered)
            }
            Readiness::Deferred { attempt, retry_in } => {
                Ok(CycleOutcome::Deferred { attempt, retry_in })
            }
        }
    }

    async fn report_fault(&mut self, fault: CycleFault) {
        warn!("cycle lost: {}", fault);
        match fault {
            CycleFault::NetworkUnavailable => {
                let lines = report::network_lost();
                self.display.show_lines(&lines);
                // The cycle is already lost; wait out the interface here.
                self.link.reconnect().await;
            }
            CycleFault::BrokerConnectionFailed { .. } => {
                let lines = self.outage_lines(self.period);
                self.display.show_lines(&lines);
            }
            CycleFault::PublishFailed(err) => {
                let lines = report::publish_failed(&err, self.backend.endpoint(), self.period);
                self.display.show_lines(&lines);
            }
            CycleFault::Configuration(reason) => {
                error!("configuration fault, halting telemetry: {}", reason);
                self.halt(reason);
            }
        }
    }

    fn halt(&mut self, reason: String) {
        let lines = report::configuration_halt(&reason);
        self.display.show_lines(&lines);
        self.halted = Some(reason);
    }

    fn outage_lines(&self, retry_in: Duration) -> Vec<String> {
        report::broker_unreachable(&LinkReport {
            local_ip: self.link.local_ip(),
            hostname: &self.hostname,
            network_up: self.link.is_connected(),
            endpoint: self.backend.endpoint(),
            identity: self.backend.identity(),
            retry_in,
        })
    }
}
