//! Simulated collaborators for running a node on a workstation.
//!
//! Everything here is deterministic: the sensors walk fixed triangle
//! waves, the link is always up, and the panel prints to stdout. A
//! simulated node exercises the whole delivery pipeline against a real
//! collector with no sensor hardware attached.

use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use tracing::trace;

use airpost_delivery::NetworkLink;
use airpost_types::{format_value, ReadingSet, CO2, HUMIDITY, PM10, PM25, PRESSURE, TEMPERATURE};

use crate::node::{StatusDisplay, UpdateService};
use crate::sensors::Sensor;

/// Deterministic sensor that walks a triangle wave above its base values.
pub struct SimulatedSensor {
    name: String,
    channels: Vec<&'static str>,
    bases: Vec<f64>,
    swing: f64,
    step: u64,
    dropout_every: Option<u64>,
}

impl SimulatedSensor {
    /// Create a sensor with one base value per channel. Each read answers
    /// `base + swing * wave` where the wave cycles 0 -> 1 -> 0 over
    /// sixteen reads.
    pub fn new(
        name: impl Into<String>,
        channels: Vec<&'static str>,
        bases: Vec<f64>,
        swing: f64,
    ) -> Self {
        Self {
            name: name.into(),
            channels,
            bases,
            swing,
            step: 0,
            dropout_every: None,
        }
    }

    /// Fail every `every`-th read, so the sentinel path gets exercised.
    pub fn with_dropouts(mut self, every: u64) -> Self {
        self.dropout_every = Some(every.max(1));
        self
    }

    /// Temperature, humidity and pressure, like a combined climate sensor.
    pub fn climate() -> Self {
        Self::new(
            "climate-sim",
            vec![TEMPERATURE, HUMIDITY, PRESSURE],
            vec![21.0, 45.0, 1012.0],
            2.5,
        )
    }

    /// Particulate matter in the 10 and 2.5 micrometre buckets.
    pub fn particulates() -> Self {
        Self::new("particulate-sim", vec![PM10, PM25], vec![12.0, 6.0], 4.0)
    }

    /// CO2 concentration.
    pub fn co2() -> Self {
        Self::new("co2-sim", vec![CO2], vec![600.0], 80.0)
    }
}

impl Sensor for SimulatedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn channels(&self) -> &[&'static str] {
        &self.channels
    }

    fn read(&mut self) -> Option<Vec<f64>> {
        self.step += 1;
        if let Some(every) = self.dropout_every {
            if self.step % every == 0 {
                return None;
            }
        }

        // Triangle wave over 16 reads: eight rising, eight falling.
        let phase = (self.step % 16) as f64;
        let wave = if phase < 8.0 {
            phase / 8.0
        } else {
            (16.0 - phase) / 8.0
        };
        Some(self.bases.iter().map(|base| base + self.swing * wave).collect())
    }
}

/// The full simulated suite covering every stock channel.
///
/// Dropouts, when asked for, go to the particulate sensor; it is the one
/// that fails in the field.
pub fn stock_sensors(dropout_every: Option<u64>) -> Vec<Box<dyn Sensor>> {
    let mut particulates = SimulatedSensor::particulates();
    if let Some(every) = dropout_every {
        particulates = particulates.with_dropouts(every);
    }
    vec![
        Box::new(SimulatedSensor::climate()),
        Box::new(particulates),
        Box::new(SimulatedSensor::co2()),
    ]
}

/// Always-up network link for workstation runs.
#[derive(Debug, Default)]
pub struct WorkstationLink;

#[async_trait]
impl NetworkLink for WorkstationLink {
    fn is_connected(&self) -> bool {
        true
    }

    async fn reconnect(&mut self) {}

    fn local_ip(&self) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

/// Status panel that prints to stdout, one panel line per console line.
#[derive(Debug, Default)]
pub struct ConsolePanel;

impl StatusDisplay for ConsolePanel {
    fn show_lines(&mut self, lines: &[String]) {
        for line in lines {
            println!("| {}", line);
        }
    }

    fn show_readings(&mut self, readings: &ReadingSet) {
        let summary = readings
            .iter()
            .map(|(channel, value)| format!("{} {}", channel, format_value(value)))
            .collect::<Vec<_>>()
            .join("  ");
        println!("[readings] {}", summary);
    }
}

/// Maintenance chore standing in for a firmware update poller.
///
/// Real deployments service their over-the-air update channel in this
/// slot; the simulated one counts iterations to prove the slot is never
/// starved.
#[derive(Debug, Default)]
pub struct UpdatePoller {
    ticks: u64,
}

impl UpdatePoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterations serviced so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl UpdateService for UpdatePoller {
    fn tick(&mut self) {
        self.ticks += 1;
        // 12k ticks is one minute at the default 5ms tick.
        if self.ticks % 12_000 == 0 {
            trace!("update poller alive at {} ticks", self.ticks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_reads_are_deterministic() {
        let mut first = SimulatedSensor::climate();
        let mut second = SimulatedSensor::climate();

        for _ in 0..40 {
            assert_eq!(first.read(), second.read());
        }
    }

    #[test]
    fn simulated_values_stay_within_the_swing_band() {
        let mut sensor = SimulatedSensor::co2();
        for _ in 0..50 {
            let value = sensor.read().unwrap()[0];
            assert!((600.0..=680.0).contains(&value), "out of band: {}", value);
        }
    }

    #[test]
    fn dropouts_happen_on_schedule() {
        let mut sensor = SimulatedSensor::particulates().with_dropouts(4);
        let outcomes: Vec<bool> = (0..8).map(|_| sensor.read().is_some()).collect();
        assert_eq!(
            outcomes,
            vec![true, true, true, false, true, true, true, false]
        );
    }

    #[test]
    fn stock_suite_covers_every_stock_channel() {
        let sensors = stock_sensors(None);
        let mut covered: Vec<&str> = sensors
            .iter()
            .flat_map(|sensor| sensor.channels().iter().copied())
            .collect();
        covered.sort_unstable();

        let mut stock = airpost_types::STOCK_CHANNELS.to_vec();
        stock.sort_unstable();

        assert_eq!(covered, stock);
    }

    #[test]
    fn update_poller_counts_every_tick() {
        let mut poller = UpdatePoller::new();
        for _ in 0..7 {
            poller.tick();
        }
        assert_eq!(poller.ticks(), 7);
    }
}
