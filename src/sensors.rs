//! The sensor seam and per-cycle sampling.

use tracing::{debug, warn};

use airpost_types::ReadingSet;

/// One physical (or simulated) sensor feeding a fixed set of channels.
///
/// `read` answers one value per channel, in the order [`channels`]
/// declares them, or `None` when the sensor could not be read. Failure
/// is per sensor: one dead sensor marks only its own channels.
///
/// [`channels`]: Sensor::channels
pub trait Sensor: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// The channels this sensor feeds, in read order.
    fn channels(&self) -> &[&'static str];

    /// Take one measurement per channel.
    fn read(&mut self) -> Option<Vec<f64>>;
}

/// Run every sensor once and fold the results into the reading set.
///
/// A sensor that fails to read, or answers the wrong number of values,
/// gets the failure sentinel on each of its channels. Channels outside
/// the set's schema are skipped, never added.
pub fn sample_into(readings: &mut ReadingSet, sensors: &mut [Box<dyn Sensor>]) {
    for sensor in sensors.iter_mut() {
        let values = sensor.read();
        let channels = sensor.channels();

        match values {
            Some(values) if values.len() == channels.len() => {
                for (channel, value) in channels.iter().copied().zip(values) {
                    if !readings.set(channel, value) {
                        debug!("{} feeds unknown channel '{}'", sensor.name(), channel);
                    }
                }
            }
            Some(values) => {
                warn!(
                    "{} answered {} values for {} channels, marking it failed",
                    sensor.name(),
                    values.len(),
                    channels.len()
                );
                for channel in channels.iter().copied() {
                    readings.mark_failed(channel);
                }
            }
            None => {
                warn!("{} read failed, reporting sentinel", sensor.name());
                for channel in channels.iter().copied() {
                    readings.mark_failed(channel);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use airpost_types::{HUMIDITY, PM10, PM25, SENTINEL, TEMPERATURE};

    struct FixedSensor {
        name: &'static str,
        channels: Vec<&'static str>,
        values: Option<Vec<f64>>,
    }

    impl Sensor for FixedSensor {
        fn name(&self) -> &str {
            self.name
        }

        fn channels(&self) -> &[&'static str] {
            &self.channels
        }

        fn read(&mut self) -> Option<Vec<f64>> {
            self.values.clone()
        }
    }

    #[test]
    fn sampling_updates_each_sensors_channels() {
        let mut readings = ReadingSet::stock();
        let mut sensors: Vec<Box<dyn Sensor>> = vec![
            Box::new(FixedSensor {
                name: "climate",
                channels: vec![TEMPERATURE, HUMIDITY],
                values: Some(vec![21.5, 55.2]),
            }),
            Box::new(FixedSensor {
                name: "particulate",
                channels: vec![PM10, PM25],
                values: Some(vec![10.0, 5.0]),
            }),
        ];

        sample_into(&mut readings, &mut sensors);

        assert_eq!(readings.get(TEMPERATURE), Some(21.5));
        assert_eq!(readings.get(HUMIDITY), Some(55.2));
        assert_eq!(readings.get(PM10), Some(10.0));
        assert_eq!(readings.get(PM25), Some(5.0));
        // Channels no sensor feeds keep their previous value.
        assert_eq!(readings.get("CO2"), Some(0.0));
    }

    #[test]
    fn a_failed_sensor_marks_only_its_channels() {
        let mut readings = ReadingSet::stock();
        let mut sensors: Vec<Box<dyn Sensor>> = vec![
            Box::new(FixedSensor {
                name: "climate",
                channels: vec![TEMPERATURE],
                values: Some(vec![22.0]),
            }),
            Box::new(FixedSensor {
                name: "particulate",
                channels: vec![PM10, PM25],
                values: None,
            }),
        ];

        sample_into(&mut readings, &mut sensors);

        assert_eq!(readings.get(PM10), Some(SENTINEL));
        assert_eq!(readings.get(PM25), Some(SENTINEL));
        assert_eq!(readings.get(TEMPERATURE), Some(22.0));
    }

    #[test]
    fn a_short_read_counts_as_a_failure() {
        let mut readings = ReadingSet::stock();
        let mut sensors: Vec<Box<dyn Sensor>> = vec![Box::new(FixedSensor {
            name: "particulate",
            channels: vec![PM10, PM25],
            values: Some(vec![10.0]),
        })];

        sample_into(&mut readings, &mut sensors);

        assert_eq!(readings.get(PM10), Some(SENTINEL));
        assert_eq!(readings.get(PM25), Some(SENTINEL));
    }

    #[test]
    fn unknown_channels_are_skipped_not_added() {
        let mut readings = ReadingSet::stock();
        let mut sensors: Vec<Box<dyn Sensor>> = vec![Box::new(FixedSensor {
            name: "exotic",
            channels: vec![TEMPERATURE, "radon"],
            values: Some(vec![20.0, 99.0]),
        })];

        sample_into(&mut readings, &mut sensors);

        assert_eq!(readings.get(TEMPERATURE), Some(20.0));
        assert_eq!(readings.get("radon"), None);
        assert_eq!(readings.len(), 6);
    }

    #[test]
    fn a_recovered_sensor_overwrites_its_sentinel() {
        let mut readings = ReadingSet::stock();
        let mut dead: Vec<Box<dyn Sensor>> = vec![Box::new(FixedSensor {
            name: "particulate",
            channels: vec![PM10],
            values: None,
        })];
        sample_into(&mut readings, &mut dead);
        assert_eq!(readings.get(PM10), Some(SENTINEL));

        let mut alive: Vec<Box<dyn Sensor>> = vec![Box::new(FixedSensor {
            name: "particulate",
            channels: vec![PM10],
            values: Some(vec![12.5]),
        })];
        sample_into(&mut readings, &mut alive);
        assert_eq!(readings.get(PM10), Some(12.5));
    }
}
