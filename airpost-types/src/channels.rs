//! Channel names for the stock sensor complement.
//!
//! Nodes are free to run with any channel set; these constants cover the
//! reference hardware build (particulate matter, CO2, and a combined
//! temperature/humidity/pressure sensor).

/// Ambient temperature in degrees Celsius.
pub const TEMPERATURE: &str = "temperature";

/// Relative humidity in percent.
pub const HUMIDITY: &str = "humidity";

/// Barometric pressure in hectopascal.
pub const PRESSURE: &str = "pressure";

/// Coarse particulate matter (PM10) in micrograms per cubic metre.
pub const PM10: &str = "pm10";

/// Fine particulate matter (PM2.5) in micrograms per cubic metre.
pub const PM25: &str = "pm25";

/// Carbon dioxide concentration in parts per million.
pub const CO2: &str = "CO2";

/// The stock channel complement.
pub const STOCK_CHANNELS: [&str; 6] = [TEMPERATURE, HUMIDITY, PRESSURE, PM10, PM25, CO2];
