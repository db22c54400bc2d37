//! Sensor capability traits.
//!
//! The collection loop only knows these two traits; the concrete drivers in
//! `devices/` plug in behind them, so the loop can be exercised with mocks.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("hardware access failed: {0}")]
    Hardware(String),

    #[error("timed out waiting for the sensor line")]
    Timeout,

    #[error("checksum mismatch in sensor frame")]
    Checksum,

    #[error("reading outside the sensor's stated range: {0}")]
    OutOfRange(String),
}

pub type Result<T> = std::result::Result<T, SensorError>;

/// Combined temperature/relative-humidity sensor.
pub trait TemperatureSensor {
    /// Temperature in degrees Fahrenheit.
    fn get_temp(&mut self) -> Result<f64>;

    /// Relative humidity in percent.
    fn get_humidity(&mut self) -> Result<f64>;
}

/// Current/voltage/power monitor.
pub trait PowerSensor {
    /// One simultaneous reading of current (mA), bus voltage (V) and
    /// power (mW).
    fn get_cvp(&mut self) -> Result<(f64, f64, f64)>;
}
