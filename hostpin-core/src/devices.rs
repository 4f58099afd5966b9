//! Environmental sensor boundary
//!
//! Physical quantities are fixed-point integers so readings compare exactly
//! and print without float rounding surprises.

use std::fmt;

use thiserror::Error;

/// Temperature in milli-degrees Celsius
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Celsius(pub i64);

impl Celsius {
    /// Temperature from milli-degrees, the unit sysfs reports
    pub const fn from_milli(milli: i64) -> Self {
        Self(milli)
    }

    /// Raw value in milli-degrees
    pub const fn milli(self) -> i64 {
        self.0
    }
}

/// Pressure in pascal, displayed in kPa
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pascal(pub i64);

/// Relative humidity in thousandths of a percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativeHumidity(pub i32);

/// Writes `value / 1000` with exactly three decimals
fn fmt_milli(f: &mut fmt::Formatter<'_>, value: i64, unit: &str) -> fmt::Result {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    write!(f, "{}{}.{:03}{}", sign, abs / 1000, abs % 1000, unit)
}

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_milli(f, self.0, "°C")
    }
}

impl fmt::Display for Pascal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1 Pa is 1/1000 kPa
        fmt_milli(f, self.0, "kPa")
    }
}

impl fmt::Display for RelativeHumidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_milli(f, i64::from(self.0), "%rH")
    }
}

/// One reading; sensors fill the fields they measure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Environment {
    /// Ambient temperature
    pub temperature: Celsius,
    /// Barometric pressure
    pub pressure: Pascal,
    /// Relative humidity
    pub humidity: RelativeHumidity,
}

/// Errors reading a sensor
#[derive(Debug, Error)]
pub enum SensorError {
    /// Sensor could not be read
    #[error("reading sensor: {0}")]
    Io(#[from] std::io::Error),
    /// Sensor returned something that is not a reading
    #[error("unexpected sensor value {0:?}")]
    Parse(String),
}

/// Environmental sensor
pub trait Sensor {
    /// Device name, unique on the host
    fn name(&self) -> &str;

    /// What kind of sensor this is, e.g. `cpu-thermal`
    fn kind(&self) -> &str;

    /// Take a reading
    ///
    /// Fields the sensor does not measure are left untouched.
    fn sense(&mut self, env: &mut Environment) -> Result<(), SensorError>;
}
