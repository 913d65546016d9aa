//! Model of the data taken during one wake

use core::fmt;

/// BME280 and friends report pressure in Pa, the payload carries hPa.
pub const PASCALS_PER_HECTOPASCAL: f32 = 100.0;

/// One forced sample of the environmental sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentReading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity in percent
    pub humidity: f32,
    /// Hectopascal
    pub pressure: f32,
}

impl EnvironmentReading {
    /// Builds a reading from a driver that reports pressure in Pa.
    pub fn from_pascals(temperature: f32, humidity: f32, pressure_pa: f32) -> Self {
        Self {
            temperature,
            humidity,
            pressure: pressure_pa / PASCALS_PER_HECTOPASCAL,
        }
    }

    /// A non-finite value would serialize as `null`.
    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite() && self.humidity.is_finite() && self.pressure.is_finite()
    }
}

/// Everything reported for one duty cycle. Never outlives the cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub environment: EnvironmentReading,
    pub raw_voltage: f32,
    pub charge_percent: f32,
    pub sensor_id: DeviceId,
    pub firmware_version: FirmwareVersion,
}

/// Stable per-device identifier, rendered as eight uppercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// Derives the identifier from the last four bytes of the factory MAC,
    /// the vendor-assigned part lives in the first three.
    pub const fn from_mac(mac: [u8; 6]) -> Self {
        Self(u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]]))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    /// Debug build, rendered with a `-dev` suffix.
    pub dev: bool,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8, patch: u8, dev: bool) -> Self {
        Self {
            major,
            minor,
            patch,
            dev,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.dev {
            f.write_str("-dev")?;
        }
        Ok(())
    }
}
