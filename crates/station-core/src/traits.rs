//! Capability traits
//!
//! Each wake the firmware acquires one implementation of every trait, moves
//! them into the [`DutyCycle`](crate::DutyCycle), which drops them
//! once the cycle is over. Tests and the simulator substitute their own.

use crate::config::{TimeSyncConfig, WifiConfig};
use crate::error::{NetworkError, SensorError, TransmitError};
use crate::http::HttpRequest;
use crate::measurement::EnvironmentReading;

/// Trait for the environmental sensor
pub trait EnvironmentSensor {
    /// Probe the sensor and configure it for forced single-shot sampling.
    fn init(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Take one forced sample and read it back.
    fn measure(&mut self) -> impl Future<Output = Result<EnvironmentReading, SensorError>>;
}

/// Trait for the battery divider input
pub trait BatteryProbe {
    /// Read the divider in raw ADC counts.
    fn read_raw(&mut self) -> impl Future<Output = Result<u16, SensorError>>;
}

/// Trait for the WiFi station
pub trait WifiLink {
    /// Start associating with the access point. Returns once the attempt is
    /// under way, not once it succeeded.
    fn begin(&mut self, config: &WifiConfig<'_>) -> impl Future<Output = Result<(), NetworkError>>;

    /// Associated and holding an IP address.
    fn is_connected(&mut self) -> bool;

    /// Drop the association and power down the station.
    fn disconnect(&mut self) -> impl Future<Output = ()>;
}

/// Trait for network time
pub trait TimeSource {
    /// One synchronization attempt, returning Unix seconds.
    fn sync(&mut self, config: &TimeSyncConfig<'_>) -> impl Future<Output = Result<u64, NetworkError>>;
}

/// Trait for the HTTP client
pub trait HttpTransport {
    /// Send one request and return the response status code.
    fn post(&mut self, request: &HttpRequest<'_>) -> impl Future<Output = Result<u16, TransmitError>>;
}
