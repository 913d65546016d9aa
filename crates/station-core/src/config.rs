//! Station configuration
//!
//! Everything here is fixed when the firmware is built. The firmware's build
//! script renders a `Config<'static>` constant, the simulator may load one
//! from JSON. Nothing mutates it at runtime.

use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Upper calibration bound of the battery divider in raw ADC counts.
pub const MAX_RAW_VOLTAGE: u16 = 814;
/// Lower calibration bound; readings at or below it are not transmitted.
pub const MIN_RAW_VOLTAGE: u16 = 605;
pub const WIFI_CHANNEL: u8 = 6;
pub const MAX_WIFI_CONNECTION_TRIES: u8 = 20;
pub const WAIT_FOR_WIFI_MS: u32 = 500;
/// Sleep for 15 minutes after each measurement.
pub const DEEP_SLEEP_SECONDS: u32 = 60 * 15;
/// BME280 bus address with SDO tied low.
pub const BME280_ADDRESS: u8 = 0x76;
/// BME280 bus address with SDO tied high.
pub const BME280_SECONDARY_ADDRESS: u8 = 0x77;
pub const EXPECTED_STATUS: u16 = 204;
pub const USER_AGENT: &str = "WeatherStation/BA188";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub wifi: WifiConfig<'a>,
    pub endpoint: EndpointConfig<'a>,
    pub battery: BatteryCalibration,
    pub sensor: SensorConfig,
    pub time_sync: TimeSyncConfig<'a>,
    pub sleep: SleepMode,
    /// Debug builds tag the firmware version with `-dev` and log to the console.
    pub debug: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    /// Channel hint for a faster association, `0` scans all channels.
    pub channel: u8,
    pub hostname: &'a str,
    pub max_connection_tries: u8,
    pub retry_delay_ms: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
    /// Wrap the connection in TLS. Certificates are not verified.
    pub tls: bool,
    pub user_agent: &'a str,
    pub expected_status: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryCalibration {
    pub min_raw: u16,
    pub max_raw: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    pub address: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSyncConfig<'a> {
    pub enabled: bool,
    pub server: &'a str,
    pub max_attempts: u8,
    pub retry_delay_ms: u32,
}

/// What the node does once the cycle is over.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    /// RTC timer deep sleep; the chip boots from the top on wake.
    DeepSleep { seconds: u32 },
    /// Stay awake for the delay, then restart the chip.
    Restart { delay_ms: u32 },
}

impl Config<'_> {
    /// Log level for the console logger, derived from the build profile.
    pub const fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Off
        }
    }
}

impl Default for Config<'_> {
    fn default() -> Self {
        Self {
            wifi: WifiConfig::default(),
            endpoint: EndpointConfig::default(),
            battery: BatteryCalibration::default(),
            sensor: SensorConfig::default(),
            time_sync: TimeSyncConfig::default(),
            sleep: SleepMode::default(),
            debug: cfg!(debug_assertions),
        }
    }
}

impl Default for WifiConfig<'_> {
    fn default() -> Self {
        Self {
            ssid: "",
            password: "",
            channel: WIFI_CHANNEL,
            hostname: "weather-station",
            max_connection_tries: MAX_WIFI_CONNECTION_TRIES,
            retry_delay_ms: WAIT_FOR_WIFI_MS,
        }
    }
}

impl Default for EndpointConfig<'_> {
    fn default() -> Self {
        Self {
            host: "localhost",
            port: 80,
            path: "/",
            tls: false,
            user_agent: USER_AGENT,
            expected_status: EXPECTED_STATUS,
        }
    }
}

impl Default for BatteryCalibration {
    fn default() -> Self {
        Self {
            min_raw: MIN_RAW_VOLTAGE,
            max_raw: MAX_RAW_VOLTAGE,
        }
    }
}

/// Which of the two SDO straps a BME280 address selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bme280Strap {
    Primary,
    Secondary,
}

impl SensorConfig {
    /// `None` when no BME280 can answer on the configured address.
    pub const fn strap(&self) -> Option<Bme280Strap> {
        match self.address {
            BME280_ADDRESS => Some(Bme280Strap::Primary),
            BME280_SECONDARY_ADDRESS => Some(Bme280Strap::Secondary),
            _ => None,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: BME280_ADDRESS,
        }
    }
}

impl Default for TimeSyncConfig<'_> {
    fn default() -> Self {
        Self {
            enabled: false,
            server: "pool.ntp.org",
            max_attempts: 10,
            retry_delay_ms: 500,
        }
    }
}

impl Default for SleepMode {
    fn default() -> Self {
        Self::DeepSleep {
            seconds: DEEP_SLEEP_SECONDS,
        }
    }
}
