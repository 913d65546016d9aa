//! Build-time station configuration
//!
//! `build.rs` renders `CONFIG` and `FIRMWARE_VERSION` from the `STATION_*`
//! environment and the package version.

use station_core::FirmwareVersion;
use station_core::config::{
    BatteryCalibration, Config, EndpointConfig, SensorConfig, SleepMode, TimeSyncConfig, WifiConfig,
};

include!(concat!(env!("OUT_DIR"), "/station_config.rs"));
