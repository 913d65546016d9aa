//! JSON body of the measurement POST
//!
//! The shape is fixed: seven keys, none of them optional. The server keys
//! on `sensor` to authenticate the node.

use alloc::vec::Vec;

use serde::{Serialize, Serializer};

use crate::measurement::{DeviceId, FirmwareVersion, Measurement};

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Payload {
    pub temperature: f32,
    pub humidity: f32,
    pub pressure: f32,
    pub raw_voltage: f32,
    pub charge: f32,
    pub sensor: DeviceId,
    pub firmware_version: FirmwareVersion,
}

impl Payload {
    pub fn from_measurement(measurement: &Measurement) -> Self {
        Self {
            temperature: measurement.environment.temperature,
            humidity: measurement.environment.humidity,
            pressure: measurement.environment.pressure,
            raw_voltage: measurement.raw_voltage,
            charge: measurement.charge_percent,
            sensor: measurement.sensor_id,
            firmware_version: measurement.firmware_version,
        }
    }

    /// Serializes the payload. Fails only if a value is not representable,
    /// which the acquisition gate rules out.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for FirmwareVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
