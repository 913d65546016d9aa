//! Battery divider on ADC1

use station_core::error::SensorError;
use station_core::traits::BatteryProbe;

use crate::hardware::{BatteryAdc, BatteryPin};

/// The calibration bounds are in 10-bit counts; ADC1 converts with 12 bits.
const RESOLUTION_SHIFT: u16 = 2;

pub struct AdcBatteryProbe {
    adc: BatteryAdc,
    pin: BatteryPin,
}

impl AdcBatteryProbe {
    pub fn new(adc: BatteryAdc, pin: BatteryPin) -> Self {
        Self { adc, pin }
    }
}

impl BatteryProbe for AdcBatteryProbe {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        let raw = nb::block!(self.adc.read_oneshot(&mut self.pin)).map_err(|_| {
            log::error!("Battery ADC conversion failed");
            SensorError::ReadFailed {
                sensor: "ADC1",
                operation: "read battery divider",
                details: "oneshot conversion failed",
            }
        })?;

        log::debug!("Battery divider raw reading: {}", raw);
        Ok(raw >> RESOLUTION_SHIFT)
    }
}
