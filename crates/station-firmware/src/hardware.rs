//! Peripheral construction for the station board
//!
//! The BME280 sits on I2C0 (SDA GPIO8, SCL GPIO9) and the battery divider
//! feeds ADC1 on GPIO1.

use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::efuse::Efuse;
use esp_hal::i2c::master::{Config as I2cConfig, ConfigError, I2c};
use esp_hal::peripherals::{ADC1, GPIO1, GPIO8, GPIO9, I2C0};
use esp_hal::time::Rate;
use esp_hal::{Async, Blocking};
use station_core::DeviceId;

pub type SensorBus = I2c<'static, Async>;
pub type BatteryAdc = Adc<'static, ADC1<'static>, Blocking>;
pub type BatteryPin = AdcPin<GPIO1<'static>, ADC1<'static>>;

/// Create the I2C bus the environmental sensor lives on
pub fn create_i2c_bus(
    i2c0: I2C0<'static>,
    sda: GPIO8<'static>,
    scl: GPIO9<'static>,
) -> Result<SensorBus, ConfigError> {
    let bus = I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(100)))?
        .with_sda(sda)
        .with_scl(scl)
        .into_async();

    Ok(bus)
}

/// Enable ADC1 on the battery divider pin
///
/// 11 dB attenuation covers the whole divider output range.
pub fn create_battery_adc(adc1: ADC1<'static>, pin: GPIO1<'static>) -> (BatteryAdc, BatteryPin) {
    let mut config = AdcConfig::new();
    let pin = config.enable_pin(pin, Attenuation::_11dB);

    (Adc::new(adc1, config), pin)
}

/// Identifier reported as `sensor` in every payload
pub fn device_id() -> DeviceId {
    DeviceId::from_mac(Efuse::mac_address())
}
