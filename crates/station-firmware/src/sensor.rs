//! BME280 environmental sensor

use bme280::i2c::AsyncBME280;
use bme280::{Configuration, IIRFilter, Oversampling};
use embassy_time::Delay;
use station_core::config::{Bme280Strap, SensorConfig};
use station_core::error::SensorError;
use station_core::traits::EnvironmentSensor;
use station_core::EnvironmentReading;

use crate::hardware::SensorBus;

pub struct Bme280Sensor {
    /// `None` when the configured address is not one of the two SDO straps.
    sensor: Option<AsyncBME280<SensorBus>>,
}

impl Bme280Sensor {
    pub fn new(i2c: SensorBus, config: &SensorConfig) -> Self {
        let sensor = match config.strap() {
            Some(Bme280Strap::Primary) => Some(AsyncBME280::new_primary(i2c)),
            Some(Bme280Strap::Secondary) => Some(AsyncBME280::new_secondary(i2c)),
            None => {
                log::error!("BME280 cannot answer on address {:#04x}", config.address);
                None
            }
        };

        Self { sensor }
    }

    fn driver(&mut self) -> Result<&mut AsyncBME280<SensorBus>, SensorError> {
        self.sensor.as_mut().ok_or(SensorError::InitializationFailed {
            sensor: "BME280",
            details: "unsupported I2C address",
        })
    }
}

// Weather monitoring mode: forced single shots, 1x oversampling, no filter.
fn weather_monitoring() -> Configuration {
    Configuration::default()
        .with_temperature_oversampling(Oversampling::Oversampling1X)
        .with_pressure_oversampling(Oversampling::Oversampling1X)
        .with_humidity_oversampling(Oversampling::Oversampling1X)
        .with_iir_filter(IIRFilter::Off)
}

impl EnvironmentSensor for Bme280Sensor {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.driver()?
            .init_with_config(&mut Delay, weather_monitoring())
            .await
            .map_err(|e| {
                log::error!("BME280 initialization failed: {:?}", e);
                SensorError::InitializationFailed {
                    sensor: "BME280",
                    details: "no BME280 at the configured address",
                }
            })
    }

    async fn measure(&mut self) -> Result<EnvironmentReading, SensorError> {
        let measurements = self.driver()?.measure(&mut Delay).await.map_err(|e| {
            log::error!("BME280 measurement failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "BME280",
                operation: "measure temperature/humidity/pressure",
                details: "I2C communication error or sensor not responding",
            }
        })?;

        Ok(EnvironmentReading::from_pascals(
            measurements.temperature,
            measurements.humidity,
            measurements.pressure,
        ))
    }
}
