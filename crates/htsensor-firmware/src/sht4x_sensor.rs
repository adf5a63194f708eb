use embedded_hal_async::i2c::I2c;
use htsensor_core::sensor::{HumiditySensor, SensorError};
use sht4x::Sht4xAsync;

const SENSOR_NAME: &str = "SHT4x";

/// SHT4x behind the two-channel sensor interface.
///
/// The chip measures both channels in one transaction, so the temperature
/// read performs the measurement and the humidity read hands out the value
/// captured alongside it.
pub struct Sht4xSensor<I> {
    sensor: Sht4xAsync<I, embassy_time::Delay>,
    humidity: Option<f32>,
}

impl<I: I2c> Sht4xSensor<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            sensor: Sht4xAsync::<I, embassy_time::Delay>::new(i2c),
            humidity: None,
        }
    }
}

impl<I: I2c> HumiditySensor for Sht4xSensor<I> {
    async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.humidity = None;

        let measurement = self
            .sensor
            .measure(sht4x::Precision::High, &mut embassy_time::Delay)
            .await
            .map_err(|e| {
                log::warn!("SHT4x measurement failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: SENSOR_NAME,
                    operation: "measure temperature/humidity",
                }
            })?;

        self.humidity = Some(measurement.humidity_percent().to_num::<f32>());
        Ok(measurement.temperature_celsius().to_num::<f32>())
    }

    async fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.humidity
            .take()
            .ok_or(SensorError::NotReady { sensor: SENSOR_NAME })
    }
}
