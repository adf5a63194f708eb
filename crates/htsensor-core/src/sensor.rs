//! Temperature/humidity sensor interface and bus sharing
//!
//! The driver itself lives in the firmware crate. The core only needs two
//! fallible reads, and exclusive access to the device while both happen.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor}: no measurement available yet")]
    NotReady { sensor: &'static str },
    #[error("{sensor}: timed out")]
    Timeout { sensor: &'static str },
}

/// A sensor producing temperature (°C) and relative humidity (%).
///
/// Either read may fail outright or return NaN; the acquisition loop treats
/// both the same way.
pub trait HumiditySensor {
    fn read_temperature(&mut self) -> impl Future<Output = Result<f32, SensorError>>;

    fn read_humidity(&mut self) -> impl Future<Output = Result<f32, SensorError>>;
}

/// Raw result of one locked read of both channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMeasurement {
    pub temperature: Result<f32, SensorError>,
    pub humidity: Result<f32, SensorError>,
}

impl RawMeasurement {
    /// Both channels, or `None` if either failed or is not a finite number.
    pub fn valid_pair(&self) -> Option<(f32, f32)> {
        match (self.temperature, self.humidity) {
            (Ok(t), Ok(h)) if classify(t, h) => Some((t, h)),
            _ => None,
        }
    }
}

/// A read succeeds only when both values are finite; NaN counts as a failure.
pub fn classify(temperature: f32, humidity: f32) -> bool {
    temperature.is_finite() && humidity.is_finite()
}

/// Handle on a sensor shared through an async mutex.
///
/// The lock is held for the whole temperature + humidity read so nothing
/// else can touch the sensor bus in between.
pub struct SharedSensor<'a, S> {
    bus: &'a Mutex<CriticalSectionRawMutex, S>,
}

impl<S> Clone for SharedSensor<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for SharedSensor<'_, S> {}

impl<'a, S: HumiditySensor> SharedSensor<'a, S> {
    #[inline]
    pub const fn new(bus: &'a Mutex<CriticalSectionRawMutex, S>) -> Self {
        Self { bus }
    }

    /// Read temperature then humidity under one lock.
    pub async fn measure(&self) -> RawMeasurement {
        let mut sensor = self.bus.lock().await;
        let temperature = sensor.read_temperature().await;
        let humidity = sensor.read_humidity().await;
        RawMeasurement {
            temperature,
            humidity,
        }
    }

    /// True while some activity holds the sensor.
    pub fn is_busy(&self) -> bool {
        self.bus.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedSensor;
    use embassy_futures::block_on;

    #[test]
    fn test_classify_rejects_non_finite() {
        assert!(classify(21.5, 40.0));
        assert!(!classify(f32::NAN, 40.0));
        assert!(!classify(21.5, f32::NAN));
        assert!(!classify(f32::INFINITY, 40.0));
    }

    #[test]
    fn test_valid_pair_requires_both_channels() {
        let ok = RawMeasurement {
            temperature: Ok(21.5),
            humidity: Ok(40.0),
        };
        assert_eq!(ok.valid_pair(), Some((21.5, 40.0)));

        let nan = RawMeasurement {
            temperature: Ok(21.5),
            humidity: Ok(f32::NAN),
        };
        assert_eq!(nan.valid_pair(), None);

        let err = RawMeasurement {
            temperature: Err(SensorError::Timeout { sensor: "test" }),
            humidity: Ok(40.0),
        };
        assert_eq!(err.valid_pair(), None);
    }

    #[test]
    fn test_measure_reads_both_channels_in_order() {
        let bus = Mutex::new(ScriptedSensor::new([(Ok(22.0), Ok(55.0))]));
        let shared = SharedSensor::new(&bus);

        let raw = block_on(shared.measure());
        assert_eq!(raw.valid_pair(), Some((22.0, 55.0)));
        assert!(!shared.is_busy());
    }

    #[test]
    fn test_sensor_is_busy_while_locked_elsewhere() {
        let bus = Mutex::new(ScriptedSensor::new([]));
        let shared = SharedSensor::new(&bus);

        let guard = block_on(bus.lock());
        assert!(shared.is_busy());
        drop(guard);
        assert!(!shared.is_busy());
    }
}
