//! Sensor acquisition loop with fault tracking and power-cycle recovery
//!
//! Each iteration reads the sensor once and lands in one of three cases:
//!
//! - **success**: the reading is published, the failure counter is cleared and
//!   the loop sleeps for the steady-state poll interval;
//! - **transient failure**: the counter goes up, the store keeps the last good
//!   reading and the loop sleeps for the short retry interval;
//! - **exhausted failure**: once the counter would pass the threshold it is
//!   cleared and the sensor is power-cycled, then the next read starts
//!   straight away.
//!
//! Nothing here ever returns an error. A sensor that never recovers leaves the
//! store frozen at its last good value.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::AcquisitionConfig;
use crate::sensor::{HumiditySensor, RawMeasurement, SharedSensor};
use crate::store::{Reading, SensorReadingStore};

/// What to do after a failed read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// Try again after the retry interval
    Retry { failures: u32 },
    /// Threshold passed; power-cycle the sensor
    PowerCycle,
}

/// Counts consecutive failed reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultTracker {
    consecutive_failures: u32,
    threshold: u32,
}

impl FaultTracker {
    pub const fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
        }
    }

    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Record a failure. The counter never goes above the threshold: the
    /// failure that would push it over resets it and asks for a power cycle.
    pub fn on_failure(&mut self) -> FaultAction {
        if self.consecutive_failures >= self.threshold {
            self.consecutive_failures = 0;
            FaultAction::PowerCycle
        } else {
            self.consecutive_failures += 1;
            FaultAction::Retry {
                failures: self.consecutive_failures,
            }
        }
    }
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Stored(Reading),
    Retrying { failures: u32 },
    PowerCycled,
}

/// The acquisition loop.
///
/// `P` drives the sensor's power rail (high = powered) and `D` provides the
/// sleeps between iterations.
pub struct Acquisition<'a, S, P, D> {
    sensor: SharedSensor<'a, S>,
    power: P,
    delay: D,
    store: &'a SensorReadingStore,
    faults: FaultTracker,
    config: AcquisitionConfig,
}

impl<'a, S, P, D> Acquisition<'a, S, P, D>
where
    S: HumiditySensor,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(
        sensor: SharedSensor<'a, S>,
        power: P,
        delay: D,
        store: &'a SensorReadingStore,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            sensor,
            power,
            delay,
            store,
            faults: FaultTracker::new(config.failure_threshold),
            config,
        }
    }

    pub fn faults(&self) -> &FaultTracker {
        &self.faults
    }

    /// Run forever.
    pub async fn run(&mut self) -> ! {
        info!(
            "Acquisition started (poll {} s, retry {} s, threshold {})",
            self.config.poll_interval.as_secs(),
            self.config.retry_interval.as_secs(),
            self.config.failure_threshold
        );
        loop {
            self.step().await;
        }
    }

    /// One read, classify, react cycle, including the sleep that follows it.
    pub async fn step(&mut self) -> Outcome {
        if self.sensor.is_busy() {
            debug!("Sensor bus busy, waiting for it");
        }
        let raw = self.sensor.measure().await;

        if let Some((temperature, humidity)) = raw.valid_pair() {
            let reading = Reading::from_celsius(temperature, humidity);
            self.store.publish(reading, Instant::now());
            self.faults.on_success();
            debug!(
                "Reading stored: {:.2} C, {:.2} %, heat index {:.2} C",
                reading.temperature, reading.humidity, reading.heat_index
            );
            self.sleep(self.config.poll_interval).await;
            return Outcome::Stored(reading);
        }

        log_failed_read(&raw);

        match self.faults.on_failure() {
            FaultAction::Retry { failures } => {
                warn!(
                    "Sensor read failed ({}/{}), retrying",
                    failures,
                    self.faults.threshold()
                );
                self.sleep(self.config.retry_interval).await;
                Outcome::Retrying { failures }
            }
            FaultAction::PowerCycle => {
                warn!("Sensor unresponsive, power-cycling");
                self.power_cycle().await;
                Outcome::PowerCycled
            }
        }
    }

    async fn power_cycle(&mut self) {
        if let Err(e) = self.power.set_low() {
            warn!("Failed to cut sensor power: {:?}", e);
        }
        self.sleep(self.config.power_off_settle).await;

        if let Err(e) = self.power.set_high() {
            warn!("Failed to restore sensor power: {:?}", e);
        }
        self.sleep(self.config.power_on_boot).await;
        info!("Sensor power restored");
    }

    async fn sleep(&mut self, duration: Duration) {
        self.delay.delay_ms(duration.as_millis() as u32).await;
    }
}

fn log_failed_read(raw: &RawMeasurement) {
    if let Err(e) = raw.temperature {
        debug!("Temperature read error: {}", e);
    }
    if let Err(e) = raw.humidity {
        debug!("Humidity read error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heat_index::compute_heat_index;
    use crate::sensor::SensorError;
    use crate::testutil::{Event, FakeDelay, FakePowerPin, ScriptedSensor, Timeline};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::mutex::Mutex;

    type Bus = Mutex<CriticalSectionRawMutex, ScriptedSensor>;

    fn acquisition<'a>(
        bus: &'a Bus,
        store: &'a SensorReadingStore,
        timeline: &Timeline,
    ) -> Acquisition<'a, ScriptedSensor, FakePowerPin, FakeDelay> {
        Acquisition::new(
            SharedSensor::new(bus),
            timeline.power_pin(),
            timeline.delay(),
            store,
            AcquisitionConfig::DEFAULT,
        )
    }

    #[test]
    fn test_fault_tracker_caps_at_threshold() {
        let mut tracker = FaultTracker::new(3);
        assert_eq!(tracker.on_failure(), FaultAction::Retry { failures: 1 });
        assert_eq!(tracker.on_failure(), FaultAction::Retry { failures: 2 });
        assert_eq!(tracker.on_failure(), FaultAction::Retry { failures: 3 });
        assert_eq!(tracker.on_failure(), FaultAction::PowerCycle);
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.on_failure(), FaultAction::Retry { failures: 1 });
        tracker.on_success();
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[test]
    fn test_success_publishes_and_sleeps_poll_interval() {
        let bus = Mutex::new(ScriptedSensor::new([(Ok(23.5), Ok(41.0))]));
        let store = SensorReadingStore::new();
        let timeline = Timeline::default();
        let mut acq = acquisition(&bus, &store, &timeline);

        let outcome = block_on(acq.step());

        let expected = Reading::from_celsius(23.5, 41.0);
        assert_eq!(outcome, Outcome::Stored(expected));
        assert_eq!(store.latest(), Some(expected));
        assert_eq!(timeline.events(), [Event::SleepMs(60_000)]);
    }

    #[test]
    fn test_step_waits_for_busy_sensor_bus() {
        let bus = Mutex::new(ScriptedSensor::new([(Ok(23.5), Ok(41.0))]));
        let store = SensorReadingStore::new();
        let timeline = Timeline::default();
        let mut acq = acquisition(&bus, &store, &timeline);

        let guard = block_on(bus.lock());
        let store_ref = &store;
        let (outcome, ()) = block_on(embassy_futures::join::join(acq.step(), async move {
            embassy_time::Timer::after(Duration::from_millis(20)).await;
            assert_eq!(store_ref.latest(), None);
            drop(guard);
        }));

        assert_eq!(outcome, Outcome::Stored(Reading::from_celsius(23.5, 41.0)));
    }

    #[test]
    fn test_transient_failure_keeps_last_good_reading() {
        let bus = Mutex::new(ScriptedSensor::new([
            (Ok(21.0), Ok(50.0)),
            (Ok(f32::NAN), Ok(52.0)),
            (Ok(21.5), Err(SensorError::Timeout { sensor: "test" })),
        ]));
        let store = SensorReadingStore::new();
        let timeline = Timeline::default();
        let mut acq = acquisition(&bus, &store, &timeline);

        block_on(acq.step());
        timeline.clear();

        assert_eq!(block_on(acq.step()), Outcome::Retrying { failures: 1 });
        assert_eq!(block_on(acq.step()), Outcome::Retrying { failures: 2 });
        assert_eq!(store.latest(), Some(Reading::from_celsius(21.0, 50.0)));
        assert_eq!(
            timeline.events(),
            [Event::SleepMs(5_000), Event::SleepMs(5_000)]
        );
    }

    #[test]
    fn test_power_cycle_after_threshold_exceeded() {
        let bus = Mutex::new(ScriptedSensor::failing());
        let store = SensorReadingStore::new();
        let timeline = Timeline::default();
        let mut acq = acquisition(&bus, &store, &timeline);

        for expected in 1..=10 {
            assert_eq!(
                block_on(acq.step()),
                Outcome::Retrying { failures: expected }
            );
        }
        timeline.clear();

        assert_eq!(block_on(acq.step()), Outcome::PowerCycled);
        assert_eq!(acq.faults().consecutive_failures(), 0);
        assert_eq!(
            timeline.events(),
            [
                Event::Power(false),
                Event::SleepMs(3_000),
                Event::Power(true),
                Event::SleepMs(5_000),
            ]
        );
        // A dead sensor never produces a reading
        assert_eq!(store.latest(), None);
    }

    #[test]
    fn test_success_after_failures_resets_counter() {
        let bus = Mutex::new(ScriptedSensor::new([
            (Ok(f32::NAN), Ok(f32::NAN)),
            (Ok(f32::NAN), Ok(f32::NAN)),
            (Ok(19.0), Ok(60.0)),
        ]));
        let store = SensorReadingStore::new();
        let timeline = Timeline::default();
        let mut acq = acquisition(&bus, &store, &timeline);

        block_on(acq.step());
        block_on(acq.step());
        assert_eq!(acq.faults().consecutive_failures(), 2);

        block_on(acq.step());
        assert_eq!(acq.faults().consecutive_failures(), 0);
    }

    #[test]
    fn test_counter_bounded_for_mixed_sequences() {
        // Deterministic pseudo-random mix of good and bad reads
        let mut seed: u32 = 0x1234_5678;
        let mut script = std::vec::Vec::new();
        for i in 0..400 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let good = (seed >> 16) % 7 == 0;
            let t = 15.0 + (i % 20) as f32;
            let h = 30.0 + (i % 50) as f32;
            if good {
                script.push((Ok(t), Ok(h)));
            } else {
                script.push((Ok(f32::NAN), Ok(h)));
            }
        }

        let bus = Mutex::new(ScriptedSensor::new(script));
        let store = SensorReadingStore::new();
        let timeline = Timeline::default();
        let mut acq = acquisition(&bus, &store, &timeline);

        for _ in 0..400 {
            let outcome = block_on(acq.step());
            let failures = acq.faults().consecutive_failures();
            assert!(failures <= acq.faults().threshold());

            match outcome {
                Outcome::Stored(reading) => {
                    assert_eq!(failures, 0);
                    assert_eq!(
                        reading.heat_index,
                        compute_heat_index(reading.temperature, reading.humidity, false)
                    );
                    assert_eq!(store.latest(), Some(reading));
                }
                Outcome::PowerCycled => assert_eq!(failures, 0),
                Outcome::Retrying { failures: reported } => assert_eq!(reported, failures),
            }
        }
    }
}
