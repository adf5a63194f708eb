//! Latest-reading store shared between the acquisition, display and HTTP tasks
//!
//! The acquisition loop is the only writer. A reading is replaced as a whole
//! inside one critical section, so readers can never see a temperature from
//! one sample next to the humidity of another.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant};

use crate::heat_index::compute_heat_index;

/// One consistent sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// °C
    pub temperature: f32,
    /// Relative humidity in %
    pub humidity: f32,
    /// °C, derived from `temperature` and `humidity` above
    pub heat_index: f32,
}

impl Reading {
    /// Build a reading from a Celsius temperature and humidity pair.
    ///
    /// This is the only constructor, so the heat index always belongs to the
    /// pair stored next to it.
    pub fn from_celsius(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
            heat_index: compute_heat_index(temperature, humidity, false),
        }
    }
}

/// A reading together with the moment it was stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub reading: Reading,
    pub updated_at: Instant,
}

impl Snapshot {
    /// Time since the reading was stored, relative to `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.checked_duration_since(self.updated_at)
            .unwrap_or(Duration::from_ticks(0))
    }
}

/// Process-wide holder of the last good reading.
pub struct SensorReadingStore {
    latest: Mutex<CriticalSectionRawMutex, Cell<Option<Snapshot>>>,
}

impl SensorReadingStore {
    pub const fn new() -> Self {
        Self {
            latest: Mutex::new(Cell::new(None)),
        }
    }

    /// Replace the stored reading. Only the acquisition loop calls this.
    pub fn publish(&self, reading: Reading, at: Instant) {
        let snapshot = Snapshot {
            reading,
            updated_at: at,
        };
        self.latest.lock(|cell| cell.set(Some(snapshot)));
    }

    /// The last good snapshot, or `None` before the first successful read.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.latest.lock(|cell| cell.get())
    }

    /// The last good reading, or `None` before the first successful read.
    pub fn latest(&self) -> Option<Reading> {
        self.snapshot().map(|s| s.reading)
    }
}

impl Default for SensorReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_first_publish() {
        let store = SensorReadingStore::new();
        assert_eq!(store.latest(), None);
        assert_eq!(store.snapshot(), None);
    }

    #[test]
    fn test_publish_replaces_whole_reading() {
        let store = SensorReadingStore::new();
        store.publish(Reading::from_celsius(20.0, 40.0), Instant::from_secs(1));
        store.publish(Reading::from_celsius(30.0, 80.0), Instant::from_secs(2));

        let latest = store.latest().unwrap();
        assert_eq!(latest, Reading::from_celsius(30.0, 80.0));
        assert_eq!(latest.heat_index, compute_heat_index(30.0, 80.0, false));
    }

    #[test]
    fn test_snapshot_age() {
        let store = SensorReadingStore::new();
        store.publish(Reading::from_celsius(20.0, 40.0), Instant::from_secs(10));

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.age(Instant::from_secs(70)), Duration::from_secs(60));
        // A clock reading earlier than the update saturates at zero
        assert_eq!(snapshot.age(Instant::from_secs(5)), Duration::from_ticks(0));
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_pairs() {
        use std::sync::atomic::{AtomicBool, Ordering};

        static STORE: SensorReadingStore = SensorReadingStore::new();
        static DONE: AtomicBool = AtomicBool::new(false);

        let writer = std::thread::spawn(|| {
            for i in 0..2_000u32 {
                let t = i as f32;
                STORE.publish(Reading::from_celsius(t, t), Instant::from_ticks(i as u64));
            }
            DONE.store(true, Ordering::SeqCst);
        });

        while !DONE.load(Ordering::SeqCst) {
            if let Some(r) = STORE.latest() {
                assert_eq!(r.temperature, r.humidity);
                assert_eq!(r.heat_index, compute_heat_index(r.temperature, r.humidity, false));
            }
        }
        writer.join().unwrap();
    }
}
