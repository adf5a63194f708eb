//! Hand-written fakes shared by the unit tests
//!
//! Time is virtual: [`FakeDelay`] advances a shared clock instead of sleeping,
//! and [`FakeButton`] decides whether it is pressed by looking at that clock.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use core::net::Ipv4Addr;

use embassy_time::Instant;

use crate::display::{CharacterDisplay, NetworkStatus};
use crate::http::ConnectionSlot;
use crate::sensor::{HumiditySensor, SensorError};

/// Events recorded in order by the fakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SleepMs(u64),
    Power(bool),
}

/// Shared virtual clock (milliseconds) plus an ordered event log.
#[derive(Clone, Default)]
pub struct Timeline {
    now_ms: Rc<Cell<u64>>,
    events: Rc<RefCell<Vec<Event>>>,
}

impl Timeline {
    pub fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn delay(&self) -> FakeDelay {
        FakeDelay {
            timeline: self.clone(),
        }
    }

    pub fn power_pin(&self) -> FakePowerPin {
        FakePowerPin {
            timeline: self.clone(),
        }
    }
}

/// `DelayNs` that only advances the virtual clock.
pub struct FakeDelay {
    timeline: Timeline,
}

impl FakeDelay {
    fn sleep_ms(&mut self, ms: u64) {
        self.timeline.now_ms.set(self.timeline.now_ms.get() + ms);
        self.timeline.push(Event::SleepMs(ms));
    }
}

impl embedded_hal_async::delay::DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.sleep_ms(u64::from(ns) / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.sleep_ms(u64::from(us) / 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.sleep_ms(u64::from(ms));
    }
}

/// Sensor power rail that logs every level change.
pub struct FakePowerPin {
    timeline: Timeline,
}

impl embedded_hal::digital::ErrorType for FakePowerPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for FakePowerPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.timeline.push(Event::Power(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.timeline.push(Event::Power(true));
        Ok(())
    }
}

/// Active-low button held down during the given `[start, end)` windows (ms).
pub struct FakeButton {
    timeline: Timeline,
    held: Vec<(u64, u64)>,
}

impl FakeButton {
    pub fn new(timeline: &Timeline, held: &[(u64, u64)]) -> Self {
        Self {
            timeline: timeline.clone(),
            held: held.to_vec(),
        }
    }

    fn pressed(&self) -> bool {
        let now = self.timeline.now_ms();
        self.held.iter().any(|&(start, end)| now >= start && now < end)
    }
}

impl embedded_hal::digital::ErrorType for FakeButton {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for FakeButton {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pressed())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pressed())
    }
}

type ScriptedRead = (Result<f32, SensorError>, Result<f32, SensorError>);

/// Sensor replaying a fixed script of (temperature, humidity) results.
///
/// Once the script runs out every read returns NaN.
pub struct ScriptedSensor {
    script: VecDeque<ScriptedRead>,
    pending_humidity: Option<Result<f32, SensorError>>,
}

impl ScriptedSensor {
    pub fn new<I: IntoIterator<Item = ScriptedRead>>(script: I) -> Self {
        Self {
            script: script.into_iter().collect(),
            pending_humidity: None,
        }
    }

    pub fn failing() -> Self {
        Self::new([])
    }
}

impl HumiditySensor for ScriptedSensor {
    async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        let (temperature, humidity) = self.script.pop_front().unwrap_or((Ok(f32::NAN), Ok(f32::NAN)));
        self.pending_humidity = Some(humidity);
        temperature
    }

    async fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.pending_humidity.take().unwrap_or(Ok(f32::NAN))
    }
}

/// 16x2 character panel kept in memory.
#[derive(Debug, Default)]
pub struct FakePanel {
    pub lines: [String; 2],
    pub cursor: (u8, u8),
    pub backlight: bool,
    pub clears: usize,
}

impl FakePanel {
    pub fn text(&self) -> (String, String) {
        (self.lines[0].clone(), self.lines[1].clone())
    }
}

impl CharacterDisplay for FakePanel {
    type Error = Infallible;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.lines = [String::new(), String::new()];
        self.cursor = (0, 0);
        self.clears += 1;
        Ok(())
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), Self::Error> {
        self.cursor = (col, row);
        Ok(())
    }

    fn write(&mut self, text: &str) -> Result<(), Self::Error> {
        let row = usize::from(self.cursor.1.min(1));
        self.lines[row].push_str(text);
        self.cursor.0 += text.chars().count() as u8;
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), Self::Error> {
        self.backlight = on;
        Ok(())
    }
}

/// Network status with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FakeNetwork(pub Option<Ipv4Addr>);

impl NetworkStatus for FakeNetwork {
    fn is_connected(&self) -> bool {
        self.0.is_some()
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.0
    }
}

/// In-memory TCP connection.
///
/// Hands out the request bytes `chunk` at a time. When they run out the
/// connection either reports EOF or stalls forever. The first
/// `failed_accepts` calls to `accept` fail.
pub struct FakeConnection {
    request: VecDeque<u8>,
    chunk: usize,
    stall_at_end: bool,
    failed_accepts: usize,
    pub response: Vec<u8>,
    pub accepted: usize,
    pub accept_attempts: Vec<Instant>,
    pub closed: bool,
}

impl FakeConnection {
    pub fn new(request: &[u8]) -> Self {
        Self {
            request: request.iter().copied().collect(),
            chunk: 7,
            stall_at_end: false,
            failed_accepts: 0,
            response: Vec::new(),
            accepted: 0,
            accept_attempts: Vec::new(),
            closed: false,
        }
    }

    pub fn failing_accepts(request: &[u8], failures: usize) -> Self {
        Self {
            failed_accepts: failures,
            ..Self::new(request)
        }
    }

    pub fn stalling(request: &[u8]) -> Self {
        Self {
            stall_at_end: true,
            ..Self::new(request)
        }
    }

    pub fn response_text(&self) -> String {
        String::from_utf8(self.response.clone()).unwrap()
    }
}

impl embedded_io_async::ErrorType for FakeConnection {
    type Error = embedded_io_async::ErrorKind;
}

impl embedded_io_async::Read for FakeConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.request.is_empty() {
            if self.stall_at_end {
                core::future::pending::<()>().await;
            }
            return Ok(0);
        }
        let n = buf.len().min(self.chunk).min(self.request.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.request.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl embedded_io_async::Write for FakeConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.response.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ConnectionSlot for FakeConnection {
    type AcceptError = &'static str;

    async fn accept(&mut self) -> Result<(), Self::AcceptError> {
        self.accept_attempts.push(Instant::now());
        if self.failed_accepts > 0 {
            self.failed_accepts -= 1;
            return Err("no free socket");
        }
        self.accepted += 1;
        self.closed = false;
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
