//! Stand-ins for the node's peripherals

use std::convert::Infallible;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use htsensor_core::display::{CharacterDisplay, NetworkStatus};
use htsensor_core::sensor::{HumiditySensor, SensorError};
use log::info;

/// Every n-th measurement fails, so the retry path shows up in the logs.
const FAULT_EVERY: u32 = 7;

/// Generates slowly varying temperature/humidity values.
pub struct SyntheticSensor {
    started: Instant,
    reads: u32,
    humidity: Option<f32>,
}

impl SyntheticSensor {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            reads: 0,
            humidity: None,
        }
    }
}

impl HumiditySensor for SyntheticSensor {
    async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.reads = self.reads.wrapping_add(1);
        if self.reads % FAULT_EVERY == 0 {
            self.humidity = None;
            return Err(SensorError::Timeout {
                sensor: "synthetic",
            });
        }

        let t = self.started.elapsed().as_secs_f64();

        // Temperature: 20-26 °C sinusoidal with slow drift
        let temperature = 23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos();
        // Humidity: 40-60 % with a different period
        let humidity = 50.0 + 10.0 * (t / 180.0).sin() + 2.0 * (t / 23.0).cos();

        self.humidity = Some(humidity as f32);
        Ok(temperature as f32)
    }

    async fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.humidity.take().ok_or(SensorError::NotReady {
            sensor: "synthetic",
        })
    }
}

/// Sensor power rail; only logs.
pub struct SimPowerPin;

impl embedded_hal::digital::ErrorType for SimPowerPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for SimPowerPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        info!("[power] sensor rail off");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        info!("[power] sensor rail on");
        Ok(())
    }
}

/// Button pressed once per line typed on stdin.
pub struct StdinButton {
    pending: &'static AtomicBool,
}

impl StdinButton {
    pub const fn new(pending: &'static AtomicBool) -> Self {
        Self { pending }
    }
}

impl embedded_hal::digital::ErrorType for StdinButton {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for StdinButton {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.is_low().map(|low| !low)
    }

    // Consumes the pending press
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pending.swap(false, Ordering::AcqRel))
    }
}

/// 16x2 panel printed to stdout whenever a frame completes.
#[derive(Default)]
pub struct TerminalPanel {
    lines: [String; 2],
    row: usize,
    lit: bool,
}

impl TerminalPanel {
    fn print_frame(&self) {
        println!("+------------------+");
        for line in &self.lines {
            println!("| {:<16} |", line);
        }
        println!("+------------------+");
    }
}

impl CharacterDisplay for TerminalPanel {
    type Error = Infallible;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.lines = Default::default();
        self.row = 0;
        Ok(())
    }

    fn set_cursor(&mut self, _col: u8, row: u8) -> Result<(), Self::Error> {
        self.row = usize::from(row.min(1));
        Ok(())
    }

    fn write(&mut self, text: &str) -> Result<(), Self::Error> {
        self.lines[self.row].push_str(text);
        // The second line is always written last
        if self.row == 1 {
            self.print_frame();
        }
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), Self::Error> {
        if self.lit && !on {
            println!("[panel] backlight off");
        }
        self.lit = on;
        Ok(())
    }
}

/// The host is always online at a fixed address.
#[derive(Debug, Clone, Copy)]
pub struct SimNetwork {
    pub address: Ipv4Addr,
}

impl NetworkStatus for SimNetwork {
    fn is_connected(&self) -> bool {
        true
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        Some(self.address)
    }
}
