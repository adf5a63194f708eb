//! ESP32-S3 firmware-specific modules for htsensor
//!
//! This crate binds the hardware-independent core to real peripherals: the
//! SHT4x sensor on I2C, the SSD1306 panel in terminal mode, the Wi-Fi station
//! and the TCP socket behind the metrics endpoint.

#![no_std]

pub mod app_state;
pub mod net;
#[cfg(feature = "display")]
pub mod panel;
pub mod sht4x_sensor;
pub mod wifi_secrets;
