//! Hardware-independent core library for htsensor
//!
//! This crate contains all platform-agnostic logic for the temperature/humidity
//! metrics node: the sensor acquisition loop with power-cycle recovery, the
//! shared reading store, the display/button/backlight state machine and the
//! single-connection HTTP metrics responder.
//!
//! It is `#![no_std]` so it compiles on both the embedded target (ESP32-S3)
//! and desktop hosts (for the simulator and tests). Hardware is reached only
//! through the traits in [`sensor`] and [`display`] and the `embedded-hal`
//! pin and delay traits.

#![cfg_attr(not(test), no_std)]

pub mod acquisition;
pub mod button;
pub mod config;
pub mod display;
pub mod heat_index;
pub mod http;
pub mod sensor;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;
