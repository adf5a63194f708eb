//! Firmware-level error type and network status view

use core::net::Ipv4Addr;

use embassy_net::Stack;
use htsensor_core::display::NetworkStatus;
use thiserror_no_std::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Radio init failed: {0}")]
    Radio(heapless::String<64>),
    #[error("WiFi connection failed: {0}")]
    Wifi(heapless::String<64>),
}

impl AppError {
    /// Wrap any `Debug` error, truncated to fit the message buffer.
    pub fn wifi<E: core::fmt::Debug>(e: E) -> Self {
        Self::Wifi(debug_string(e))
    }

    pub fn radio<E: core::fmt::Debug>(e: E) -> Self {
        Self::Radio(debug_string(e))
    }
}

fn debug_string<E: core::fmt::Debug>(e: E) -> heapless::String<64> {
    use core::fmt::Write;

    let mut out = heapless::String::new();
    // Overflow just truncates the message
    let _ = write!(out, "{:?}", e);
    out
}

/// Connectivity as seen by the embassy-net stack.
#[derive(Clone, Copy)]
pub struct LinkStatus<'a> {
    stack: Stack<'a>,
}

impl<'a> LinkStatus<'a> {
    pub const fn new(stack: Stack<'a>) -> Self {
        Self { stack }
    }
}

impl NetworkStatus for LinkStatus<'_> {
    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.stack.config_v4().map(|config| config.address.address())
    }
}
