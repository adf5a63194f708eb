//! Push-button watcher
//!
//! The button pulls its input low when pressed. The pin is polled on a short
//! fixed interval; after a press the watcher sits out a hold-off window, which
//! both swallows contact bounce and limits page changes to one per window
//! however long the button is held.

use embassy_time::Duration;
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use crate::config::ButtonConfig;

/// Action run for every debounced press.
pub trait PressHandler {
    fn on_press(&mut self) -> impl Future<Output = ()>;
}

pub struct ButtonWatcher<B, D> {
    pin: B,
    delay: D,
    config: ButtonConfig,
}

impl<B: InputPin, D: DelayNs> ButtonWatcher<B, D> {
    pub fn new(pin: B, delay: D, config: ButtonConfig) -> Self {
        Self { pin, delay, config }
    }

    fn is_pressed(&mut self) -> bool {
        self.pin.is_low().unwrap_or_else(|e| {
            warn!("Button read failed: {:?}", e);
            false
        })
    }

    /// Check the pin once, handle a press, and wait for the next poll.
    ///
    /// Returns whether a press was handled.
    pub async fn poll<H: PressHandler>(&mut self, handler: &mut H) -> bool {
        let pressed = self.is_pressed();
        if pressed {
            handler.on_press().await;
            self.sleep(self.config.debounce_hold_off).await;
        }
        self.sleep(self.config.poll_interval).await;
        pressed
    }

    /// Poll forever.
    pub async fn run<H: PressHandler>(&mut self, mut handler: H) -> ! {
        info!(
            "Button watcher started (poll {} ms, hold-off {} ms)",
            self.config.poll_interval.as_millis(),
            self.config.debounce_hold_off.as_millis()
        );
        loop {
            self.poll(&mut handler).await;
        }
    }

    async fn sleep(&mut self, duration: Duration) {
        self.delay.delay_ms(duration.as_millis() as u32).await;
    }
}
