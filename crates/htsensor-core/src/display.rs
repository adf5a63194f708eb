//! Display state machine, backlight timer and presentation sinks
//!
//! The node shows one of two pages (readings, network status) on a small
//! character panel. A button press advances the page and keeps the backlight
//! on; the backlight turns itself off a fixed time after the last press.
//!
//! Headless deployments use the same controller with the [`Headless`] sink,
//! so the button and backlight tasks never need to know whether a panel is
//! attached.

use core::fmt::Write;
use core::net::Ipv4Addr;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use heapless::String;
use log::{debug, warn};
use thiserror_no_std::Error;

use crate::button::PressHandler;
use crate::config::DisplayConfig;
use crate::store::{Reading, SensorReadingStore};

/// Character panel driver consumed by [`CharacterPanel`].
pub trait CharacterDisplay {
    type Error: core::fmt::Debug;

    fn clear(&mut self) -> Result<(), Self::Error>;
    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), Self::Error>;
    fn write(&mut self, text: &str) -> Result<(), Self::Error>;
    fn set_backlight(&mut self, on: bool) -> Result<(), Self::Error>;
}

/// Connectivity as reported by the network stack.
pub trait NetworkStatus {
    fn is_connected(&self) -> bool;
    fn local_address(&self) -> Option<Ipv4Addr>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    #[error("Display bus error")]
    Bus,
    #[error("Text does not fit the line buffer")]
    Format,
}

/// Pages in cycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPage {
    Readings,
    NetworkStatus,
}

impl DisplayPage {
    pub const COUNT: usize = 2;

    /// Page for any index, wrapping around so repeated advances cycle.
    pub const fn from_index(index: usize) -> Self {
        match index % Self::COUNT {
            0 => Self::Readings,
            _ => Self::NetworkStatus,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Readings => 0,
            Self::NetworkStatus => 1,
        }
    }
}

/// Everything a page needs to draw itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageView {
    pub reading: Option<Reading>,
    pub connected: bool,
    pub address: Option<Ipv4Addr>,
}

/// One line of panel text
pub type Line = String<32>;

/// Format the two lines of `page`.
pub fn format_page(
    page: DisplayPage,
    view: &PageView,
    degree_symbol: &str,
) -> Result<(Line, Line), DisplayError> {
    let mut first = Line::new();
    let mut second = Line::new();

    match page {
        DisplayPage::Readings => match view.reading {
            Some(r) => {
                write!(first, "Temp:   {:5.2} {}C", r.temperature, degree_symbol)
                    .map_err(|_| DisplayError::Format)?;
                write!(second, "Humi:   {:5.2} %", r.humidity).map_err(|_| DisplayError::Format)?;
            }
            None => {
                write!(first, "Temp:   --.-- {}C", degree_symbol)
                    .map_err(|_| DisplayError::Format)?;
                second
                    .push_str("Humi:   --.-- %")
                    .map_err(|_| DisplayError::Format)?;
            }
        },
        DisplayPage::NetworkStatus => {
            let status = if view.connected {
                "Connected!"
            } else {
                "Offline..."
            };
            first.push_str(status).map_err(|_| DisplayError::Format)?;
            if let (true, Some(address)) = (view.connected, view.address) {
                write!(second, "{}", address).map_err(|_| DisplayError::Format)?;
            }
        }
    }

    Ok((first, second))
}

/// Where the display state machine sends its output.
pub trait PresentationSink {
    /// Clear, switch the backlight on and draw `page`.
    fn render(&mut self, page: DisplayPage, view: &PageView) -> Result<(), DisplayError>;

    /// Clear and switch the backlight off.
    fn off(&mut self) -> Result<(), DisplayError>;

    /// Free-form two-line message (startup status, fatal errors).
    fn show_message(&mut self, first: &str, second: &str) -> Result<(), DisplayError>;
}

/// Sink for deployments without a panel.
#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl PresentationSink for Headless {
    fn render(&mut self, _page: DisplayPage, _view: &PageView) -> Result<(), DisplayError> {
        Ok(())
    }

    fn off(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }

    fn show_message(&mut self, _first: &str, _second: &str) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// A panel that may not have been detected at boot; `None` behaves like
/// [`Headless`].
impl<P: PresentationSink> PresentationSink for Option<P> {
    fn render(&mut self, page: DisplayPage, view: &PageView) -> Result<(), DisplayError> {
        self.as_mut().map_or(Ok(()), |sink| sink.render(page, view))
    }

    fn off(&mut self) -> Result<(), DisplayError> {
        self.as_mut().map_or(Ok(()), |sink| sink.off())
    }

    fn show_message(&mut self, first: &str, second: &str) -> Result<(), DisplayError> {
        self.as_mut()
            .map_or(Ok(()), |sink| sink.show_message(first, second))
    }
}

fn bus_error<E: core::fmt::Debug>(e: E) -> DisplayError {
    warn!("Display write failed: {:?}", e);
    DisplayError::Bus
}

/// Sink driving a two-line character panel.
pub struct CharacterPanel<D> {
    display: D,
    degree_symbol: &'static str,
}

impl<D: CharacterDisplay> CharacterPanel<D> {
    pub fn new(display: D) -> Self {
        Self {
            display,
            degree_symbol: "\u{b0}",
        }
    }

    /// Use a different glyph for the degree sign (panels without `°` in ROM).
    pub fn with_degree_symbol(mut self, symbol: &'static str) -> Self {
        self.degree_symbol = symbol;
        self
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn write_lines(&mut self, first: &str, second: &str) -> Result<(), DisplayError> {
        self.display.clear().map_err(bus_error)?;
        self.display.set_cursor(0, 0).map_err(bus_error)?;
        self.display.set_backlight(true).map_err(bus_error)?;
        self.display.write(first).map_err(bus_error)?;
        self.display.set_cursor(0, 1).map_err(bus_error)?;
        self.display.write(second).map_err(bus_error)
    }
}

impl<D: CharacterDisplay> PresentationSink for CharacterPanel<D> {
    fn render(&mut self, page: DisplayPage, view: &PageView) -> Result<(), DisplayError> {
        let (first, second) = format_page(page, view, self.degree_symbol)?;
        self.write_lines(&first, &second)
    }

    fn off(&mut self) -> Result<(), DisplayError> {
        self.display.clear().map_err(bus_error)?;
        self.display.set_backlight(false).map_err(bus_error)
    }

    fn show_message(&mut self, first: &str, second: &str) -> Result<(), DisplayError> {
        self.write_lines(first, second)
    }
}

/// Tracks the visible page and drives the sink.
///
/// `current` is `None` while the display is off, so the next advance starts
/// again from the first page instead of resuming the old one.
pub struct DisplayController<'a, P, N> {
    sink: P,
    network: N,
    store: &'a SensorReadingStore,
    current: Option<DisplayPage>,
}

impl<'a, P: PresentationSink, N: NetworkStatus> DisplayController<'a, P, N> {
    pub fn new(sink: P, network: N, store: &'a SensorReadingStore) -> Self {
        Self {
            sink,
            network,
            store,
            current: None,
        }
    }

    pub fn current_page(&self) -> Option<DisplayPage> {
        self.current
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    fn view(&self) -> PageView {
        PageView {
            reading: self.store.latest(),
            connected: self.network.is_connected(),
            address: self.network.local_address(),
        }
    }

    /// Show page `index mod 2` with the backlight on.
    pub fn render(&mut self, index: usize) {
        let page = DisplayPage::from_index(index);
        self.current = Some(page);
        let view = self.view();
        if let Err(e) = self.sink.render(page, &view) {
            warn!("Failed to render {:?}: {}", page, e);
        }
    }

    /// Move to the next page; from "off" this is the first page.
    pub fn advance(&mut self) {
        let next = self.current.map_or(0, |page| page.index() + 1);
        debug!("Advancing to page {}", next % DisplayPage::COUNT);
        self.render(next);
    }

    /// Redraw the visible page with fresh data. Does nothing while off.
    pub fn refresh(&mut self) {
        if let Some(page) = self.current {
            self.render(page.index());
        }
    }

    /// Blank the panel, backlight off, forget the page.
    pub fn turn_off(&mut self) {
        if let Err(e) = self.sink.off() {
            warn!("Failed to turn display off: {}", e);
        }
        self.current = None;
    }

    pub fn show_message(&mut self, first: &str, second: &str) {
        if let Err(e) = self.sink.show_message(first, second) {
            warn!("Failed to show message: {}", e);
        }
    }
}

/// Display controller shared between the button and backlight tasks.
pub type SharedDisplay<'a, P, N> = Mutex<CriticalSectionRawMutex, DisplayController<'a, P, N>>;

/// Raised on every button press to restart the backlight countdown.
pub type BacklightReset = Signal<CriticalSectionRawMutex, ()>;

/// One-shot countdown that can be restarted at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacklightTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl BacklightTimer {
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// (Re)start the countdown from `now`, even if it is already running.
    pub fn reset(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Returns true exactly once when the countdown has run out.
    pub fn fire_if_expired(&mut self, now: Instant) -> bool {
        if self.is_expired(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

/// Turns the backlight off after inactivity and keeps the visible page fresh.
pub async fn backlight_task<P, N>(
    display: &SharedDisplay<'_, P, N>,
    reset: &BacklightReset,
    config: DisplayConfig,
) -> !
where
    P: PresentationSink,
    N: NetworkStatus,
{
    let mut timer = BacklightTimer::new(config.backlight_timeout);

    loop {
        let Some(deadline) = timer.deadline() else {
            reset.wait().await;
            timer.reset(Instant::now());
            continue;
        };

        let wake_at = deadline.min(Instant::now() + config.refresh_interval);
        match select(Timer::at(wake_at), reset.wait()).await {
            Either::First(()) => {
                let mut display = display.lock().await;
                if timer.fire_if_expired(Instant::now()) {
                    debug!("Backlight timeout");
                    display.turn_off();
                } else {
                    display.refresh();
                }
            }
            Either::Second(()) => timer.reset(Instant::now()),
        }
    }
}

/// Button action: next page, then restart the backlight countdown.
pub struct AdvanceOnPress<'d, 'a, P, N> {
    display: &'d SharedDisplay<'a, P, N>,
    reset: &'d BacklightReset,
}

impl<'d, 'a, P, N> AdvanceOnPress<'d, 'a, P, N> {
    pub const fn new(display: &'d SharedDisplay<'a, P, N>, reset: &'d BacklightReset) -> Self {
        Self { display, reset }
    }
}

impl<P: PresentationSink, N: NetworkStatus> PressHandler for AdvanceOnPress<'_, '_, P, N> {
    async fn on_press(&mut self) {
        self.display.lock().await.advance();
        self.reset.signal(());
    }
}
