//! SSD1306 OLED driven as a two-line character panel
//!
//! The panel runs in terminal mode so the core can keep talking in lines and
//! cursor positions. "Backlight" maps to switching the panel on and off.

use esp_hal::Blocking;
use esp_hal::i2c::master::I2c;
use htsensor_core::display::CharacterDisplay;
use ssd1306::mode::{TerminalMode, TerminalModeError};
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};

pub type Oled = Ssd1306<I2CInterface<I2c<'static, Blocking>>, DisplaySize128x32, TerminalMode>;

/// Glyph used for the degree sign; the terminal font is ASCII only.
pub const DEGREE_SYMBOL: &str = "";

pub struct OledPanel {
    display: Oled,
}

impl OledPanel {
    /// Bring the panel up in terminal mode.
    pub fn init(i2c: I2c<'static, Blocking>) -> Result<Self, TerminalModeError> {
        let interface = I2CDisplayInterface::new(i2c);
        let mut display = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate0)
            .into_terminal_mode();
        display.init()?;
        display.clear()?;
        Ok(Self { display })
    }
}

impl CharacterDisplay for OledPanel {
    type Error = TerminalModeError;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.display.clear()
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), Self::Error> {
        self.display.set_position(col, row)
    }

    fn write(&mut self, text: &str) -> Result<(), Self::Error> {
        text.chars().try_for_each(|c| self.display.print_char(c))
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), Self::Error> {
        self.display
            .set_display_on(on)
            .map_err(TerminalModeError::InterfaceError)
    }
}
