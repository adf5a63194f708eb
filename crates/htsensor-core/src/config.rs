//! Compile-time configuration for the node
//!
//! Everything here is fixed at build time. The structs exist so the firmware,
//! the simulator and the tests can each pick their own timings without the
//! core hard-coding them, not so the values can change at runtime.

use embassy_time::Duration;

/// Hostname announced to the network and used as the `instance` metric label.
pub const HOSTNAME: &str = "htsensoresp32";

/// Value of the `job` metric label.
pub const JOB: &str = "air-quality";

/// TCP port the metrics endpoint listens on.
pub const HTTP_PORT: u16 = 8000;

/// Timings and thresholds for the sensor acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Sleep after a successful read (steady-state poll period)
    pub poll_interval: Duration,
    /// Sleep after a failed read
    pub retry_interval: Duration,
    /// Number of consecutive failures tolerated before the sensor is power-cycled
    pub failure_threshold: u32,
    /// How long the sensor stays unpowered during recovery
    pub power_off_settle: Duration,
    /// How long the sensor is given to boot after power is restored
    pub power_on_boot: Duration,
}

impl AcquisitionConfig {
    pub const DEFAULT: Self = Self {
        poll_interval: Duration::from_secs(60),
        retry_interval: Duration::from_secs(5),
        failure_threshold: 10,
        power_off_settle: Duration::from_secs(3),
        power_on_boot: Duration::from_secs(5),
    };
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Backlight and refresh timings for the display subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Time after the last button press before the backlight turns off
    pub backlight_timeout: Duration,
    /// How often the visible page is redrawn while the backlight is on
    pub refresh_interval: Duration,
}

impl DisplayConfig {
    pub const DEFAULT: Self = Self {
        backlight_timeout: Duration::from_millis(5000),
        refresh_interval: Duration::from_secs(5),
    };
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Polling cadence for the push button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonConfig {
    /// Interval between two reads of the input pin
    pub poll_interval: Duration,
    /// Pause after a detected press; also bounds the page advance rate
    pub debounce_hold_off: Duration,
}

impl ButtonConfig {
    pub const DEFAULT: Self = Self {
        poll_interval: Duration::from_millis(30),
        debounce_hold_off: Duration::from_millis(500),
    };
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Settings for the metrics HTTP responder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig<'a> {
    pub port: u16,
    /// `instance` label value
    pub instance: &'a str,
    /// `job` label value
    pub job: &'a str,
    /// Deadline for receiving the complete request head.
    ///
    /// `None` waits forever for a stalled client and keeps every other client
    /// out until it goes away.
    pub read_timeout: Option<Duration>,
    /// Pause between closing a connection and accepting the next one
    pub settle_after_close: Duration,
}

impl HttpConfig<'static> {
    pub const DEFAULT: Self = Self {
        port: HTTP_PORT,
        instance: HOSTNAME,
        job: JOB,
        read_timeout: Some(Duration::from_secs(5)),
        settle_after_close: Duration::from_millis(10),
    };
}

impl Default for HttpConfig<'static> {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Wi-Fi association settings, filled from the build environment by the firmware
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkConfig<'a> {
    pub hostname: &'a str,
    pub ssid: &'a str,
    pub password: &'a str,
}
