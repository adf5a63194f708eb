//! Desktop simulator for the htsensor temperature/humidity metrics node.
//!
//! Runs the core's acquisition, button, backlight and HTTP tasks on a host
//! executor thread. The sensor is synthetic, the panel is printed to the
//! terminal and the metrics endpoint listens on port 8000 like the real node.
//!
//! # Controls
//!
//! | Input      | Action                       |
//! |------------|------------------------------|
//! | Enter      | Button press (next page)     |
//! | q + Enter  | Quit                         |
//!
//! Scrape with `curl http://localhost:8000/`.

mod listener;
mod sim_hw;

use std::io::BufRead;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};

use embassy_executor::Spawner;
use embassy_futures::join::join4;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Delay, Duration};
use log::{error, info};

use htsensor_core::acquisition::Acquisition;
use htsensor_core::button::ButtonWatcher;
use htsensor_core::config::{AcquisitionConfig, ButtonConfig, DisplayConfig, HttpConfig};
use htsensor_core::display::{
    AdvanceOnPress, BacklightReset, CharacterPanel, DisplayController, DisplayPage, backlight_task,
};
use htsensor_core::http::MetricsServer;
use htsensor_core::sensor::SharedSensor;
use htsensor_core::store::SensorReadingStore;

use listener::ListenerSlot;
use sim_hw::{SimNetwork, SimPowerPin, StdinButton, SyntheticSensor, TerminalPanel};

// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

/// Faster steady-state polling than the real node so changes show up quickly.
const ACQUISITION: AcquisitionConfig = AcquisitionConfig {
    poll_interval: Duration::from_secs(5),
    retry_interval: Duration::from_secs(2),
    ..AcquisitionConfig::DEFAULT
};

const SIM_ADDRESS: Ipv4Addr = Ipv4Addr::LOCALHOST;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

static STORE: SensorReadingStore = SensorReadingStore::new();
static BACKLIGHT_RESET: BacklightReset = BacklightReset::new();
static BUTTON_PENDING: AtomicBool = AtomicBool::new(false);

/// Turns stdin lines into button presses; runs on its own OS thread.
fn spawn_stdin_reader() {
    std::thread::spawn(|| {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim() == "q" => {
                    info!("Simulator exiting");
                    std::process::exit(0);
                }
                Ok(_) => BUTTON_PENDING.store(true, Ordering::Release),
                Err(e) => {
                    error!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::init();
    info!("Starting htsensor simulator");

    let http = HttpConfig::DEFAULT;
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, http.port));
    let mut slot = match ListenerSlot::bind(addr) {
        Ok(slot) => slot,
        Err(e) => {
            error!("Cannot listen on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    let mut controller = DisplayController::new(
        CharacterPanel::new(TerminalPanel::default()),
        SimNetwork {
            address: SIM_ADDRESS,
        },
        &STORE,
    );
    controller.show_message("Connecting...", "");
    // Host networking is already up
    controller.render(DisplayPage::NetworkStatus.index());
    let display = Mutex::<CriticalSectionRawMutex, _>::new(controller);
    BACKLIGHT_RESET.signal(());

    let sensor_bus = Mutex::<CriticalSectionRawMutex, _>::new(SyntheticSensor::new());
    let mut acquisition = Acquisition::new(
        SharedSensor::new(&sensor_bus),
        SimPowerPin,
        Delay,
        &STORE,
        ACQUISITION,
    );
    let mut button = ButtonWatcher::new(
        StdinButton::new(&BUTTON_PENDING),
        Delay,
        ButtonConfig::DEFAULT,
    );
    let server = MetricsServer::new(&STORE, http);

    info!("Press Enter to cycle pages, q + Enter to quit");
    spawn_stdin_reader();

    let _ = join4(
        acquisition.run(),
        button.run(AdvanceOnPress::new(&display, &BACKLIGHT_RESET)),
        backlight_task(&display, &BACKLIGHT_RESET, DisplayConfig::DEFAULT),
        server.run(&mut slot),
    )
    .await;
}
