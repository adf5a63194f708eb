#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_futures::join::{join, join4};
use embassy_net::{DhcpConfig, StackResources};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use htsensor_core::acquisition::Acquisition;
use htsensor_core::button::ButtonWatcher;
use htsensor_core::config::{AcquisitionConfig, ButtonConfig, DisplayConfig, HttpConfig};
use htsensor_core::display::{
    AdvanceOnPress, BacklightReset, DisplayController, DisplayPage, backlight_task,
};
use htsensor_core::http::MetricsServer;
use htsensor_core::sensor::SharedSensor;
use htsensor_core::store::SensorReadingStore;
use htsensor_firmware::app_state::{AppError, LinkStatus};
use htsensor_firmware::net::{self, TcpSlot};
use htsensor_firmware::sht4x_sensor::Sht4xSensor;
use htsensor_firmware::wifi_secrets::NETWORK;
use log::{error, info, warn};
use static_cell::StaticCell;

#[cfg(feature = "display")]
use htsensor_core::display::CharacterPanel;
#[cfg(not(feature = "display"))]
use htsensor_core::display::Headless;
#[cfg(feature = "display")]
use htsensor_firmware::panel::{DEGREE_SYMBOL, OledPanel};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

type SensorBus = Mutex<CriticalSectionRawMutex, Sht4xSensor<I2c<'static, esp_hal::Async>>>;

#[cfg(feature = "display")]
type Sink = Option<CharacterPanel<OledPanel>>;
#[cfg(not(feature = "display"))]
type Sink = Headless;

const ASSOCIATE_RETRY_DELAY: Duration = Duration::from_secs(5);
const SOCKET_BUFFER_LEN: usize = 1024;

static STORE: SensorReadingStore = SensorReadingStore::new();
static BACKLIGHT_RESET: BacklightReset = BacklightReset::new();
static SENSOR_BUS: StaticCell<SensorBus> = StaticCell::new();
static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

async fn halt() -> ! {
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // esp-radio requires an allocator.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized");

    // Sensor power rail (high = powered) and active-low button
    let sensor_power = Output::new(peripherals.GPIO13, Level::High, OutputConfig::default());
    let button = Input::new(
        peripherals.GPIO12,
        InputConfig::default().with_pull(Pull::Up),
    );

    let sensor_i2c = match I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    ) {
        Ok(i2c) => i2c
            .with_sda(peripherals.GPIO8)
            .with_scl(peripherals.GPIO9)
            .into_async(),
        Err(e) => {
            error!("Sensor I2C config rejected: {:?}", e);
            halt().await
        }
    };
    let sensor_bus = SENSOR_BUS.init(Mutex::new(Sht4xSensor::new(sensor_i2c)));

    #[cfg(feature = "display")]
    let sink: Sink = match I2c::new(
        peripherals.I2C1,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    ) {
        Ok(i2c) => {
            let i2c = i2c.with_sda(peripherals.GPIO17).with_scl(peripherals.GPIO18);
            match OledPanel::init(i2c) {
                Ok(panel) => {
                    info!("Display initialized");
                    Some(CharacterPanel::new(panel).with_degree_symbol(DEGREE_SYMBOL))
                }
                Err(e) => {
                    warn!("Display not available, continuing without it: {:?}", e);
                    None
                }
            }
        }
        Err(e) => {
            warn!("Display I2C config rejected: {:?}", e);
            None
        }
    };
    #[cfg(not(feature = "display"))]
    let sink: Sink = Headless;

    // Wi-Fi station and network stack
    let radio = match esp_radio::init() {
        Ok(radio) => RADIO.init(radio),
        Err(e) => {
            error!("{}", AppError::radio(e));
            halt().await
        }
    };
    let (mut wifi_controller, interfaces) =
        match esp_radio::wifi::new(radio, peripherals.WIFI, Default::default()) {
            Ok(parts) => parts,
            Err(e) => {
                error!("{}", AppError::radio(e));
                halt().await
            }
        };

    let mut dhcp = DhcpConfig::default();
    dhcp.hostname = NETWORK.hostname.try_into().ok();

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (stack, mut net_runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(dhcp),
        NET_RESOURCES.init(StackResources::<3>::new()),
        seed,
    );

    let display = Mutex::<CriticalSectionRawMutex, _>::new(DisplayController::new(
        sink,
        LinkStatus::new(stack),
        &STORE,
    ));

    let mut rx_buffer = [0u8; SOCKET_BUFFER_LEN];
    let mut tx_buffer = [0u8; SOCKET_BUFFER_LEN];

    let app = async {
        display.lock().await.show_message("Connecting...", "");

        if let Err(e) = net::start_station(&mut wifi_controller, &NETWORK).await {
            error!("{}", e);
            display.lock().await.show_message("Cannot connect!", "");
            halt().await;
        }

        loop {
            match net::associate(&mut wifi_controller, stack).await {
                Ok(()) => break,
                // With a panel attached the failure is shown and the node stops
                Err(e) if cfg!(feature = "display") => {
                    error!("{}", e);
                    display.lock().await.show_message("Cannot connect!", "");
                    halt().await;
                }
                Err(e) => {
                    warn!("{}, retrying", e);
                    Timer::after(ASSOCIATE_RETRY_DELAY).await;
                }
            }
        }

        display
            .lock()
            .await
            .render(DisplayPage::NetworkStatus.index());
        BACKLIGHT_RESET.signal(());

        let mut acquisition = Acquisition::new(
            SharedSensor::new(sensor_bus),
            sensor_power,
            Delay,
            &STORE,
            AcquisitionConfig::DEFAULT,
        );
        let mut button_watcher = ButtonWatcher::new(button, Delay, ButtonConfig::DEFAULT);
        let server = MetricsServer::new(&STORE, HttpConfig::DEFAULT);
        let mut slot = TcpSlot::new(
            stack,
            &mut rx_buffer,
            &mut tx_buffer,
            HttpConfig::DEFAULT.port,
        );

        let _ = join(
            join4(
                acquisition.run(),
                button_watcher.run(AdvanceOnPress::new(&display, &BACKLIGHT_RESET)),
                backlight_task(&display, &BACKLIGHT_RESET, DisplayConfig::DEFAULT),
                server.run(&mut slot),
            ),
            net::keep_connected(&mut wifi_controller),
        )
        .await;
    };

    let _ = join(net_runner.run(), app).await;
    unreachable!()
}
