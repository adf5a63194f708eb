//! Wi-Fi association and the TCP socket behind the metrics endpoint

use embassy_net::Stack;
use embassy_net::tcp::{AcceptError, TcpSocket};
use embassy_time::{Duration, Timer};
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiEvent};
use htsensor_core::config::NetworkConfig;
use htsensor_core::http::ConnectionSlot;
use log::{info, warn};

use crate::app_state::AppError;

/// Socket-level inactivity timeout, on top of the request head deadline.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Configure the station and start the radio.
pub async fn start_station(
    controller: &mut WifiController<'static>,
    network: &NetworkConfig<'_>,
) -> Result<(), AppError> {
    let client = ClientConfig::default()
        .with_ssid(network.ssid.into())
        .with_password(network.password.into());
    controller
        .set_config(&ModeConfig::Client(client))
        .map_err(AppError::wifi)?;
    controller.start_async().await.map_err(AppError::wifi)?;
    info!("WiFi started, joining {}", network.ssid);
    Ok(())
}

/// Associate once and wait for a DHCP lease.
pub async fn associate(
    controller: &mut WifiController<'static>,
    stack: Stack<'_>,
) -> Result<(), AppError> {
    controller.connect_async().await.map_err(AppError::wifi)?;
    stack.wait_config_up().await;
    if let Some(config) = stack.config_v4() {
        info!("Got IP: {}", config.address);
    }
    Ok(())
}

/// Keep the station associated after the first connection, forever.
pub async fn keep_connected(controller: &mut WifiController<'static>) -> ! {
    loop {
        controller.wait_for_event(WifiEvent::StaDisconnected).await;
        warn!("WiFi disconnected");

        loop {
            Timer::after(RECONNECT_DELAY).await;
            match controller.connect_async().await {
                Ok(()) => {
                    info!("WiFi reconnected");
                    break;
                }
                Err(e) => warn!("WiFi connect failed: {:?}, retrying", e),
            }
        }
    }
}

/// Socket error as seen through `embedded-io-async`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketError(pub embassy_net::tcp::Error);

impl embedded_io_async::Error for SocketError {
    fn kind(&self) -> ErrorKind {
        match self.0 {
            // embassy-net reports a peer RST and an expired socket timeout alike
            embassy_net::tcp::Error::ConnectionReset => ErrorKind::ConnectionReset,
        }
    }
}

/// The single listening socket of the metrics endpoint.
pub struct TcpSlot<'a> {
    socket: TcpSocket<'a>,
    port: u16,
}

impl<'a> TcpSlot<'a> {
    pub fn new(
        stack: Stack<'a>,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
        port: u16,
    ) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        Self { socket, port }
    }
}

impl ErrorType for TcpSlot<'_> {
    type Error = SocketError;
}

impl Read for TcpSlot<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.read(buf).await.map_err(SocketError)
    }
}

impl Write for TcpSlot<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.write(buf).await.map_err(SocketError)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.flush().await.map_err(SocketError)
    }
}

impl ConnectionSlot for TcpSlot<'_> {
    type AcceptError = AcceptError;

    async fn accept(&mut self) -> Result<(), Self::AcceptError> {
        self.socket.accept(self.port).await
    }

    async fn close(&mut self) {
        // Response is already flushed; reset so the next accept starts from Closed
        self.socket.abort();
    }
}
