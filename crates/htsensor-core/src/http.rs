//! Single-connection HTTP responder serving the readings as Prometheus text
//!
//! Only one request shape is understood: a `GET /` gets the metrics document,
//! anything else gets an empty 404. The request head is consumed one byte at
//! a time until the first blank line; nothing after it is read.

use core::fmt;

use embassy_time::{Duration, Instant, Timer, with_timeout};
use embedded_io_async::{Error as _, ErrorKind, Read, Write};
use heapless::{String, Vec};
use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::config::HttpConfig;
use crate::store::{Reading, SensorReadingStore};

/// Upper bound on the request head; longer requests fail the connection.
pub const MAX_HEAD_LEN: usize = 1024;

/// Room for the status line, headers and the metrics body.
pub const RESPONSE_CAPACITY: usize = 1024;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(200);

const ROOT_GET: &[u8] = b"GET / HTTP";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    #[error("Accept failed")]
    Accept,
    #[error("Read failed: {0:?}")]
    Read(ErrorKind),
    #[error("Write failed: {0:?}")]
    Write(ErrorKind),
    #[error("Request head not received in time")]
    Timeout,
    #[error("Request head too large")]
    HeaderTooLarge,
    #[error("Connection closed before the request head ended")]
    ConnectionClosed,
    #[error("Response does not fit the send buffer")]
    ResponseTooLarge,
}

/// Accumulates a request head and spots the blank line that ends it.
pub struct HeadAccumulator<const N: usize> {
    buf: Vec<u8, N>,
    current_line_is_blank: bool,
    complete: bool,
}

impl<const N: usize> HeadAccumulator<N> {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            current_line_is_blank: true,
            complete: false,
        }
    }

    /// Feed one byte. Returns `Ok(true)` once the head is complete.
    pub fn push(&mut self, byte: u8) -> Result<bool, HttpError> {
        if self.complete {
            return Ok(true);
        }

        self.buf.push(byte).map_err(|_| HttpError::HeaderTooLarge)?;

        if byte == b'\n' && self.current_line_is_blank {
            self.complete = true;
            return Ok(true);
        }

        if byte == b'\n' {
            self.current_line_is_blank = true;
        } else if byte != b'\r' {
            self.current_line_is_blank = false;
        }
        Ok(false)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl<const N: usize> Default for HeadAccumulator<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// What the request asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Metrics,
    NotFound,
}

impl Route {
    pub fn from_head(head: &[u8]) -> Self {
        if head.windows(ROOT_GET.len()).any(|w| w == ROOT_GET) {
            Self::Metrics
        } else {
            Self::NotFound
        }
    }
}

/// A Prometheus gauge sample.
pub struct Gauge<'a> {
    pub name: &'a str,
    pub help: &'a str,
    pub value: f32,
}

impl Gauge<'_> {
    pub fn render_prometheus<W: fmt::Write>(
        &self,
        writer: &mut W,
        instance: &str,
        job: &str,
    ) -> fmt::Result {
        writeln!(writer, "# HELP {} {}", self.name, self.help)?;
        writeln!(writer, "# TYPE {} gauge", self.name)?;
        writeln!(
            writer,
            "{}{{instance=\"{}\",job=\"{}\"}} {:.6}",
            self.name, instance, job, self.value
        )
    }
}

/// The three gauges for `reading`; NaN before the first good sample.
pub fn gauges(reading: Option<Reading>) -> [Gauge<'static>; 3] {
    let (temperature, humidity, heat_index) = match reading {
        Some(r) => (r.temperature, r.humidity, r.heat_index),
        None => (f32::NAN, f32::NAN, f32::NAN),
    };
    [
        Gauge {
            name: "room_temperature_celsius",
            help: "Room temperature",
            value: temperature,
        },
        Gauge {
            name: "room_humidity_ratio",
            help: "Room humidity",
            value: humidity,
        },
        Gauge {
            name: "room_heat_index",
            help: "Room heat index",
            value: heat_index,
        },
    ]
}

/// Write the full response for `route`, trailing newline included.
pub fn write_response<W: fmt::Write>(
    out: &mut W,
    route: Route,
    reading: Option<Reading>,
    config: &HttpConfig<'_>,
) -> fmt::Result {
    match route {
        Route::Metrics => {
            out.write_str("HTTP/1.1 200 OK\r\n")?;
            out.write_str("Content-Type: text/plain; version=0.0.4; charset=utf-8\r\n")?;
            out.write_str("\r\n")?;
            for gauge in gauges(reading) {
                gauge.render_prometheus(out, config.instance, config.job)?;
            }
        }
        Route::NotFound => {
            out.write_str("HTTP/1.1 404 Not Found\r\n")?;
            out.write_str("Content-type: text/html\r\n")?;
            out.write_str("Connection: close\r\n")?;
            out.write_str("\r\n")?;
        }
    }
    out.write_str("\n")
}

async fn read_head<C: Read, const N: usize>(
    conn: &mut C,
    head: &mut HeadAccumulator<N>,
) -> Result<(), HttpError> {
    let mut byte = [0u8; 1];
    loop {
        let n = conn
            .read(&mut byte)
            .await
            .map_err(|e| HttpError::Read(e.kind()))?;
        if n == 0 {
            return Err(HttpError::ConnectionClosed);
        }
        if head.push(byte[0])? {
            return Ok(());
        }
    }
}

/// Handle one request on an accepted connection.
///
/// With `read_timeout: None` a client that never finishes its request head
/// holds the responder indefinitely.
pub async fn serve_connection<C: Read + Write>(
    conn: &mut C,
    store: &SensorReadingStore,
    config: &HttpConfig<'_>,
) -> Result<Route, HttpError> {
    let mut head = HeadAccumulator::<MAX_HEAD_LEN>::new();

    match config.read_timeout {
        Some(timeout) => with_timeout(timeout, read_head(conn, &mut head))
            .await
            .map_err(|_| HttpError::Timeout)??,
        None => read_head(conn, &mut head).await?,
    }

    let route = Route::from_head(head.as_bytes());

    let snapshot = store.snapshot();
    if let Some(snapshot) = snapshot {
        debug!(
            "Serving reading taken {} s ago",
            snapshot.age(Instant::now()).as_secs()
        );
    }

    let mut response = String::<RESPONSE_CAPACITY>::new();
    write_response(&mut response, route, snapshot.map(|s| s.reading), config)
        .map_err(|_| HttpError::ResponseTooLarge)?;

    conn.write_all(response.as_bytes())
        .await
        .map_err(|e| HttpError::Write(e.kind()))?;
    conn.flush().await.map_err(|e| HttpError::Write(e.kind()))?;

    Ok(route)
}

/// A socket that holds at most one client at a time.
///
/// `accept` waits for the next client; reads and writes then go to that
/// client until `close`.
pub trait ConnectionSlot: Read + Write {
    type AcceptError: fmt::Debug;

    fn accept(&mut self) -> impl Future<Output = Result<(), Self::AcceptError>>;

    fn close(&mut self) -> impl Future<Output = ()>;
}

/// Accept loop for the metrics endpoint.
pub struct MetricsServer<'a> {
    store: &'a SensorReadingStore,
    config: HttpConfig<'a>,
}

impl<'a> MetricsServer<'a> {
    pub const fn new(store: &'a SensorReadingStore, config: HttpConfig<'a>) -> Self {
        Self { store, config }
    }

    /// Accept, serve and close one connection.
    pub async fn serve_one<S: ConnectionSlot>(&self, slot: &mut S) -> Result<Route, HttpError> {
        slot.accept().await.map_err(|e| {
            warn!("Accept failed: {:?}", e);
            HttpError::Accept
        })?;

        let result = serve_connection(slot, self.store, &self.config).await;

        Timer::after(self.config.settle_after_close).await;
        slot.close().await;
        result
    }

    /// Serve clients one after another, forever.
    pub async fn run<S: ConnectionSlot>(&self, slot: &mut S) -> ! {
        info!("Metrics endpoint listening on port {}", self.config.port);
        loop {
            match self.serve_one(slot).await {
                Ok(route) => debug!("Served {:?}", route),
                Err(HttpError::Accept) => Timer::after(ACCEPT_RETRY_DELAY).await,
                Err(e) => warn!("Connection failed: {}", e),
            }
        }
    }
}
