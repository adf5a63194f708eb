//! `std::net` listener adapted to the core's single-connection slot
//!
//! Sockets are non-blocking and polled on an embassy timer, so waiting for a
//! client never stalls the other tasks on the executor thread.

use std::io::{self, Read as _, Write as _};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use embassy_time::{Duration, Timer};
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use htsensor_core::http::ConnectionSlot;
use log::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct ListenerSlot {
    listener: TcpListener,
    stream: Option<TcpStream>,
}

impl ListenerSlot {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            stream: None,
        })
    }

    fn stream(&mut self) -> Result<&mut TcpStream, ErrorKind> {
        self.stream.as_mut().ok_or(ErrorKind::NotConnected)
    }
}

fn io_kind(e: &io::Error) -> ErrorKind {
    match e.kind() {
        io::ErrorKind::ConnectionReset => ErrorKind::ConnectionReset,
        io::ErrorKind::ConnectionAborted => ErrorKind::ConnectionAborted,
        io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
        io::ErrorKind::TimedOut => ErrorKind::TimedOut,
        _ => ErrorKind::Other,
    }
}

impl ErrorType for ListenerSlot {
    type Error = ErrorKind;
}

impl Read for ListenerSlot {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        loop {
            match self.stream()?.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Timer::after(POLL_INTERVAL).await,
                Err(e) => return Err(io_kind(&e)),
            }
        }
    }
}

impl Write for ListenerSlot {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        loop {
            match self.stream()?.write(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Timer::after(POLL_INTERVAL).await,
                Err(e) => return Err(io_kind(&e)),
            }
        }
    }

    // Writes go straight to the socket
    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ConnectionSlot for ListenerSlot {
    type AcceptError = io::Error;

    async fn accept(&mut self) -> Result<(), Self::AcceptError> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(true)?;
                    debug!("Client connected from {}", peer);
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Timer::after(POLL_INTERVAL).await,
                Err(e) => return Err(e),
            }
        }
    }

    async fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}
