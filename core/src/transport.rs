//! Byte streams under a session.
//!
//! # Design
//! A session never opens sockets itself; it asks a `Connector` for a
//! `Transport`. The default `TcpConnector` wraps `std::net::TcpStream`.
//! Tests plug in scripted connectors to count opens and closes without
//! touching the network.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A connected, bidirectional byte stream.
pub trait Transport: Read + Write + Send {
    /// Orderly shutdown of both directions. Errors are not fatal to the
    /// caller; the stream is released on drop regardless.
    fn shutdown(&mut self) -> io::Result<()>;
}

/// Opens transports to `host:port`.
pub trait Connector: Send + Sync {
    fn connect(&self, host: &str, port: u16, timeout: Option<Duration>) -> io::Result<Box<dyn Transport>>;
}

impl Transport for TcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Plain blocking TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, host: &str, port: u16, timeout: Option<Duration>) -> io::Result<Box<dyn Transport>> {
        let stream = match timeout {
            None => TcpStream::connect((host, port))?,
            Some(timeout) => connect_with_timeout(host, port, timeout)?,
        };
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

/// Try every resolved address in turn, keeping the last error.
fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("{host} resolved to no addresses"))
    }))
}

/// Whether an I/O error only means "not ready yet".
pub(crate) fn is_would_block(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
}
