//! One connection to one target: TCP plus optional TLS.
//!
//! # Design
//! A `Session` owns its transport and, for HTTPS, the rustls connection and
//! the client configuration holding the trust roots. They are created
//! together in `open` and released together when the session is closed or
//! dropped, so an early `?` return can never leak half of a session.
//! Sessions are single-use: the redirect coordinator closes one and opens a
//! fresh one for every hop.

use std::io::{self, Read, Write};
use std::sync::Arc;

use log::debug;
use rustls::pki_types::ServerName;
use rustls::ClientConnection;

use crate::config::RequestConfig;
use crate::error::HttpcError;
use crate::http::Target;
use crate::tls;
use crate::transport::{is_would_block, Connector, TcpConnector, Transport};

/// Outcome of a single receive attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// `n` bytes were written into the buffer.
    Data(usize),
    /// Nothing available yet; try again.
    WouldBlock,
    /// The peer closed the connection.
    Closed,
}

pub struct Session {
    config: RequestConfig,
    connector: Arc<dyn Connector>,
    stream: Box<dyn Transport>,
    tls: Option<ClientConnection>,
    closed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target().url())
            .field("tls", &self.tls.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Open a session over plain TCP sockets.
pub fn open_session(config: &RequestConfig) -> Result<Session, HttpcError> {
    Session::open(config)
}

impl Session {
    pub fn open(config: &RequestConfig) -> Result<Self, HttpcError> {
        Self::open_with(config, Arc::new(TcpConnector))
    }

    /// Validate `config`, connect through `connector`, and complete the TLS
    /// handshake when `is_https` is set.
    pub fn open_with(config: &RequestConfig, connector: Arc<dyn Connector>) -> Result<Self, HttpcError> {
        config.validate()?;

        let stream = connector
            .connect(&config.host, config.port, config.socket_timeout())
            .map_err(|source| HttpcError::Connect {
                host: config.host.clone(),
                port: config.port,
                source,
            })?;
        debug!("connected to {}:{}", config.host, config.port);

        let mut session = Session {
            config: config.clone(),
            connector,
            stream,
            tls: None,
            closed: false,
        };
        if config.is_https {
            session.start_tls()?;
        }
        Ok(session)
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub fn target(&self) -> Target {
        self.config.target()
    }

    pub(crate) fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    fn start_tls(&mut self) -> Result<(), HttpcError> {
        let roots = tls::load_roots(self.config.ca_cert_path.as_deref())?;
        let server_name = ServerName::try_from(self.config.host.clone())
            .map_err(|e| HttpcError::Param(format!("invalid server name {}: {e}", self.config.host)))?;
        let conn = ClientConnection::new(tls::client_config(roots), server_name)
            .map_err(|e| HttpcError::Init(e.to_string()))?;
        self.tls = Some(conn);
        self.handshake()?;

        let Some(conn) = self.tls.as_ref() else {
            return Err(HttpcError::Init("TLS state missing after handshake".to_string()));
        };
        if conn.peer_certificates().map_or(true, |chain| chain.is_empty()) {
            return Err(HttpcError::Certificate("peer presented no certificate".to_string()));
        }
        if self.config.debug_level > 0 {
            debug!(
                "TLS established with {}: {:?} {:?}",
                self.config.host,
                conn.protocol_version(),
                conn.negotiated_cipher_suite().map(|s| s.suite())
            );
        }
        Ok(())
    }

    /// Drive the handshake to completion. Would-block conditions on the
    /// socket are retried unless a socket timeout is configured, in which
    /// case they mean the deadline passed; anything else is fatal.
    fn handshake(&mut self) -> Result<(), HttpcError> {
        loop {
            self.flush_tls().map_err(|e| HttpcError::Handshake(e.to_string()))?;
            let Some(conn) = self.tls.as_mut() else {
                return Ok(());
            };
            if !conn.is_handshaking() {
                return Ok(());
            }
            match conn.read_tls(&mut self.stream) {
                Ok(0) => {
                    return Err(HttpcError::Handshake(
                        "connection closed during handshake".to_string(),
                    ));
                }
                Ok(_) => {
                    if let Err(e) = conn.process_new_packets() {
                        // Let the peer see our alert before we give up.
                        let _ = self.flush_tls();
                        return Err(e.into());
                    }
                }
                Err(e) if is_would_block(&e) && self.config.timeout_secs.is_none() => std::thread::yield_now(),
                Err(e) => return Err(HttpcError::Handshake(e.to_string())),
            }
        }
    }

    /// Write all pending TLS records to the socket. A write that times out
    /// under a configured socket timeout is returned as an error.
    fn flush_tls(&mut self) -> io::Result<()> {
        let retry = self.config.timeout_secs.is_none();
        let Some(conn) = self.tls.as_mut() else {
            return Ok(());
        };
        while conn.wants_write() {
            match conn.write_tls(&mut self.stream) {
                Ok(_) => {}
                Err(e) if retry && is_would_block(&e) => std::thread::yield_now(),
                Err(e) => return Err(e),
            }
        }
        self.stream.flush()
    }

    /// Send every byte of `bytes`.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), HttpcError> {
        if self.tls.is_none() {
            return self.stream.write_all(bytes).map_err(HttpcError::Write);
        }
        let mut rest = bytes;
        while let Some(conn) = self.tls.as_mut().filter(|_| !rest.is_empty()) {
            let n = conn.writer().write(rest).map_err(HttpcError::Write)?;
            rest = &rest[n..];
            self.flush_tls().map_err(HttpcError::Write)?;
        }
        Ok(())
    }

    /// One receive attempt into `buf`.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<Received, HttpcError> {
        if self.tls.is_none() {
            return match self.stream.read(buf) {
                Ok(0) => Ok(Received::Closed),
                Ok(n) => Ok(Received::Data(n)),
                Err(e) if is_would_block(&e) && self.config.timeout_secs.is_none() => {
                    Ok(Received::WouldBlock)
                }
                Err(e) => Err(HttpcError::Read(e)),
            };
        }
        self.receive_tls(buf)
    }

    fn receive_tls(&mut self, buf: &mut [u8]) -> Result<Received, HttpcError> {
        loop {
            let Some(conn) = self.tls.as_mut() else {
                return Ok(Received::Closed);
            };
            match conn.reader().read(buf) {
                Ok(0) => return Ok(Received::Closed),
                Ok(n) => return Ok(Received::Data(n)),
                // Peer went away without close_notify; treat like a plain EOF.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Received::Closed),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(HttpcError::Read(e)),
            }

            match conn.read_tls(&mut self.stream) {
                Ok(_) => {
                    conn.process_new_packets()
                        .map_err(|e| HttpcError::Read(io::Error::new(io::ErrorKind::InvalidData, e)))?;
                    self.flush_tls().map_err(HttpcError::Read)?;
                }
                Err(e) if is_would_block(&e) && self.config.timeout_secs.is_none() => {
                    return Ok(Received::WouldBlock);
                }
                Err(e) => return Err(HttpcError::Read(e)),
            }
        }
    }

    /// Orderly shutdown: TLS close-notify when applicable, then the socket.
    /// Consumes the session, so it happens at most once.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(conn) = self.tls.as_mut() {
            conn.send_close_notify();
            let _ = self.flush_tls();
        }
        let _ = self.stream.shutdown();
        debug!("closed session to {}:{}", self.config.host, self.config.port);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
