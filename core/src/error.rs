//! Error types for the request engine.
//!
//! # Design
//! One variant per failure category the engine can report. Each top-level
//! call returns exactly one of these; the only retry the engine performs is
//! the would-block retry inside a session, so a variant here is always final.
//! `code()` gives the stable numeric code exposed through the C ABI.

use std::io;

/// Errors returned by session, builder, parser and coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum HttpcError {
    /// TLS client configuration could not be assembled.
    #[error("initialization failed: {0}")]
    Init(String),

    /// DNS resolution or TCP connect failed.
    #[error("connect to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// TLS negotiation failed for a reason other than certificate trust.
    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    /// Trust roots could not be loaded, or the peer certificate was rejected.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Sending the request failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Receiving the response failed.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The configuration or a call argument is unusable.
    #[error("invalid parameter: {0}")]
    Param(String),

    /// The response bytes could not be interpreted.
    #[error("unparseable response: {0}")]
    Parse(String),

    /// A redirect response carried no usable `Location`.
    #[error("redirect failed: {0}")]
    Redirect(String),

    /// The redirect chain exceeded the hop limit.
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// Text could not be converted to UTF-8 or did not fit its bound.
    #[error("encoding conversion failed: {0}")]
    Codec(String),
}

impl HttpcError {
    /// Numeric code matching the C ABI's `httpc_err_t`.
    pub fn code(&self) -> i32 {
        match self {
            HttpcError::Init(_) => -1,
            HttpcError::Connect { .. } => -2,
            HttpcError::Handshake(_) => -3,
            HttpcError::Certificate(_) => -4,
            HttpcError::Write(_) => -5,
            HttpcError::Read(_) => -6,
            HttpcError::Param(_) => -7,
            HttpcError::Parse(_) | HttpcError::Codec(_) => -8,
            HttpcError::Redirect(_) => -9,
            HttpcError::TooManyRedirects(_) => -10,
        }
    }
}

impl From<rustls::Error> for HttpcError {
    /// Certificate trust failures are reported separately from other
    /// negotiation failures.
    fn from(err: rustls::Error) -> Self {
        match err {
            rustls::Error::InvalidCertificate(_) | rustls::Error::NoCertificatesPresented => {
                HttpcError::Certificate(err.to_string())
            }
            other => HttpcError::Handshake(other.to_string()),
        }
    }
}
