//! Redirect-following request coordinator.
//!
//! # Design
//! One logical request walks `connect -> send -> read/parse`, and on a
//! 301/302 goes around again against the resolved `Location`. Every hop uses
//! a fresh `Session`: the previous one is closed before the next is opened,
//! and a session abandoned by an early `?` is closed by its `Drop`. The
//! follow-up request is always rebuilt from the hop's configuration, never
//! replayed from the caller's raw request.

use std::sync::Arc;

use log::debug;

use crate::config::{RequestConfig, MAX_REDIRECTS};
use crate::error::HttpcError;
use crate::http::Target;
use crate::request::build_request;
use crate::response::read_response;
use crate::session::Session;
use crate::transport::{Connector, TcpConnector};

/// Result of one logical request, redirects included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Bytes of the final response held in the caller buffer.
    pub bytes_read: usize,
    pub status: u16,
    /// Redirects followed before the final response.
    pub hops: usize,
    pub final_target: Target,
    /// The final response did not fit the buffer.
    pub truncated: bool,
}

impl Exchange {
    pub fn final_url(&self) -> String {
        self.final_target.url()
    }
}

enum Hop {
    Done(Exchange),
    Redirect(Target),
}

/// Send the configured request over `session` and read the reply into
/// `buf`, following up to `MAX_REDIRECTS` redirects.
///
/// On success `buf` holds the final response followed by a zero byte. On
/// failure it may hold a partial response, which must be treated as
/// incomplete. The session is consumed and closed in every case.
pub fn send_and_receive(session: Session, buf: &mut [u8]) -> Result<Exchange, HttpcError> {
    if buf.is_empty() {
        return Err(HttpcError::Param("response buffer has no capacity".to_string()));
    }
    let connector = session.connector();
    let mut session = session;
    let mut hops = 0;

    loop {
        let next = match exchange_once(&mut session, buf, hops)? {
            Hop::Done(exchange) => {
                session.close();
                return Ok(exchange);
            }
            Hop::Redirect(next) => next,
        };

        let config = session.config().redirected_to(&next);
        session.close();
        if hops >= MAX_REDIRECTS {
            debug!("giving up on {} after {hops} redirects", next.url());
            return Err(HttpcError::TooManyRedirects(MAX_REDIRECTS));
        }
        hops += 1;
        debug!("redirect {hops} -> {}", next.url());
        session = Session::open_with(&config, Arc::clone(&connector))?;
    }
}

fn exchange_once(session: &mut Session, buf: &mut [u8], hops: usize) -> Result<Hop, HttpcError> {
    let request = build_request(session.config())?;
    if session.config().debug_level > 0 {
        debug!("sending {} bytes to {}", request.len(), session.target().url());
    }
    session.send(&request)?;

    let (bytes_read, view) = read_response(session, buf)?;
    let target = session.target();
    if !view.is_redirect() {
        return Ok(Hop::Done(Exchange {
            bytes_read,
            status: view.status,
            hops,
            final_target: target,
            truncated: view.truncated,
        }));
    }

    let location = view.location().ok_or_else(|| {
        HttpcError::Redirect(format!("{} from {} without Location", view.status, target.url()))
    })?;
    target.resolve_location(location).map(Hop::Redirect)
}

/// A request configuration bound to a connector.
#[derive(Clone)]
pub struct Client {
    config: RequestConfig,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(config: RequestConfig) -> Self {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    pub fn with_connector(config: RequestConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub fn open_session(&self) -> Result<Session, HttpcError> {
        Session::open_with(&self.config, Arc::clone(&self.connector))
    }

    /// Open a session and run `send_and_receive` on it.
    pub fn execute(&self, buf: &mut [u8]) -> Result<Exchange, HttpcError> {
        if buf.is_empty() {
            return Err(HttpcError::Param("response buffer has no capacity".to_string()));
        }
        send_and_receive(self.open_session()?, buf)
    }
}
