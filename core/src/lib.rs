//! Blocking HTTP/HTTPS request engine with redirect following.
//!
//! # Overview
//! A `RequestConfig` names the target and the request. `open_session`
//! connects (and negotiates TLS with certificate verification when asked),
//! and `send_and_receive` writes the request, reads the reply into a
//! caller-owned buffer and follows 301/302 redirects across hosts and
//! schemes, opening a fresh session per hop.
//!
//! # Design
//! - No connection reuse, no HTTP/2, no chunked decoding: a response is read
//!   until the peer closes or the buffer is full.
//! - Responses are parsed in place; `ResponseView` borrows the buffer.
//! - The text helpers in `text` cover what callers do with response bodies:
//!   legacy-encoding recovery, JSON `\uXXXX` decoding, marker extraction and
//!   form encoding.
//! - Logging goes through the `log` facade only.

pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod response;
pub mod session;
pub mod text;
pub mod tls;
pub mod transport;

pub use cache::TtlCache;
pub use client::{send_and_receive, Client, Exchange};
pub use config::RequestConfig;
pub use error::HttpcError;
pub use http::{Scheme, Target};
pub use request::build_request;
pub use response::{parse_response, read_response, ResponseView};
pub use session::{open_session, Received, Session};
pub use text::{
    decode_json_unicode_escapes, detect_language, extract_between, extract_between_within, is_utf8,
    percent_encode, to_utf8,
};
pub use transport::{Connector, TcpConnector, Transport};
