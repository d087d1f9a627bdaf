//! Request configuration and engine-wide constants.
//!
//! # Design
//! `RequestConfig` is a fully owned value: the engine copies what it needs
//! and never holds on to caller memory past the call that consumed it.
//! It can be assembled in code, derived from a URL, or deserialized from
//! JSON so collaborators can keep request templates in files.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::HttpcError;
use crate::http::{Scheme, Target};

/// Maximum number of redirect hops followed by one logical request.
pub const MAX_REDIRECTS: usize = 5;

/// Size of the `Location` field in a parsed response, terminator included.
pub const LOCATION_CAPACITY: usize = 1024;

/// Fixed allowance for the request line and generated headers.
pub const HEADER_ALLOWANCE: usize = 2048;

pub const DEFAULT_USER_AGENT: &str = concat!("httpc/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Everything needed to reach a server and describe one request.
///
/// Either `request` (a complete raw request) or both `method` and `path`
/// must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub host: String,
    pub port: u16,
    pub is_https: bool,
    /// PEM trust-root file. Empty or unreadable falls back to the embedded roots.
    pub ca_cert_path: Option<String>,
    pub debug_level: u32,
    /// Socket read/write timeout in seconds.
    pub timeout_secs: Option<u64>,

    /// Complete raw request, sent verbatim when present.
    pub request: Option<String>,

    pub method: Option<String>,
    pub path: Option<String>,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    #[serde(with = "body_text")]
    pub body: Option<Vec<u8>>,
    /// Explicit body length; 0 means the whole body.
    pub body_length: usize,
    /// Extra header lines, e.g. `"Accept: */*\r\nX-Trace: 1"`.
    pub extra_headers: Option<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: Scheme::Http.default_port(),
            is_https: false,
            ca_cert_path: None,
            debug_level: 0,
            timeout_secs: None,
            request: None,
            method: None,
            path: None,
            content_type: None,
            user_agent: None,
            body: None,
            body_length: 0,
            extra_headers: None,
        }
    }
}

impl RequestConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Self::default()
        }
    }

    /// Derive host, port, scheme and path from an absolute URL.
    pub fn from_url(method: &str, url: &str) -> Result<Self, HttpcError> {
        let url = Url::parse(url).map_err(|e| HttpcError::Param(format!("bad url {url:?}: {e}")))?;
        let target = Target::from_url(&url)?;
        Ok(Self {
            host: target.host,
            port: target.port,
            is_https: target.scheme.is_tls(),
            method: Some(method.to_string()),
            path: Some(target.path),
            ..Self::default()
        })
    }

    pub fn from_json(json: &str) -> Result<Self, HttpcError> {
        serde_json::from_str(json).map_err(|e| HttpcError::Param(format!("bad config: {e}")))
    }

    pub fn https(mut self, is_https: bool) -> Self {
        self.is_https = is_https;
        self
    }

    pub fn ca_cert_path(mut self, path: &str) -> Self {
        self.ca_cert_path = Some(path.to_string());
        self
    }

    pub fn raw_request(mut self, request: &str) -> Self {
        self.request = Some(request.to_string());
        self
    }

    pub fn method_path(mut self, method: &str, path: &str) -> Self {
        self.method = Some(method.to_string());
        self.path = Some(path.to_string());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn extra_headers(mut self, headers: &str) -> Self {
        self.extra_headers = Some(headers.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn debug_level(mut self, level: u32) -> Self {
        self.debug_level = level;
        self
    }

    pub fn socket_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The raw request, ignoring an empty string.
    pub fn raw(&self) -> Option<&str> {
        self.request.as_deref().filter(|r| !r.is_empty())
    }

    /// Method and path, if both are present and non-empty.
    pub fn method_and_path(&self) -> Option<(&str, &str)> {
        let method = self.method.as_deref().filter(|m| !m.is_empty())?;
        let path = self.path.as_deref().filter(|p| !p.is_empty())?;
        Some((method, path))
    }

    pub fn target(&self) -> Target {
        let path = match (self.method_and_path(), self.raw()) {
            (Some((_, path)), _) => path.to_string(),
            (None, Some(raw)) => request_target(raw).unwrap_or("/").to_string(),
            (None, None) => "/".to_string(),
        };
        Target {
            scheme: Scheme::from_tls(self.is_https),
            host: self.host.clone(),
            port: self.port,
            path,
        }
    }

    /// Check everything a session needs before any network I/O happens.
    pub fn validate(&self) -> Result<(), HttpcError> {
        if self.host.trim().is_empty() {
            return Err(HttpcError::Param("server host is required".to_string()));
        }
        if self.port == 0 {
            return Err(HttpcError::Param("server port is required".to_string()));
        }
        self.validate_request()
    }

    pub(crate) fn validate_request(&self) -> Result<(), HttpcError> {
        if self.raw().is_none() && self.method_and_path().is_none() {
            return Err(HttpcError::Param(
                "either a raw request or both method and path are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Configuration for the hop after a redirect to `target`.
    ///
    /// The raw request is never carried across hops: the follow-up is
    /// rebuilt as a bodiless `GET` that keeps the caller's user agent, extra
    /// headers, trust settings and timeouts.
    pub fn redirected_to(&self, target: &Target) -> RequestConfig {
        RequestConfig {
            host: target.host.clone(),
            port: target.port,
            is_https: target.scheme.is_tls(),
            request: None,
            method: Some("GET".to_string()),
            path: Some(target.path.clone()),
            content_type: None,
            body: None,
            body_length: 0,
            ..self.clone()
        }
    }
}

/// Second token of the request line of a raw request.
fn request_target(raw: &str) -> Option<&str> {
    raw.lines().next()?.split_whitespace().nth(1)
}

/// Bodies are written as text in JSON configs; bytes that are not UTF-8
/// are replaced when serializing.
mod body_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match body {
            Some(bytes) => s.serialize_some(&String::from_utf8_lossy(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Ok(Option::<String>::deserialize(d)?.map(String::into_bytes))
    }
}
