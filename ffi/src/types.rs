//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! `FfiConfig` and `FfiResponse` keep the field layout C callers of the
//! engine already use. Conversion to and from core types lives here so
//! `lib.rs` stays focused on the `extern "C"` surface. Nothing in this module
//! keeps a caller pointer past the call that received it.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

use httpc_core::config::LOCATION_CAPACITY;
use httpc_core::http::Scheme;
use httpc_core::{HttpcError, RequestConfig, ResponseView, Session};

/// Opaque client handle. Holds the configuration and, until the first
/// request consumes it, the session opened by `httpc_client_init`.
pub struct FfiClient {
    pub(crate) config: RequestConfig,
    pub(crate) session: Option<Session>,
}

/// Error codes shared by every fallible entry point.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Success = 0,
    Init = -1,
    Connect = -2,
    SslHandshake = -3,
    SslCert = -4,
    Write = -5,
    Read = -6,
    Param = -7,
    Parse = -8,
    Redirect = -9,
    TooManyRedirects = -10,
}

impl From<&HttpcError> for FfiErrorCode {
    fn from(e: &HttpcError) -> Self {
        match e {
            HttpcError::Init(_) => FfiErrorCode::Init,
            HttpcError::Connect { .. } => FfiErrorCode::Connect,
            HttpcError::Handshake(_) => FfiErrorCode::SslHandshake,
            HttpcError::Certificate(_) => FfiErrorCode::SslCert,
            HttpcError::Write(_) => FfiErrorCode::Write,
            HttpcError::Read(_) => FfiErrorCode::Read,
            HttpcError::Param(_) => FfiErrorCode::Param,
            HttpcError::Parse(_) | HttpcError::Codec(_) => FfiErrorCode::Parse,
            HttpcError::Redirect(_) => FfiErrorCode::Redirect,
            HttpcError::TooManyRedirects(_) => FfiErrorCode::TooManyRedirects,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration input
// ---------------------------------------------------------------------------

/// Request configuration as plain C data. All strings are optional
/// NUL-terminated pointers except `server_host`.
#[repr(C)]
pub struct FfiConfig {
    pub server_host: *const c_char,
    /// Decimal port; null or empty means the scheme default.
    pub server_port: *const c_char,
    pub is_https: c_int,
    pub ca_cert_path: *const c_char,
    pub debug_level: u32,

    /// Complete raw request; takes precedence over the fields below.
    pub request: *const c_char,

    pub method: *const c_char,
    pub url_path: *const c_char,
    pub content_type: *const c_char,
    pub user_agent: *const c_char,
    /// Body bytes. With `data_length == 0` it is read as a C string.
    pub data: *const c_char,
    pub data_length: usize,
    pub extra_headers: *const c_char,
}

/// Borrow an optional C string; invalid UTF-8 is a parameter error.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn opt_str<'a>(ptr: *const c_char, field: &str) -> Result<Option<&'a str>, HttpcError> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(Some)
        .map_err(|_| HttpcError::Param(format!("{field} is not valid UTF-8")))
}

impl FfiConfig {
    /// Copy every field into an owned `RequestConfig`.
    ///
    /// # Safety
    /// Every non-null pointer must be valid for the documented length.
    pub(crate) unsafe fn to_core(&self) -> Result<RequestConfig, HttpcError> {
        let host = unsafe { opt_str(self.server_host, "server_host")? }
            .ok_or_else(|| HttpcError::Param("server_host is required".to_string()))?;
        let is_https = self.is_https != 0;
        let port = match unsafe { opt_str(self.server_port, "server_port")? }.map(str::trim) {
            None | Some("") => Scheme::from_tls(is_https).default_port(),
            Some(port) => port
                .parse()
                .map_err(|_| HttpcError::Param(format!("invalid server_port {port:?}")))?,
        };
        let owned = |s: Option<&str>| s.map(str::to_string);

        let body = if self.data.is_null() {
            None
        } else if self.data_length > 0 {
            Some(unsafe { std::slice::from_raw_parts(self.data.cast::<u8>(), self.data_length) }.to_vec())
        } else {
            Some(unsafe { CStr::from_ptr(self.data) }.to_bytes().to_vec())
        };

        Ok(RequestConfig {
            host: host.to_string(),
            port,
            is_https,
            ca_cert_path: owned(unsafe { opt_str(self.ca_cert_path, "ca_cert_path")? }),
            debug_level: self.debug_level,
            timeout_secs: None,
            request: owned(unsafe { opt_str(self.request, "request")? }),
            method: owned(unsafe { opt_str(self.method, "method")? }),
            path: owned(unsafe { opt_str(self.url_path, "url_path")? }),
            content_type: owned(unsafe { opt_str(self.content_type, "content_type")? }),
            user_agent: owned(unsafe { opt_str(self.user_agent, "user_agent")? }),
            body,
            body_length: 0,
            extra_headers: owned(unsafe { opt_str(self.extra_headers, "extra_headers")? }),
        })
    }
}

// ---------------------------------------------------------------------------
// Parsed response output
// ---------------------------------------------------------------------------

/// Parsed response header, filled in by `httpc_parse_response`.
///
/// `content_start` points into the caller's response data and is only valid
/// as long as that data is.
#[repr(C)]
pub struct FfiResponse {
    pub status_code: c_int,
    pub location: [c_char; LOCATION_CAPACITY],
    pub header_length: usize,
    pub content_length: usize,
    pub content_start: *const c_char,
}

impl FfiResponse {
    /// Fill from a view over `data`, the same bytes the caller passed in.
    pub(crate) fn fill(&mut self, view: &ResponseView<'_>, data: *const c_char) {
        self.status_code = c_int::from(view.status);
        self.location = [0; LOCATION_CAPACITY];
        if let Some(location) = view.location() {
            for (dst, &src) in self.location.iter_mut().zip(location.as_bytes()) {
                *dst = src as c_char;
            }
        }
        self.header_length = view.header_length;
        self.content_length = view.content_length;
        self.content_start = data.wrapping_add(view.header_length);
    }
}

/// Copy `bytes` plus a terminator into a caller buffer of `capacity` bytes.
/// Nothing is written unless everything fits.
///
/// # Safety
/// `dst` must be valid for writes of `capacity` bytes.
pub(crate) unsafe fn write_c_buf(dst: *mut c_char, capacity: usize, bytes: &[u8]) -> bool {
    if dst.is_null() || bytes.len() >= capacity {
        return false;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.cast::<u8>(), bytes.len());
        *dst.add(bytes.len()) = 0;
    }
    true
}
