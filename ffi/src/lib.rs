//! C-ABI wrapper around `httpc-core`.
//!
//! # Overview
//! Exposes the request engine, the response parser and the text helpers
//! through `extern "C"` functions with the `httpc_*` names and error codes C
//! callers already link against.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary; a caught panic reports `Init` (or null).
//! - Configuration is copied into owned core types on entry. No caller
//!   pointer is kept past the call that received it.
//! - Strings returned as `*mut c_char` are owned by the caller and released
//!   with `httpc_free_string`; clients with `httpc_client_free`.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};

use httpc_core::{text, HttpcError, Session};

use types::*;

fn fail(e: &HttpcError) -> FfiErrorCode {
    log::debug!("httpc call failed: {e}");
    FfiErrorCode::from(e)
}

fn into_c_string(bytes: Vec<u8>) -> *mut c_char {
    CString::new(bytes).map_or(std::ptr::null_mut(), CString::into_raw)
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Copy `config` and open a session to the configured server.
///
/// Returns null on a null or invalid config, or when connecting or the TLS
/// handshake fails. The caller must free the result with `httpc_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_client_init(config: *const FfiConfig) -> *mut FfiClient {
    catch_unwind(|| {
        if config.is_null() {
            return std::ptr::null_mut();
        }
        let opened = unsafe { (*config).to_core() }
            .and_then(|config| Session::open(&config).map(|session| (config, session)));
        match opened {
            Ok((config, session)) => Box::into_raw(Box::new(FfiClient {
                config,
                session: Some(session),
            })),
            Err(e) => {
                fail(&e);
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Send the request and read the final response (after redirects) into
/// `resp_buf`, which is always zero-terminated on return.
///
/// A client can serve several requests; each one after the first opens a
/// fresh session. `actual_read` may be null; it receives 0 on failure.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_client_request(
    client: *mut FfiClient,
    resp_buf: *mut c_char,
    resp_buf_len: usize,
    actual_read: *mut usize,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if !actual_read.is_null() {
            unsafe { *actual_read = 0 };
        }
        if client.is_null() || resp_buf.is_null() || resp_buf_len == 0 {
            return FfiErrorCode::Param;
        }
        let client = unsafe { &mut *client };
        let buf = unsafe { std::slice::from_raw_parts_mut(resp_buf.cast::<u8>(), resp_buf_len) };
        buf[0] = 0;

        let session = match client.session.take() {
            Some(session) => session,
            None => match Session::open(&client.config) {
                Ok(session) => session,
                Err(e) => return fail(&e),
            },
        };
        match httpc_core::send_and_receive(session, buf) {
            Ok(exchange) => {
                if !actual_read.is_null() {
                    unsafe { *actual_read = exchange.bytes_read };
                }
                FfiErrorCode::Success
            }
            Err(e) => fail(&e),
        }
    }))
    .unwrap_or(FfiErrorCode::Init)
}

/// Close any open session and free the client. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_client_free(client: *mut FfiClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let client = unsafe { Box::from_raw(client) };
            if let Some(session) = client.session {
                session.close();
            }
        }));
    }
}

// ---------------------------------------------------------------------------
// Request and response
// ---------------------------------------------------------------------------

/// Parse a NUL-terminated response into `response`.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_parse_response(
    response_data: *const c_char,
    response: *mut FfiResponse,
) -> FfiErrorCode {
    catch_unwind(|| {
        if response_data.is_null() || response.is_null() {
            return FfiErrorCode::Param;
        }
        let data = unsafe { CStr::from_ptr(response_data) }.to_bytes();
        match httpc_core::parse_response(data) {
            Ok(view) => {
                unsafe { (*response).fill(&view, response_data) };
                FfiErrorCode::Success
            }
            Err(e) => fail(&e),
        }
    })
    .unwrap_or(FfiErrorCode::Init)
}

/// Assemble the wire-format request for `config`.
///
/// Returns null on invalid input. Free with `httpc_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_build_request(config: *const FfiConfig) -> *mut c_char {
    catch_unwind(|| {
        if config.is_null() {
            return std::ptr::null_mut();
        }
        match unsafe { (*config).to_core() }.and_then(|c| httpc_core::build_request(&c)) {
            Ok(bytes) => into_c_string(bytes),
            Err(e) => {
                fail(&e);
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Form-encode `input`. Free the result with `httpc_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_url_encode(input: *const c_char) -> *mut c_char {
    catch_unwind(|| {
        if input.is_null() {
            return std::ptr::null_mut();
        }
        let input = unsafe { CStr::from_ptr(input) }.to_bytes();
        into_c_string(text::percent_encode(input).into_bytes())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// `"zh-cn"` or `"en"`. The returned string is static and must not be freed.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_detect_language(input: *const c_char) -> *const c_char {
    catch_unwind(|| {
        if input.is_null() {
            return c"en".as_ptr();
        }
        let input = unsafe { CStr::from_ptr(input) }.to_string_lossy();
        match text::detect_language(&input) {
            "zh-cn" => c"zh-cn".as_ptr(),
            _ => c"en".as_ptr(),
        }
    })
    .unwrap_or(c"en".as_ptr())
}

/// Copy the unescaped text between the first `start_pattern` and the next
/// `end_pattern` into `result`.
///
/// Returns 1 when the span was found and fits, 0 otherwise. Nothing is
/// written on failure.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_extract_pattern(
    content: *const c_char,
    start_pattern: *const c_char,
    end_pattern: *const c_char,
    result: *mut c_char,
    result_len: usize,
) -> c_int {
    catch_unwind(|| {
        if content.is_null() || start_pattern.is_null() || end_pattern.is_null() || result.is_null() {
            return 0;
        }
        let (content, start, end) = unsafe {
            (
                CStr::from_ptr(content).to_bytes(),
                CStr::from_ptr(start_pattern).to_bytes(),
                CStr::from_ptr(end_pattern).to_bytes(),
            )
        };
        match text::extract_between_within(content, start, end, result_len) {
            Some(span) if unsafe { write_c_buf(result, result_len, &span) } => 1,
            _ => 0,
        }
    })
    .unwrap_or(0)
}

/// Convert GBK or UTF-8 input to UTF-8 in `output_buf`.
///
/// Returns the converted length, or -1 on failure.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_any_to_utf8(input_str: *const c_char, output_buf: *mut c_char, buf_len: usize) -> c_int {
    catch_unwind(|| {
        if input_str.is_null() || output_buf.is_null() || buf_len == 0 {
            return -1;
        }
        let input = unsafe { CStr::from_ptr(input_str) }.to_bytes();
        match text::to_utf8(input, buf_len) {
            Ok(converted) if unsafe { write_c_buf(output_buf, buf_len, converted.as_bytes()) } => {
                c_int::try_from(converted.len()).unwrap_or(-1)
            }
            Ok(_) => -1,
            Err(e) => {
                fail(&e);
                -1
            }
        }
    })
    .unwrap_or(-1)
}

/// Decode `\uXXXX` escapes in `len` bytes at `start` into `result`.
///
/// Returns the decoded length, or -1 when it does not fit `result_len`.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_decode_unicode(
    start: *const c_char,
    len: usize,
    result: *mut c_char,
    result_len: usize,
) -> c_int {
    catch_unwind(|| {
        if start.is_null() || result.is_null() {
            return -1;
        }
        let input = unsafe { std::slice::from_raw_parts(start.cast::<u8>(), len) };
        let decoded = text::decode_json_unicode_escapes(input);
        if unsafe { write_c_buf(result, result_len, &decoded) } {
            c_int::try_from(decoded.len()).unwrap_or(-1)
        } else {
            -1
        }
    })
    .unwrap_or(-1)
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn httpc_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_server() -> u16 {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = std_listener.local_addr().unwrap().port();
        std_listener.set_nonblocking(true).unwrap();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
        });
        port
    }

    struct Strings {
        host: CString,
        port: CString,
        method: CString,
        path: CString,
    }

    impl Strings {
        fn new(port: u16, path: &str) -> Self {
            Self {
                host: CString::new("127.0.0.1").unwrap(),
                port: CString::new(port.to_string()).unwrap(),
                method: CString::new("GET").unwrap(),
                path: CString::new(path).unwrap(),
            }
        }

        fn config(&self) -> FfiConfig {
            FfiConfig {
                server_host: self.host.as_ptr(),
                server_port: self.port.as_ptr(),
                is_https: 0,
                ca_cert_path: std::ptr::null(),
                debug_level: 0,
                request: std::ptr::null(),
                method: self.method.as_ptr(),
                url_path: self.path.as_ptr(),
                content_type: std::ptr::null(),
                user_agent: std::ptr::null(),
                data: std::ptr::null(),
                data_length: 0,
                extra_headers: std::ptr::null(),
            }
        }
    }

    fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        httpc_free_string(ptr);
        s
    }

    #[test]
    fn client_request_follows_redirects() {
        let port = spawn_server();
        let strings = Strings::new(port, "/redirect/2");
        let config = strings.config();
        let client = httpc_client_init(&config);
        assert!(!client.is_null());

        let mut buf = vec![0 as c_char; 4096];
        let mut read = 0usize;
        let code = httpc_client_request(client, buf.as_mut_ptr(), buf.len(), &mut read);
        assert_eq!(code, FfiErrorCode::Success);
        assert!(read > 0);
        assert_eq!(buf[read], 0);

        let mut response = unsafe { std::mem::zeroed::<FfiResponse>() };
        assert_eq!(httpc_parse_response(buf.as_ptr(), &mut response), FfiErrorCode::Success);
        assert_eq!(response.status_code, 200);
        let body = unsafe { CStr::from_ptr(response.content_start) }.to_bytes();
        assert_eq!(body, b"done");

        // A second request on the same client reconnects.
        let code = httpc_client_request(client, buf.as_mut_ptr(), buf.len(), std::ptr::null_mut());
        assert_eq!(code, FfiErrorCode::Success);
        httpc_client_free(client);
    }

    #[test]
    fn client_request_reports_redirect_limit() {
        let port = spawn_server();
        let strings = Strings::new(port, "/redirect/9");
        let client = httpc_client_init(&strings.config());
        assert!(!client.is_null());
        let mut buf = vec![0 as c_char; 1024];
        let mut read = 7usize;
        let code = httpc_client_request(client, buf.as_mut_ptr(), buf.len(), &mut read);
        assert_eq!(code, FfiErrorCode::TooManyRedirects);
        assert_eq!(code as i32, -10);
        assert_eq!(read, 0);
        httpc_client_free(client);
    }

    #[test]
    fn client_init_fails_on_refused_port() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let strings = Strings::new(port, "/");
        assert!(httpc_client_init(&strings.config()).is_null());
    }

    #[test]
    fn null_arguments_are_rejected() {
        assert!(httpc_client_init(std::ptr::null()).is_null());
        let mut buf = [0 as c_char; 8];
        assert_eq!(
            httpc_client_request(std::ptr::null_mut(), buf.as_mut_ptr(), buf.len(), std::ptr::null_mut()),
            FfiErrorCode::Param
        );
        assert_eq!(httpc_parse_response(std::ptr::null(), std::ptr::null_mut()), FfiErrorCode::Param);
        assert!(httpc_build_request(std::ptr::null()).is_null());
        assert!(httpc_url_encode(std::ptr::null()).is_null());
        assert_eq!(httpc_any_to_utf8(std::ptr::null(), buf.as_mut_ptr(), buf.len()), -1);
        assert_eq!(httpc_decode_unicode(std::ptr::null(), 0, buf.as_mut_ptr(), buf.len()), -1);
        httpc_client_free(std::ptr::null_mut());
        httpc_free_string(std::ptr::null_mut());
    }

    #[test]
    fn parse_response_fills_location() {
        let raw = CString::new("HTTP/1.1 302 Found\r\nLocation: /next\r\n\r\nbody").unwrap();
        let mut response = unsafe { std::mem::zeroed::<FfiResponse>() };
        assert_eq!(httpc_parse_response(raw.as_ptr(), &mut response), FfiErrorCode::Success);
        assert_eq!(response.status_code, 302);
        let location = unsafe { CStr::from_ptr(response.location.as_ptr()) };
        assert_eq!(location.to_str().unwrap(), "/next");
        assert_eq!(response.content_length, 4);
        assert_eq!(unsafe { CStr::from_ptr(response.content_start) }.to_bytes(), b"body");
    }

    #[test]
    fn parse_empty_response_is_parse_error() {
        let raw = CString::new("").unwrap();
        let mut response = unsafe { std::mem::zeroed::<FfiResponse>() };
        assert_eq!(httpc_parse_response(raw.as_ptr(), &mut response), FfiErrorCode::Parse);
    }

    #[test]
    fn build_request_from_components() {
        let strings = Strings::new(8080, "/search?q=1");
        let built = take_string(httpc_build_request(&strings.config()));
        assert!(built.starts_with("GET /search?q=1 HTTP/1.1\r\nHost: 127.0.0.1:8080\r\n"));
        assert!(built.ends_with("\r\n\r\n"));
    }

    #[test]
    fn build_request_without_path_is_null() {
        let strings = Strings::new(80, "/");
        let mut config = strings.config();
        config.url_path = std::ptr::null();
        assert!(httpc_build_request(&config).is_null());
    }

    #[test]
    fn url_encode_and_language() {
        let input = CString::new("hello world&").unwrap();
        assert_eq!(take_string(httpc_url_encode(input.as_ptr())), "hello+world%26");

        let zh = CString::new("\u{4f60}\u{597d}").unwrap();
        let lang = unsafe { CStr::from_ptr(httpc_detect_language(zh.as_ptr())) };
        assert_eq!(lang.to_str().unwrap(), "zh-cn");
        let lang = unsafe { CStr::from_ptr(httpc_detect_language(std::ptr::null())) };
        assert_eq!(lang.to_str().unwrap(), "en");
    }

    #[test]
    fn extract_pattern_respects_capacity() {
        let content = CString::new("prefix{X}suffix").unwrap();
        let start = CString::new("{").unwrap();
        let end = CString::new("}").unwrap();
        let mut out = [0x7f as c_char; 4];
        let found = httpc_extract_pattern(content.as_ptr(), start.as_ptr(), end.as_ptr(), out.as_mut_ptr(), out.len());
        assert_eq!(found, 1);
        assert_eq!(unsafe { CStr::from_ptr(out.as_ptr()) }.to_bytes(), b"X");

        let missing = CString::new("<").unwrap();
        let mut out = [0x7f as c_char; 4];
        let found = httpc_extract_pattern(content.as_ptr(), missing.as_ptr(), end.as_ptr(), out.as_mut_ptr(), out.len());
        assert_eq!(found, 0);
        assert_eq!(out[0], 0x7f);

        let mut tiny = [0x7f as c_char; 1];
        let found = httpc_extract_pattern(content.as_ptr(), start.as_ptr(), end.as_ptr(), tiny.as_mut_ptr(), tiny.len());
        assert_eq!(found, 0);
        assert_eq!(tiny[0], 0x7f);
    }

    #[test]
    fn extract_pattern_result_is_truthy_on_success() {
        let content = CString::new(r#"_G={IG:"ABC",EventID:1}"#).unwrap();
        let start = CString::new(r#"IG:""#).unwrap();
        let end = CString::new("\"").unwrap();
        let mut out = [0 as c_char; 16];
        let found = httpc_extract_pattern(content.as_ptr(), start.as_ptr(), end.as_ptr(), out.as_mut_ptr(), out.len());
        assert!(found != 0);
        assert_eq!(unsafe { CStr::from_ptr(out.as_ptr()) }.to_bytes(), b"ABC");

        let absent = CString::new("IID:").unwrap();
        let found = httpc_extract_pattern(content.as_ptr(), absent.as_ptr(), end.as_ptr(), out.as_mut_ptr(), out.len());
        assert!(found == 0);
    }

    #[test]
    fn any_to_utf8_reports_length() {
        let input = CString::new("abc").unwrap();
        let mut out = [0 as c_char; 8];
        assert_eq!(httpc_any_to_utf8(input.as_ptr(), out.as_mut_ptr(), out.len()), 3);
        assert_eq!(httpc_any_to_utf8(input.as_ptr(), out.as_mut_ptr(), 3), -1);
    }

    #[test]
    fn decode_unicode_writes_utf8() {
        let input = b"x\\u4f60";
        let mut out = [0 as c_char; 8];
        let n = httpc_decode_unicode(input.as_ptr().cast(), input.len(), out.as_mut_ptr(), out.len());
        assert_eq!(n, 4);
        assert_eq!(unsafe { CStr::from_ptr(out.as_ptr()) }.to_bytes(), "x\u{4f60}".as_bytes());
    }
}
