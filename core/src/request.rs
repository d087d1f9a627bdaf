//! Wire-format request assembly.

use crate::config::{RequestConfig, DEFAULT_CONTENT_TYPE, DEFAULT_USER_AGENT, HEADER_ALLOWANCE};
use crate::error::HttpcError;

/// Turn a configuration into the bytes sent on the wire.
///
/// A raw request is returned verbatim. Otherwise the request line is
/// followed by `Host`, `Connection: close` and `User-Agent`, then
/// `Content-Type` and `Content-Length` when there is a body, then the
/// caller's extra headers, a blank line and the body.
pub fn build_request(config: &RequestConfig) -> Result<Vec<u8>, HttpcError> {
    config.validate_request()?;
    if let Some(raw) = config.raw() {
        return Ok(raw.as_bytes().to_vec());
    }
    let Some((method, path)) = config.method_and_path() else {
        return Err(HttpcError::Param("method and path are required".to_string()));
    };

    let body = body_slice(config)?;
    let extra = config.extra_headers.as_deref().unwrap_or("");

    let mut head = String::with_capacity(HEADER_ALLOWANCE + extra.len());
    head.push_str(&format!("{method} {path} HTTP/1.1\r\n"));
    head.push_str(&format!("Host: {}\r\n", config.target().host_header()));
    head.push_str("Connection: close\r\n");
    let user_agent = config
        .user_agent
        .as_deref()
        .filter(|ua| !ua.is_empty())
        .unwrap_or(DEFAULT_USER_AGENT);
    head.push_str(&format!("User-Agent: {user_agent}\r\n"));

    if let Some(body) = body {
        let content_type = config
            .content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        head.push_str(&format!("Content-Type: {content_type}\r\n"));
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }

    if !extra.is_empty() {
        head.push_str(extra);
        if !extra.ends_with("\r\n") {
            head.push_str("\r\n");
        }
    }
    head.push_str("\r\n");

    let body = body.unwrap_or_default();
    let mut out = Vec::with_capacity(head.len() + body.len());
    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

/// The body bytes to send, honoring an explicit length.
fn body_slice(config: &RequestConfig) -> Result<Option<&[u8]>, HttpcError> {
    let Some(body) = config.body.as_deref() else {
        return Ok(None);
    };
    let len = match config.body_length {
        0 => body.len(),
        n if n > body.len() => {
            return Err(HttpcError::Param(format!(
                "body length {n} exceeds the {} body bytes supplied",
                body.len()
            )));
        }
        n => n,
    };
    Ok((len > 0).then(|| &body[..len]))
}
