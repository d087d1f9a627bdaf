//! Reading a response into a caller buffer and interpreting it.
//!
//! # Design
//! The reader fills a fixed-size, caller-owned buffer and always leaves a
//! zero byte after the data. A response larger than the buffer is cut at
//! `capacity - 1` bytes and still reported as success, flagged through
//! `ResponseView::truncated`. The parser never copies the body: a
//! `ResponseView` borrows the buffer it describes.

use log::{debug, warn};

use crate::config::LOCATION_CAPACITY;
use crate::error::HttpcError;
use crate::session::{Received, Session};

const HEADER_END: &[u8] = b"\r\n\r\n";
const LOCATION_PREFIX: &[u8] = b"\nlocation:";

/// Parsed view over a response held in a caller buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseView<'a> {
    raw: &'a [u8],
    /// Numeric status; 0 means the status line could not be parsed.
    pub status: u16,
    location: Option<&'a str>,
    /// Bytes up to and including the blank line; 0 when none was found.
    pub header_length: usize,
    /// Bytes after the header block.
    pub content_length: usize,
    /// The read stopped because the buffer was full.
    pub truncated: bool,
}

impl<'a> ResponseView<'a> {
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn body(&self) -> &'a [u8] {
        &self.raw[self.header_length..]
    }

    pub fn location(&self) -> Option<&'a str> {
        self.location
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302)
    }

    /// Case-insensitive lookup of a header value in the header block.
    pub fn header(&self, name: &str) -> Option<&'a str> {
        let head = std::str::from_utf8(&self.raw[..self.header_length]).ok()?;
        head.split("\r\n").skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Interpret raw response bytes.
///
/// Fails only on empty input; a missing status line or header block still
/// yields a view (status 0, whole buffer as body).
pub fn parse_response(raw: &[u8]) -> Result<ResponseView<'_>, HttpcError> {
    if raw.is_empty() {
        return Err(HttpcError::Parse("empty response".to_string()));
    }

    let header_length = find(raw, HEADER_END, 0).map_or(0, |pos| pos + HEADER_END.len());
    let head = if header_length > 0 { &raw[..header_length] } else { raw };

    Ok(ResponseView {
        raw,
        status: parse_status(raw),
        location: parse_location(head),
        header_length,
        content_length: raw.len() - header_length,
        truncated: false,
    })
}

/// First run of digits after the first space of the status line.
fn parse_status(raw: &[u8]) -> u16 {
    let line_end = find(raw, b"\n", 0).unwrap_or(raw.len());
    let line = &raw[..line_end];
    let Some(space) = line.iter().position(|&b| b == b' ') else {
        return 0;
    };
    let digits: Vec<u8> = line[space..]
        .iter()
        .skip_while(|b| !b.is_ascii_digit())
        .take_while(|b| b.is_ascii_digit())
        .copied()
        .collect();
    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// The trimmed `Location` value, cut to the field capacity. The header name
/// is matched without regard to case.
fn parse_location(head: &[u8]) -> Option<&str> {
    let start = head
        .windows(LOCATION_PREFIX.len())
        .position(|w| w.eq_ignore_ascii_case(LOCATION_PREFIX))?
        + LOCATION_PREFIX.len();
    let rest = &head[start..];
    let end = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    let value = rest[..end].trim_ascii();
    let value = &value[..value.len().min(LOCATION_CAPACITY - 1)];
    let value = match std::str::from_utf8(value) {
        Ok(s) => Some(s),
        // The cut may land inside a multi-byte character.
        Err(e) => std::str::from_utf8(&value[..e.valid_up_to()]).ok(),
    };
    value.filter(|s| !s.is_empty())
}

/// Read until the peer closes or `buf` is full, then parse.
///
/// One byte of `buf` is reserved for a terminating zero.
pub fn read_response<'a>(
    session: &mut Session,
    buf: &'a mut [u8],
) -> Result<(usize, ResponseView<'a>), HttpcError> {
    if buf.is_empty() {
        return Err(HttpcError::Param("response buffer has no capacity".to_string()));
    }
    let limit = buf.len() - 1;
    let mut total = 0;

    while total < limit {
        match session.receive(&mut buf[total..limit])? {
            Received::Data(n) => total += n,
            Received::WouldBlock => std::thread::yield_now(),
            Received::Closed => break,
        }
    }
    buf[total] = 0;
    let buf: &'a [u8] = buf;

    let truncated = total == limit && limit > 0;
    if truncated {
        warn!("response from {} truncated at {total} bytes", session.config().host);
    }
    debug!("read {total} bytes from {}", session.config().host);

    let data = &buf[..total];
    let view = match parse_response(data) {
        Ok(view) => view,
        Err(_) => ResponseView {
            raw: data,
            status: 0,
            location: None,
            header_length: 0,
            content_length: 0,
            truncated,
        },
    };
    Ok((total, ResponseView { truncated, ..view }))
}

/// Offset of the first `needle` in `haystack` at or after `from`.
pub(crate) fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}
