//! Text helpers used on response bodies before they reach callers.
//!
//! # Design
//! Every bounded operation takes the destination capacity explicitly and
//! fails instead of truncating. Capacities follow the C convention used at
//! the FFI boundary: one byte is reserved for a terminator, so at most
//! `capacity - 1` bytes of output fit.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

use crate::codec::{LegacyCodec, PlatformCodec};
use crate::error::HttpcError;
use crate::response::find;

/// Bytes left untouched by `percent_encode`, besides ASCII alphanumerics.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Share of non-whitespace characters that must be CJK to report Chinese.
const CJK_THRESHOLD: f64 = 0.3;

/// Strict UTF-8 check: overlong forms, surrogates and truncated sequences
/// are all rejected.
pub fn is_utf8(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}

/// Convert `input` to UTF-8, decoding with the built-in legacy codec when it
/// is not already UTF-8.
pub fn to_utf8(input: &[u8], capacity: usize) -> Result<String, HttpcError> {
    let text = match std::str::from_utf8(input) {
        Ok(text) => text.to_string(),
        Err(_) => PlatformCodec::default().decode(input)?,
    };
    if text.len() >= capacity {
        return Err(HttpcError::Codec(format!(
            "{} bytes of UTF-8 do not fit a {capacity}-byte buffer",
            text.len()
        )));
    }
    Ok(text)
}

/// Replace `\uXXXX` escapes with their UTF-8 encoding.
///
/// Escape pairs forming a valid surrogate pair become one 4-byte character.
/// Escapes without four hex digits, and lone surrogates, are copied as-is.
pub fn decode_json_unicode_escapes(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let Some(unit) = escape_at(input, i) else {
            out.push(input[i]);
            i += 1;
            continue;
        };

        let (ch, consumed) = match unit {
            0xD800..=0xDBFF => match escape_at(input, i + 6) {
                Some(low @ 0xDC00..=0xDFFF) => {
                    let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                    (char::from_u32(code), 12)
                }
                _ => (None, 6),
            },
            _ => (char::from_u32(unit), 6),
        };
        match ch {
            Some(ch) => {
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            }
            None => out.extend_from_slice(&input[i..i + consumed]),
        }
        i += consumed;
    }
    out
}

/// The code unit of a well-formed `\uXXXX` escape starting at `at`.
fn escape_at(input: &[u8], at: usize) -> Option<u32> {
    let escape = input.get(at..at + 6)?;
    if !escape.starts_with(b"\\u") {
        return None;
    }
    let hex = std::str::from_utf8(&escape[2..]).ok()?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// The unescaped bytes between the first `start` and the first `end` after it.
pub fn extract_between(content: &[u8], start: &[u8], end: &[u8]) -> Option<Vec<u8>> {
    let from = find(content, start, 0)? + start.len();
    let to = find(content, end, from)?;
    Some(decode_json_unicode_escapes(&content[from..to]))
}

/// `extract_between`, failing when the raw span does not fit `capacity`.
pub fn extract_between_within(
    content: &[u8],
    start: &[u8],
    end: &[u8],
    capacity: usize,
) -> Option<Vec<u8>> {
    let from = find(content, start, 0)? + start.len();
    let to = find(content, end, from)?;
    if to - from >= capacity {
        return None;
    }
    Some(decode_json_unicode_escapes(&content[from..to]))
}

/// Form-style encoding: spaces become `+`, everything outside
/// `[A-Za-z0-9-_.~]` becomes `%XX`.
pub fn percent_encode(input: &[u8]) -> String {
    input
        .split(|&b| b == b' ')
        .map(|part| percent_encoding::percent_encode(part, FORM_VALUE).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Rough language guess for translation requests: `"zh-cn"` or `"en"`.
pub fn detect_language(text: &str) -> &'static str {
    let (cjk, total) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(cjk, total), c| (cjk + usize::from(is_cjk(c)), total + 1));
    if total > 0 && cjk as f64 / total as f64 > CJK_THRESHOLD {
        "zh-cn"
    } else {
        "en"
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{2E80}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FFEF}'
        | '\u{20000}'..='\u{2FA1F}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_validation() {
        assert!(is_utf8("hello 你好 👋".as_bytes()));
        assert!(is_utf8(b""));
        assert!(!is_utf8(b"\x80abc"));
        assert!(!is_utf8(b"\xe4\xbd"));
        assert!(!is_utf8(b"\xf8\x88\x80\x80\x80"));
    }

    #[test]
    fn utf8_is_copied_through() {
        assert_eq!(to_utf8("你好".as_bytes(), 16).unwrap(), "你好");
    }

    #[test]
    fn utf8_that_does_not_fit_fails() {
        assert!(matches!(to_utf8(b"hello", 5), Err(HttpcError::Codec(_))));
        assert_eq!(to_utf8(b"hello", 6).unwrap(), "hello");
    }

    #[cfg(feature = "gbk")]
    #[test]
    fn legacy_input_is_decoded() {
        assert_eq!(to_utf8(b"\xc4\xe3\xba\xc3", 16).unwrap(), "你好");
    }

    #[cfg(not(feature = "gbk"))]
    #[test]
    fn legacy_input_is_rejected_without_codec() {
        assert!(matches!(to_utf8(b"\xc4\xe3\xba\xc3", 16), Err(HttpcError::Codec(_))));
    }

    #[test]
    fn decodes_cjk_escapes() {
        assert_eq!(decode_json_unicode_escapes(br"\u4f60\u597d"), "你好".as_bytes());
        assert_eq!(decode_json_unicode_escapes(br"a\u0041b\u00e9"), "aAbé".as_bytes());
    }

    #[test]
    fn malformed_escape_passes_through() {
        assert_eq!(decode_json_unicode_escapes(br"\uZZZZ\u4f60"), r"\uZZZZ你".as_bytes());
        assert_eq!(decode_json_unicode_escapes(br"tail\u4f"), br"tail\u4f");
    }

    #[test]
    fn surrogate_pairs_are_combined() {
        assert_eq!(decode_json_unicode_escapes(br"\ud83d\ude00"), "😀".as_bytes());
        assert_eq!(decode_json_unicode_escapes(br"\ud83dx"), br"\ud83dx");
    }

    #[test]
    fn extracts_first_span() {
        assert_eq!(extract_between(b"prefix{X}suffix", b"{", b"}").unwrap(), b"X");
        assert_eq!(
            extract_between(br#"{"translatedText":"\u4f60\u597d","x":1}"#, br#""translatedText":""#, b"\"").unwrap(),
            "你好".as_bytes()
        );
        assert_eq!(extract_between(b"prefix X suffix", b"{", b"}"), None);
        assert_eq!(extract_between(b"prefix{X", b"{", b"}"), None);
    }

    #[test]
    fn bounded_extract_rejects_oversized_span() {
        assert_eq!(extract_between_within(b"[abcd]", b"[", b"]", 4), None);
        assert_eq!(extract_between_within(b"[abcd]", b"[", b"]", 5).unwrap(), b"abcd");
    }

    #[test]
    fn percent_encoding_rules() {
        assert_eq!(percent_encode(b"AZaz09-_.~"), "AZaz09-_.~");
        assert_eq!(percent_encode(b"hello world"), "hello+world");
        assert_eq!(percent_encode(b"a&b=c/d"), "a%26b%3Dc%2Fd");
        assert_eq!(percent_encode("你".as_bytes()), "%E4%BD%A0");
        assert_eq!(percent_encode(b""), "");
    }

    fn form_decode(encoded: &str) -> Vec<u8> {
        let spaced = encoded.replace('+', " ");
        percent_encoding::percent_decode(spaced.as_bytes()).collect()
    }

    #[test]
    fn percent_encoding_round_trips() {
        let inputs: [&[u8]; 6] = [
            b"plain",
            b"hello world & friends",
            b"a+b=c?d/e#f%g",
            "你好 世界".as_bytes(),
            b"tab\tnewline\n\x00\xff",
            b"  ",
        ];
        for input in inputs {
            let encoded = percent_encode(input);
            assert_eq!(form_decode(&encoded), input, "{encoded}");
            assert!(encoded.bytes().all(|b| b.is_ascii_alphanumeric() || b"-_.~%+".contains(&b)));
        }
    }

    #[test]
    fn safe_output_is_left_unchanged() {
        let encoded = percent_encode(b"query-string_v1.2~x");
        assert_eq!(percent_encode(encoded.as_bytes()), encoded);
    }

    #[test]
    fn language_detection() {
        assert_eq!(detect_language("你好，世界"), "zh-cn");
        assert_eq!(detect_language("hello world"), "en");
        assert_eq!(detect_language("hello 你"), "en");
        assert_eq!(detect_language("   "), "en");
    }
}
