//! Legacy-encoding fallback used by `text::to_utf8`.
//!
//! The backend is fixed at build time: with the `gbk` feature (default)
//! non-UTF-8 input is decoded as GBK through `encoding_rs`; without it every
//! non-UTF-8 input is rejected.

use crate::error::HttpcError;

/// Decodes bytes in a legacy regional encoding into UTF-8.
pub trait LegacyCodec {
    fn name(&self) -> &'static str;

    fn decode(&self, input: &[u8]) -> Result<String, HttpcError>;
}

#[cfg(feature = "gbk")]
pub type PlatformCodec = Gbk;

#[cfg(not(feature = "gbk"))]
pub type PlatformCodec = Unsupported;

/// GBK (code page 936).
#[cfg(feature = "gbk")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Gbk;

#[cfg(feature = "gbk")]
impl LegacyCodec for Gbk {
    fn name(&self) -> &'static str {
        encoding_rs::GBK.name()
    }

    fn decode(&self, input: &[u8]) -> Result<String, HttpcError> {
        let (text, had_errors) = encoding_rs::GBK.decode_without_bom_handling(input);
        if had_errors {
            return Err(HttpcError::Codec(format!("input is neither UTF-8 nor {}", self.name())));
        }
        Ok(text.into_owned())
    }
}

/// Backend for builds without a legacy codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl LegacyCodec for Unsupported {
    fn name(&self) -> &'static str {
        "none"
    }

    fn decode(&self, _input: &[u8]) -> Result<String, HttpcError> {
        Err(HttpcError::Codec("input is not UTF-8 and no legacy codec is built in".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_always_fails() {
        assert!(matches!(Unsupported.decode(b"\xc4\xe3"), Err(HttpcError::Codec(_))));
    }

    #[cfg(feature = "gbk")]
    #[test]
    fn gbk_decodes_chinese() {
        // "你好" in GBK
        assert_eq!(Gbk.decode(b"\xc4\xe3\xba\xc3").unwrap(), "你好");
    }

    #[cfg(feature = "gbk")]
    #[test]
    fn gbk_rejects_truncated_sequence() {
        assert!(matches!(Gbk.decode(b"\xc4"), Err(HttpcError::Codec(_))));
    }
}
