//! Display-side decompression of buffered response bodies.
//!
//! The decoder works on a borrowed copy of the body. The bytes relayed to the
//! client are never touched, so a failure here only affects the transcript.

use std::borrow::Cow;
use std::fmt;
use std::io::Read;

use brotli::Decompressor;
use flate2::read::{MultiGzDecoder, ZlibDecoder};

use crate::error::{DebuggerError, Result};

/// Largest decoded body rendered in the transcript (16 MiB).
const DEFAULT_MAX_DECODED: usize = 16 * 1024 * 1024;

/// Brotli decoder buffer size.
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Body encoding declared by `content-encoding`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    /// No encoding.
    #[default]
    Identity,
    /// gzip (RFC 1952)
    Gzip,
    /// Zstandard (RFC 8878)
    Zstd,
    /// zlib-wrapped deflate (RFC 1950)
    Deflate,
    /// Brotli (RFC 7932)
    Brotli,
    /// Anything else, including stacked encodings; left undecoded.
    Other(String),
}

impl ContentEncoding {
    /// Parse a `content-encoding` header value.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Self::Identity;
        };

        match value.to_ascii_lowercase().as_str() {
            "identity" => Self::Identity,
            "gzip" | "x-gzip" => Self::Gzip,
            "zstd" => Self::Zstd,
            "deflate" => Self::Deflate,
            "br" => Self::Brotli,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Token as it appears on the wire.
    pub fn name(&self) -> &str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Deflate => "deflate",
            Self::Brotli => "br",
            Self::Other(name) => name,
        }
    }

    /// Whether the decoder can undo this encoding.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decompresses buffered bodies for display.
#[derive(Debug, Clone)]
pub struct BodyDecoder {
    max_decoded: usize,
}

impl Default for BodyDecoder {
    fn default() -> Self {
        Self {
            max_decoded: DEFAULT_MAX_DECODED,
        }
    }
}

impl BodyDecoder {
    /// Create a decoder with the default output limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with a custom output limit.
    pub fn with_max_decoded(max_decoded: usize) -> Self {
        Self { max_decoded }
    }

    /// Decode `body` according to `encoding`.
    ///
    /// Identity bodies are borrowed unchanged. Unsupported encodings are an
    /// error so the caller can render a note instead of binary noise.
    pub fn decode<'a>(&self, encoding: &ContentEncoding, body: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let decoded = match encoding {
            ContentEncoding::Identity => return Ok(Cow::Borrowed(body)),
            ContentEncoding::Gzip => self.read_limited(MultiGzDecoder::new(body))?,
            ContentEncoding::Deflate => self.read_limited(ZlibDecoder::new(body))?,
            ContentEncoding::Brotli => {
                self.read_limited(Decompressor::new(body, BROTLI_BUFFER_SIZE))?
            },
            ContentEncoding::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(body)
                    .map_err(|e| DebuggerError::Decode(e.to_string()))?;
                self.read_limited(decoder)?
            },
            ContentEncoding::Other(name) => {
                return Err(DebuggerError::Decode(format!(
                    "unsupported content-encoding: {name}"
                )))
            },
        };
        Ok(Cow::Owned(decoded))
    }

    fn read_limited(&self, reader: impl Read) -> Result<Vec<u8>> {
        let mut decoded = Vec::new();
        reader
            .take(self.max_decoded as u64 + 1)
            .read_to_end(&mut decoded)
            .map_err(|e| DebuggerError::Decode(e.to_string()))?;

        if decoded.len() > self.max_decoded {
            return Err(DebuggerError::Decode(format!(
                "decoded body exceeds {} bytes",
                self.max_decoded
            )));
        }
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    const BODY: &[u8] = br#"{"choices":[{"message":{"role":"assistant","content":"Hi"},"finish_reason":"stop"}]}"#;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_parse_content_encoding() {
        assert_eq!(ContentEncoding::from_header(None), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::from_header(Some("")), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::from_header(Some("GZIP")), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_header(Some("zstd")), ContentEncoding::Zstd);
        assert_eq!(ContentEncoding::from_header(Some("br")), ContentEncoding::Brotli);
        assert_eq!(
            ContentEncoding::from_header(Some("gzip, br")),
            ContentEncoding::Other("gzip, br".to_string())
        );
    }

    #[test]
    fn test_identity_is_borrowed() {
        let decoder = BodyDecoder::new();
        let decoded = decoder.decode(&ContentEncoding::Identity, BODY).unwrap();
        assert!(matches!(decoded, Cow::Borrowed(_)));
    }

    #[test]
    fn test_gzip() {
        let decoder = BodyDecoder::new();
        let compressed = gzip(BODY);
        let decoded = decoder.decode(&ContentEncoding::Gzip, &compressed).unwrap();
        assert_eq!(decoded.as_ref(), BODY);
    }

    #[test]
    fn test_zstd() {
        let decoder = BodyDecoder::new();
        let compressed = zstd::stream::encode_all(BODY, 3).unwrap();
        let decoded = decoder.decode(&ContentEncoding::Zstd, &compressed).unwrap();
        assert_eq!(decoded.as_ref(), BODY);
    }

    #[test]
    fn test_deflate() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(BODY).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoder = BodyDecoder::new();
        let decoded = decoder.decode(&ContentEncoding::Deflate, &compressed).unwrap();
        assert_eq!(decoded.as_ref(), BODY);
    }

    #[test]
    fn test_brotli() {
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(BODY).unwrap();
        }

        let decoder = BodyDecoder::new();
        let decoded = decoder.decode(&ContentEncoding::Brotli, &compressed).unwrap();
        assert_eq!(decoded.as_ref(), BODY);
    }

    #[test]
    fn test_corrupt_gzip_is_decode_error() {
        let decoder = BodyDecoder::new();
        let err = decoder
            .decode(&ContentEncoding::Gzip, b"definitely not gzip")
            .unwrap_err();
        assert!(matches!(err, DebuggerError::Decode(_)));
    }

    #[test]
    fn test_output_limit() {
        let decoder = BodyDecoder::with_max_decoded(16);
        let err = decoder
            .decode(&ContentEncoding::Gzip, &gzip(&[b'a'; 1024]))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds 16 bytes"));
    }

    #[test]
    fn test_unsupported_encoding() {
        let decoder = BodyDecoder::new();
        let err = decoder
            .decode(&ContentEncoding::Other("compress".to_string()), b"x")
            .unwrap_err();
        assert!(err.to_string().contains("compress"));
    }
}
