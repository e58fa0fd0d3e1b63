//! Response mode classification.
//!
//! A response is treated as an incremental event stream only when its
//! `content-type` names a streaming format **and** its `transfer-encoding`
//! says chunked. A content type alone is not enough: some servers label a
//! fully buffered body `text/event-stream`.

use http::header::{CONTENT_TYPE, TRANSFER_ENCODING};
use http::HeaderMap;

use crate::proxy::ResponseMode;

/// Content types treated as streaming by default.
pub const DEFAULT_STREAMING_CONTENT_TYPES: &[&str] = &["text/event-stream", "application/x-ndjson"];

/// Decides whether a response must be relayed incrementally.
#[derive(Debug, Clone)]
pub struct StreamClassifier {
    markers: Vec<String>,
}

impl Default for StreamClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_STREAMING_CONTENT_TYPES.iter().map(|s| (*s).to_string()))
    }
}

impl StreamClassifier {
    /// Create a classifier with the given content-type markers.
    pub fn new(markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.trim().to_ascii_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Configured content-type markers.
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Pure decision on raw header values. Missing headers are passed as `""`.
    pub fn is_streaming(&self, content_type: &str, transfer_encoding: &str) -> bool {
        let content_type = content_type.to_ascii_lowercase();
        let has_marker = self
            .markers
            .iter()
            .any(|marker| content_type.contains(marker.as_str()));

        has_marker && is_chunked(transfer_encoding)
    }

    /// Classify a response from its headers.
    pub fn classify(&self, headers: &HeaderMap) -> ResponseMode {
        let content_type = joined(headers, CONTENT_TYPE.as_str());
        let transfer_encoding = joined(headers, TRANSFER_ENCODING.as_str());

        if self.is_streaming(&content_type, &transfer_encoding) {
            ResponseMode::Streaming
        } else {
            ResponseMode::Buffered
        }
    }
}

/// Chunked must be the final transfer coding (RFC 9112 §6.1).
fn is_chunked(transfer_encoding: &str) -> bool {
    transfer_encoding
        .rsplit(',')
        .next()
        .map(|last| last.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

fn joined(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ")
}
