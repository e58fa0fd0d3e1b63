//! Captured request and response of one proxied exchange.

use bytes::Bytes;
use chrono::{DateTime, Local};
use http::header::CONTENT_ENCODING;
use http::{HeaderMap, Method, StatusCode};

use crate::codec::{ContentEncoding, StreamClassifier};

/// How a response body is relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Accumulated in full, then written in one go.
    Buffered,
    /// Forwarded chunk by chunk as it arrives.
    Streaming,
}

/// An inbound request, fully read. Immutable once captured.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Exchange id, monotonic per server.
    pub id: u64,
    /// HTTP method.
    pub method: Method,
    /// Path and query as received.
    pub path_and_query: String,
    /// Request headers as received.
    pub headers: HeaderMap,
    /// Complete body.
    pub body: Bytes,
    /// When the body finished arriving.
    pub captured_at: DateTime<Local>,
}

impl ProxyRequest {
    /// Path without the query string.
    pub fn path(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map_or(self.path_and_query.as_str(), |(path, _)| path)
    }
}

/// An upstream response head, plus the body once buffered.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// Exchange id.
    pub id: u64,
    /// Upstream status.
    pub status: StatusCode,
    /// Upstream headers.
    pub headers: HeaderMap,
    /// Declared `content-encoding`.
    pub encoding: ContentEncoding,
    /// Relay mode.
    pub mode: ResponseMode,
    /// Full body, buffered mode only.
    pub body: Option<Bytes>,
}

impl ProxyResponse {
    /// Capture a response head and classify it.
    pub fn head(
        id: u64,
        status: StatusCode,
        headers: HeaderMap,
        classifier: &StreamClassifier,
    ) -> Self {
        let encoding = ContentEncoding::from_header(
            headers
                .get(CONTENT_ENCODING)
                .and_then(|value| value.to_str().ok()),
        );
        let mode = classifier.classify(&headers);
        Self {
            id,
            status,
            headers,
            encoding,
            mode,
            body: None,
        }
    }

    /// Attach the buffered body.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// Whether the body is relayed incrementally.
    pub fn is_streaming(&self) -> bool {
        self.mode == ResponseMode::Streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_request_path_strips_query() {
        let request = ProxyRequest {
            id: 1,
            method: Method::GET,
            path_and_query: "/v1/models?limit=2".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            captured_at: Local::now(),
        };
        assert_eq!(request.path(), "/v1/models");
    }

    #[test]
    fn test_response_head_classification() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/event-stream"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("content-encoding", HeaderValue::from_static("gzip"));

        let response = ProxyResponse::head(7, StatusCode::OK, headers, &StreamClassifier::default());
        assert!(response.is_streaming());
        assert_eq!(response.encoding, ContentEncoding::Gzip);
        assert!(response.body.is_none());
    }

    #[test]
    fn test_plain_json_is_buffered() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let response = ProxyResponse::head(1, StatusCode::OK, headers, &StreamClassifier::default())
            .with_body(Bytes::from_static(b"{}"));
        assert_eq!(response.mode, ResponseMode::Buffered);
        assert_eq!(response.encoding, ContentEncoding::Identity);
    }
}
