//! Chatlens error types.
//!
//! # Propagation Policy
//!
//! Errors fall into two families:
//!
//! - **Transport path** (`UpstreamConnection`, `UpstreamBody`, `RequestBody`):
//!   surfaced to the client as an HTTP error response when no response has
//!   begun, or as connection termination once a streamed response is under way.
//! - **Display path** (`Decode`): recovered locally by logging a raw
//!   fallback rendering. Forwarding never depends on it succeeding.
//!
//! `ConfigLoad` is recovered with built-in defaults; `Listen` is fatal.

use std::error::Error as StdError;

use thiserror::Error;

/// Chatlens errors.
#[derive(Error, Debug)]
pub enum DebuggerError {
    /// Upstream could not be reached (DNS, TCP, TLS, or send failure).
    #[error("Failed to connect to upstream: {0}")]
    UpstreamConnection(String),

    /// Upstream response body failed mid-transfer.
    #[error("Failed to read upstream response: {0}")]
    UpstreamBody(String),

    /// Inbound request body could not be read.
    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    /// Inbound request body exceeded the configured limit.
    #[error("Request body exceeds {limit} bytes")]
    RequestTooLarge {
        /// Configured maximum body size.
        limit: usize,
    },

    /// Display-side decompression or parse failure.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Persisted configuration could not be read or parsed.
    #[error("Config load error: {0}")]
    ConfigLoad(String),

    /// The listener could not bind its address.
    #[error("Failed to listen on {addr}: {reason}")]
    Listen {
        /// Address that was requested.
        addr: String,
        /// Underlying failure.
        reason: String,
    },

    /// Upstream base URL is not a valid absolute URL.
    #[error("Invalid upstream URL: {0}")]
    InvalidUpstream(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Chatlens operations
pub type Result<T> = std::result::Result<T, DebuggerError>;

/// Failures while reading a response body are `UpstreamBody`; everything
/// before the response head arrives is `UpstreamConnection`.
impl From<reqwest::Error> for DebuggerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_body() || err.is_decode() {
            DebuggerError::UpstreamBody(error_chain(&err))
        } else {
            DebuggerError::UpstreamConnection(error_chain(&err))
        }
    }
}

/// Render an error together with its `source()` chain, outermost first.
///
/// `reqwest` keeps the interesting part (DNS failure, refused connection,
/// certificate problem) in the source chain, so the top-level message alone
/// is rarely useful to a client.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        let text = source.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = source.source();
    }
    message
}
