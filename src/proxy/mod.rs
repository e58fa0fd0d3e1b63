//! Debugging reverse proxy with a live transcript.
//!
//! The proxy sits between your application and a chat-completion API and
//! forwards every request and response byte-for-byte, while producing a
//! highlighted transcript of both directions.
//!
//! # Features
//!
//! - **Lossless passthrough**: bodies are relayed exactly as received
//! - **Streaming aware**: SSE responses are forwarded chunk by chunk and
//!   framed for display on a separate task
//! - **Display-only decoding**: gzip, zstd, deflate and brotli bodies are
//!   decompressed for the transcript, never for the client
//! - **Secret masking**: authorization headers show only their last four characters
//! - **Collapse patterns**: suppress transcript detail for noisy paths
//! - **Statistics**: request counts, relayed bytes, latencies
//!
//! # Usage
//!
//! ```rust,ignore
//! use chatlens::proxy::{ProxyConfig, ProxyServer};
//!
//! let config = ProxyConfig {
//!     listen_addr: "127.0.0.1:8090".to_string(),
//!     upstream_url: "https://api.openai.com".to_string(),
//!     ..Default::default()
//! };
//!
//! let server = ProxyServer::new(config)?;
//! server.run().await?;
//! ```
//!
//! # Client Configuration
//!
//! Point your OpenAI client at the proxy:
//!
//! ```python
//! from openai import OpenAI
//!
//! client = OpenAI(base_url="http://localhost:8090/v1")
//! ```

mod exchange;
mod server;
mod stats;

pub use exchange::{ProxyRequest, ProxyResponse, ResponseMode};
pub use server::{ProxyConfig, ProxyServer, ProxyState};
pub use stats::{ProxyStats, StatsSummary};
