//! # Chatlens - Debugging Proxy for Chat-Completion APIs
//!
//! A reverse proxy that sits between a client application and an upstream
//! chat-completion API, forwarding traffic byte-for-byte while producing a
//! human-readable, highlighted transcript of every request and response,
//! including incrementally streamed ones.
//!
//! ## Features
//!
//! - **Lossless passthrough**: request and response bodies reach the other
//!   side exactly as received, whatever the display pipeline does
//! - **Streaming aware**: Server-Sent Events are relayed as they arrive and
//!   framed for display across network delivery boundaries
//! - **Display-only decompression**: gzip, zstd, deflate and brotli
//! - **Chat-aware highlighting**: roles, models and finish reasons in color
//! - **Secret masking**: authorization headers keep only their last four characters
//! - **Collapse patterns**: suppress transcript detail for noisy paths
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────── ProxyServer ────────────────┐
//!  Client ──────────>│ read body ──> forward ───────────────────────│──> Upstream
//!         <──────────│ relay <────── StreamClassifier <─────────────│<──
//!                    │   │                 │                        │
//!                    │   │ copies    buffered │ streaming           │
//!                    │   v                 v  v                     │
//!                    │ Transcriber <── BodyDecoder / SseFramer      │
//!                    │   │  (HeaderMasker, JsonHighlighter,         │
//!                    │   │   CollapsePatterns)                      │
//!                    └───│──────────────────────────────────────────┘
//!                        v
//!                     LogSink ──> console printer / other consumers
//! ```
//!
//! ## Response Modes
//!
//! | `content-type`                      | `transfer-encoding` | Mode      |
//! |-------------------------------------|---------------------|-----------|
//! | `text/event-stream`, `application/x-ndjson` | `chunked`   | streaming |
//! | streaming type                      | absent              | buffered  |
//! | anything else                       | any                 | buffered  |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chatlens::{Config, ProxyServer};
//!
//! let config = Config::load(None).with_env_overrides();
//! let server = ProxyServer::new(config.proxy_config())?;
//! let _printer = chatlens::transcript::console::spawn_console_printer(&server.sink(), true);
//! server.run().await?;
//! ```
//!
//! ### Framing a Stream
//!
//! ```rust
//! use chatlens::codec::{SseFrame, SseFramer};
//!
//! let mut framer = SseFramer::new();
//! assert!(framer.feed(b"data: {\"a\":").is_empty());
//! let frames = framer.feed(b"1}\n\ndata: [DONE]\n");
//! assert!(matches!(frames[0], SseFrame::Event(_)));
//! assert_eq!(frames[1], SseFrame::Done);
//! ```
//!
//! ## Modules
//!
//! - [`proxy`]: Proxy server, exchange types and statistics
//! - [`codec`]: Stream classification, SSE framing, body decoding
//! - [`render`]: Styled lines, JSON highlighting, header masking
//! - [`transcript`]: Log entries, the bounded sink and the console printer
//! - [`collapse`]: Collapse patterns
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod codec;
pub mod collapse;
pub mod config;
pub mod error;
pub mod proxy;
pub mod render;
pub mod transcript;

// Re-exports for convenience
pub use codec::{BodyDecoder, ContentEncoding, SseEvent, SseFrame, SseFramer, StreamClassifier};
pub use collapse::{CollapsePattern, CollapsePatterns};
pub use config::Config;
pub use error::{DebuggerError, Result};
pub use proxy::{ProxyConfig, ProxyRequest, ProxyResponse, ProxyServer, ResponseMode, StatsSummary};
pub use render::{mask_token, HeaderMasker, JsonHighlighter};
pub use transcript::{LogEntry, LogKind, LogSink, Transcriber};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
