//! Debugging reverse proxy for chat-completion APIs.
//!
//! Every inbound request is read in full, logged, and relayed to the
//! upstream base URL with its bytes untouched. Responses come back the same
//! way: buffered bodies are relayed in one write, streaming bodies chunk by
//! chunk as they arrive. The transcript is built from copies on the side.
//!
//! # Architecture
//!
//! ```text
//! Client App            Chatlens                 Upstream API
//!     |                    |                          |
//!     |-- any request ---->|-- same bytes ----------->|
//!     |                    |   (Host rewritten)       |
//!     |<-- same bytes -----|<-- response -------------|
//!     |                    |                          |
//!     |               copies only                     |
//!                          v
//!            Transcriber -> LogSink -> console / UI
//! ```
//!
//! For streaming responses each delivery is forwarded immediately; a clone
//! goes over a bounded channel to a framing task that owns the
//! [`SseFramer`]. Forwarding never waits on that channel: if the framing task
//! falls behind, the remaining copies are dropped and the transcript for that
//! stream is marked truncated.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use bytes::{Bytes, BytesMut};
use chrono::Local;
use futures::stream::StreamExt;
use reqwest::{redirect::Policy, Client, Url};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::codec::{BodyDecoder, SseFrame, SseFramer, StreamClassifier, DEFAULT_STREAMING_CONTENT_TYPES};
use crate::collapse::CollapsePatterns;
use crate::error::{error_chain, DebuggerError, Result};
use crate::render::HeaderMasker;
use crate::transcript::{LogKind, LogSink, Transcriber, DEFAULT_CAPACITY};

use super::exchange::{ProxyRequest, ProxyResponse, ResponseMode};
use super::stats::{ProxyStats, StatsSummary};

/// Headers that describe a single connection and are never relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Display copies of streamed deliveries queued for the framing task.
const FRAMING_QUEUE: usize = 256;

/// Proxy server configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to listen on (`host:port`)
    pub listen_addr: String,
    /// Upstream base URL (e.g., "https://api.openai.com")
    pub upstream_url: String,
    /// Upstream connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Largest accepted request body in bytes
    pub max_body_size: usize,
    /// Transcript entries kept in memory
    pub history: usize,
    /// Content types relayed incrementally when chunked
    pub streaming_content_types: Vec<String>,
    /// Display masking and emphasis of headers
    pub header_masker: HeaderMasker,
    /// Paths whose transcript detail is suppressed
    pub collapsed: CollapsePatterns,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8090".to_string(),
            upstream_url: "https://api.openai.com".to_string(),
            connect_timeout_secs: 30,
            max_body_size: 32 * 1024 * 1024,
            history: DEFAULT_CAPACITY,
            streaming_content_types: DEFAULT_STREAMING_CONTENT_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
            header_masker: HeaderMasker::default(),
            collapsed: CollapsePatterns::default(),
        }
    }
}

/// Shared proxy state
pub struct ProxyState {
    config: ProxyConfig,
    upstream: Url,
    client: Client,
    classifier: StreamClassifier,
    transcriber: Transcriber,
    patterns: RwLock<Arc<CollapsePatterns>>,
    sink: Arc<LogSink>,
    stats: Arc<ProxyStats>,
    next_id: AtomicU64,
    shutdown_tx: broadcast::Sender<()>,
}

impl ProxyState {
    fn new(config: ProxyConfig) -> Result<Self> {
        let upstream = parse_upstream(&config.upstream_url)?;

        // No idle pooling: every proxied request opens its own connection.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(Policy::none())
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| DebuggerError::UpstreamConnection(format!("Failed to create HTTP client: {e}")))?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            upstream,
            client,
            classifier: StreamClassifier::new(config.streaming_content_types.iter().cloned()),
            transcriber: Transcriber::new(config.header_masker.clone(), BodyDecoder::new()),
            patterns: RwLock::new(Arc::new(config.collapsed.clone())),
            sink: Arc::new(LogSink::new(config.history)),
            stats: Arc::new(ProxyStats::new()),
            next_id: AtomicU64::new(0),
            shutdown_tx,
            config,
        })
    }

    fn patterns(&self) -> Arc<CollapsePatterns> {
        Arc::clone(&self.patterns.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn parse_upstream(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| DebuggerError::InvalidUpstream(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(DebuggerError::InvalidUpstream(format!(
            "{raw}: expected an http(s) URL with a host"
        )));
    }
    Ok(url)
}

/// Upstream target: the base URL with its path and query replaced.
fn upstream_url(base: &Url, path_and_query: &str) -> Url {
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(query);
    url
}

/// Chatlens proxy server
pub struct ProxyServer {
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Create a new proxy server
    pub fn new(config: ProxyConfig) -> Result<Self> {
        Ok(Self {
            state: Arc::new(ProxyState::new(config)?),
        })
    }

    /// Get the router for the proxy. Every path and method is proxied.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<()> {
        let addr = &self.state.config.listen_addr;
        let listener = TcpListener::bind(addr).await.map_err(|e| DebuggerError::Listen {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until [`ProxyServer::shutdown`].
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!("Chatlens proxy listening on http://{}", local);
        info!("Forwarding to {}", self.state.upstream);
        info!("Collapsed patterns: {}", self.state.patterns().len());

        let mut shutdown_rx = self.state.shutdown_tx.subscribe();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        info!("Chatlens proxy stopped");
        Ok(())
    }

    /// Swap the active collapse patterns.
    pub fn reload_patterns(&self, patterns: CollapsePatterns) {
        info!("Reloaded {} collapse pattern(s)", patterns.len());
        *self
            .state
            .patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(patterns);
    }

    /// Active collapse patterns
    pub fn patterns(&self) -> Arc<CollapsePatterns> {
        self.state.patterns()
    }

    /// The transcript sink
    pub fn sink(&self) -> Arc<LogSink> {
        Arc::clone(&self.state.sink)
    }

    /// Upstream base URL
    pub fn upstream(&self) -> &Url {
        &self.state.upstream
    }

    /// Get statistics
    pub fn stats(&self) -> StatsSummary {
        self.state.stats.summary()
    }

    /// Send shutdown signal
    pub fn shutdown(&self) {
        let _ = self.state.shutdown_tx.send(());
    }
}

// === Handler ===

async fn proxy_handler(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let start = Instant::now();
    let id = state.next_id.fetch_add(1, Ordering::Relaxed) + 1;
    let (parts, body) = request.into_parts();

    let body = match read_body(body, state.config.max_body_size).await {
        Ok(body) => body,
        Err(err) => {
            warn!(exchange = id, "Rejected request: {}", err);
            let status = match err {
                DebuggerError::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            state.sink.append(state.transcriber.rejected(id, &err));
            return error_response(status, &err);
        },
    };

    let request = ProxyRequest {
        id,
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string()),
        headers: parts.headers,
        body,
        captured_at: Local::now(),
    };

    let url = upstream_url(&state.upstream, &request.path_and_query);
    let collapsed = state.patterns().should_collapse(request.path());
    state
        .sink
        .append(state.transcriber.request(&request, url.as_str(), collapsed));
    state.stats.record_request(request.body.len());
    debug!(exchange = id, method = %request.method, %url, collapsed, "Forwarding request");

    let mut headers = request.headers.clone();
    strip_request_headers(&mut headers);
    let mut upstream_request = state
        .client
        .request(request.method.clone(), url)
        .headers(headers);
    if !request.body.is_empty() {
        upstream_request = upstream_request.body(request.body.clone());
    }

    let upstream = match upstream_request.send().await {
        Ok(response) => response,
        Err(e) => {
            let err = DebuggerError::from(e);
            warn!(exchange = id, "{}", err);
            state.stats.record_upstream_error();
            state.sink.append(state.transcriber.upstream_error(id, &err));
            return error_response(StatusCode::BAD_GATEWAY, &err);
        },
    };

    let head = ProxyResponse::head(
        id,
        upstream.status(),
        upstream.headers().clone(),
        &state.classifier,
    );
    state.sink.append(state.transcriber.response_head(&head));

    match head.mode {
        ResponseMode::Streaming => stream_response(state, head, upstream, collapsed),
        ResponseMode::Buffered => buffered_response(state, head, upstream, collapsed, start).await,
    }
}

/// Read the whole inbound body, refusing anything over `limit` bytes.
async fn read_body(body: Body, limit: usize) -> Result<Bytes> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DebuggerError::RequestBody(error_chain(&e)))?;
        if buf.len() + chunk.len() > limit {
            return Err(DebuggerError::RequestTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Accumulate the body, log a decoded copy, relay the original in one write.
async fn buffered_response(
    state: Arc<ProxyState>,
    head: ProxyResponse,
    upstream: reqwest::Response,
    collapsed: bool,
    start: Instant,
) -> Response {
    let id = head.id;
    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => {
            let err = DebuggerError::UpstreamBody(error_chain(&e));
            warn!(exchange = id, "{}", err);
            state.stats.record_upstream_error();
            state.sink.append(state.transcriber.upstream_error(id, &err));
            return error_response(StatusCode::BAD_GATEWAY, &err);
        },
    };

    state.stats.record_buffered_response(body.len(), start.elapsed());
    let entry = state.transcriber.response_body(&head, &body, collapsed);
    if entry.kind == LogKind::Error {
        debug!(exchange = id, encoding = %head.encoding, "Could not decode body for display");
        state.stats.record_decode_failure();
    }
    state.sink.append(entry);

    let head = head.with_body(body.clone());
    relay(&head, Body::from(body))
}

/// Forward each delivery as it arrives; frame copies on a separate task.
fn stream_response(
    state: Arc<ProxyState>,
    head: ProxyResponse,
    upstream: reqwest::Response,
    collapsed: bool,
) -> Response {
    let id = head.id;
    state.stats.record_streaming_response();

    let (mut tap, rx, truncated) = DisplayTap::new(FRAMING_QUEUE);
    tokio::spawn(frame_stream(Arc::clone(&state), id, rx, truncated, collapsed));

    // Dropping the stream (client gone or body finished) drops the tap, which
    // ends the framing task, and drops the upstream response, which aborts it.
    let stream = upstream.bytes_stream().map(move |chunk| match chunk {
        Ok(bytes) => {
            state.stats.record_stream_chunk(bytes.len());
            if tap.offer(&bytes) == Offer::Overflow {
                warn!(exchange = id, "Framing fell behind; stream transcript truncated");
                state.stats.record_truncated_stream();
            }
            Ok(bytes)
        },
        Err(e) => {
            let err = DebuggerError::UpstreamBody(error_chain(&e));
            warn!(exchange = id, "{}", err);
            state.stats.record_upstream_error();
            state.sink.append(state.transcriber.upstream_error(id, &err));
            Err(std::io::Error::other(err.to_string()))
        },
    });

    relay(&head, Body::from_stream(stream))
}

/// Outcome of handing one delivery to the framing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offer {
    Queued,
    /// Queue was full; the tap is now closed.
    Overflow,
    Closed,
}

/// Sending half of the display path for one streamed response.
///
/// Never waits. The first delivery that finds the queue full closes the tap
/// and raises `truncated`, so the framer never sees a stream with a hole in it.
struct DisplayTap {
    tx: Option<mpsc::Sender<Bytes>>,
    truncated: Arc<AtomicBool>,
}

impl DisplayTap {
    fn new(capacity: usize) -> (Self, mpsc::Receiver<Bytes>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(capacity);
        let truncated = Arc::new(AtomicBool::new(false));
        let tap = Self {
            tx: Some(tx),
            truncated: Arc::clone(&truncated),
        };
        (tap, rx, truncated)
    }

    fn offer(&mut self, bytes: &Bytes) -> Offer {
        let Some(tx) = &self.tx else {
            return Offer::Closed;
        };
        match tx.try_send(bytes.clone()) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(_)) => {
                self.truncated.store(true, Ordering::Release);
                self.tx = None;
                Offer::Overflow
            },
            Err(TrySendError::Closed(_)) => {
                self.tx = None;
                Offer::Closed
            },
        }
    }
}

async fn frame_stream(
    state: Arc<ProxyState>,
    id: u64,
    mut rx: mpsc::Receiver<Bytes>,
    truncated: Arc<AtomicBool>,
    collapsed: bool,
) {
    let mut framer = SseFramer::new();
    let mut framed = 0u64;
    let mut received = 0u64;

    while let Some(chunk) = rx.recv().await {
        received += chunk.len() as u64;
        let frames = framer.feed(&chunk);
        framed += publish_frames(&state, id, &frames, collapsed);
    }

    if truncated.load(Ordering::Acquire) {
        // The residual is a fragment of a line we will never see the end of.
        state
            .sink
            .append(state.transcriber.stream_truncated(id, received));
    } else {
        let frames = framer.finish();
        framed += publish_frames(&state, id, &frames, collapsed);
    }

    if collapsed {
        state.sink.append(
            state
                .transcriber
                .stream_summary(id, framer.events_emitted(), received),
        );
    }
    state.stats.record_sse_events(framed);
    debug!(exchange = id, framed, received, "Stream closed");
}

fn publish_frames(state: &ProxyState, id: u64, frames: &[SseFrame], collapsed: bool) -> u64 {
    if !collapsed {
        for frame in frames {
            state.sink.append(state.transcriber.sse_frame(id, frame));
        }
    }
    frames.len() as u64
}

/// Client response with the upstream status and relayable headers.
fn relay(head: &ProxyResponse, body: Body) -> Response {
    let mut headers = head.headers.clone();
    strip_response_headers(&mut headers, head.is_streaming());

    let mut response = Response::new(body);
    *response.status_mut() = head.status;
    *response.headers_mut() = headers;
    response
}

fn error_response(status: StatusCode, err: &DebuggerError) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "message": err.to_string(),
                "type": "proxy_error"
            }
        })),
    )
        .into_response()
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// `Host` follows the upstream authority; `Content-Length` is recomputed.
fn strip_request_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
}

fn strip_response_headers(headers: &mut HeaderMap, streaming: bool) {
    strip_hop_by_hop(headers);
    if streaming {
        headers.remove(header::CONTENT_LENGTH);
    }
}
