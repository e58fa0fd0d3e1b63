//! Proxy statistics tracking.
//!
//! Tracks exchange counts, relayed bytes, SSE events, failures and buffered
//! round-trip latencies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Latency samples kept for percentile calculation.
const LATENCY_WINDOW: usize = 1000;

/// Thread-safe proxy statistics
#[derive(Debug, Default)]
pub struct ProxyStats {
    /// Total requests proxied
    requests: AtomicU64,
    /// Responses relayed incrementally
    streaming_responses: AtomicU64,
    /// SSE units framed for the transcript
    sse_events: AtomicU64,
    /// Upstream connection or body failures
    upstream_errors: AtomicU64,
    /// Display-side decompression failures
    decode_failures: AtomicU64,
    /// Streams whose display copies were cut off
    truncated_streams: AtomicU64,
    /// Request body bytes sent upstream
    bytes_up: AtomicU64,
    /// Response body bytes relayed to clients
    bytes_down: AtomicU64,
    /// Buffered round-trip latencies
    latencies: RwLock<Vec<Duration>>,
    /// Start time
    started_at: RwLock<Option<Instant>>,
}

impl ProxyStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            started_at: RwLock::new(Some(Instant::now())),
            ..Default::default()
        }
    }

    /// Record an inbound request forwarded with `bytes_up` body bytes
    pub fn record_request(&self, bytes_up: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_up.fetch_add(bytes_up as u64, Ordering::Relaxed);
    }

    /// Record a buffered response relayed in full
    pub fn record_buffered_response(&self, bytes_down: usize, latency: Duration) {
        self.bytes_down
            .fetch_add(bytes_down as u64, Ordering::Relaxed);

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(latency);
            if latencies.len() > LATENCY_WINDOW {
                latencies.remove(0);
            }
        }
    }

    /// Record the start of a streaming response
    pub fn record_streaming_response(&self) {
        self.streaming_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one streamed delivery relayed to the client
    pub fn record_stream_chunk(&self, bytes_down: usize) {
        self.bytes_down
            .fetch_add(bytes_down as u64, Ordering::Relaxed);
    }

    /// Record SSE units framed for display
    pub fn record_sse_events(&self, count: u64) {
        self.sse_events.fetch_add(count, Ordering::Relaxed);
    }

    /// Record an upstream failure
    pub fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a body that could not be decompressed for display
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stream whose framing fell behind
    pub fn record_truncated_stream(&self) {
        self.truncated_streams.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total requests
    pub fn total_requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Get streaming responses count
    pub fn streaming_responses(&self) -> u64 {
        self.streaming_responses.load(Ordering::Relaxed)
    }

    /// Get framed SSE units
    pub fn sse_events(&self) -> u64 {
        self.sse_events.load(Ordering::Relaxed)
    }

    /// Get upstream failures
    pub fn upstream_errors(&self) -> u64 {
        self.upstream_errors.load(Ordering::Relaxed)
    }

    /// Get decode failures
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Get streams with a truncated transcript
    pub fn truncated_streams(&self) -> u64 {
        self.truncated_streams.load(Ordering::Relaxed)
    }

    /// Get bytes sent upstream
    pub fn bytes_up(&self) -> u64 {
        self.bytes_up.load(Ordering::Relaxed)
    }

    /// Get bytes relayed downstream
    pub fn bytes_down(&self) -> u64 {
        self.bytes_down.load(Ordering::Relaxed)
    }

    /// Get p50 latency
    pub fn p50_latency(&self) -> Option<Duration> {
        self.percentile_latency(50)
    }

    /// Get p95 latency
    pub fn p95_latency(&self) -> Option<Duration> {
        self.percentile_latency(95)
    }

    /// Get p99 latency
    pub fn p99_latency(&self) -> Option<Duration> {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> Option<Duration> {
        let latencies = self.latencies.read().ok()?;
        if latencies.is_empty() {
            return None;
        }

        let mut sorted = latencies.clone();
        sorted.sort();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        Some(sorted[idx])
    }

    /// Get uptime
    pub fn uptime(&self) -> Duration {
        self.started_at
            .read()
            .ok()
            .and_then(|s| s.map(|start| start.elapsed()))
            .unwrap_or_default()
    }

    /// Get requests per second
    pub fn requests_per_second(&self) -> f64 {
        let uptime = self.uptime().as_secs_f64();
        if uptime > 0.0 {
            self.total_requests() as f64 / uptime
        } else {
            0.0
        }
    }

    /// Get summary as JSON-compatible struct
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            total_requests: self.total_requests(),
            streaming_responses: self.streaming_responses(),
            sse_events: self.sse_events(),
            upstream_errors: self.upstream_errors(),
            decode_failures: self.decode_failures(),
            truncated_streams: self.truncated_streams(),
            bytes_up: self.bytes_up(),
            bytes_down: self.bytes_down(),
            p50_latency_ms: self.p50_latency().map(|d| d.as_secs_f64() * 1000.0),
            p95_latency_ms: self.p95_latency().map(|d| d.as_secs_f64() * 1000.0),
            p99_latency_ms: self.p99_latency().map(|d| d.as_secs_f64() * 1000.0),
            uptime_secs: self.uptime().as_secs(),
            requests_per_second: self.requests_per_second(),
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        for counter in [
            &self.requests,
            &self.streaming_responses,
            &self.sse_events,
            &self.upstream_errors,
            &self.decode_failures,
            &self.truncated_streams,
            &self.bytes_up,
            &self.bytes_down,
        ] {
            counter.store(0, Ordering::Relaxed);
        }

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.clear();
        }

        if let Ok(mut started) = self.started_at.write() {
            *started = Some(Instant::now());
        }
    }
}

/// Statistics summary for serialization.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatsSummary {
    /// Total number of requests proxied.
    pub total_requests: u64,
    /// Number of responses relayed incrementally.
    pub streaming_responses: u64,
    /// SSE units framed for the transcript.
    pub sse_events: u64,
    /// Upstream connection or body failures.
    pub upstream_errors: u64,
    /// Bodies that could not be decompressed for display.
    pub decode_failures: u64,
    /// Streams whose transcript was cut off because framing fell behind.
    pub truncated_streams: u64,
    /// Request body bytes sent upstream.
    pub bytes_up: u64,
    /// Response body bytes relayed to clients.
    pub bytes_down: u64,
    /// 50th percentile buffered latency in milliseconds.
    pub p50_latency_ms: Option<f64>,
    /// 95th percentile buffered latency in milliseconds.
    pub p95_latency_ms: Option<f64>,
    /// 99th percentile buffered latency in milliseconds.
    pub p99_latency_ms: Option<f64>,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Average requests per second.
    pub requests_per_second: f64,
}
