//! Turns exchanges into transcript entries.
//!
//! Everything here reads copies. Nothing returned by a [`Transcriber`]
//! feeds back into forwarding.

use bytes::Bytes;

use super::{LogEntry, LogKind};
use crate::codec::{BodyDecoder, ContentEncoding, SseFrame};
use crate::error::DebuggerError;
use crate::proxy::{ProxyRequest, ProxyResponse};
use crate::render::{HeaderMasker, JsonContext, JsonHighlighter, StatusClass, StyledLine, Tone};

/// Builds [`LogEntry`] values for every stage of an exchange.
#[derive(Debug, Clone, Default)]
pub struct Transcriber {
    masker: HeaderMasker,
    highlighter: JsonHighlighter,
    decoder: BodyDecoder,
}

fn labeled(label: &str, value: impl Into<String>) -> StyledLine {
    StyledLine::new()
        .push(label, Tone::Label)
        .push(" ", Tone::Plain)
        .push(value, Tone::Plain)
}

impl Transcriber {
    /// Create a transcriber.
    pub fn new(masker: HeaderMasker, decoder: BodyDecoder) -> Self {
        Self {
            masker,
            highlighter: JsonHighlighter::new(),
            decoder,
        }
    }

    /// The header masker in use.
    pub fn masker(&self) -> &HeaderMasker {
        &self.masker
    }

    /// Request entry: method, target URL, masked headers and body.
    pub fn request(&self, request: &ProxyRequest, url: &str, collapsed: bool) -> LogEntry {
        let mut lines = vec![
            StyledLine::toned("=== Request ===", Tone::RequestTitle),
            labeled("Method:", request.method.as_str()),
            labeled("URL:", url),
            StyledLine::toned("Headers:", Tone::Label),
        ];
        lines.extend(self.masker.render(&request.headers));

        if collapsed {
            lines.push(collapsed_line(request.body.len()));
        } else if !request.body.is_empty() {
            lines.push(StyledLine::toned("Body:", Tone::Label));
            lines.extend(self.body_lines(&request.body, JsonContext::Request));
        }

        LogEntry::new(LogKind::Request, request.id, lines).with_raw(request.body.clone())
    }

    /// Response head entry, titled in the color of its status class.
    pub fn response_head(&self, response: &ProxyResponse) -> LogEntry {
        let class = StatusClass::from_status(response.status.as_u16());
        let mut lines = vec![
            StyledLine::toned("=== Response ===", Tone::ResponseTitle(class)),
            labeled("Status:", response.status.to_string()),
            StyledLine::toned("Headers:", Tone::Label),
        ];
        lines.extend(self.masker.render(&response.headers));
        LogEntry::new(LogKind::Response, response.id, lines)
    }

    /// Entry for a buffered body.
    ///
    /// Decompression failure yields an error entry carrying the encoding and
    /// the original byte length in place of the body.
    pub fn response_body(
        &self,
        response: &ProxyResponse,
        body: &Bytes,
        collapsed: bool,
    ) -> LogEntry {
        let id = response.id;
        if collapsed {
            return LogEntry::new(LogKind::Response, id, vec![collapsed_line(body.len())])
                .with_raw(body.clone());
        }
        if body.is_empty() {
            return LogEntry::new(
                LogKind::Response,
                id,
                vec![StyledLine::new()
                    .push("Body:", Tone::Label)
                    .push(" (empty)", Tone::Dim)],
            );
        }

        let encoding = &response.encoding;
        if let ContentEncoding::Other(name) = encoding {
            let note = format!(" ({name}-encoded, {} bytes, not decoded)", body.len());
            return LogEntry::new(
                LogKind::Response,
                id,
                vec![StyledLine::new().push("Body:", Tone::Label).push(note, Tone::Dim)],
            )
            .with_raw(body.clone());
        }

        match self.decoder.decode(encoding, body) {
            Ok(decoded) => {
                let mut lines = vec![StyledLine::toned("Body:", Tone::Label)];
                lines.extend(self.body_lines(&decoded, JsonContext::Response));
                LogEntry::new(LogKind::Response, id, lines).with_raw(body.clone())
            },
            Err(err) => {
                let message = match err {
                    DebuggerError::Decode(message) => message,
                    other => other.to_string(),
                };
                LogEntry::new(
                    LogKind::Error,
                    id,
                    vec![
                        StyledLine::toned(
                            format!("Failed to decompress {encoding} response: {message}"),
                            Tone::Error,
                        ),
                        StyledLine::toned(
                            format!("Raw {encoding} data length: {}", body.len()),
                            Tone::Dim,
                        ),
                    ],
                )
                .with_raw(body.clone())
            },
        }
    }

    /// One chunk entry per framed SSE unit.
    pub fn sse_frame(&self, id: u64, frame: &SseFrame) -> LogEntry {
        let lines = match frame {
            SseFrame::Event(event) => {
                let mut lines = vec![StyledLine::toned(
                    format!("--- Event {} ---", event.sequence),
                    Tone::EventTitle,
                )];
                lines.extend(self.highlighter.highlight(&event.payload, JsonContext::Response));
                lines
            },
            SseFrame::Unparsed(line) => vec![
                StyledLine::toned("Raw chunk:", Tone::Label),
                StyledLine::toned(line.clone(), Tone::Content),
            ],
            SseFrame::Passthrough(line) => vec![StyledLine::toned(line.clone(), Tone::Dim)],
            SseFrame::Done => vec![StyledLine::toned("=== Stream Complete ===", Tone::StreamComplete)],
        };
        LogEntry::new(LogKind::Chunk, id, lines)
    }

    /// Summary for a stream whose detail is collapsed.
    pub fn stream_summary(&self, id: u64, events: u64, bytes: u64) -> LogEntry {
        LogEntry::new(
            LogKind::Chunk,
            id,
            vec![StyledLine::toned(
                format!("Stream: (collapsed, {events} events, {bytes} bytes)"),
                Tone::Dim,
            )],
        )
    }

    /// The framing task fell behind and stopped receiving copies of a stream.
    /// The client still got every byte.
    pub fn stream_truncated(&self, id: u64, framed_bytes: u64) -> LogEntry {
        LogEntry::new(
            LogKind::Error,
            id,
            vec![StyledLine::toned(
                format!(
                    "Stream transcript truncated after {framed_bytes} bytes: framing fell behind"
                ),
                Tone::Error,
            )],
        )
    }

    /// Transport failure entry.
    pub fn upstream_error(&self, id: u64, err: &DebuggerError) -> LogEntry {
        LogEntry::new(
            LogKind::Error,
            id,
            vec![StyledLine::toned(format!("Upstream error: {err}"), Tone::Error)],
        )
    }

    /// Inbound request refused before forwarding.
    pub fn rejected(&self, id: u64, err: &DebuggerError) -> LogEntry {
        LogEntry::new(
            LogKind::Error,
            id,
            vec![StyledLine::toned(format!("Request rejected: {err}"), Tone::Error)],
        )
    }

    fn body_lines(&self, body: &[u8], context: JsonContext) -> Vec<StyledLine> {
        let text = String::from_utf8_lossy(body);
        self.highlighter
            .highlight_str(&text, context)
            .unwrap_or_else(|| text.lines().map(StyledLine::plain_text).collect())
    }
}

fn collapsed_line(len: usize) -> StyledLine {
    StyledLine::new()
        .push("Body:", Tone::Label)
        .push(format!(" (collapsed, {len} bytes)"), Tone::Dim)
}
