//! The human-readable transcript of proxied traffic.
//!
//! [`Transcriber`] turns exchanges into [`LogEntry`] values, [`LogSink`]
//! keeps the most recent ones and fans them out to live consumers such as
//! the console printer.

pub mod console;
mod format;
mod sink;

use bytes::Bytes;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::render::{StyledLine, Tone};

pub use format::Transcriber;
pub use sink::{LogSink, DEFAULT_CAPACITY};

/// Entry category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Inbound request.
    Request,
    /// Response head or buffered body.
    Response,
    /// One framed unit of a streaming response.
    Chunk,
    /// Display or transport failure.
    Error,
}

impl LogKind {
    /// Marker shown next to the timestamp.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Request => "→",
            Self::Response => "←",
            Self::Chunk => "⋯",
            Self::Error => "✗",
        }
    }

    /// Tone of the marker.
    pub fn tone(self) -> Tone {
        match self {
            Self::Request => Tone::RequestTitle,
            Self::Response => Tone::Model,
            Self::Chunk => Tone::EventTitle,
            Self::Error => Tone::Error,
        }
    }
}

/// One formatted transcript entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Category.
    pub kind: LogKind,
    /// When the entry was produced.
    pub timestamp: DateTime<Local>,
    /// Exchange the entry belongs to.
    pub exchange: u64,
    /// Display lines.
    pub lines: Vec<StyledLine>,
    /// Underlying bytes the entry describes, when there are any.
    pub raw: Option<Bytes>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(kind: LogKind, exchange: u64, lines: Vec<StyledLine>) -> Self {
        Self {
            kind,
            timestamp: Local::now(),
            exchange,
            lines,
            raw: None,
        }
    }

    /// Attach the underlying bytes.
    #[must_use]
    pub fn with_raw(mut self, raw: Bytes) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Lines joined with `\n`, styled or not.
    pub fn text(&self, color: bool) -> String {
        self.lines
            .iter()
            .map(|line| line.render(color))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Lines joined with `\n`, without styling.
    pub fn plain_text(&self) -> String {
        self.text(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_text() {
        let entry = LogEntry::new(
            LogKind::Error,
            3,
            vec![
                StyledLine::toned("Upstream error: refused", Tone::Error),
                StyledLine::plain_text("second"),
            ],
        )
        .with_raw(Bytes::from_static(b"raw"));

        assert_eq!(entry.plain_text(), "Upstream error: refused\nsecond");
        assert_eq!(entry.exchange, 3);
        assert_eq!(entry.raw.as_deref(), Some(&b"raw"[..]));
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LogKind::Chunk).unwrap(), "\"chunk\"");
    }
}
