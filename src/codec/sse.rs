//! Incremental Server-Sent Events framing for the transcript.
//!
//! Upstream chat-completion streams look like:
//!
//! ```text
//! data: {"id":"chatcmpl-123","choices":[{"delta":{"content":"Hello"}}]}
//!
//! data: {"id":"chatcmpl-123","choices":[{"delta":{"content":" world"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Network deliveries do not line up with that framing: one read can hold
//! half a line, or the tail of one event and the head of the next. The framer
//! keeps the unterminated tail of every delivery in a residual buffer and only
//! parses lines once their `\n` has arrived.
//!
//! The framer only ever sees copies of the forwarded bytes.

use serde_json::Value;

/// Literal payload marking the end of a chat-completion stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Longest unterminated line held back before it is flushed raw (16 MiB).
pub const DEFAULT_MAX_LINE: usize = 16 * 1024 * 1024;

/// A `data:` line whose payload parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// 1-based position among parsed events of this response.
    pub sequence: u64,
    /// The complete line as received (without the line terminator).
    pub raw: String,
    /// Parsed payload.
    pub payload: Value,
}

/// One framed unit handed to the transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// Data line with a JSON payload.
    Event(SseEvent),
    /// Data line whose payload is not JSON; shown raw.
    Unparsed(String),
    /// Any other non-empty line (`event:`, `id:`, `retry:`, `: comment`).
    Passthrough(String),
    /// `data: [DONE]`; nothing after it is framed.
    Done,
}

/// Splits a byte stream into SSE frames across delivery boundaries.
///
/// Each delivery is scanned once. A line that grows past `max_line` bytes
/// without a terminator is flushed as [`SseFrame::Unparsed`] and framing
/// restarts at the next byte.
#[derive(Debug)]
pub struct SseFramer {
    residual: Vec<u8>,
    sequence: u64,
    done: bool,
    max_line: usize,
}

impl Default for SseFramer {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }
}

impl SseFramer {
    /// Create a framer for a single response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a framer holding back at most `max_line` unterminated bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            residual: Vec::new(),
            sequence: 0,
            done: false,
            max_line: max_line.max(1),
        }
    }

    /// Whether the terminal marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of JSON events emitted so far.
    pub fn events_emitted(&self) -> u64 {
        self.sequence
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.residual.len()
    }

    /// Consume one delivery and return every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        // Earlier bytes in the residual are known to hold no newline.
        let held = self.residual.len();
        self.residual.extend_from_slice(chunk);

        if let Some(offset) = chunk.iter().rposition(|&b| b == b'\n') {
            let complete: Vec<u8> = self.residual.drain(..=held + offset).collect();
            for line in complete.split(|&b| b == b'\n') {
                if self.push_line(line, &mut frames) {
                    self.residual.clear();
                    return frames;
                }
            }
        }

        if self.residual.len() > self.max_line {
            let line = std::mem::take(&mut self.residual);
            frames.push(SseFrame::Unparsed(
                String::from_utf8_lossy(&line).into_owned(),
            ));
        }

        frames
    }

    /// Flush a trailing line that never received its terminator.
    ///
    /// Called once the upstream body has ended.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if !self.done && !self.residual.is_empty() {
            let line = std::mem::take(&mut self.residual);
            self.push_line(&line, &mut frames);
        }
        self.residual.clear();
        frames
    }

    /// Returns true when framing has ended.
    fn push_line(&mut self, line: &[u8], frames: &mut Vec<SseFrame>) -> bool {
        let text = String::from_utf8_lossy(line);
        if let Some(frame) = self.parse_line(&text) {
            let terminal = frame == SseFrame::Done;
            frames.push(frame);
            return terminal;
        }
        false
    }

    /// Classify a single complete line.
    pub fn parse_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.trim().is_empty() {
            return None;
        }

        let Some(data) = line.strip_prefix("data:") else {
            return Some(SseFrame::Passthrough(line.to_string()));
        };
        let payload = data.strip_prefix(' ').unwrap_or(data);

        if payload.trim() == DONE_MARKER {
            self.done = true;
            return Some(SseFrame::Done);
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(payload) => {
                self.sequence += 1;
                Some(SseFrame::Event(SseEvent {
                    sequence: self.sequence,
                    raw: line.to_string(),
                    payload,
                }))
            },
            Err(_) => Some(SseFrame::Unparsed(line.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn events(frames: &[SseFrame]) -> Vec<&SseEvent> {
        frames
            .iter()
            .filter_map(|f| match f {
                SseFrame::Event(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_event_then_blank_line_across_deliveries() {
        let mut framer = SseFramer::new();

        let first = framer.feed(b"data: {\"a\":1}\n");
        let second = framer.feed(b"\n");

        let mut all = first;
        all.extend(second);
        let parsed = events(&all);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].payload, json!({"a": 1}));
        assert_eq!(parsed[0].sequence, 1);
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_done_marker() {
        let mut framer = SseFramer::new();

        let frames = framer.feed(b"data: [DONE]\n");
        assert_eq!(frames, vec![SseFrame::Done]);
        assert!(framer.is_done());
        assert_eq!(framer.events_emitted(), 0);
    }

    #[test]
    fn test_json_split_mid_payload() {
        let mut framer = SseFramer::new();

        assert!(framer.feed(b"data: {\"choices\":[{\"del").is_empty());
        assert!(framer.pending() > 0);
        let frames = framer.feed(b"ta\":{\"content\":\"Hi\"}}]}\n\n");

        let parsed = events(&frames);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].payload["choices"][0]["delta"]["content"], "Hi");
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_multiple_events_in_one_delivery() {
        let mut framer = SseFramer::new();

        let frames = framer.feed(b"data: {\"n\":1}\n\ndata: {\"n\":2}\n\ndata: {\"n\":3}\n\n");
        let sequences: Vec<u64> = events(&frames).iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_json_falls_back_to_raw() {
        let mut framer = SseFramer::new();

        let frames = framer.feed(b"data: not json\n");
        assert_eq!(frames, vec![SseFrame::Unparsed("data: not json".to_string())]);
        assert_eq!(framer.events_emitted(), 0);
    }

    #[test]
    fn test_non_data_lines_pass_through() {
        let mut framer = SseFramer::new();

        let frames = framer.feed(b"event: message\nid: 7\n: keep-alive\n");
        assert_eq!(
            frames,
            vec![
                SseFrame::Passthrough("event: message".to_string()),
                SseFrame::Passthrough("id: 7".to_string()),
                SseFrame::Passthrough(": keep-alive".to_string()),
            ]
        );
    }

    #[test]
    fn test_crlf_and_no_space_after_colon() {
        let mut framer = SseFramer::new();

        let frames = framer.feed(b"data:{\"x\":true}\r\n\r\n");
        let parsed = events(&frames);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].raw, "data:{\"x\":true}");
    }

    #[test]
    fn test_nothing_framed_after_done() {
        let mut framer = SseFramer::new();

        let frames = framer.feed(b"data: {\"n\":1}\n\ndata: [DONE]\n\ndata: {\"n\":2}\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], SseFrame::Done);
        assert!(framer.feed(b"data: {\"n\":3}\n").is_empty());
        assert!(framer.finish().is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut framer = SseFramer::new();

        assert!(framer.feed(b"data: {\"tail\":1}").is_empty());
        let frames = framer.finish();
        assert_eq!(events(&frames).len(), 1);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_newline_free_deliveries_are_linear() {
        let mut framer = SseFramer::new();
        let chunk = vec![b'a'; 4096];

        let start = std::time::Instant::now();
        for _ in 0..2048 {
            assert!(framer.feed(&chunk).is_empty());
        }
        assert_eq!(framer.pending(), 2048 * 4096);
        assert!(
            start.elapsed() < std::time::Duration::from_secs(2),
            "8 MiB of newline-free input took {:?}",
            start.elapsed()
        );

        let frames = framer.feed(b"\ndata: {\"n\":1}\n");
        assert!(matches!(&frames[0], SseFrame::Passthrough(line) if line.len() == 2048 * 4096));
        assert_eq!(events(&frames).len(), 1);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_oversized_line_is_flushed_raw() {
        let mut framer = SseFramer::with_max_line(64);

        assert!(framer.feed(b"data: {\"content\":\"").is_empty());
        let frames = framer.feed(&[b'x'; 100]);
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], SseFrame::Unparsed(line) if line.starts_with("data: {")));
        assert_eq!(framer.pending(), 0);

        for _ in 0..10 {
            framer.feed(&[b'y'; 30]);
            assert!(framer.pending() <= 64);
        }

        let frames = framer.feed(b"\"}\ndata: {\"n\":2}\n");
        assert_eq!(events(&frames).len(), 1);
        assert_eq!(events(&frames)[0].payload["n"], 2);
    }

    #[test]
    fn test_tail_after_newline_respects_cap() {
        let mut framer = SseFramer::with_max_line(16);

        let mut delivery = b"data: {\"n\":1}\n".to_vec();
        delivery.extend_from_slice(&[b'z'; 40]);
        let frames = framer.feed(&delivery);

        assert_eq!(events(&frames).len(), 1);
        assert_eq!(frames[1], SseFrame::Unparsed("z".repeat(40)));
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_utf8_split_across_deliveries() {
        let mut framer = SseFramer::new();
        let line = "data: {\"content\":\"héllo\"}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        assert!(framer.feed(&line[..split]).is_empty());
        let frames = framer.feed(&line[split..]);
        assert_eq!(events(&frames)[0].payload["content"], "héllo");
    }
}
