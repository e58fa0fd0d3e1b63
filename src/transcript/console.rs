//! Console printer: writes live transcript entries to stdout.

use std::io::Write;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{LogEntry, LogSink};
use crate::render::StyledLine;

/// Width of the `HH:MM:SS X ` prefix; continuation lines are indented by it.
const PREFIX_WIDTH: usize = 11;

/// Render an entry for the console.
pub fn format_entry(entry: &LogEntry, color: bool) -> String {
    let stamp = entry.timestamp.format("%H:%M:%S").to_string();
    let icon = StyledLine::toned(entry.kind.icon(), entry.kind.tone()).render(color);
    let indent = " ".repeat(PREFIX_WIDTH);

    let mut out = String::new();
    for (i, line) in entry.lines.iter().enumerate() {
        if i == 0 {
            out.push_str(&format!("{stamp} {icon} "));
        } else {
            out.push('\n');
            out.push_str(&indent);
        }
        out.push_str(&line.render(color));
    }
    if entry.lines.is_empty() {
        out.push_str(&format!("{stamp} {icon}"));
    }
    out
}

/// Print every entry appended to `sink` from now on.
///
/// The task ends when the sink is dropped or stdout is closed.
pub fn spawn_console_printer(sink: &LogSink, color: bool) -> JoinHandle<()> {
    let mut rx = sink.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(entry) => {
                    let mut stdout = std::io::stdout().lock();
                    if writeln!(stdout, "{}", format_entry(&entry, color)).is_err() {
                        debug!("stdout closed, stopping console printer");
                        break;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Console printer fell behind; entries skipped");
                },
                Err(RecvError::Closed) => break,
            }
        }
    })
}
