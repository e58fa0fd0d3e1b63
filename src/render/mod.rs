//! Presentation model for the transcript.
//!
//! Formatting code never writes escape sequences directly. It produces
//! [`StyledLine`]s made of text segments tagged with a semantic [`Tone`];
//! only [`StyledLine::render`] turns tones into terminal colors (through
//! `crossterm`). Tests can therefore assert on roles and roles alone, and
//! `--no-color` output is the same text minus styling.

pub mod headers;
pub mod json;

use crossterm::style::{Color, ContentStyle, Stylize};

pub use headers::{mask_token, HeaderMaskRule, HeaderMasker, MaskBehavior};
pub use json::{FinishReason, JsonContext, JsonHighlighter, Role};

/// HTTP status class, used to color response titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx
    Success,
    /// 3xx
    Redirect,
    /// Everything else
    Failure,
}

impl StatusClass {
    /// Classify a status code.
    pub fn from_status(code: u16) -> Self {
        match code {
            200..=299 => Self::Success,
            300..=399 => Self::Redirect,
            _ => Self::Failure,
        }
    }
}

/// Semantic style of a text segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Unstyled (indentation, separators).
    Plain,
    /// Neutral gray: JSON delimiters, keys, unremarkable lines.
    Dim,
    /// Bold section label (`Method:`, `Headers:`).
    Label,
    /// Highlighted header line.
    Emphasis,
    /// `model` value.
    Model,
    /// `name` value.
    Name,
    /// `content` value.
    Content,
    /// Boolean `stream` value.
    Stream,
    /// `role` value.
    Role(Role),
    /// `finish_reason` value (responses only).
    FinishReason(FinishReason),
    /// `=== Request ===`
    RequestTitle,
    /// `=== Response ===`
    ResponseTitle(StatusClass),
    /// `--- Event N ---`
    EventTitle,
    /// `=== Stream Complete ===`
    StreamComplete,
    /// Failure messages.
    Error,
}

impl Tone {
    fn style(self) -> ContentStyle {
        let base = ContentStyle::new();
        match self {
            Tone::Plain => base,
            Tone::Dim => base.with(Color::DarkGrey),
            Tone::Label => base.bold(),
            Tone::Emphasis => base.with(Color::Magenta),
            Tone::Model => base.with(Color::Blue),
            Tone::Name => base.with(Color::Yellow),
            Tone::Content => base.with(Color::White),
            Tone::Stream => base.with(Color::DarkYellow),
            Tone::Role(role) => base.with(match role {
                Role::System => Color::DarkGrey,
                Role::User => Color::Cyan,
                Role::Assistant => Color::Green,
                Role::Function => Color::Yellow,
                Role::Other => Color::White,
            }),
            Tone::FinishReason(reason) => base.with(match reason {
                FinishReason::Stop => Color::Green,
                FinishReason::FunctionCall => Color::Cyan,
                FinishReason::Other => Color::Red,
            }),
            Tone::RequestTitle => base.with(Color::Cyan).bold().underlined(),
            Tone::ResponseTitle(class) => base
                .with(match class {
                    StatusClass::Success => Color::Green,
                    StatusClass::Redirect => Color::Yellow,
                    StatusClass::Failure => Color::Red,
                })
                .bold()
                .underlined(),
            Tone::EventTitle => base.with(Color::Cyan).bold(),
            Tone::StreamComplete => base.with(Color::Blue).bold(),
            Tone::Error => base.with(Color::Red),
        }
    }
}

/// A piece of text and its tone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Text, without escape sequences.
    pub text: String,
    /// How it should be shown.
    pub tone: Tone,
}

/// One display line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledLine {
    segments: Vec<Segment>,
}

impl StyledLine {
    /// Empty line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Line with a single segment.
    pub fn toned(text: impl Into<String>, tone: Tone) -> Self {
        Self::new().push(text, tone)
    }

    /// Line with a single unstyled segment.
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self::toned(text, Tone::Plain)
    }

    /// Append a segment. Empty text is skipped.
    pub fn push(mut self, text: impl Into<String>, tone: Tone) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.segments.push(Segment { text, tone });
        }
        self
    }

    /// Segments in display order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Tone of the first segment carrying `needle`, if any.
    pub fn tone_of(&self, needle: &str) -> Option<Tone> {
        self.segments
            .iter()
            .find(|s| s.text.contains(needle))
            .map(|s| s.tone)
    }

    /// Text without styling.
    pub fn plain(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Text with ANSI styling.
    pub fn ansi(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s.tone {
                Tone::Plain => s.text.clone(),
                tone => tone.style().apply(s.text.as_str()).to_string(),
            })
            .collect()
    }

    /// Styled or plain text.
    pub fn render(&self, color: bool) -> String {
        if color {
            self.ansi()
        } else {
            self.plain()
        }
    }
}
