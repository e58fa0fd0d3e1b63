//! Chat-completion aware JSON highlighting.
//!
//! The document is pretty-printed with two-space indentation and each line
//! is matched against a small set of field patterns:
//!
//! | Line                         | Value tone                         |
//! |------------------------------|------------------------------------|
//! | `{` `}` `[` `]` (+ comma)    | dim                                |
//! | `"role": "<r>"`              | [`Role`] taxonomy                  |
//! | `"model"` / `"name"` / `"content"` string | fixed per field       |
//! | `"stream": true\|false`      | fixed                              |
//! | `"finish_reason": "<r>"`     | [`FinishReason`], responses only   |
//!
//! Anything else is dim. Highlighting only adds tones; the concatenated
//! plain text is exactly the pretty-printed document.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::{StyledLine, Tone};

lazy_static! {
    static ref DELIMITER: Regex = Regex::new(r"^[{}\[\]],?$").unwrap();
    static ref ROLE: Regex = Regex::new(r#"^("role":\s*)("([^"]+)")(,?)$"#).unwrap();
    static ref STRING_FIELD: Regex =
        Regex::new(r#"^("(model|name|content)":\s*)(".*")(,?)$"#).unwrap();
    static ref STREAM: Regex = Regex::new(r#"^("stream":\s*)(true|false)(,?)$"#).unwrap();
    static ref FINISH_REASON: Regex =
        Regex::new(r#"^("finish_reason":\s*)("([^"]+)")(,?)$"#).unwrap();
}

/// Chat message roles with a dedicated color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// `system`
    System,
    /// `user`
    User,
    /// `assistant`
    Assistant,
    /// `function`
    Function,
    /// Any other role.
    Other,
}

impl Role {
    /// Map a role string onto the taxonomy.
    pub fn from_value(role: &str) -> Self {
        match role {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "function" => Self::Function,
            _ => Self::Other,
        }
    }
}

/// Finish reasons with a dedicated color; anything else is a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// `stop`
    Stop,
    /// `function_call`
    FunctionCall,
    /// Any other reason (`length`, `content_filter`, ...).
    Other,
}

impl FinishReason {
    /// Map a finish reason string onto the taxonomy.
    pub fn from_value(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "function_call" => Self::FunctionCall,
            _ => Self::Other,
        }
    }
}

/// Which side of the exchange a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonContext {
    /// Request body.
    Request,
    /// Response body or stream event.
    Response,
}

/// Renders JSON documents as styled lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHighlighter;

impl JsonHighlighter {
    /// Create a highlighter.
    pub fn new() -> Self {
        Self
    }

    /// Highlight a parsed document.
    pub fn highlight(&self, value: &Value, context: JsonContext) -> Vec<StyledLine> {
        let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        pretty
            .lines()
            .map(|line| self.highlight_line(line, context))
            .collect()
    }

    /// Parse and highlight; `None` when `text` is not JSON.
    pub fn highlight_str(&self, text: &str, context: JsonContext) -> Option<Vec<StyledLine>> {
        serde_json::from_str::<Value>(text)
            .ok()
            .map(|value| self.highlight(&value, context))
    }

    fn highlight_line(&self, line: &str, context: JsonContext) -> StyledLine {
        let trimmed = line.trim_start();
        let indent = &line[..line.len() - trimmed.len()];
        let out = StyledLine::new().push(indent, Tone::Plain);

        if DELIMITER.is_match(trimmed) {
            return out.push(trimmed, Tone::Dim);
        }

        if let Some(caps) = ROLE.captures(trimmed) {
            let role = Role::from_value(&caps[3]);
            return out
                .push(&caps[1], Tone::Dim)
                .push(&caps[2], Tone::Role(role))
                .push(&caps[4], Tone::Plain);
        }

        if let Some(caps) = STRING_FIELD.captures(trimmed) {
            let tone = match &caps[2] {
                "model" => Tone::Model,
                "name" => Tone::Name,
                _ => Tone::Content,
            };
            return out
                .push(&caps[1], Tone::Dim)
                .push(&caps[3], tone)
                .push(&caps[4], Tone::Plain);
        }

        if let Some(caps) = STREAM.captures(trimmed) {
            return out
                .push(&caps[1], Tone::Dim)
                .push(&caps[2], Tone::Stream)
                .push(&caps[3], Tone::Plain);
        }

        if context == JsonContext::Response {
            if let Some(caps) = FINISH_REASON.captures(trimmed) {
                let reason = FinishReason::from_value(&caps[3]);
                return out
                    .push(&caps[1], Tone::Dim)
                    .push(&caps[2], Tone::FinishReason(reason))
                    .push(&caps[4], Tone::Plain);
            }
        }

        out.push(trimmed, Tone::Dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line_with<'a>(lines: &'a [StyledLine], needle: &str) -> &'a StyledLine {
        lines
            .iter()
            .find(|l| l.plain().contains(needle))
            .unwrap_or_else(|| panic!("no line containing {needle}"))
    }

    #[test]
    fn test_plain_text_is_pretty_json() {
        let value = json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "Hello"}],
            "stream": true
        });
        let lines = JsonHighlighter::new().highlight(&value, JsonContext::Request);

        let plain: Vec<String> = lines.iter().map(StyledLine::plain).collect();
        assert_eq!(plain.join("\n"), serde_json::to_string_pretty(&value).unwrap());
    }

    #[test]
    fn test_key_order_is_preserved() {
        let lines = JsonHighlighter::new()
            .highlight_str(r#"{"zeta":1,"alpha":2}"#, JsonContext::Request)
            .unwrap();
        assert!(lines[1].plain().contains("zeta"));
        assert!(lines[2].plain().contains("alpha"));
    }

    #[test]
    fn test_request_fields() {
        let value = json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "Be brief"},
                {"role": "user", "content": "Hi", "name": "alice"},
                {"role": "assistant", "content": "Hello"},
                {"role": "function", "content": "{}"},
                {"role": "tool", "content": "x"}
            ],
            "stream": false
        });
        let lines = JsonHighlighter::new().highlight(&value, JsonContext::Request);

        assert_eq!(line_with(&lines, "gpt-4o").tone_of("gpt-4o"), Some(Tone::Model));
        assert_eq!(
            line_with(&lines, "\"system\"").tone_of("\"system\""),
            Some(Tone::Role(Role::System))
        );
        assert_eq!(
            line_with(&lines, "\"user\"").tone_of("\"user\""),
            Some(Tone::Role(Role::User))
        );
        assert_eq!(
            line_with(&lines, "\"assistant\"").tone_of("\"assistant\""),
            Some(Tone::Role(Role::Assistant))
        );
        assert_eq!(
            line_with(&lines, "\"function\"").tone_of("\"function\""),
            Some(Tone::Role(Role::Function))
        );
        assert_eq!(
            line_with(&lines, "\"tool\"").tone_of("\"tool\""),
            Some(Tone::Role(Role::Other))
        );
        assert_eq!(line_with(&lines, "alice").tone_of("alice"), Some(Tone::Name));
        assert_eq!(line_with(&lines, "Be brief").tone_of("Be brief"), Some(Tone::Content));
        assert_eq!(line_with(&lines, "\"stream\"").tone_of("false"), Some(Tone::Stream));
    }

    #[test]
    fn test_delimiters_and_keys_are_dim() {
        let lines = JsonHighlighter::new()
            .highlight_str(r#"{"messages":[{"role":"user"}]}"#, JsonContext::Request)
            .unwrap();

        assert_eq!(lines[0].tone_of("{"), Some(Tone::Dim));
        assert_eq!(line_with(&lines, "\"role\"").tone_of("\"role\""), Some(Tone::Dim));
        assert_eq!(lines.last().unwrap().tone_of("}"), Some(Tone::Dim));
    }

    #[test]
    fn test_finish_reason_only_in_responses() {
        let value = json!({"choices": [{"finish_reason": "stop"}]});
        let highlighter = JsonHighlighter::new();

        let response = highlighter.highlight(&value, JsonContext::Response);
        assert_eq!(
            line_with(&response, "finish_reason").tone_of("\"stop\""),
            Some(Tone::FinishReason(FinishReason::Stop))
        );

        let request = highlighter.highlight(&value, JsonContext::Request);
        assert_eq!(line_with(&request, "finish_reason").tone_of("\"stop\""), Some(Tone::Dim));
    }

    #[test]
    fn test_finish_reason_taxonomy() {
        let highlighter = JsonHighlighter::new();
        for (reason, expected) in [
            ("stop", FinishReason::Stop),
            ("function_call", FinishReason::FunctionCall),
            ("length", FinishReason::Other),
        ] {
            let lines = highlighter.highlight(&json!({ "finish_reason": reason }), JsonContext::Response);
            assert_eq!(
                lines[1].tone_of(reason),
                Some(Tone::FinishReason(expected)),
                "finish_reason {reason}"
            );
        }
    }

    #[test]
    fn test_non_string_content_is_dim() {
        let lines = JsonHighlighter::new()
            .highlight_str(r#"{"content":null}"#, JsonContext::Response)
            .unwrap();
        assert_eq!(lines[1].tone_of("null"), Some(Tone::Dim));
    }

    #[test]
    fn test_trailing_comma_stays_plain() {
        let lines = JsonHighlighter::new()
            .highlight_str(r#"{"model":"m","stream":true}"#, JsonContext::Request)
            .unwrap();
        let model = &lines[1];
        assert_eq!(model.tone_of("\"m\""), Some(Tone::Model));
        assert_eq!(model.segments().last().unwrap().text, ",");
        assert_eq!(model.segments().last().unwrap().tone, Tone::Plain);
    }

    #[test]
    fn test_deterministic() {
        let value = json!({"model": "m", "messages": [{"role": "user", "content": "x"}]});
        let highlighter = JsonHighlighter::new();
        assert_eq!(
            highlighter.highlight(&value, JsonContext::Request),
            highlighter.highlight(&value, JsonContext::Request)
        );
    }

    #[test]
    fn test_not_json() {
        assert!(JsonHighlighter::new()
            .highlight_str("plain text", JsonContext::Request)
            .is_none());
    }
}
