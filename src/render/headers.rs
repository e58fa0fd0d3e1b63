//! Header display rules: secret masking and emphasis.
//!
//! Masking is applied to the rendered copy of a header only. The
//! [`HeaderMap`] handed to the upstream client is never touched.

use http::HeaderMap;
use serde::{Deserialize, Serialize};

use super::{StyledLine, Tone};

/// Prefixes of headers emphasised in the transcript.
pub const DEFAULT_IMPORTANT_PREFIXES: &[&str] = &["x-user-", "x-channel-", "x-app-", "x-api-"];

/// Individual headers emphasised in the transcript.
pub const DEFAULT_IMPORTANT_HEADERS: &[&str] = &["authorization", "content-type"];

/// Shown in place of a hidden secret.
const MASK: &str = "****";

/// Number of trailing characters revealed by [`mask_token`].
const REVEALED: usize = 4;

/// How a masked header is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskBehavior {
    /// Replace the whole value.
    Redact,
    /// Keep the auth scheme and the last four characters of the secret.
    RevealLast4,
}

/// Masking rule for one header name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMaskRule {
    /// Header name, matched case-insensitively.
    pub name: String,
    /// Display behavior.
    pub mask: MaskBehavior,
}

impl HeaderMaskRule {
    /// Create a rule.
    pub fn new(name: impl Into<String>, mask: MaskBehavior) -> Self {
        Self {
            name: name.into(),
            mask,
        }
    }
}

/// Rules installed when the configuration names none.
pub fn default_mask_rules() -> Vec<HeaderMaskRule> {
    vec![
        HeaderMaskRule::new("authorization", MaskBehavior::RevealLast4),
        HeaderMaskRule::new("x-user-auth", MaskBehavior::RevealLast4),
        HeaderMaskRule::new("proxy-authorization", MaskBehavior::RevealLast4),
        HeaderMaskRule::new("cookie", MaskBehavior::Redact),
        HeaderMaskRule::new("set-cookie", MaskBehavior::Redact),
    ]
}

/// Hide all but the last four characters of a secret.
///
/// Secrets of four characters or fewer are hidden entirely. This departs
/// from the reveal-last-4 rule on purpose: showing the last four characters
/// of a four-character secret would show all of it.
///
/// ```
/// assert_eq!(chatlens::render::mask_token("sk-abcdef123456"), "****3456");
/// assert_eq!(chatlens::render::mask_token("abcd"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= REVEALED {
        return MASK.to_string();
    }
    let tail: String = token.chars().skip(count - REVEALED).collect();
    format!("{MASK}{tail}")
}

/// Applies masking and emphasis to headers for display.
#[derive(Debug, Clone)]
pub struct HeaderMasker {
    rules: Vec<HeaderMaskRule>,
    important: Vec<String>,
    important_prefixes: Vec<String>,
}

impl Default for HeaderMasker {
    fn default() -> Self {
        Self::new(
            default_mask_rules(),
            DEFAULT_IMPORTANT_HEADERS.iter().map(ToString::to_string),
            DEFAULT_IMPORTANT_PREFIXES.iter().map(ToString::to_string),
        )
    }
}

impl HeaderMasker {
    /// Create a masker. Names and prefixes are matched case-insensitively.
    pub fn new(
        rules: impl IntoIterator<Item = HeaderMaskRule>,
        important: impl IntoIterator<Item = String>,
        important_prefixes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| HeaderMaskRule::new(rule.name.to_ascii_lowercase(), rule.mask))
                .collect(),
            important: important
                .into_iter()
                .map(|name| name.to_ascii_lowercase())
                .collect(),
            important_prefixes: important_prefixes
                .into_iter()
                .map(|prefix| prefix.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Masking behavior for `name`, if any rule covers it.
    pub fn rule_for(&self, name: &str) -> Option<MaskBehavior> {
        self.rules
            .iter()
            .find(|rule| rule.name.eq_ignore_ascii_case(name))
            .map(|rule| rule.mask)
    }

    /// Value of `name` as it should appear in the transcript.
    pub fn display_value(&self, name: &str, value: &str) -> String {
        match self.rule_for(name) {
            None => value.to_string(),
            Some(MaskBehavior::Redact) => MASK.to_string(),
            Some(MaskBehavior::RevealLast4) => match value.trim().split_once(char::is_whitespace) {
                Some((scheme, secret)) => format!("{scheme} {}", mask_token(secret.trim_start())),
                None => mask_token(value.trim()),
            },
        }
    }

    /// Whether `name` is emphasised.
    pub fn is_important(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.important.iter().any(|n| *n == name)
            || self
                .important_prefixes
                .iter()
                .any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// One line per header name, repeated values joined with `", "`.
    pub fn render(&self, headers: &HeaderMap) -> Vec<StyledLine> {
        headers
            .keys()
            .map(|name| {
                let joined = headers
                    .get_all(name)
                    .iter()
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                    .collect::<Vec<_>>()
                    .join(", ");
                let text = format!("{}: {}", name, self.display_value(name.as_str(), &joined));
                let tone = if self.is_important(name.as_str()) {
                    Tone::Emphasis
                } else {
                    Tone::Plain
                };
                StyledLine::new().push("  ", Tone::Plain).push(text, tone)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("sk-abcdef123456"), "****3456");
        assert_eq!(mask_token("12345"), "****2345");
        assert_eq!(mask_token("1234"), "****");
        assert_eq!(mask_token(""), "****");
        assert_eq!(mask_token("ключ-секрет"), "****крет");
    }

    #[test]
    fn test_scheme_is_preserved() {
        let masker = HeaderMasker::default();
        assert_eq!(
            masker.display_value("Authorization", "Bearer sk-abcdef123456"),
            "Bearer ****3456"
        );
        assert_eq!(masker.display_value("x-user-auth", "tok_998877"), "****8877");
    }

    #[test]
    fn test_redact_hides_everything() {
        let masker = HeaderMasker::default();
        assert_eq!(masker.display_value("cookie", "session=abc123; theme=dark"), "****");
    }

    #[test]
    fn test_unmasked_header_is_unchanged() {
        let masker = HeaderMasker::default();
        assert_eq!(
            masker.display_value("content-type", "application/json"),
            "application/json"
        );
    }

    #[test]
    fn test_important_headers() {
        let masker = HeaderMasker::default();
        assert!(masker.is_important("Authorization"));
        assert!(masker.is_important("X-User-Id"));
        assert!(masker.is_important("x-api-version"));
        assert!(!masker.is_important("accept"));
        assert!(!masker.is_important("x-request-id"));
    }

    #[test]
    fn test_render_masks_and_emphasises() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-abcdef123456"));
        headers.insert("accept", HeaderValue::from_static("*/*"));
        headers.append("x-app-tag", HeaderValue::from_static("a"));
        headers.append("x-app-tag", HeaderValue::from_static("b"));

        let lines = HeaderMasker::default().render(&headers);
        let plain: Vec<String> = lines.iter().map(StyledLine::plain).collect();

        assert!(plain.contains(&"  authorization: Bearer ****3456".to_string()));
        assert!(plain.contains(&"  accept: */*".to_string()));
        assert!(plain.contains(&"  x-app-tag: a, b".to_string()));

        let auth = lines.iter().find(|l| l.plain().contains("authorization")).unwrap();
        assert_eq!(auth.tone_of("authorization"), Some(Tone::Emphasis));
        let accept = lines.iter().find(|l| l.plain().contains("accept")).unwrap();
        assert_eq!(accept.tone_of("accept"), Some(Tone::Plain));
    }

    #[test]
    fn test_forwarded_headers_are_untouched() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-abcdef123456"));

        let _ = HeaderMasker::default().render(&headers);
        assert_eq!(headers["authorization"], "Bearer sk-abcdef123456");
    }

    #[test]
    fn test_rule_config_names() {
        let rule: HeaderMaskRule =
            toml::from_str("name = \"Authorization\"\nmask = \"reveal_last4\"").unwrap();
        assert_eq!(rule.mask, MaskBehavior::RevealLast4);

        let masker = HeaderMasker::new([rule], Vec::new(), Vec::new());
        assert_eq!(masker.rule_for("authorization"), Some(MaskBehavior::RevealLast4));
        assert_eq!(masker.rule_for("cookie"), None);
    }
}
