//! Collapse patterns: request paths whose transcript detail is suppressed.
//!
//! A pattern is either an exact path (`/v1/models`) or a prefix ending in a
//! `*` wildcard (`/users/*`). Prefixes only match at a path-segment boundary,
//! so `/users/*` covers `/users/42` but neither `/users` nor `/userspage`.
//! The query string is ignored when matching.
//!
//! Collapsing only affects what the transcript shows. Forwarding is
//! identical for collapsed and non-collapsed paths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wildcard marker terminating a prefix pattern.
const WILDCARD: char = '*';

/// Built-in patterns used when no configuration is available.
pub const DEFAULT_COLLAPSED_PATTERNS: &[&str] = &["/users/*"];

/// A single collapse pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollapsePattern {
    /// Matches only this path.
    Exact(String),
    /// Matches paths under this literal prefix (wildcard stripped).
    Prefix(String),
}

impl CollapsePattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        match pattern.strip_suffix(WILDCARD) {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    /// Whether `path` (without query) matches.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(prefix) => {
                let Some(rest) = path.strip_prefix(prefix.as_str()) else {
                    return false;
                };
                if prefix.ends_with('/') {
                    !rest.is_empty()
                } else {
                    rest.is_empty() || rest.starts_with('/')
                }
            },
        }
    }
}

impl fmt::Display for CollapsePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Prefix(prefix) => write!(f, "{prefix}{WILDCARD}"),
        }
    }
}

/// The active pattern set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CollapsePatterns {
    patterns: Vec<CollapsePattern>,
}

impl Default for CollapsePatterns {
    fn default() -> Self {
        DEFAULT_COLLAPSED_PATTERNS.iter().copied().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for CollapsePatterns {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            patterns: iter
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty())
                .map(|p| CollapsePattern::parse(&p))
                .collect(),
        }
    }
}

impl From<Vec<String>> for CollapsePatterns {
    fn from(patterns: Vec<String>) -> Self {
        patterns.into_iter().collect()
    }
}

impl From<CollapsePatterns> for Vec<String> {
    fn from(patterns: CollapsePatterns) -> Self {
        patterns.patterns.iter().map(ToString::to_string).collect()
    }
}

impl CollapsePatterns {
    /// An empty set; nothing is collapsed.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Whether transcript detail for `path` should be suppressed.
    ///
    /// `path` may carry a query string; it is ignored.
    pub fn should_collapse(&self, path: &str) -> bool {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// The pattern that collapses `path`, if any.
    pub fn matching(&self, path: &str) -> Option<&CollapsePattern> {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        self.patterns.iter().find(|p| p.matches(path))
    }

    /// Patterns in configuration order.
    pub fn patterns(&self) -> &[CollapsePattern] {
        &self.patterns
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
