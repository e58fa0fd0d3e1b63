//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config file (`~/.config/chatlens/config.toml` by default)
//! - Environment variables
//! - CLI arguments (applied by the binary)
//!
//! Every field has a default, so a partial file is valid. A missing file is
//! not an error; an unreadable or malformed one falls back to the defaults
//! with a warning.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::DEFAULT_STREAMING_CONTENT_TYPES;
use crate::collapse::CollapsePatterns;
use crate::error::{DebuggerError, Result};
use crate::proxy;
use crate::render::headers::{
    default_mask_rules, DEFAULT_IMPORTANT_HEADERS, DEFAULT_IMPORTANT_PREFIXES,
};
use crate::render::{HeaderMaskRule, HeaderMasker};
use crate::transcript::DEFAULT_CAPACITY;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Listener and upstream settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Header display rules
    #[serde(default)]
    pub headers: HeadersConfig,

    /// Response classification
    #[serde(default)]
    pub content: ContentConfig,

    /// Transcript collapsing
    #[serde(default)]
    pub responses: ResponsesConfig,

    /// Transcript retention
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatlens").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DebuggerError::ConfigLoad(format!("Failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&content).map_err(|e| {
            DebuggerError::ConfigLoad(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Load configuration, falling back to defaults when the file is
    /// missing or broken.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            debug!("No config directory; using defaults");
            return Self::default();
        };

        if !path.exists() {
            debug!("No config file at {}; using defaults", path.display());
            return Self::default();
        }

        match Self::from_file(&path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            },
        }
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = lookup("CHATLENS_PORT").or_else(|| lookup("PORT")) {
            match port.parse() {
                Ok(port) => self.proxy.port = port,
                Err(_) => warn!("Ignoring invalid port override: {}", port),
            }
        }
        if let Some(host) = lookup("CHATLENS_HOST") {
            self.proxy.host = host;
        }
        if let Some(upstream) = lookup("CHATLENS_UPSTREAM") {
            self.proxy.upstream = upstream;
        }
        self
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DebuggerError::ConfigLoad(e.to_string()))
    }

    /// Build the proxy server configuration
    pub fn proxy_config(&self) -> proxy::ProxyConfig {
        proxy::ProxyConfig {
            listen_addr: self.proxy.listen_addr(),
            upstream_url: self.proxy.upstream.clone(),
            connect_timeout_secs: self.proxy.connect_timeout_secs,
            max_body_size: self.proxy.max_body_size,
            history: self.history.max_entries,
            streaming_content_types: self.content.streaming_content_types.clone(),
            header_masker: self.headers.masker(),
            collapsed: self.responses.collapsed_patterns.clone(),
        }
    }
}

/// Listener and upstream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Upstream API base URL (e.g., https://api.openai.com)
    pub upstream: String,

    /// Upstream connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
            upstream: "https://api.openai.com".to_string(),
            connect_timeout_secs: 30,
            max_body_size: 32 * 1024 * 1024, // 32 MB
        }
    }
}

impl ProxyConfig {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Header display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// Prefixes of emphasised headers
    pub important_prefixes: Vec<String>,

    /// Individually emphasised headers
    pub important: Vec<String>,

    /// Masking rules
    pub masked: Vec<HeaderMaskRule>,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            important_prefixes: DEFAULT_IMPORTANT_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            important: DEFAULT_IMPORTANT_HEADERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            masked: default_mask_rules(),
        }
    }
}

impl HeadersConfig {
    /// Build the display masker
    pub fn masker(&self) -> HeaderMasker {
        HeaderMasker::new(
            self.masked.iter().cloned(),
            self.important.iter().cloned(),
            self.important_prefixes.iter().cloned(),
        )
    }
}

/// Response classification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Content types relayed incrementally when chunked
    pub streaming_content_types: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            streaming_content_types: DEFAULT_STREAMING_CONTENT_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Transcript collapsing configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsesConfig {
    /// Paths whose transcript detail is suppressed
    pub collapsed_patterns: CollapsePatterns,
}

/// Transcript retention configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Entries kept in memory
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MaskBehavior;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.proxy.port, 8090);
        assert_eq!(config.proxy.upstream, "https://api.openai.com");
        assert_eq!(config.history.max_entries, 200);
        assert!(config.responses.collapsed_patterns.should_collapse("/users/1"));
        assert_eq!(config.headers.masked.len(), 5);
    }

    #[test]
    fn test_proxy_listen_addr() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_addr(), "127.0.0.1:8090");
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [proxy]
            upstream = "https://openrouter.ai/api"
            port = 9090

            [headers]
            important_prefixes = ["x-tenant-"]
            masked = [{ name = "x-secret", mask = "redact" }]

            [responses]
            collapsed_patterns = ["/v1/models", "/files/*"]

            [history]
            max_entries = 50
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.proxy.upstream, "https://openrouter.ai/api");
        assert_eq!(config.proxy.port, 9090);
        assert_eq!(config.proxy.host, "127.0.0.1");
        assert_eq!(config.headers.important, vec!["authorization", "content-type"]);
        assert_eq!(config.headers.masked[0].mask, MaskBehavior::Redact);
        assert!(config.responses.collapsed_patterns.should_collapse("/files/a"));
        assert!(!config.responses.collapsed_patterns.should_collapse("/users/1"));
        assert_eq!(config.history.max_entries, 50);

        let masker = config.headers.masker();
        assert!(masker.is_important("X-Tenant-Id"));
        assert_eq!(masker.display_value("x-secret", "abc"), "****");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().join("absent.toml").as_path()));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_malformed_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[proxy\nport = \"nope\"").unwrap();

        assert!(matches!(
            Config::from_file(file.path()),
            Err(DebuggerError::ConfigLoad(_))
        ));
        assert_eq!(Config::load(Some(file.path())), Config::default());
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[responses]\ncollapsed_patterns = []").unwrap();

        let config = Config::load(Some(file.path()));
        assert!(config.responses.collapsed_patterns.is_empty());
        assert_eq!(config.proxy.port, 8090);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "7000"),
            ("CHATLENS_HOST", "0.0.0.0"),
            ("CHATLENS_UPSTREAM", "http://localhost:11434"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .with_overrides_from(|key| vars.get(key).map(|v| (*v).to_string()));
        assert_eq!(config.proxy.listen_addr(), "0.0.0.0:7000");
        assert_eq!(config.proxy.upstream, "http://localhost:11434");
    }

    #[test]
    fn test_chatlens_port_wins_and_bad_port_is_ignored() {
        let config = Config::default().with_overrides_from(|key| match key {
            "CHATLENS_PORT" => Some("9100".to_string()),
            "PORT" => Some("7000".to_string()),
            _ => None,
        });
        assert_eq!(config.proxy.port, 9100);

        let config = Config::default()
            .with_overrides_from(|key| (key == "PORT").then(|| "many".to_string()));
        assert_eq!(config.proxy.port, 8090);
    }

    #[test]
    fn test_to_toml_reparses() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("collapsed_patterns"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_proxy_config_conversion() {
        let mut config = Config::default();
        config.proxy.port = 9999;
        config.history.max_entries = 10;

        let server = config.proxy_config();
        assert_eq!(server.listen_addr, "127.0.0.1:9999");
        assert_eq!(server.history, 10);
        assert_eq!(server.streaming_content_types.len(), 2);
    }
}
