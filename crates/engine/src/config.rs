//! Per-streamer configuration.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{EngineError, Result};

pub const DEFAULT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = "Chrome";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_headers() -> HashMap<String, String> {
    HashMap::from([("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string())])
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

/// Immutable configuration for one tracked streamer.
///
/// Built once at startup (typically deserialized from the config file) and
/// shared read-only between the recorder, its HTTP session and the capture
/// orchestrator.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamerConfig {
    /// Channel identifier. Platform-specific; for the built-in `direct`
    /// platform this is the media URL itself.
    pub id: String,
    /// Platform tag resolved through the platform factory.
    pub platform: String,
    /// Display name; falls back to `id`.
    #[serde(default)]
    pub name: Option<String>,
    /// Poll interval in seconds. Must be greater than zero.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Headers sent on every detection request.
    #[serde(default = "default_headers")]
    pub headers: HashMap<String, String>,
    /// Browser-style cookie string, e.g. `"sessionid=abc; token=xyz"`.
    #[serde(default)]
    pub cookies: Option<String>,
    /// Target container format. When set and different from the source
    /// format, the finished capture is transcoded.
    #[serde(default)]
    pub format: Option<String>,
    /// Proxy URL (`http://`, `https://` or `socks5://`).
    #[serde(default)]
    pub proxy: Option<String>,
    /// Directory capture files are written to.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl StreamerConfig {
    /// Config with defaults for everything but the identity fields.
    pub fn new(id: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            platform: platform.into(),
            name: None,
            interval: default_interval(),
            headers: default_headers(),
            cookies: None,
            format: None,
            proxy: None,
            output: default_output(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// `[platform][name]` prefix used in derived filenames.
    pub fn flag(&self) -> String {
        format!("[{}][{}]", self.platform, self.display_name())
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(EngineError::Config(format!(
                "interval must be greater than zero for `{}`",
                self.id
            )));
        }
        Ok(())
    }

    /// Cookie string parsed into a name → value map.
    pub fn parsed_cookies(&self) -> HashMap<String, String> {
        self.cookies
            .as_deref()
            .map(parse_cookie_string)
            .unwrap_or_default()
    }
}

/// Parse a browser-style cookie string (`"name1=value1; name2=value2"`).
///
/// Accepts `;` and newline separators, trims whitespace and skips fragments
/// without both a name and a value.
pub fn parse_cookie_string(raw: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for part in raw.split(&[';', '\n'][..]).map(str::trim) {
        if part.is_empty() {
            continue;
        }
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        cookies.insert(name.to_owned(), value.to_owned());
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_minimal_json() {
        let config: StreamerConfig =
            serde_json::from_str(r#"{"id": "x", "platform": "p"}"#).unwrap();
        assert_eq!(config.interval, 10);
        assert_eq!(
            config.headers.get("User-Agent").map(String::as_str),
            Some("Chrome")
        );
        assert_eq!(config.output, PathBuf::from("output"));
        assert_eq!(config.display_name(), "x");
        assert_eq!(config.flag(), "[p][x]");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn name_overrides_display_name() {
        let mut config = StreamerConfig::new("x", "p");
        config.name = Some("Streamer".to_string());
        assert_eq!(config.display_name(), "Streamer");
        assert_eq!(config.flag(), "[p][Streamer]");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = StreamerConfig::new("x", "p");
        config.interval = 0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn cookie_string_parsing() {
        let cookies = parse_cookie_string("sessionid=abc123; csrftoken=def456; theme=dark");
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies.get("sessionid").map(String::as_str), Some("abc123"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn cookie_string_skips_malformed_fragments() {
        let cookies = parse_cookie_string("valid=1; ; novalue=; =noname; bare");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies.get("valid").map(String::as_str), Some("1"));
    }

    #[test]
    fn no_cookies_means_empty_map() {
        let config = StreamerConfig::new("x", "p");
        assert!(config.parsed_cookies().is_empty());
    }
}
