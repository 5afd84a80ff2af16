//! Platform capability port and the platform factory.
//!
//! A platform implementation answers exactly two questions: is this channel
//! live right now, and if so, where is its stream. Everything site-specific
//! (API endpoints, response parsing, signing) lives behind [`PlatformClient`];
//! the recorder core never sees a wire format.

mod direct;

pub use direct::DirectUrl;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::StreamerConfig;
use crate::error::{EngineError, Result};
use crate::session::HttpSession;

/// Identifier for a specific channel's stream. Doubles as the registry key
/// that deduplicates in-flight captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLocator {
    pub url: String,
}

/// Resolved, directly fetchable stream endpoint.
#[derive(Debug, Clone)]
pub struct StreamSource {
    pub url: String,
    /// Extra headers the transfer must carry (referer, tokens, ...).
    pub headers: HashMap<String, String>,
}

impl StreamSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }
}

/// Live status reported by a platform check.
#[derive(Debug, Clone)]
pub enum LiveStatus {
    Live {
        title: String,
        locator: StreamLocator,
    },
    Offline,
}

impl LiveStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, LiveStatus::Live { .. })
    }
}

/// Per-platform live-status and stream-resolution capability.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Stable key identifying this channel's stream. Known without network
    /// I/O so the duplicate-capture check can run before the status request.
    fn registry_key(&self) -> &str;

    /// Container format this platform's streams arrive in ("ts", "flv", ...).
    fn source_format(&self) -> &str;

    /// Check whether the channel is currently live.
    async fn check_live(&self, session: &HttpSession) -> Result<LiveStatus>;

    /// Resolve a playable stream for a live channel. `None` means the
    /// channel reported live but no playable stream could be obtained.
    async fn resolve_stream(
        &self,
        locator: &StreamLocator,
        session: &HttpSession,
    ) -> Result<Option<StreamSource>>;
}

/// Thread-safe constructor for a platform client.
pub type PlatformConstructor = fn(&StreamerConfig) -> Result<Box<dyn PlatformClient>>;

struct PlatformEntry {
    tag: &'static str,
    constructor: PlatformConstructor,
}

/// Registry mapping platform tags to client constructors.
///
/// Ships with the built-in platforms; callers embedding the engine register
/// their own implementations with [`PlatformFactory::register`].
pub struct PlatformFactory {
    entries: Vec<PlatformEntry>,
}

impl PlatformFactory {
    /// Factory pre-populated with the built-in platforms.
    pub fn builtin() -> Self {
        let mut factory = Self::empty();
        factory.register(direct::TAG, direct::DirectUrl::boxed);
        factory
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a constructor under `tag`. Later registrations win.
    pub fn register(&mut self, tag: &'static str, constructor: PlatformConstructor) {
        self.entries.retain(|entry| entry.tag != tag);
        self.entries.push(PlatformEntry { tag, constructor });
    }

    pub fn create(&self, config: &StreamerConfig) -> Result<Box<dyn PlatformClient>> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.tag.eq_ignore_ascii_case(&config.platform))
            .ok_or_else(|| EngineError::UnsupportedPlatform(config.platform.clone()))?;
        (entry.constructor)(config)
    }
}

impl Default for PlatformFactory {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_factory_resolves_direct() {
        let factory = PlatformFactory::builtin();
        let config = StreamerConfig::new("https://example.com/live.ts", "direct");
        let platform = factory.create(&config).unwrap();
        assert_eq!(platform.registry_key(), "https://example.com/live.ts");
    }

    #[test]
    fn tag_lookup_is_case_insensitive() {
        let factory = PlatformFactory::builtin();
        let config = StreamerConfig::new("https://example.com/live.ts", "Direct");
        assert!(factory.create(&config).is_ok());
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        let factory = PlatformFactory::builtin();
        let config = StreamerConfig::new("x", "nosuchsite");
        assert!(matches!(
            factory.create(&config),
            Err(EngineError::UnsupportedPlatform(_))
        ));
    }
}
