//! Direct-URL platform adapter.
//!
//! The streamer `id` is itself a media URL; the channel counts as live when
//! the URL answers a successful GET. This is the one platform shipped
//! in-tree — site-specific platforms are external collaborators that
//! implement [`PlatformClient`] and register through the factory.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{LiveStatus, PlatformClient, StreamLocator, StreamSource};
use crate::config::StreamerConfig;
use crate::error::{EngineError, Result};
use crate::session::HttpSession;

pub const TAG: &str = "direct";

const DEFAULT_FORMAT: &str = "ts";

pub struct DirectUrl {
    url: String,
    title: String,
    format: String,
}

impl DirectUrl {
    pub fn new(config: &StreamerConfig) -> Result<Self> {
        if !config.id.starts_with("http://") && !config.id.starts_with("https://") {
            return Err(EngineError::Config(format!(
                "direct platform expects a media URL as id, got `{}`",
                config.id
            )));
        }
        Ok(Self {
            url: config.id.clone(),
            title: config.display_name().to_string(),
            format: infer_format(&config.id).to_string(),
        })
    }

    pub(super) fn boxed(config: &StreamerConfig) -> Result<Box<dyn PlatformClient>> {
        Ok(Box::new(Self::new(config)?))
    }
}

/// Container format guessed from the URL path extension.
fn infer_format(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => ext,
        _ => DEFAULT_FORMAT,
    }
}

#[async_trait]
impl PlatformClient for DirectUrl {
    fn registry_key(&self) -> &str {
        &self.url
    }

    fn source_format(&self) -> &str {
        &self.format
    }

    async fn check_live(&self, session: &HttpSession) -> Result<LiveStatus> {
        let response = session.get(&self.url).await?;
        if response.status().is_success() {
            Ok(LiveStatus::Live {
                title: self.title.clone(),
                locator: StreamLocator {
                    url: self.url.clone(),
                },
            })
        } else {
            Ok(LiveStatus::Offline)
        }
    }

    async fn resolve_stream(
        &self,
        locator: &StreamLocator,
        _session: &HttpSession,
    ) -> Result<Option<StreamSource>> {
        Ok(Some(StreamSource {
            url: locator.url.clone(),
            headers: HashMap::new(),
        }))
    }
}
