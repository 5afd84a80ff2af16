use std::path::Path;

use anyhow::{Context, bail};
use serde::Deserialize;

use livrec_engine::StreamerConfig;

/// Top-level configuration file: the list of streamers to track.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub streamers: Vec<StreamerConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file `{}`", path.display()))?;
        let config: AppConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file `{}`", path.display()))?;

        if config.streamers.is_empty() {
            bail!("no streamers configured in `{}`", path.display());
        }
        for streamer in &config.streamers {
            streamer.validate()?;
        }

        Ok(config)
    }
}
