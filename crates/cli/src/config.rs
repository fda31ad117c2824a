//! The JSON configuration file.

use std::path::Path;

use anyhow::{Context, Result};
use api_client::ClientConfig;
use pipeline::RunOptions;
use serde::Deserialize;
use taiga::{TaigaConnection, TaigaScopeConfig};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CliConfig {
    pub connection: TaigaConnection,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub options: RawRunOptions,
    /// Projects `run` processes when `--projects` is not given.
    #[serde(default)]
    pub projects: Vec<u64>,
    #[serde(default)]
    pub scope_config: TaigaScopeConfig,
}

/// Run options as written in the file; validated by [`RawRunOptions::validate`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawRunOptions {
    pub page_size: Option<u32>,
    pub incremental: Option<bool>,
    pub force_full_resync: Option<bool>,
    pub entities: Option<Vec<String>>,
}

impl RawRunOptions {
    pub fn validate(&self, force_full_resync: bool) -> Result<RunOptions> {
        let force = force_full_resync || self.force_full_resync.unwrap_or(false);
        let options = RunOptions::new(
            self.page_size,
            self.incremental,
            Some(force),
            self.entities.clone(),
        )?;
        Ok(options)
    }
}

impl CliConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::parse(&bytes).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(bytes)?;
        if config.connection.id.as_u64() == 0 {
            anyhow::bail!("connection.id must be non-zero");
        }
        Ok(config)
    }
}
