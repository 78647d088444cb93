//! Server configuration: the shared `[processing]` table plus `[server]`

use anyhow::{Context, Result};
use serde::Deserialize;
use sheetlink_core::ProcessingConfig;
use std::net::SocketAddr;
use std::path::Path;

/// Environment variable naming the TOML config file
pub const CONFIG_ENV: &str = "SHEETLINK_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl WebConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: WebConfig = toml::from_str(content)?;
        config.processing.validate()?;
        config.bind_address()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Config from `SHEETLINK_CONFIG`, or defaults when it is unset
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Configuration error: invalid bind address '{}'", self.server.bind))
    }
}
