//! Processing limits loaded from a TOML file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetlinkConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl SheetlinkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SheetlinkConfig = toml::from_str(content)?;
        config.processing.validate()?;
        Ok(config)
    }
}

/// Limits applied while reading uploads and writing links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Largest accepted upload in MiB
    pub max_file_size_mb: usize,
    /// Largest total size in MiB the parts of an upload may unpack to
    pub max_decompressed_size_mb: usize,
    /// Rows scanned when looking for a header
    pub max_header_search_rows: usize,
    /// Longest URL a merge will write
    pub max_url_length: usize,
    /// Sliding expiry of cached templates
    pub template_cache_ttl_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            max_decompressed_size_mb: 160,
            max_header_search_rows: 10,
            max_url_length: 2000,
            template_cache_ttl_secs: 2 * 60 * 60,
        }
    }
}

impl ProcessingConfig {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * BYTES_PER_MB
    }

    pub fn max_decompressed_size_bytes(&self) -> usize {
        self.max_decompressed_size_mb * BYTES_PER_MB
    }

    pub fn template_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.template_cache_ttl_secs)
    }

    /// Check every limit against its allowed range
    pub fn validate(&self) -> Result<()> {
        check_range("max_file_size_mb", self.max_file_size_mb, 1, 100)?;
        check_range(
            "max_decompressed_size_mb",
            self.max_decompressed_size_mb,
            self.max_file_size_mb,
            2048,
        )?;
        check_range("max_header_search_rows", self.max_header_search_rows, 1, 50)?;
        check_range("max_url_length", self.max_url_length, 100, 10_000)?;
        if self.template_cache_ttl_secs == 0 {
            anyhow::bail!("Configuration error: template_cache_ttl_secs must be at least 1");
        }
        Ok(())
    }
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if !(min..=max).contains(&value) {
        anyhow::bail!(
            "Configuration error: {} must be between {} and {} (got {})",
            name,
            min,
            max,
            value
        );
    }
    Ok(())
}
