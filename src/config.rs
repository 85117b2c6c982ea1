//! Run configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::Schedule;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Member directory endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL of the directory service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// `lang` query parameter sent with every request
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Size suffix appended to photo token URLs
    #[serde(default = "default_photo_size")]
    pub photo_size: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            lang: default_lang(),
            timeout_secs: default_timeout_secs(),
            photo_size: default_photo_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    /// One person at a time, with progress after each
    #[default]
    Sequential,
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub mode: EnrichmentMode,

    /// People in flight at once in concurrent mode
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            mode: EnrichmentMode::default(),
            concurrency: default_concurrency(),
        }
    }
}

impl EnrichmentConfig {
    pub fn schedule(&self) -> Schedule {
        match self.mode {
            EnrichmentMode::Sequential => Schedule::Sequential,
            EnrichmentMode::Concurrent => Schedule::Concurrent {
                limit: self.concurrency.max(1),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Indent the exported JSON
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pretty: default_true(),
        }
    }
}

// Defaults
fn default_base_url() -> String { "https://lcr.churchofjesuschrist.org".to_string() }
fn default_lang() -> String { "eng".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_photo_size() -> String { "MEDIUM".to_string() }
fn default_concurrency() -> usize { 8 }
fn default_true() -> bool { true }

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
