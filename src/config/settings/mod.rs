
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::DEFAULT_EMBEDDING_DIMENSION;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub ingest: IngestProfile,
    #[serde(default)]
    pub kb_api: KbApiConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: u32,
    pub api_key_env: String,
}

/// Fixed metadata stamped onto every record of an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestProfile {
    pub atoms_file: PathBuf,
    pub atom_type: String,
    pub manufacturer: String,
    pub product_family: String,
    pub product_version: String,
    pub difficulty: String,
    pub quality_score: f64,
    pub source_document: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KbApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub cache_capacity: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            ingest: IngestProfile::default(),
            kb_api: KbApiConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl Default for OpenAiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION as u32,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl Default for IngestProfile {
    #[inline]
    fn default() -> Self {
        Self {
            atoms_file: PathBuf::from("DEVCTO_CLAUDE_ATOMS.md"),
            atom_type: "pattern".to_string(),
            manufacturer: "devcto".to_string(),
            product_family: "agent".to_string(),
            product_version: "v1.0".to_string(),
            difficulty: "intermediate".to_string(),
            quality_score: 1.0,
            source_document: "DEVCTO_CLAUDE_ATOMS.md".to_string(),
        }
    }
}

impl Default for KbApiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
            cache_capacity: 256,
            cache_ttl_seconds: 300,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid quality score: {0} (must be between 0.0 and 1.0)")]
    InvalidQualityScore(f64),
    #[error("Invalid manufacturer: cannot be empty")]
    InvalidManufacturer,
    #[error("Invalid timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid cache capacity: {0} (must be between 1 and 100000 entries)")]
    InvalidCacheCapacity(u64),
    #[error("Invalid cache TTL: {0} (must be between 1 and 86400 seconds)")]
    InvalidCacheTtl(u64),
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                openai: OpenAiConfig::default(),
                ingest: IngestProfile::default(),
                kb_api: KbApiConfig::default(),
                base_dir: config_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Load from the platform configuration directory.
    #[inline]
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir()?;
        Self::load(config_dir)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("atom-kb"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openai.validate()?;
        self.ingest.validate()?;
        self.kb_api.validate()?;
        Ok(())
    }

    /// Get the path for the SQLite database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join("knowledge.db")
    }
}

impl OpenAiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(64..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        Ok(())
    }

    /// Full URL of the embeddings endpoint.
    pub fn embeddings_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    /// Read the API key from the configured environment variable.
    ///
    /// Absence is fatal: callers construct the embedding client before
    /// parsing begins, so a missing credential aborts the whole run.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.api_key_env.clone()))
    }
}

impl IngestProfile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manufacturer.trim().is_empty() {
            return Err(ConfigError::InvalidManufacturer);
        }

        if !(0.0..=1.0).contains(&self.quality_score) {
            return Err(ConfigError::InvalidQualityScore(self.quality_score));
        }

        Ok(())
    }
}

impl KbApiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if self.timeout_seconds == 0 || self.timeout_seconds > 300 {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if self.cache_capacity == 0 || self.cache_capacity > 100_000 {
            return Err(ConfigError::InvalidCacheCapacity(self.cache_capacity));
        }

        if self.cache_ttl_seconds == 0 || self.cache_ttl_seconds > 86_400 {
            return Err(ConfigError::InvalidCacheTtl(self.cache_ttl_seconds));
        }

        Ok(())
    }
}
