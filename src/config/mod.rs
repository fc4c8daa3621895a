// Configuration management module
// Handles the TOML settings file and environment-provided credentials

pub mod settings;


pub use settings::{Config, ConfigError, IngestProfile, KbApiConfig, OpenAiConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
