//! Configuration file support for conductor
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/conductor/config.toml`
//! - macOS: `~/Library/Application Support/conductor/config.toml`
//! - Windows: `%APPDATA%\conductor\config.toml`

use crate::error::{Error, Result};
use crate::protocol::{AddressMode, DEFAULT_ADDRESS, DEFAULT_PORT};
use crate::sampler::DEFAULT_INTERVAL_MS;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OSC transport settings
    pub osc: OscSettings,
    /// Sampler loop settings
    pub sampler: SamplerSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(Error::Config(_)) => Self::default(),
            Err(e) => {
                log::warn!("Ignoring unreadable config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "conductor") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Reject values the receiver or sampler cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.osc.address.starts_with('/') {
            return Err(Error::Config(format!(
                "osc.address must start with '/', got '{}'",
                self.osc.address
            )));
        }
        if self.osc.address.ends_with('/') {
            return Err(Error::Config(format!(
                "osc.address must name at least one segment and not end with '/', got '{}'",
                self.osc.address
            )));
        }
        if self.sampler.interval_ms == 0 {
            return Err(Error::Config("sampler.interval_ms must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Create a default config file with comments at the default location
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config_file(&path)?;
        Ok(path)
    }

    /// Write the commented default config file to `path`
    pub fn write_default_config_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = r#"# conductor configuration file

[osc]
# Where `conductor send` delivers parameter messages
host = "127.0.0.1"
port = 4560

# Interface `conductor listen` binds to
bind = "0.0.0.0"

# Base OSC address for parameter messages
address = "/ai"

# Addressing convention:
#   "pair"   - /ai ["energy", 0.8]
#   "path"   - /ai/energy/0.8
#   "either" - accept both when listening (senders use "pair")
mode = "either"

[sampler]
# How often energy/darkness/hats are read, in milliseconds
interval_ms = 100
"#;

        fs::write(path, content)?;
        Ok(())
    }
}

/// OSC settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscSettings {
    /// Host that sent messages are delivered to
    pub host: String,
    /// UDP port, shared by sender and receiver
    pub port: u16,
    /// Interface the receiver binds to
    pub bind: String,
    /// Base OSC address
    pub address: String,
    /// Addressing convention
    pub mode: AddressMode,
}

impl Default for OscSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            bind: "0.0.0.0".to_string(),
            address: DEFAULT_ADDRESS.to_string(),
            mode: AddressMode::Either,
        }
    }
}

impl OscSettings {
    /// Send target in "host:port" format
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Sampler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// Read interval in milliseconds
    pub interval_ms: u64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl SamplerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.osc.port, 4560);
        assert_eq!(config.osc.address, "/ai");
        assert_eq!(config.osc.mode, AddressMode::Either);
        assert_eq!(config.osc.target(), "127.0.0.1:4560");
        assert_eq!(config.sampler.interval(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = Config::default();
        config.osc.mode = AddressMode::Path;
        config.sampler.interval_ms = 250;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[osc]\nport = 9000\n").unwrap();
        assert_eq!(parsed.osc.port, 9000);
        assert_eq!(parsed.osc.address, "/ai");
        assert_eq!(parsed.sampler.interval_ms, 100);
    }

    #[test]
    fn test_default_config_file_parses_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_default_config_file(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.osc.host = "10.0.0.5".to_string();
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().osc.host, "10.0.0.5");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "[osc]\naddress = \"ai\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        fs::write(&path, "[sampler]\ninterval_ms = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        fs::write(&path, "[osc]\naddress = \"/\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        fs::write(&path, "[osc]\naddress = \"/ai/\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        fs::write(&path, "[osc]\nmode = \"json\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::TomlParse(_))));
    }
}
