use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config directory not found")]
    NoConfigDir,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Language tag sent to plugins in `GetInfo`
    pub language: String,
    pub plugins: PluginsConfig,
    pub log: LogConfig,
    /// Global key bindings, key name to command line
    pub keys: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub enabled: bool,
    /// Extra directories searched for plugins, after the built-in ones
    pub search_paths: Vec<PathBuf>,
    pub handshake_timeout_ms: u64,
    pub info_timeout_ms: u64,
    pub quit_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            plugins: PluginsConfig::default(),
            log: LogConfig::default(),
            keys: BTreeMap::new(),
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_paths: Vec::new(),
            handshake_timeout_ms: 5000,
            info_timeout_ms: 10000,
            quit_timeout_ms: 1000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl ConfigFile {
    pub fn load() -> Result<Self, ConfigError> {
        // Priority: ./wi.toml -> ~/.config/wi/wi.toml -> default
        let paths = [
            std::env::current_dir()?.join("wi.toml"),
            dirs::config_dir()
                .ok_or(ConfigError::NoConfigDir)?
                .join("wi/wi.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }
}

impl PluginsConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn info_timeout(&self) -> Duration {
        Duration::from_millis(self.info_timeout_ms)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }
}

impl LogConfig {
    /// Configured log file, else `<data_dir>/wi/wi.log`
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("wi").join("wi.log")))
    }
}
