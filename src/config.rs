use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::account::auth::KdfSettings;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CustodyConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub keystore: KeystoreConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct KeystoreConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_keystore_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub kdf: KdfSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("writing default config to {path}: {reason}")]
    Write { path: String, reason: String },
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:9797".to_string()
}

fn default_keystore_path() -> PathBuf {
    PathBuf::from("./keystore")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            path: default_keystore_path(),
            kdf: KdfSettings::default(),
        }
    }
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            keystore: KeystoreConfig::default(),
        }
    }
}

impl CustodyConfig {
    /// Load the config at `path`; a missing file is created with defaults.
    ///
    /// A file that exists but does not parse is an error, never silently
    /// replaced by defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            let config = toml::from_str(&s).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
            info!("Config loaded from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            let s = toml::to_string_pretty(&config).map_err(|e| ConfigError::Write {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            std::fs::write(path, s).map_err(|e| ConfigError::Write {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            info!("Config file not found at '{}'. Created default.", path.display());
            Ok(config)
        }
    }
}
