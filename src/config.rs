use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::http::{DEFAULT_TIMEOUT_SECS, default_user_agent};
use crate::s3::{DEFAULT_PART_SIZE, MIN_PART_SIZE, StorageSettings};

pub const CONFIG_FILE_NAME: &str = "bank-sync.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    /// Per storage call; falls back to `timeout_secs`.
    #[serde(default)]
    pub upload_timeout_secs: Option<u64>,
    #[serde(default)]
    pub part_size_mib: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub storage: StorageSettings,
    pub workers: usize,
    pub source: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default(), None)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist. Without one, `bank-sync.json` in the
    /// working directory and then the user config directory are tried, and
    /// built-in defaults apply when neither exists.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SyncError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };

        match config_path {
            Some(config_path) => {
                let config = Self::read(&config_path)?;
                Ok(Self::resolve_config(config, Some(config_path)))
            }
            None => Ok(ResolvedConfig::default()),
        }
    }

    pub fn read(path: &Path) -> Result<Config, SyncError> {
        let content =
            fs::read_to_string(path).map_err(|_| SyncError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| SyncError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config, source: Option<PathBuf>) -> ResolvedConfig {
        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let upload_timeout_secs = config.upload_timeout_secs.unwrap_or(timeout_secs);
        let part_size = config
            .part_size_mib
            .map_or(DEFAULT_PART_SIZE, |mib| mib.saturating_mul(1024 * 1024))
            .max(MIN_PART_SIZE);
        ResolvedConfig {
            timeout: Duration::from_secs(timeout_secs),
            user_agent: config.user_agent.unwrap_or_else(default_user_agent),
            storage: StorageSettings {
                region: config.region,
                endpoint_url: config.endpoint_url,
                timeout: Some(Duration::from_secs(upload_timeout_secs)),
                part_size,
            },
            workers: config.workers.unwrap_or(1).max(1),
            source,
        }
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "bank-sync")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }
}
