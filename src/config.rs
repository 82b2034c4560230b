use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::io::DEFAULT_QUOTA;
use crate::photo::PhotoSettings;

/// Tunables of the records core. Missing keys in a config file fall back to
/// the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory backing the file store.
    pub data_dir: PathBuf,
    /// Maximum bytes of a single key/value pair.
    pub store_quota: usize,
    pub session_ttl_hours: i64,
    pub operator: OperatorConfig,
    /// Confirmation value required before an update is applied.
    pub step_up_secret: String,
    pub page_size: usize,
    pub photo: PhotoSettings,
    /// Default `env_logger` filter, overridden by `RUST_LOG`.
    pub log_filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub username: String,
    pub password: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("diary"),
            store_quota: DEFAULT_QUOTA,
            session_ttl_hours: 24,
            operator: OperatorConfig::default(),
            step_up_secret: "72991".to_string(),
            page_size: 5,
            photo: PhotoSettings::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Installs `env_logger`. Later calls keep the first logger.
    pub fn init_logging(&self) {
        let env = env_logger::Env::default().default_filter_or(self.log_filter.as_str());
        if env_logger::Builder::from_env(env).try_init().is_err() {
            log::debug!("logger already initialised");
        }
    }
}
