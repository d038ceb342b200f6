// Configuration loading

use crate::storage::{DEFAULT_KEY, FileStorage, MemoryStorage, SnapshotStorage, SqliteStorage};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "tasklist";
const CONFIG_FILE: &str = "config.yaml";

/// Which storage backend holds the snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    /// Snapshot file or database path; backend default when unset
    pub path: Option<PathBuf>,
    /// Key the snapshot is stored under (SQLite only)
    pub key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            path: None,
            key: DEFAULT_KEY.to_string(),
        }
    }
}

impl Config {
    /// Load from an explicit file, else the user config file, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::from_yaml(&content).with_context(|| format!("Invalid config file {:?}", path))?;
        info!(file = ?path, backend = ?config.backend, "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content).context("Failed to parse config YAML")?;
        if config.key.trim().is_empty() {
            return Err(eyre!("Config key cannot be empty"));
        }
        Ok(config)
    }

    /// Storage location after applying backend defaults
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        let dir = dirs::data_dir()
            .ok_or_else(|| eyre!("Could not determine a data directory; set `path` in the config"))?
            .join(APP_DIR);

        Ok(match self.backend {
            Backend::Sqlite => dir.join("tasks.db"),
            Backend::File | Backend::Memory => dir.join("todos.json"),
        })
    }

    /// Open the configured backend
    pub fn open_storage(&self) -> Result<Box<dyn SnapshotStorage>> {
        let storage: Box<dyn SnapshotStorage> = match self.backend {
            Backend::Memory => Box::new(MemoryStorage::new()),
            Backend::File => Box::new(FileStorage::new(self.resolved_path()?)),
            Backend::Sqlite => {
                let sqlite = SqliteStorage::open(self.resolved_path()?, &self.key)?;
                debug!(key = sqlite.key(), "Using SQLite snapshot key");
                Box::new(sqlite)
            }
        };
        debug!(backend = ?self.backend, "Opened storage");
        Ok(storage)
    }
}

/// `<config_dir>/tasklist/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}
