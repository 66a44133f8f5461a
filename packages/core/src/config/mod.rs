//! Configuration management for skyport
//!
//! Handles loading and saving config.json, and shares one in-memory copy
//! between the remote client (which stores tokens and endpoints) and the
//! command handlers (which read targets and print status).

pub mod paths;
pub mod schema;
pub mod token;
pub mod validation;

pub use schema::{Config, TargetedResource};
pub use validation::{ValidationError, ValidationWarning, validate_config};

use crate::error::ActorError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;

/// Errors from reading or writing config.json
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory (set HOME or SKYPORT_CONFIG_DIR)")]
    NoConfigDir,

    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Load config from `path`, or defaults when the file does not exist
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if contents.trim().is_empty() {
        return Ok(Config::default());
    }

    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write config to `path`, creating parent directories
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    // Tokens live in this file
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }

    Ok(())
}

/// Shared, mutable view of the config for one CLI invocation
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<Config>>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Load from `path` and remember it for [`ConfigStore::save`]
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let config = load_config_from(&path)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path),
        })
    }

    /// A store that never touches the filesystem
    pub fn in_memory(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` with read access
    pub fn read<R>(&self, f: impl FnOnce(&Config) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with write access
    pub fn update<R>(&self, f: impl FnOnce(&mut Config) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn snapshot(&self) -> Config {
        self.read(Config::clone)
    }

    /// Persist the current state (no-op for in-memory stores)
    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let config = self.snapshot();
        save_config_to(&config, path)?;
        debug!(path = %path.display(), "config saved");
        Ok(())
    }

    /// API endpoint currently targeted
    pub fn target(&self) -> Option<String> {
        self.read(|c| c.target.clone())
    }

    /// Name of the logged-in user, decoded from the stored access token
    pub fn current_user_name(&self) -> Result<Option<String>, ActorError> {
        let token = self.read(|c| c.access_token.clone());
        match token.as_deref() {
            None | Some("") => Ok(None),
            Some(token) => token::user_name_from_token(token).map(Some),
        }
    }
}
