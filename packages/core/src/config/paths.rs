//! Config file locations
//!
//! Defaults to the platform config directory (`~/.config/skyport` on Linux).
//! `SKYPORT_CONFIG_DIR` overrides it, which tests and CI runners rely on.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Environment variable that overrides the config directory
pub const CONFIG_DIR_ENV: &str = "SKYPORT_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.json";

/// Directory holding config.json
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "skyport").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Full path of config.json
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
