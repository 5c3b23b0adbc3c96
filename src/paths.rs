//! Default locations for the config file and logs
//!
//! A `config.yaml` in the working directory wins (handy with `cargo run`);
//! otherwise the platform config directory is used, e.g.
//! `~/.config/obs-midi-gw/config.yaml` or `%APPDATA%\obs-midi-gw\config.yaml`.

use std::path::{Path, PathBuf};

/// Directory name used under the platform config/data directories
const APP_NAME: &str = "obs-midi-gw";

const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub config: PathBuf,
    pub logs_dir: PathBuf,
}

impl AppPaths {
    /// Resolve paths from the current directory and the platform dirs
    pub fn detect() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::resolve(&cwd, dirs::config_dir(), dirs::data_dir())
    }

    fn resolve(cwd: &Path, config_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        let local = cwd.join(CONFIG_FILE);
        if local.exists() {
            return Self {
                config: local,
                logs_dir: cwd.join("logs"),
            };
        }

        let config_base = config_dir.unwrap_or_else(|| cwd.to_path_buf()).join(APP_NAME);
        let data_base = data_dir.unwrap_or_else(|| cwd.to_path_buf()).join(APP_NAME);
        Self {
            config: config_base.join(CONFIG_FILE),
            logs_dir: data_base.join("logs"),
        }
    }
}
