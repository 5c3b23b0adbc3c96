//! Configuration management for OBS MIDI GW
//!
//! Handles loading, validating, saving and hot-reloading the YAML document
//! that lists the OBS connection and every device with its bindings.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

use crate::binding::Binding;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub obs: ObsConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// OBS WebSocket configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObsConfig {
    #[serde(default = "default_obs_host")]
    pub host: String,
    #[serde(default = "default_obs_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_obs_host(),
            port: default_obs_port(),
            password: None,
        }
    }
}

/// One control surface and its bindings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Input port name (substring match)
    pub name: String,
    /// Output port name when it differs from the input's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outname: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default)]
    pub hooks: Vec<Binding>,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outname: None,
            enabled: false,
            bidirectional: false,
            hooks: Vec::new(),
        }
    }

    /// Port used for feedback
    pub fn output_port(&self) -> &str {
        self.outname
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load the file if it exists, else start from an empty configuration
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            tracing::info!("No config at {}, starting with no devices", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.obs.host.is_empty() {
            anyhow::bail!("OBS host cannot be empty");
        }

        let mut names = HashSet::new();
        for (idx, device) in self.devices.iter().enumerate() {
            if device.name.is_empty() {
                anyhow::bail!("Device {} name cannot be empty", idx);
            }
            if !names.insert(device.name.as_str()) {
                anyhow::bail!("Device '{}' is defined twice", device.name);
            }

            for (hook_idx, hook) in device.hooks.iter().enumerate() {
                validate_binding(hook).with_context(|| {
                    format!("Invalid binding {} on device '{}'", hook_idx, device.name)
                })?;
            }
        }

        Ok(())
    }

    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.name == name)
    }
}

fn validate_binding(binding: &Binding) -> Result<()> {
    if binding.index > 127 {
        anyhow::bail!("index {} out of range (0-127)", binding.index);
    }
    if binding.channel > 15 {
        anyhow::bail!("channel {} out of range (0-15)", binding.channel);
    }
    if let Some(value) = binding.value_filter {
        if value > 127 {
            anyhow::bail!("value filter {} out of range (0-127)", value);
        }
    }
    if let (Some(min), Some(max)) = (binding.range_min, binding.range_max) {
        if !min.is_finite() || !max.is_finite() {
            anyhow::bail!("range must be finite");
        }
    }
    Ok(())
}

fn default_obs_host() -> String {
    "localhost".to_string()
}

fn default_obs_port() -> u16 {
    4455
}
