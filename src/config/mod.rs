//! Configuration management for winstack
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files: stack draw-order spacing, the animation switch and the
//! catalog of window configs used to resolve dependencies.

use crate::host::WindowCatalog;
use crate::window::WindowOpenConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration struct containing all winstack settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WinstackConfig {
    /// Layer stack settings
    #[serde(default)]
    pub stack: StackConfig,

    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Known windows, keyed by `window_id`
    #[serde(default)]
    pub windows: Vec<WindowOpenConfig>,
}

/// Draw-order spacing and transition settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StackConfig {
    /// Draw-order distance between two layers
    pub layer_order_interval: i32,

    /// Draw-order distance between neighbours inside a layer
    pub in_layer_order_interval: i32,

    /// Play open/close transitions (false = every transition is instant)
    pub animations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            layer_order_interval: 1000,
            in_layer_order_interval: 20,
            animations: true,
        }
    }
}

impl StackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.in_layer_order_interval <= 0 {
            anyhow::bail!("Invalid in_layer_order_interval: must be positive");
        }
        if self.layer_order_interval < self.in_layer_order_interval {
            anyhow::bail!(
                "Invalid layer_order_interval: must be at least in_layer_order_interval ({})",
                self.in_layer_order_interval
            );
        }
        Ok(())
    }
}

impl WinstackConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = expand_home(path.as_ref())?;

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: WinstackConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.stack.validate()?;

        let mut seen = HashSet::new();
        for window in &self.windows {
            if window.window_id.is_empty() {
                anyhow::bail!("Invalid window entry: window_id must not be empty");
            }
            if !seen.insert(window.window_id.as_str()) {
                anyhow::bail!("Duplicate window id: {}", window.window_id);
            }
            if window.dependencies.iter().any(|d| *d == window.window_id) {
                anyhow::bail!("Window {} lists itself as a dependency", window.window_id);
            }
            if !window.expire_secs.is_finite() || window.expire_secs < 0.0 {
                anyhow::bail!(
                    "Invalid expire_secs for {}: must be a non-negative number",
                    window.window_id
                );
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }

    /// The `[[windows]]` entries as a dependency config resolver
    pub fn catalog(&self) -> WindowCatalog {
        WindowCatalog::from_configs(self.windows.iter().cloned())
    }

    pub fn window(&self, window_id: &str) -> Option<&WindowOpenConfig> {
        self.windows.iter().find(|w| w.window_id == window_id)
    }
}

/// Expands a leading `~` to the home directory
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Ok(Path::new(&home).join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}


#[cfg(test)]
mod property_tests;
