//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API endpoint override and the last signed-in e-mail (used to
//! prefill the sign-in form).
//!
//! Configuration is stored at `~/.config/barbook/config.json`.

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/storage directory paths
const APP_NAME: &str = "barbook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Endpoint override for staging builds; `None` means the production
    /// endpoint baked into the API client.
    pub api_base_url: Option<String>,
    /// Last e-mail that signed in, for prefilling the form.
    pub last_email: Option<String>,
}

impl Config {
    /// Load the saved configuration. Never fails: a missing file means a
    /// first launch, and an unreadable one is warned about and ignored -
    /// a broken config must not keep the app from starting.
    pub fn load() -> Self {
        let Ok(path) = Self::config_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
                Self::default()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let parent = path.parent().context("Config path has no parent")?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
        std::fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("No config directory on this platform")?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Sandbox directory for durable session storage.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir().context("No data directory on this platform")?;
        Ok(data_dir.join(APP_NAME))
    }
}
