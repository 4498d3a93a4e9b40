// ABOUTME: Config file loading and settings resolution for the ember CLI
// ABOUTME: Precedence is flag > environment > ~/.config/ember/config.toml > default

use anyhow::{Context, Result};
use ember_ca::{normalize_address, DEFAULT_AUTHORITY};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Seconds to wait for the certificate authority when nothing else is set.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// On-disk config. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct EmberConfig {
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl EmberConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|d| d.join(".config/ember/config.toml"))
    }

    /// Load the default config file, falling back to defaults if it is missing or broken.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring config file {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Values the flags and environment supplied. Clap has already merged env into these.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub authority: Option<String>,
    pub token: Option<String>,
    pub organization: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub authority: String,
    pub token: Option<String>,
    pub organization: Option<String>,
    pub timeout: Duration,
}

impl Settings {
    pub fn resolve(overrides: Overrides, config: EmberConfig) -> Self {
        let authority = overrides
            .authority
            .or(config.authority)
            .map(|a| normalize_address(&a))
            .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string());

        let timeout_secs = overrides
            .timeout_secs
            .or(config.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            authority,
            token: overrides.token.or(config.token),
            organization: overrides.organization.or(config.organization),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}
