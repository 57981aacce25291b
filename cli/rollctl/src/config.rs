//! Configuration for reaching the scheduler.
//!
//! Handles:
//! - Scheduler address, ACL token and namespace
//! - An optional JSON config file in the platform config directory
//!
//! Flags and `NOMAD_*` environment variables (applied by clap) win over the
//! file; the file wins over built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Scheduler address used when nothing else is configured.
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:4646";

/// Get the config file path.
fn config_path() -> Result<PathBuf> {
    ProjectDirs::from("io", "rollwatch", "rollctl")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// CLI configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Scheduler HTTP API address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// ACL token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Namespace jobs are tracked in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Config {
    /// Load config from the platform config directory, or return default.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load config from a specific file, or return default if it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Apply flag/env overrides on top of the file.
    pub fn with_overrides(
        mut self,
        address: Option<String>,
        token: Option<String>,
        namespace: Option<String>,
    ) -> Self {
        if address.is_some() {
            self.address = address;
        }
        if token.is_some() {
            self.token = token;
        }
        if namespace.is_some() {
            self.namespace = namespace;
        }
        self
    }

    /// Scheduler address, without a trailing slash.
    pub fn address(&self) -> &str {
        self.address
            .as_deref()
            .unwrap_or(DEFAULT_ADDRESS)
            .trim_end_matches('/')
    }

    pub fn namespace(&self) -> &str {
        self.namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(rollwatch_id::Namespace::DEFAULT)
    }
}
