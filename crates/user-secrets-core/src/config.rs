//! Configuration for the user-secrets tool

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::{Paths, ROOT_ENV_VAR};

/// Tool configuration, read from `~/.config/user-secrets/config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Alternate root for per-identifier stores
    #[serde(default)]
    pub store_root: Option<PathBuf>,

    /// Build configuration used when none is given on the command line
    #[serde(default = "default_configuration")]
    pub default_configuration: String,

    /// How many levels of `<Import>` to follow when looking for an id
    #[serde(default = "default_max_import_depth")]
    pub max_import_depth: usize,

    /// Mask the value echoed back by `set`
    #[serde(default = "default_mask_values")]
    pub mask_values: bool,
}

fn default_configuration() -> String {
    "Debug".to_string()
}

fn default_max_import_depth() -> usize {
    32
}

fn default_mask_values() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: None,
            default_configuration: default_configuration(),
            max_import_depth: default_max_import_depth(),
            mask_values: default_mask_values(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            if content.trim().is_empty() {
                return Ok(Self::default());
            }
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply the configured stores root to `paths`.
    ///
    /// `env_root` is the value of `USER_SECRETS_ROOT`, which wins over
    /// `store_root` when set and non-empty.
    pub fn apply(&self, paths: Paths, env_root: Option<String>) -> Paths {
        match env_root.filter(|r| !r.is_empty()) {
            Some(root) => paths.with_stores_root(root),
            None => match &self.store_root {
                Some(root) => paths.with_stores_root(root),
                None => paths,
            },
        }
    }

    /// `apply` with the root taken from the process environment
    pub fn apply_env(&self, paths: Paths) -> Paths {
        self.apply(paths, std::env::var(ROOT_ENV_VAR).ok())
    }
}
