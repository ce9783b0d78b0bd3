//! Configuration loading and defaults
//!
//! Configuration is plain TOML with built-in defaults for every field, so
//! an empty file (or no file at all) yields a working setup:
//!
//! ```toml
//! default_lang = "en"
//!
//! [storage]
//! db_path = "jukebox.db"
//! max_connections = 5
//!
//! [lock]
//! auto_unlock = true
//! stale_after_secs = 240
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Language code used when an inbound event carries no sender language.
pub const DEFAULT_LANG: &str = "en";

/// Top-level configuration for the coordination core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage gateway settings.
    pub storage: StorageConfig,
    /// Lock manager settings.
    pub lock: LockConfig,
    /// Fallback language for synthesized contexts.
    pub default_lang: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            lock: LockConfig::default(),
            default_lang: DEFAULT_LANG.to_string(),
        }
    }
}

impl Config {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Load a configuration file, falling back to defaults if it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }
}

/// Settings for the shared database pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub db_path: PathBuf,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Minimum pooled connections kept warm.
    pub min_connections: u32,
    /// Truncate lock/context/playlist state during installation.
    /// A restarted bot has no calls in progress, so persisted
    /// coordination state from a previous run is garbage.
    pub reset_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("jukebox.db"),
            max_connections: 5,
            min_connections: 1,
            reset_on_start: false,
        }
    }
}

/// Settings for chat lock acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Reclaim locks whose holder appears to have died.
    pub auto_unlock: bool,
    /// Seconds after which a held lock is considered abandoned.
    pub stale_after_secs: i64,
    /// Bounded acquisition attempts before the unconditional fallback.
    pub acquire_tries: u32,
    /// Sleep between bounded acquisition attempts, in milliseconds.
    pub acquire_sleep_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            auto_unlock: true,
            stale_after_secs: 240,
            acquire_tries: 10,
            acquire_sleep_ms: 500,
        }
    }
}
