//! Runtime configuration.
//!
//! Values come from `config/lifeflow.toml` (optional) overlaid with
//! environment variables prefixed `LIFEFLOW__`, using `__` between section
//! and key, e.g. `LIFEFLOW__DATABASE__PATH=/var/lib/lifeflow.db`.

use std::path::{Path, PathBuf};

use ::config::{Config, ConfigError, Environment, File, FileFormat, FileSourceFile};
use serde::{Deserialize, Serialize};

use crate::domain::InventoryThresholds;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/lifeflow.toml";

const ENV_PREFIX: &str = "LIFEFLOW";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeflowConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub inventory: InventoryConfig,
    pub stats: StatsConfig,
    pub donations: DonationsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/lifeflow.db"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    #[default]
    Stderr,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub mode: LogMode,
    pub file: PathBuf,
    /// Used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            mode: LogMode::Stderr,
            file: PathBuf::from("data/lifeflow.log"),
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub low_below: u32,
    pub critical_below: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        let t = InventoryThresholds::default();
        Self {
            low_below: t.low_below,
            critical_below: t.critical_below,
        }
    }
}

impl InventoryConfig {
    #[must_use]
    pub fn thresholds(&self) -> InventoryThresholds {
        InventoryThresholds {
            low_below: self.low_below,
            critical_below: self.critical_below,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub window_days: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { window_days: 30 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DonationsConfig {
    /// Rows returned by donation-history listings
    pub history_limit: usize,
}

impl Default for DonationsConfig {
    fn default() -> Self {
        Self { history_limit: 50 }
    }
}

impl LifeflowConfig {
    /// Load from `path` (may be missing) and the environment.
    ///
    /// An unreadable or malformed file is reported and skipped; the
    /// environment still applies.
    ///
    /// # Errors
    /// Returns error if a value has the wrong shape.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file_layer(path) {
            builder = builder.add_source(file);
        }
        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }
}

/// The file source for `path`, or `None` when the file exists but does not parse.
fn file_layer(path: &Path) -> Option<File<FileSourceFile, FileFormat>> {
    let file = || File::from(path).required(false);
    match Config::builder().add_source(file()).build() {
        Ok(_) => Some(file()),
        Err(err) => {
            // Logging is configured from these values, so it isn't up yet.
            eprintln!("Warning: ignoring config file {}: {err}", path.display());
            None
        }
    }
}
