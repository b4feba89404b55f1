//! Configuration loading and database path resolution
//!
//! Resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the database location
pub const DATABASE_ENV_VAR: &str = "ROSTER_DATABASE";

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "ROSTER_CONFIG";

/// What to do with rows that lack a required key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OmissionPolicy {
    /// Exclude the row, report it, keep importing the rest of the file
    #[default]
    Skip,
    /// Reject the whole file
    Fatal,
}

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "roster_sync=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Import section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub omission_policy: OmissionPolicy,

    /// Schema used when the CLI does not name one
    #[serde(default = "default_schema")]
    pub default_schema: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            omission_policy: OmissionPolicy::default(),
            default_schema: default_schema(),
        }
    }
}

fn default_schema() -> String {
    "applicants".to_string()
}

/// Contents of `config.toml`
///
/// Every section is optional so that partial files remain valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub database_path: PathBuf,
    pub config_path: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|d| d.join("roster"))
            .unwrap_or_else(|| PathBuf::from("./roster_data"));
        let config_dir = dirs::config_dir()
            .map(|d| d.join("roster"))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            database_path: data_dir.join("roster.db"),
            config_path: config_dir.join("config.toml"),
            log_level: default_log_level(),
        }
    }
}

/// Locate the config file: explicit path, then `ROSTER_CONFIG`, then the platform default
pub fn config_file_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    CompiledDefaults::for_current_platform().config_path
}

/// Load the TOML config, degrading to defaults when the file does not exist
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolves the SQLite database location
pub struct DatabasePathResolver<'a> {
    cli_arg: Option<&'a Path>,
    toml_config: &'a TomlConfig,
}

impl<'a> DatabasePathResolver<'a> {
    pub fn new(cli_arg: Option<&'a Path>, toml_config: &'a TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_config,
        }
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = self.cli_arg {
            debug!("Database path from command line");
            return path.to_path_buf();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
            if !path.trim().is_empty() {
                debug!("Database path from {}", DATABASE_ENV_VAR);
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_config.database_path {
            debug!("Database path from TOML config");
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().database_path
    }
}
