//! Layered configuration.
//!
//! Sources, lowest precedence first:
//! - Built-in defaults
//! - A TOML file: an explicit path, or the first of `./config.toml`,
//!   `./config/config.toml`, `~/.calp/config.toml`, `/etc/calp/config.toml`
//! - Environment variables
//!
//! # Environment Variables
//!
//! Variables are prefixed with `CALP_` and use double underscores to
//! separate nested levels:
//! - `CALP_WEBSERVER__ADDRESS=127.0.0.1:9000` sets `webserver.address`
//! - `CALP_WEBSERVER__DEBUG=true` sets `webserver.debug`
//! - `CALP_WATCHER__REPLAY_EXISTING=false` sets `watcher.replay_existing`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "CALP_";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Directories (or files) holding provider YAML files.
    #[serde(default)]
    pub providers: Vec<PathBuf>,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub webserver: WebServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatcherConfig {
    /// Load files already present in provider directories on startup.
    #[serde(default = "default_true")]
    pub replay_existing: bool,

    /// Extensions treated as provider files. Empty accepts everything.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WebServerConfig {
    /// Enables permissive CORS for `cors_origin`.
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for every target.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `calp::watcher = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["yaml".to_string(), "yml".to_string()]
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cors_origin() -> String {
    "https://127.0.0.1:3000".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            replay_existing: default_true(),
            extensions: default_extensions(),
        }
    }
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            address: default_address(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load from the first config file found in the search paths, if any.
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::find_config_file())
    }

    /// Load from a specific file, which must exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::extract(Some(path.to_path_buf()))
    }

    fn extract(file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        if let Some(path) = file {
            crate::debug_event!("config", "loading", "{}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        figment
            // Double underscore separates nesting; single underscores stay in names
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// Config file search order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from("config").join(CONFIG_FILE_NAME),
        ];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".calp").join(CONFIG_FILE_NAME));
        }
        paths.push(PathBuf::from("/etc/calp").join(CONFIG_FILE_NAME));
        paths
    }

    fn find_config_file() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.is_file())
    }
}
