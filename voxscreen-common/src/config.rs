//! Configuration loading
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `VOXSCREEN_CONFIG` environment variable
//! 3. User config directory (`<config_dir>/voxscreen/config.toml`)
//! 4. Built-in defaults (fallback)
//!
//! Every table and key is optional; missing values take the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::normalizer::Normalizer;
use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "VOXSCREEN_CONFIG";

/// Default gateway port
pub const DEFAULT_GATEWAY_PORT: u16 = 5730;

/// Complete configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub gateway: GatewayConfig,
    pub client: ClientConfig,
    pub normalizer: NormalizerConfig,
    pub logging: LoggingConfig,
}

/// Gateway (proxy) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the external inference service
    pub upstream_url: String,
    pub upstream_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_GATEWAY_PORT,
            upstream_url: "http://localhost:5000".to_string(),
            upstream_timeout_secs: 60,
        }
    }
}

impl GatewayConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Client (CLI) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the voxscreen gateway
    pub gateway_url: String,
    pub request_timeout_secs: u64,
    /// Where session state is persisted (defaults to the OS data directory)
    pub state_dir: Option<PathBuf>,
    /// Recording auto-stop ceiling in seconds (clamped to 10..=30)
    pub recording_limit_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: format!("http://127.0.0.1:{}", DEFAULT_GATEWAY_PORT),
            request_timeout_secs: 60,
            state_dir: None,
            recording_limit_secs: 10,
        }
    }
}

impl ClientConfig {
    pub fn resolved_state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }
}

/// Extra verdict label synonyms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub positive_labels: Vec<String>,
    pub negative_labels: Vec<String>,
}

impl NormalizerConfig {
    pub fn build(&self) -> Normalizer {
        Normalizer::with_extra_labels(&self.positive_labels, &self.negative_labels)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Pick the config file to read, if any
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory, only if the file exists
    dirs::config_dir()
        .map(|d| d.join("voxscreen").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load configuration following the resolution priority.
///
/// An explicitly named file (CLI or environment) must exist and parse; with no
/// file at all the built-in defaults are returned.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = read_config_file(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => {
            debug!("No configuration file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Parse a single TOML config file
pub fn read_config_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// OS-dependent default directory for persisted session state
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("voxscreen"))
        .unwrap_or_else(|| PathBuf::from("./voxscreen_data"))
}
